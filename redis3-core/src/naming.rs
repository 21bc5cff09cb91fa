//! Deterministic bucket and object naming.
//!
//! A cache maps to exactly one bucket, and every logical key maps to one
//! object inside it. Database numbers partition the bucket by key prefix:
//!
//! ```text
//! bucket:  redis3-mycache--use1-az5--x-s3
//! objects: 0/foo, 0/bar, 100/foo_100
//! ```

use crate::db::DbNumber;

/// Bucket prefix used when the caller does not override it.
pub const DEFAULT_BUCKET_PREFIX: &str = "redis3";

/// Availability zone the bucket is placed in when no hint is given.
pub const DEFAULT_LOCALITY_HINT: &str = "use1-az5";

/// Separator between the prefix and the cache name.
const NAME_SEPARATOR: &str = "-";

/// Separator wrapping the locality hint in zonal bucket names.
const ZONE_SEPARATOR: &str = "--";

/// Fixed suffix of zonal (directory) bucket names.
const ZONAL_SUFFIX: &str = "x-s3";

/// Separator between the database number and the user key.
const DB_SEPARATOR: char = '/';

/// Build the bucket name backing a cache.
///
/// Without a locality hint the name is `{prefix}-{cache_name}`. With one it
/// follows the zonal directory-bucket shape `{prefix}-{cache_name}--{hint}--x-s3`.
/// Backend naming constraints (length, character set) are the caller's
/// responsibility.
pub fn container_name(
    bucket_prefix: &str,
    cache_name: &str,
    locality_hint: Option<&str>,
) -> String {
    let base = format!("{bucket_prefix}{NAME_SEPARATOR}{cache_name}");
    match locality_hint {
        Some(hint) => format!("{base}{ZONE_SEPARATOR}{hint}{ZONE_SEPARATOR}{ZONAL_SUFFIX}"),
        None => base,
    }
}

/// Build the object key for a user key in a database: `{db}/{user_key}`.
pub fn object_key(db: DbNumber, user_key: &str) -> String {
    format!("{db}{DB_SEPARATOR}{user_key}")
}

/// Listing prefix covering every object of one database: `{db}/`.
pub fn db_prefix(db: DbNumber) -> String {
    format!("{db}{DB_SEPARATOR}")
}

/// Recover the user key from an object key of database `db`.
///
/// Returns `None` when the object key belongs to another database.
pub fn strip_db_prefix(db: DbNumber, object_key: &str) -> Option<&str> {
    object_key.strip_prefix(db_prefix(db).as_str())
}
