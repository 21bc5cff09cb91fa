//! Logical database numbers.
//!
//! A database number is only a key prefix inside the cache bucket. Switching
//! numbers never moves or deletes objects written under the previous one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Logical database number, the namespace prefix of every object key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DbNumber(i64);

impl DbNumber {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for DbNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<DbNumber> for i64 {
    fn from(db: DbNumber) -> Self {
        db.0
    }
}

impl FromStr for DbNumber {
    type Err = ValidationError;

    /// Parse a base-10 integer, tolerating surrounding whitespace and a sign.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim()
            .parse::<i64>()
            .map(DbNumber)
            .map_err(|e| ValidationError::InvalidDatabaseNumber {
                value: raw.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Values that can be coerced into a [`DbNumber`].
///
/// Coercion is checked: a failed conversion reports
/// [`ValidationError::InvalidDatabaseNumber`] and never yields a partial value.
pub trait IntoDbNumber {
    fn into_db_number(self) -> Result<DbNumber, ValidationError>;
}

impl IntoDbNumber for DbNumber {
    fn into_db_number(self) -> Result<DbNumber, ValidationError> {
        Ok(self)
    }
}

impl IntoDbNumber for &str {
    fn into_db_number(self) -> Result<DbNumber, ValidationError> {
        self.parse()
    }
}

impl IntoDbNumber for String {
    fn into_db_number(self) -> Result<DbNumber, ValidationError> {
        self.as_str().parse()
    }
}

impl IntoDbNumber for &String {
    fn into_db_number(self) -> Result<DbNumber, ValidationError> {
        self.as_str().parse()
    }
}

macro_rules! impl_into_db_number_for_int {
    ($($ty:ty),*) => {
        $(
            impl IntoDbNumber for $ty {
                fn into_db_number(self) -> Result<DbNumber, ValidationError> {
                    i64::try_from(self)
                        .map(DbNumber)
                        .map_err(|e| ValidationError::InvalidDatabaseNumber {
                            value: self.to_string(),
                            reason: e.to_string(),
                        })
                }
            }
        )*
    };
}

impl_into_db_number_for_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
