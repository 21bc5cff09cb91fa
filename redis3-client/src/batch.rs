//! Bounded fan-out with input-ordered results.
//!
//! Operations are dispatched in input order, at most `concurrency` at a time,
//! and complete in whatever order the backend answers. Each future is tagged
//! with its input index and its output parked in that slot, so the returned
//! vector lines up with the input regardless of completion order.

use std::future::Future;

use futures_util::stream::{self, StreamExt};
use redis3_core::{Redis3Error, Redis3Result};

/// Run `op` over `items` with bounded concurrency, returning outputs in input order.
///
/// Every operation runs to completion; a failing one does not cancel its
/// siblings.
pub(crate) async fn ordered_fan_out<I, F, Fut, T>(items: I, concurrency: usize, mut op: F) -> Vec<T>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T>,
{
    let items: Vec<I::Item> = items.into_iter().collect();
    let mut slots: Vec<Option<T>> = (0..items.len()).map(|_| None).collect();

    let mut completions = stream::iter(items.into_iter().enumerate())
        .map(|(index, item)| {
            let pending = op(item);
            async move { (index, pending.await) }
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((index, output)) = completions.next().await {
        slots[index] = Some(output);
    }

    // buffer_unordered drains every future, so no slot is left empty.
    slots.into_iter().flatten().collect()
}

/// Collapse per-position outcomes into a single result.
///
/// Succeeds with the plain values when every position succeeded, otherwise
/// fails with [`Redis3Error::BatchFailed`] listing each failed index.
pub(crate) fn settle<T>(operation: &str, outcomes: Vec<Redis3Result<T>>) -> Redis3Result<Vec<T>> {
    let total = outcomes.len();
    let mut values = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(value) => values.push(value),
            Err(e) => failures.push((index, e)),
        }
    }

    if failures.is_empty() {
        Ok(values)
    } else {
        Err(Redis3Error::BatchFailed {
            operation: operation.to_string(),
            total,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_input_order_not_completion_order() {
        // Later items finish first.
        let delays = [50u64, 40, 30, 20, 10];
        let finished = std::sync::Mutex::new(Vec::new());

        let results = ordered_fan_out(delays.iter().enumerate(), 8, |(i, ms)| {
            let finished = &finished;
            async move {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                finished.lock().expect("lock").push(i);
                i * 10
            }
        })
        .await;

        assert_eq!(results, vec![0, 10, 20, 30, 40]);
        assert_eq!(*finished.lock().expect("lock"), vec![4, 3, 2, 1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = ordered_fan_out(0..20, 3, |i| {
            let in_flight = &in_flight;
            let peak = &peak;
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                i
            }
        })
        .await;

        assert_eq!(results, (0..20).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let results: Vec<u8> = ordered_fan_out(Vec::<u8>::new(), 4, |x| async move { x }).await;
        assert!(results.is_empty());
    }

    #[test]
    fn test_settle_all_ok() {
        let outcomes: Vec<Redis3Result<bool>> = vec![Ok(true), Ok(true)];
        assert_eq!(settle("mset", outcomes).expect("all ok"), vec![true, true]);
    }

    #[test]
    fn test_settle_reports_failed_indexes() {
        let unavailable = || Redis3Error::BackendUnavailable {
            operation: "get".to_string(),
            reason: "reset".to_string(),
        };
        let outcomes: Vec<Redis3Result<Option<String>>> =
            vec![Ok(None), Err(unavailable()), Ok(Some("x".to_string())), Err(unavailable())];

        match settle("mget", outcomes) {
            Err(Redis3Error::BatchFailed {
                operation,
                total,
                failures,
            }) => {
                assert_eq!(operation, "mget");
                assert_eq!(total, 4);
                let indexes: Vec<usize> = failures.iter().map(|(i, _)| *i).collect();
                assert_eq!(indexes, vec![1, 3]);
            }
            other => panic!("expected BatchFailed, got {other:?}"),
        }
    }
}
