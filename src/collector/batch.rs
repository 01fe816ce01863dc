use std::future::Future;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

/// Classification and download batches are five wide: each group fully
/// resolves before the next one starts.
pub const BATCH_WIDTH: usize = 5;

/// Runs `work` over `items` in fixed-size concurrent groups, invoking
/// `on_batch` with each group's flattened results and the group width.
///
/// The token is polled at group boundaries only: a group already in flight
/// when cancellation lands runs to completion, but its results are discarded
/// rather than delivered.
pub async fn process_batches<T, R, F, Fut, S>(
    items: Vec<T>,
    token: &CancellationToken,
    work: F,
    mut on_batch: S,
) where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Vec<R>>,
    S: FnMut(Vec<R>, usize),
{
    let mut iter = items.into_iter();
    loop {
        if token.is_cancelled() {
            return;
        }
        let group: Vec<T> = iter.by_ref().take(BATCH_WIDTH).collect();
        if group.is_empty() {
            return;
        }
        let width = group.len();
        let results = join_all(group.into_iter().map(&work)).await;
        if token.is_cancelled() {
            return;
        }
        on_batch(results.into_iter().flatten().collect(), width);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn groups_are_sequential_and_bounded() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let mut widths = Vec::new();

        process_batches(
            (0..12).collect(),
            &token,
            |n: usize| {
                let current = current.clone();
                let peak = peak.clone();
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    vec![n]
                }
            },
            |results, width| widths.push((results.len(), width)),
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= BATCH_WIDTH);
        assert_eq!(widths, vec![(5, 5), (5, 5), (2, 2)]);
    }

    #[tokio::test]
    async fn cancellation_discards_the_in_flight_group() {
        let token = CancellationToken::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let cancel_during_first = token.clone();

        let d = delivered.clone();
        process_batches(
            (0..10).collect(),
            &token,
            move |n: usize| {
                let cancel = cancel_during_first.clone();
                async move {
                    // cancel while the first group is in flight
                    cancel.cancel();
                    vec![n]
                }
            },
            move |results: Vec<usize>, _| {
                d.fetch_add(results.len(), Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(delivered.load(Ordering::SeqCst), 0);
    }
}
