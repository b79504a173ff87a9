//! Fan-out resolution
//!
//! Expanding an index entry issues one resolution per reference. They are
//! independent, so they run concurrently; the results are put back in input
//! order and failed or absent items are dropped. One dangling reference
//! never fails the batch.
//!
//! Mutations do the opposite and stop at the first error (`?`, `try_join!`).

use futures::future::join_all;
use std::future::Future;
use tracing::debug;

use crate::error::Result;

/// Run every resolution, keep the successes in input order
pub async fn resolve_all<I, F, T>(resolutions: I) -> Vec<T>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<Option<T>>>,
{
    join_all(resolutions)
        .await
        .into_iter()
        .enumerate()
        .filter_map(|(index, outcome)| match outcome {
            Ok(Some(value)) => Some(value),
            Ok(None) => {
                debug!(index, "Fan-out item did not resolve");
                None
            }
            Err(e) => {
                debug!(index, error = %e, "Fan-out item failed");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_order_preserved_and_failures_dropped() {
        let delays = [30u64, 0, 20, 10, 5];
        let futures = delays.iter().enumerate().map(|(i, delay)| async move {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
            match i {
                1 => Err(IndexError::unavailable("x")),
                3 => Ok(None),
                _ => Ok(Some(i)),
            }
        });
        assert_eq!(resolve_all(futures).await, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let futures: Vec<std::future::Ready<Result<Option<u8>>>> = Vec::new();
        assert!(resolve_all(futures).await.is_empty());
    }
}
