use std::future::Future;

use futures::{stream, StreamExt, TryStreamExt};

/// Run a fallible async `f` over `items` with at most `limit` futures in
/// flight at once.
///
/// Results are collected in input order regardless of completion order.
/// The first error aborts the remaining work; dropping the returned future
/// cancels everything still in flight.
pub async fn concurrent_map<I, T, E, F, Fut>(items: I, f: F, limit: usize) -> Result<Vec<T>, E>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    stream::iter(items.into_iter().map(f))
        .buffered(limit.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn results_in_input_order() {
        let out: Result<Vec<_>, ()> =
            block_on(concurrent_map(0..100u64, |n| async move { Ok(n * 2) }, 7));
        assert_eq!(out.unwrap(), (0..100).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn zero_limit_still_progresses() {
        let out: Result<Vec<_>, ()> =
            block_on(concurrent_map(0..4u64, |n| async move { Ok(n) }, 0));
        assert_eq!(out.unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn first_error_surfaces() {
        let out: Result<Vec<u64>, String> = block_on(concurrent_map(
            0..10u64,
            |n| async move {
                if n == 3 {
                    Err(format!("bad item {n}"))
                } else {
                    Ok(n)
                }
            },
            2,
        ));
        assert_eq!(out.unwrap_err(), "bad item 3");
    }
}
