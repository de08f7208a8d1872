//! Concurrent retrieval of paginated resources.
//!
//! Two shapes of work are supported:
//!
//! - [`fetch_all_pages`] walks an open-ended page sequence. Workers claim page numbers from
//!   a shared [`PageCursor`] and the first empty page ends the walk for everybody.
//! - [`fetch_all_indexed`] walks a list that is known up front, one request per entry.
//!
//! In both cases workers publish non-empty batches through a bounded channel
//! (capacity twice the worker count) to the calling task, which concatenates them. The
//! channel closes once every worker has dropped its sender, so draining it doubles as
//! waiting for the workers. Batches arrive in completion order, not page order.
//!
//! A failed request is logged and counts as an empty result. It is never retried. For
//! [`fetch_all_pages`] this means a failure ends the walk, as does a transient empty page
//! from the server; both are accepted in exchange for not depending on total-count headers.

use crate::Result;
use core::num::NonZeroUsize;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

const LOG_TARGET: &str = "     pager";

/// Units completed between two progress log lines in [`fetch_all_indexed`].
pub const PROGRESS_INTERVAL: usize = 100;

/// Shared page counter and end-of-data flag for one paginated walk.
///
/// Page numbers are only ever handed out by [`PageCursor::claim`], so no two workers
/// can request the same page.
#[derive(Debug)]
pub struct PageCursor {
    next_page: AtomicU64,
    exhausted: AtomicBool,
}

impl PageCursor {
    /// Create a cursor whose first claim returns page 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_page: AtomicU64::new(1),
            exhausted: AtomicBool::new(false),
        }
    }

    /// Take the next unclaimed page number.
    pub fn claim(&self) -> u64 {
        self.next_page.fetch_add(1, Ordering::AcqRel)
    }

    /// Record that an empty page was seen.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn mark_exhausted(&self) -> bool {
        !self.exhausted.swap(true, Ordering::AcqRel)
    }

    /// Number of page numbers handed out so far.
    #[must_use]
    pub fn claimed(&self) -> u64 {
        self.next_page.load(Ordering::Acquire) - 1
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }
}

impl Default for PageCursor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch every page of a resource using `workers` concurrent tasks.
///
/// `fetch_page` is called with 1-based page numbers. `what` names the resource in log
/// output.
pub async fn fetch_all_pages<T, F, Fut>(what: &'static str, workers: NonZeroUsize, fetch_page: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    let start = Instant::now();

    let fetch_page = Arc::new(fetch_page);
    let cursor = Arc::new(PageCursor::new());
    let (tx, mut rx) = mpsc::channel(workers.get().saturating_mul(2));

    let handles: Vec<_> = (0..workers.get())
        .map(|_| {
            tokio::spawn(page_worker(
                what,
                Arc::clone(&fetch_page),
                Arc::clone(&cursor),
                tx.clone(),
            ))
        })
        .collect();
    drop(tx);

    let mut all = Vec::new();
    while let Some(batch) = rx.recv().await {
        all.extend(batch);
    }
    join_workers(what, handles).await;

    log::debug!(
        target: LOG_TARGET,
        "Walked {} {what} page(s) in {:.2?}",
        cursor.claimed(),
        start.elapsed()
    );
    all
}

async fn page_worker<T, F, Fut>(what: &'static str, fetch_page: Arc<F>, cursor: Arc<PageCursor>, tx: mpsc::Sender<Vec<T>>)
where
    F: Fn(u64) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    while !cursor.is_exhausted() {
        let page = cursor.claim();

        let items = match fetch_page(page).await {
            Ok(items) => items,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch {what} page {page}: {e:#}");
                Vec::new()
            }
        };

        if items.is_empty() {
            if cursor.mark_exhausted() {
                log::debug!(target: LOG_TARGET, "No {what} on page {page}, stopping");
            }
            return;
        }

        if tx.send(items).await.is_err() {
            return;
        }
    }
}

/// Issue exactly one request per entry of `keys` using `workers` concurrent tasks.
///
/// `what` names the unit of work in progress output, which is logged every
/// [`PROGRESS_INTERVAL`] completed units.
pub async fn fetch_all_indexed<K, T, F, Fut>(what: &'static str, workers: NonZeroUsize, keys: Vec<K>, fetch_one: F) -> Vec<T>
where
    K: Copy + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(K) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    let start = Instant::now();

    let work = Arc::new(IndexedWork {
        keys,
        next_index: AtomicUsize::new(0),
        completed: AtomicUsize::new(0),
    });
    let fetch_one = Arc::new(fetch_one);
    let (tx, mut rx) = mpsc::channel(workers.get().saturating_mul(2));

    let handles: Vec<_> = (0..workers.get())
        .map(|_| {
            tokio::spawn(indexed_worker(
                what,
                Arc::clone(&fetch_one),
                Arc::clone(&work),
                tx.clone(),
            ))
        })
        .collect();
    drop(tx);

    let mut all = Vec::new();
    while let Some(batch) = rx.recv().await {
        all.extend(batch);
    }
    join_workers(what, handles).await;

    log::debug!(
        target: LOG_TARGET,
        "Completed {} {what} request(s) in {:.2?}",
        work.completed.load(Ordering::Acquire),
        start.elapsed()
    );
    all
}

#[derive(Debug)]
struct IndexedWork<K> {
    keys: Vec<K>,
    next_index: AtomicUsize,
    completed: AtomicUsize,
}

async fn indexed_worker<K, T, F, Fut>(what: &'static str, fetch_one: Arc<F>, work: Arc<IndexedWork<K>>, tx: mpsc::Sender<Vec<T>>)
where
    K: Copy,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let total = work.keys.len();

    loop {
        let index = work.next_index.fetch_add(1, Ordering::AcqRel);
        let Some(&key) = work.keys.get(index) else {
            return;
        };

        let items = match fetch_one(key).await {
            Ok(items) => items,
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not fetch {what} for entry {index}: {e:#}");
                Vec::new()
            }
        };

        if !items.is_empty() && tx.send(items).await.is_err() {
            return;
        }

        let done = work.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if done.is_multiple_of(PROGRESS_INTERVAL) {
            log::info!(target: LOG_TARGET, "Progress: {done}/{total} {what}");
        }
    }
}

async fn join_workers(what: &str, handles: Vec<tokio::task::JoinHandle<()>>) {
    for result in join_all(handles).await {
        if let Err(e) = result {
            log::error!(target: LOG_TARGET, "A {what} worker terminated abnormally: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ohno::app_err;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PAGE_SIZE: u64 = 3;

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    /// A fake paginated resource with `pages` full pages that records every request.
    fn paged_source(
        pages: u64,
        calls: Arc<Mutex<Vec<u64>>>,
    ) -> impl Fn(u64) -> std::pin::Pin<Box<dyn Future<Output = Result<Vec<u64>>> + Send>> + Send + Sync + 'static {
        move |page| {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                calls.lock().unwrap().push(page);
                tokio::task::yield_now().await;
                let records: Result<Vec<u64>> = if page > pages {
                    Ok(Vec::new())
                } else {
                    Ok(((page - 1) * PAGE_SIZE..page * PAGE_SIZE).collect())
                };
                records
            })
        }
    }

    fn count_by_page(calls: &[u64]) -> HashMap<u64, usize> {
        let mut counts = HashMap::new();
        for &page in calls {
            *counts.entry(page).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn test_cursor_claims_are_sequential() {
        let cursor = PageCursor::new();
        assert_eq!(cursor.claim(), 1);
        assert_eq!(cursor.claim(), 2);
        assert_eq!(cursor.claim(), 3);
        assert_eq!(cursor.claimed(), 3);
    }

    #[test]
    fn test_cursor_exhausted_fires_once() {
        let cursor = PageCursor::default();
        assert!(!cursor.is_exhausted());
        assert!(cursor.mark_exhausted());
        assert!(!cursor.mark_exhausted());
        assert!(cursor.is_exhausted());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_all_pages_fetched_once_for_any_worker_count() {
        for pages in [0, 1, 2, 7, 20] {
            for workers in 1..=8 {
                let calls = Arc::new(Mutex::new(Vec::new()));
                let mut records = fetch_all_pages("records", nz(workers), paged_source(pages, Arc::clone(&calls))).await;
                records.sort_unstable();

                let expected: Vec<u64> = (0..pages * PAGE_SIZE).collect();
                assert_eq!(records, expected, "pages={pages} workers={workers}");

                let calls = calls.lock().unwrap();
                let counts = count_by_page(&calls);
                assert!(counts.values().all(|&n| n == 1), "a page was requested twice: {calls:?}");
                for page in 1..=pages {
                    assert!(counts.contains_key(&page), "page {page} skipped (pages={pages} workers={workers})");
                }

                // Pages beyond the end are only those claimed before the end was observed.
                let beyond = calls.iter().filter(|&&p| p > pages).count();
                assert!((1..=workers).contains(&beyond), "beyond={beyond} workers={workers}");
            }
        }
    }

    #[tokio::test]
    async fn test_single_worker_stops_at_first_empty_page() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let records = fetch_all_pages("records", nz(1), paged_source(4, Arc::clone(&calls))).await;

        assert_eq!(records.len(), 12);
        assert_eq!(*calls.lock().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_empty_resource_single_request() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let records = fetch_all_pages("records", nz(1), paged_source(0, Arc::clone(&calls))).await;

        assert!(records.is_empty());
        assert_eq!(*calls.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_page_error_counts_as_end_of_data() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = Arc::clone(&calls);
        let records = fetch_all_pages("records", nz(1), move |page| {
            let calls = Arc::clone(&calls_clone);
            async move {
                calls.lock().unwrap().push(page);
                match page {
                    1 => Ok(vec![10, 11]),
                    2 => Err(app_err!("boom")),
                    _ => Ok(vec![99]),
                }
            }
        })
        .await;

        assert_eq!(records, vec![10, 11]);
        assert_eq!(*calls.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_short_page_does_not_terminate() {
        let records = fetch_all_pages("records", nz(1), |page| async move {
            match page {
                1 => Ok(vec![1, 2, 3]),
                2 => Ok(vec![4]),
                3 => Ok(vec![5]),
                _ => Ok(Vec::new()),
            }
        })
        .await;

        assert_eq!(records, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_indexed_issues_one_request_per_key() {
        for total in [0_u64, 1, 5, 250] {
            for workers in [1, 2, 3, 8] {
                let calls = Arc::new(Mutex::new(Vec::new()));
                let calls_clone = Arc::clone(&calls);
                let keys: Vec<u64> = (100..100 + total).collect();

                let mut records = fetch_all_indexed("units", nz(workers), keys.clone(), move |key| {
                    let calls = Arc::clone(&calls_clone);
                    async move {
                        calls.lock().unwrap().push(key);
                        tokio::task::yield_now().await;
                        Ok(vec![key, key])
                    }
                })
                .await;
                records.sort_unstable();

                let mut calls = calls.lock().unwrap().clone();
                calls.sort_unstable();
                assert_eq!(calls, keys, "total={total} workers={workers}");

                let expected: Vec<u64> = keys.iter().flat_map(|&k| [k, k]).collect();
                assert_eq!(records, expected);
            }
        }
    }

    #[tokio::test]
    async fn test_indexed_error_contributes_nothing() {
        let mut records = fetch_all_indexed("units", nz(2), vec![1_u64, 2, 3], |key| async move {
            if key == 2 { Err(app_err!("unavailable")) } else { Ok(vec![key]) }
        })
        .await;

        records.sort_unstable();
        assert_eq!(records, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_indexed_empty_results_are_not_published() {
        let records: Vec<u64> = fetch_all_indexed("units", nz(3), vec![1_u64, 2, 3, 4], |_| async { Ok(Vec::new()) }).await;
        assert!(records.is_empty());
    }
}
