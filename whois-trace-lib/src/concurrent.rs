//! Concurrent processing utilities for batch resolution.
//!
//! Domains are independent, so a batch can keep several resolutions in
//! flight. Results must still come back in input order, which `buffered`
//! guarantees: it polls up to N futures at once but yields them in the order
//! they were created.

use futures::stream::{self, Stream, StreamExt};
use std::future::Future;

/// Runs independent tasks with bounded concurrency, preserving input order.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrentProcessor {
    max_concurrency: usize,
}

impl ConcurrentProcessor {
    /// Create a new processor. A limit of 0 is treated as 1.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Map `task` over `items`, yielding outputs in input order.
    pub fn run_ordered<T, F, Fut>(&self, items: Vec<T>, task: F) -> impl Stream<Item = Fut::Output>
    where
        F: FnMut(T) -> Fut,
        Fut: Future,
    {
        stream::iter(items).map(task).buffered(self.max_concurrency)
    }

    /// Like `run_ordered`, collecting everything into a `Vec`.
    pub async fn collect_ordered<T, F, Fut>(&self, items: Vec<T>, task: F) -> Vec<Fut::Output>
    where
        F: FnMut(T) -> Fut,
        Fut: Future,
    {
        self.run_ordered(items, task).collect().await
    }
}
