use std::{fmt, future::Future, num::NonZeroUsize, str::FromStr};

use fileforge_common::error::{ForgeError, Result};
use futures::{StreamExt, stream::FuturesUnordered};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulePolicy {
    /// Consecutive chunks of `max_concurrent`; chunk K+1 starts after all of chunk K settle.
    #[default]
    Chunked,
    /// A new item starts as soon as a slot frees up.
    SlidingWindow,
}

impl FromStr for SchedulePolicy {
    type Err = ForgeError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "chunked" => Ok(Self::Chunked),
            "sliding" | "sliding-window" => Ok(Self::SlidingWindow),
            other => Err(ForgeError::InvalidArgument(format!(
                "unknown schedule policy: {other}"
            ))),
        }
    }
}

impl fmt::Display for SchedulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunked => f.write_str("chunked"),
            Self::SlidingWindow => f.write_str("sliding"),
        }
    }
}

/// Drives a queue of thunks with at most `max_concurrent` in flight.
///
/// Thunks produce a plain value, so a failing item cannot abort its siblings;
/// the queue is exhausted only after every thunk has settled. All in-flight
/// futures are polled from the caller's task, so `on_settled` never runs
/// concurrently with itself.
#[derive(Debug, Clone, Copy)]
pub struct BoundedScheduler {
    max_concurrent: NonZeroUsize,
    policy: SchedulePolicy,
}

impl BoundedScheduler {
    pub fn new(max_concurrent: usize, policy: SchedulePolicy) -> Result<Self> {
        let max_concurrent = NonZeroUsize::new(max_concurrent).ok_or_else(|| {
            ForgeError::InvalidConfig("max_concurrent must be at least 1".to_string())
        })?;
        Ok(Self {
            max_concurrent,
            policy,
        })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.get()
    }

    pub fn policy(&self) -> SchedulePolicy {
        self.policy
    }

    pub async fn run<F, Fut, T>(&self, thunks: Vec<F>, mut on_settled: impl FnMut(T))
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let limit = self.max_concurrent.get();
        match self.policy {
            SchedulePolicy::Chunked => {
                let total = thunks.len();
                let mut queue = thunks.into_iter().peekable();
                let mut chunk = 0usize;
                while queue.peek().is_some() {
                    let mut in_flight: FuturesUnordered<Fut> =
                        queue.by_ref().take(limit).map(|thunk| thunk()).collect();
                    debug!(chunk, size = in_flight.len(), total, "starting chunk");
                    while let Some(output) = in_flight.next().await {
                        on_settled(output);
                    }
                    chunk += 1;
                }
            }
            SchedulePolicy::SlidingWindow => {
                let mut settled = futures::stream::iter(thunks)
                    .map(|thunk| thunk())
                    .buffer_unordered(limit);
                while let Some(output) = settled.next().await {
                    on_settled(output);
                }
            }
        }
    }
}
