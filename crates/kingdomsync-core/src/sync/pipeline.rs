//! Sequential fetch pipeline
//!
//! A refresh drains its keys through a `RefreshPipeline`: the step for the
//! next key is not started until the previous step's future has resolved.
//! Observers therefore see key N fully landed (value and loading flag)
//! before the fetch for key N+1 is issued.

use std::collections::VecDeque;
use std::future::Future;

use serde_json::Value;
use tracing::debug;

use crate::resource::ResourceKey;

/// Result of one pipeline step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The fetch landed: `Some` with the fresh payload, `None` on failure
    Landed(Option<Value>),
    /// The store went away; drop the remaining keys
    Stop,
}

/// Ordered queue of keys drained one at a time
#[derive(Debug, Clone)]
pub struct RefreshPipeline {
    queue: VecDeque<ResourceKey>,
}

impl RefreshPipeline {
    pub fn new(keys: impl IntoIterator<Item = ResourceKey>) -> Self {
        Self {
            queue: keys.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Run `step` for each key in order, awaiting each before the next.
    ///
    /// Returns every key that landed with its fresh payload (if the fetch
    /// succeeded), in pipeline order.
    pub async fn drain<F, Fut>(mut self, mut step: F) -> Vec<(ResourceKey, Option<Value>)>
    where
        F: FnMut(ResourceKey) -> Fut,
        Fut: Future<Output = Step>,
    {
        let mut landed = Vec::with_capacity(self.queue.len());
        while let Some(key) = self.queue.pop_front() {
            match step(key).await {
                Step::Landed(value) => landed.push((key, value)),
                Step::Stop => {
                    debug!(%key, remaining = self.queue.len(), "Pipeline stopped");
                    break;
                }
            }
        }
        landed
    }
}
