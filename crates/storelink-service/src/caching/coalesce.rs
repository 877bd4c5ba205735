use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared, TryFutureExt};
use parking_lot::Mutex;
use thiserror::Error;

type ComputationChannel<V> = Shared<oneshot::Receiver<V>>;
type ComputationMap<K, V> = Arc<Mutex<HashMap<K, ComputationChannel<V>>>>;

/// The in-flight computation went away without producing a value.
///
/// This only happens when the computation panicked, or the runtime it was spawned on shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("computation channel dropped")]
pub struct ChannelDropped;

/// Deduplicates concurrent computations by key.
///
/// While a computation for a key is running, every further request for the same key waits for
/// and shares its result instead of starting a new computation. Once the computation finished,
/// its record is dropped, and the next request starts a fresh one. Results are not retained;
/// that is the job of the cache in front of this.
///
/// Computations are spawned onto the current tokio runtime, so they run to completion even if
/// every caller stops waiting for them.
pub struct Coalescer<K, V> {
    name: &'static str,
    current_computations: ComputationMap<K, V>,
}

impl<K, V> fmt::Debug for Coalescer<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self
            .current_computations
            .try_lock()
            .map(|c| c.len())
            .unwrap_or_default();
        f.debug_struct("Coalescer")
            .field("name", &self.name)
            .field("running computations", &running)
            .finish()
    }
}

impl<K, V> Clone for Coalescer<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            current_computations: Arc::clone(&self.current_computations),
        }
    }
}

impl<K, V> Coalescer<K, V>
where
    K: Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new coalescer, the `name` is used for metrics and logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            current_computations: Default::default(),
        }
    }

    /// Returns the number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.current_computations.lock().len()
    }

    /// Runs the computation created by `producer`, or joins the one already running for `key`.
    ///
    /// `producer` is invoked at most once, and only if no computation for `key` is in flight.
    /// Every caller joining the same computation receives a clone of the same value.
    ///
    /// NOTE: This function itself is *not* `async`, because it should eagerly spawn the
    /// computation on the runtime, even if you don't explicitly `await` its results.
    pub fn execute<F, Fut>(
        &self,
        key: K,
        producer: F,
    ) -> BoxFuture<'static, Result<V, ChannelDropped>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let name = self.name;
        let channel = {
            let mut current_computations = self.current_computations.lock();
            if let Some(channel) = current_computations.get(&key) {
                // A concurrent computation was deduplicated.
                metric!(counter("coalescer.channel.hit") += 1, "coalescer" => name);
                channel.clone()
            } else {
                metric!(counter("coalescer.channel.miss") += 1, "coalescer" => name);

                let channel = self.create_channel(key.clone(), producer());
                let evicted = current_computations.insert(key, channel.clone());
                debug_assert!(evicted.is_none());
                metric!(
                    gauge("coalescer.in_flight") = current_computations.len() as u64,
                    "coalescer" => name
                );
                channel
            }
        };

        channel
            .map_err(move |_cancelled| {
                tracing::error!(coalescer = name, "computation channel dropped");
                ChannelDropped
            })
            .boxed()
    }

    /// Spawns the computation and returns a shareable channel for its result.
    ///
    /// The record for `key` is removed when the computation finishes, before the result is
    /// sent. Callers thus either get a channel that will receive data, or create a new one.
    fn create_channel<Fut>(&self, key: K, computation: Fut) -> ComputationChannel<V>
    where
        Fut: Future<Output = V> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();

        let remove_computation_token = RemoveOnDrop {
            computations: Arc::clone(&self.current_computations),
            key: Some(key),
        };

        let channel = async move {
            let result = computation.await;
            // Drop the token first to evict from the map.
            drop(remove_computation_token);
            sender.send(result).ok();
        };
        tokio::spawn(channel);

        receiver.shared()
    }
}

/// Removes the record of a computation once dropped, including when the computation panics.
struct RemoveOnDrop<K: Hash + Eq, V> {
    computations: ComputationMap<K, V>,
    key: Option<K>,
}

impl<K: Hash + Eq, V> Drop for RemoveOnDrop<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.computations.lock().remove(&key);
        }
    }
}
