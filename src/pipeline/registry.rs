//! Per-node sink instances.
//!
//! The registry is the only place sinks are created or destroyed. Each node
//! owns at most one sink, remembered together with the [`SinkConfig`] it was
//! built from. Resolving a node with the same config hands back the existing
//! sink; a different config closes the old sink before the new one is built,
//! so a port is never opened twice.

use crate::backend::{AnySink, FrameSink, SinkConfig};
use crate::pipeline::id::NodeId;
use std::collections::HashMap;
use std::sync::Arc;

/// What `resolve` did for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// No sink existed; one was built.
    Created,
    /// The config matched; the existing sink was kept.
    Reused,
    /// The config changed; the old sink was closed and a new one built.
    Rebuilt,
}

/// A live sink and how it was obtained.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub sink: Arc<AnySink>,
    pub outcome: ResolveOutcome,
}

struct RegistryEntry {
    config: SinkConfig,
    sink: Arc<AnySink>,
}

/// Maps node identities to their live sinks.
#[derive(Default)]
pub struct InstanceRegistry {
    entries: HashMap<NodeId, RegistryEntry>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sink for `node_id`, building it with `factory` unless one
    /// with an equal config already exists.
    pub async fn resolve<F>(
        &mut self,
        node_id: NodeId,
        config: SinkConfig,
        factory: F,
    ) -> Resolution
    where
        F: FnOnce(&SinkConfig) -> AnySink,
    {
        let outcome = match self.entries.get(&node_id) {
            Some(entry) if entry.config == config => {
                tracing::trace!("Reusing sink {} for node {}", entry.sink.name(), node_id);
                return Resolution {
                    sink: entry.sink.clone(),
                    outcome: ResolveOutcome::Reused,
                };
            }
            Some(_) => ResolveOutcome::Rebuilt,
            None => ResolveOutcome::Created,
        };

        if let Some(old) = self.entries.remove(&node_id) {
            tracing::info!(
                "Configuration of node {} changed, closing {}",
                node_id,
                old.sink.name()
            );
            close_logged(node_id, &old.sink).await;
        }

        let sink = Arc::new(factory(&config));
        tracing::info!("Created sink {} for node {}", sink.name(), node_id);
        self.entries.insert(
            node_id,
            RegistryEntry {
                config,
                sink: sink.clone(),
            },
        );

        Resolution { sink, outcome }
    }

    /// The live sink for `node_id`, if any.
    pub fn get(&self, node_id: NodeId) -> Option<Arc<AnySink>> {
        self.entries.get(&node_id).map(|e| e.sink.clone())
    }

    /// The config the node's sink was built from.
    pub fn config(&self, node_id: NodeId) -> Option<&SinkConfig> {
        self.entries.get(&node_id).map(|e| &e.config)
    }

    pub fn contains(&self, node_id: NodeId) -> bool {
        self.entries.contains_key(&node_id)
    }

    /// Closes and forgets the node's sink. Returns whether one existed.
    pub async fn remove(&mut self, node_id: NodeId) -> bool {
        match self.entries.remove(&node_id) {
            Some(entry) => {
                close_logged(node_id, &entry.sink).await;
                true
            }
            None => false,
        }
    }

    /// Closes every sink and empties the registry.
    pub async fn close_all(&mut self) {
        let entries: Vec<_> = self.entries.drain().collect();
        if !entries.is_empty() {
            tracing::info!("Closing {} sinks", entries.len());
        }
        for (node_id, entry) in entries {
            close_logged(node_id, &entry.sink).await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }
}

async fn close_logged(node_id: NodeId, sink: &AnySink) {
    if let Err(e) = sink.close().await {
        tracing::warn!("Closing sink {} of node {} failed: {}", sink.name(), node_id, e);
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(id, e)| (id, e.sink.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AcceptOutcome, FanoutConfig, SinkStatsSnapshot};
    use crate::pipeline::error::{PipelineError, PipelineResult};
    use crate::pipeline::frame::FrameBatch;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    #[async_trait]
    impl FrameSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        async fn accept(&self, _batch: FrameBatch) -> AcceptOutcome {
            AcceptOutcome::Sent
        }

        async fn close(&self) -> PipelineResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(PipelineError::TransportUnavailable)
            } else {
                Ok(())
            }
        }

        fn stats(&self) -> SinkStatsSnapshot {
            SinkStatsSnapshot::default()
        }
    }

    fn fanout(addr: &str) -> SinkConfig {
        SinkConfig::NetworkFanout(FanoutConfig::new([addr]))
    }

    fn counting(closes: &Arc<AtomicUsize>) -> impl FnOnce(&SinkConfig) -> AnySink {
        let closes = closes.clone();
        move |_| {
            AnySink::plugin(CountingSink {
                closes,
                fail_close: false,
            })
        }
    }

    #[tokio::test]
    async fn test_same_config_reuses_instance() {
        let mut registry = InstanceRegistry::new();
        let closes = Arc::new(AtomicUsize::new(0));
        let node = NodeId(1);

        let first = registry
            .resolve(node, fanout("10.0.0.1"), counting(&closes))
            .await;
        assert_eq!(first.outcome, ResolveOutcome::Created);

        let mut built = false;
        let second = registry
            .resolve(node, fanout("10.0.0.1"), |_| {
                built = true;
                AnySink::plugin(CountingSink {
                    closes: Arc::new(AtomicUsize::new(0)),
                    fail_close: false,
                })
            })
            .await;
        assert_eq!(second.outcome, ResolveOutcome::Reused);
        assert!(!built);
        assert!(Arc::ptr_eq(&first.sink, &second.sink));
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_changed_config_closes_old_once() {
        let mut registry = InstanceRegistry::new();
        let old_closes = Arc::new(AtomicUsize::new(0));
        let new_closes = Arc::new(AtomicUsize::new(0));
        let node = NodeId(7);

        let first = registry
            .resolve(node, fanout("10.0.0.1"), counting(&old_closes))
            .await;
        let second = registry
            .resolve(node, fanout("10.0.0.2"), counting(&new_closes))
            .await;

        assert_eq!(second.outcome, ResolveOutcome::Rebuilt);
        assert!(!Arc::ptr_eq(&first.sink, &second.sink));
        assert_eq!(old_closes.load(Ordering::SeqCst), 1);
        assert_eq!(new_closes.load(Ordering::SeqCst), 0);
        assert_eq!(registry.config(node), Some(&fanout("10.0.0.2")));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_close_failure_still_rebuilds() {
        let mut registry = InstanceRegistry::new();
        let closes = Arc::new(AtomicUsize::new(0));
        let failing = closes.clone();
        let node = NodeId(2);

        registry
            .resolve(node, fanout("10.0.0.1"), move |_| {
                AnySink::plugin(CountingSink {
                    closes: failing,
                    fail_close: true,
                })
            })
            .await;
        let res = registry
            .resolve(node, fanout("10.0.0.9"), counting(&Arc::new(AtomicUsize::new(0))))
            .await;

        assert_eq!(res.outcome, ResolveOutcome::Rebuilt);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_nodes_are_independent() {
        let mut registry = InstanceRegistry::new();
        let closes = Arc::new(AtomicUsize::new(0));

        registry
            .resolve(NodeId(1), fanout("10.0.0.1"), counting(&closes))
            .await;
        let other = registry
            .resolve(NodeId(2), fanout("10.0.0.1"), counting(&closes))
            .await;
        assert_eq!(other.outcome, ResolveOutcome::Created);
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_remove_and_close_all() {
        let mut registry = InstanceRegistry::new();
        let closes = Arc::new(AtomicUsize::new(0));

        for id in 1..=3 {
            registry
                .resolve(NodeId(id), fanout("10.0.0.1"), counting(&closes))
                .await;
        }

        assert!(registry.remove(NodeId(2)).await);
        assert!(!registry.remove(NodeId(2)).await);
        assert!(registry.get(NodeId(2)).is_none());
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        registry.close_all().await;
        assert!(registry.is_empty());
        assert_eq!(closes.load(Ordering::SeqCst), 3);
    }
}
