//! Node host: the two entry points the graph engine calls.
//!
//! - [`NodeHost::on_init`] reads a node's config and resolves its sink. It
//!   runs once per configuration change, never per frame.
//! - [`NodeHost::on_deliver`] maps a batch into physical order and hands it
//!   to the node's sink, or drops it if the node has no sink.
//!
//! The registry lock is only held while looking a sink up or replacing it,
//! never while a batch is being written.

use crate::backend::{AcceptOutcome, AnySink, DropReason, FrameSink, SinkConfig, SinkStatsSnapshot};
use crate::mapping::{FrameMappingTransform, MappingParams, MappingStats};
use crate::pipeline::config_value::RawConfig;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::frame::FrameBatch;
use crate::pipeline::id::NodeId;
use crate::pipeline::node_type::NodeType;
use crate::pipeline::nodes::OutputDefaults;
use crate::pipeline::registry::{InstanceRegistry, ResolveOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Builds a sink from its config.
pub type SinkFactory = Arc<dyn Fn(&SinkConfig) -> AnySink + Send + Sync>;

/// Result of initialising a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The config is incomplete; nothing was created or changed.
    Skipped(String),
    Created,
    Reused,
    Rebuilt,
}

impl From<ResolveOutcome> for InitOutcome {
    fn from(outcome: ResolveOutcome) -> Self {
        match outcome {
            ResolveOutcome::Created => InitOutcome::Created,
            ResolveOutcome::Reused => InitOutcome::Reused,
            ResolveOutcome::Rebuilt => InitOutcome::Rebuilt,
        }
    }
}

/// Result of delivering a batch to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The node has no live sink; the batch was discarded.
    NoInstance,
    Sent,
    Partial { delivered: usize, failed: usize },
    Dropped(DropReason),
}

impl From<AcceptOutcome> for DeliveryOutcome {
    fn from(outcome: AcceptOutcome) -> Self {
        match outcome {
            AcceptOutcome::Sent => DeliveryOutcome::Sent,
            AcceptOutcome::Partial { delivered, failed } => {
                DeliveryOutcome::Partial { delivered, failed }
            }
            AcceptOutcome::Dropped(reason) => DeliveryOutcome::Dropped(reason),
        }
    }
}

impl DeliveryOutcome {
    /// Whether at least one destination received its frame.
    pub fn delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent | DeliveryOutcome::Partial { .. })
    }

    /// The failure behind a batch that reached nothing, for callers that
    /// want to report it.
    pub fn error(&self, node_id: NodeId) -> Option<PipelineError> {
        match self {
            DeliveryOutcome::NoInstance => Some(PipelineError::UnknownNode(node_id)),
            DeliveryOutcome::Dropped(reason) => Some((*reason).into()),
            DeliveryOutcome::Sent | DeliveryOutcome::Partial { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct NodeState {
    node_type: NodeType,
    mapping: MappingParams,
}

/// Owns every output node's sink and wiring.
pub struct NodeHost {
    registry: tokio::sync::Mutex<InstanceRegistry>,
    nodes: Mutex<HashMap<NodeId, NodeState>>,
    transform: Mutex<FrameMappingTransform>,
    defaults: OutputDefaults,
    factory: SinkFactory,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl NodeHost {
    /// Host building real sinks.
    pub fn new(defaults: OutputDefaults) -> Self {
        Self::with_factory(defaults, Arc::new(|config: &SinkConfig| config.build()))
    }

    /// Host building sinks with `factory`.
    pub fn with_factory(defaults: OutputDefaults, factory: SinkFactory) -> Self {
        Self {
            registry: tokio::sync::Mutex::new(InstanceRegistry::new()),
            nodes: Mutex::new(HashMap::new()),
            transform: Mutex::new(FrameMappingTransform::new()),
            defaults,
            factory,
        }
    }

    pub fn defaults(&self) -> &OutputDefaults {
        &self.defaults
    }

    /// Reads `raw` and creates, keeps, or replaces the node's sink.
    ///
    /// An incomplete config is not an error: it returns
    /// [`InitOutcome::Skipped`] and leaves any existing sink alone. Malformed
    /// values (bad mapping names, out-of-range numbers) are errors.
    pub async fn on_init(
        &self,
        node_id: NodeId,
        node_type: NodeType,
        raw: &RawConfig,
    ) -> PipelineResult<InitOutcome> {
        let setup = match node_type.parse_config(raw, &self.defaults) {
            Ok(setup) => setup,
            Err(PipelineError::ConfigIncomplete(reason)) => {
                tracing::debug!("{} node {} not initialised: {}", node_type, node_id, reason);
                return Ok(InitOutcome::Skipped(reason));
            }
            Err(e) => {
                tracing::warn!("{} node {} has invalid config: {}", node_type, node_id, e);
                return Err(e);
            }
        };

        let resolution = {
            let factory = &self.factory;
            let mut registry = self.registry.lock().await;
            registry
                .resolve(node_id, setup.sink, |config| factory(config))
                .await
        };

        lock(&self.nodes).insert(
            node_id,
            NodeState {
                node_type,
                mapping: setup.mapping,
            },
        );

        if !setup.mapping.is_identity() {
            tracing::debug!("Node {} maps modules as {}", node_id, setup.mapping);
        }
        Ok(resolution.outcome.into())
    }

    /// Maps `batch` with the node's wiring and forwards it to the node's sink.
    ///
    /// Fails only with `DimensionMismatch` when a non-identity wiring meets a
    /// batch whose frame count is not `width * height`.
    pub async fn on_deliver(
        &self,
        node_id: NodeId,
        batch: FrameBatch,
    ) -> PipelineResult<DeliveryOutcome> {
        let Some(sink) = self.sink(node_id).await else {
            tracing::trace!("No sink for node {}, dropping batch", node_id);
            return Ok(DeliveryOutcome::NoInstance);
        };

        let mapping = self.mapping(node_id).unwrap_or_default();
        let batch = lock(&self.transform).apply(&mapping, batch)?;

        Ok(sink.accept(batch).await.into())
    }

    /// Closes and forgets the node's sink and wiring. Returns whether a sink
    /// existed.
    pub async fn on_remove(&self, node_id: NodeId) -> bool {
        let state = lock(&self.nodes).remove(&node_id);
        let removed = self.registry.lock().await.remove(node_id).await;
        match state {
            Some(state) if removed => {
                tracing::info!("Removed {} node {}", state.node_type, node_id)
            }
            None if removed => tracing::info!("Removed node {}", node_id),
            _ => {}
        }
        removed
    }

    /// Closes every sink.
    pub async fn shutdown(&self) {
        lock(&self.nodes).clear();
        self.registry.lock().await.close_all().await;
        let stats = self.mapping_stats();
        tracing::info!(
            "Host shut down ({} batches reordered, {} passed through)",
            stats.reordered,
            stats.identity_skips
        );
    }

    /// The node's live sink.
    pub async fn sink(&self, node_id: NodeId) -> Option<Arc<AnySink>> {
        self.registry.lock().await.get(node_id)
    }

    pub async fn sink_stats(&self, node_id: NodeId) -> Option<SinkStatsSnapshot> {
        self.sink(node_id).await.map(|s| s.stats())
    }

    /// The node's wiring, if it was initialised.
    pub fn mapping(&self, node_id: NodeId) -> Option<MappingParams> {
        lock(&self.nodes).get(&node_id).map(|s| s.mapping)
    }

    /// Ids of initialised nodes.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<_> = lock(&self.nodes).keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn mapping_stats(&self) -> MappingStats {
        lock(&self.transform).stats()
    }
}

impl std::fmt::Debug for NodeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHost")
            .field("nodes", &self.node_ids())
            .field("defaults", &self.defaults)
            .finish()
    }
}
