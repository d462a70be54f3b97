//! Frame pipeline: output nodes, their sinks, and the graph-engine entry points.
//!
//! Upstream graph nodes produce [`FrameBatch`]es in logical (row-major)
//! order. Each output node reorders them into its physical wiring and hands
//! them to the sink it owns.
//!
//! # Architecture
//!
//! ```text
//!                on_init(id, type, raw config)
//!                         │
//!                         ▼
//!   NodeType::parse_config ──► NodeSetup { SinkConfig, MappingParams }
//!                         │
//!                         ▼
//!           InstanceRegistry::resolve ──► Arc<AnySink>
//!
//!   on_deliver(id, batch) ──► FrameMappingTransform ──► AnySink::accept
//! ```
//!
//! # Design
//!
//! - **One owner** - the registry is the only creator and destroyer of sinks.
//! - **Config equality** - re-initialising with an equal config keeps the sink.
//! - **Drop, never queue** - a busy or closed sink discards the batch.
//! - **Enum dispatch** - `AnySink` for built-in sinks, boxed trait objects for plugins.

pub mod config_value;
pub mod error;
pub mod frame;
pub mod host;
pub mod id;
pub mod node_type;
pub mod nodes;
pub mod registry;

pub use config_value::{ConfigValue, RawConfig};
pub use error::{PipelineError, PipelineResult};
pub use frame::{Frame, FrameBatch};
pub use host::{DeliveryOutcome, InitOutcome, NodeHost, SinkFactory};
pub use id::NodeId;
pub use node_type::NodeType;
pub use nodes::{NodeSetup, OutputDefaults};
pub use registry::{InstanceRegistry, Resolution, ResolveOutcome};
