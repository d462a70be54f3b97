//! # pixelflow-rs: LED Module Frame Distribution
//!
//! Takes frame batches produced by an upstream node graph, reorders them from
//! logical (row-major) order into the physical order in which display modules
//! are wired, and hands them to output transports.
//!
//! ## Architecture
//!
//! - **Mapping**: permutation generation from wiring parameters, with a cached
//!   per-batch transform
//! - **Backend**: serial and Open Pixel Control sinks that drop rather than
//!   queue when busy
//! - **Pipeline**: per-node sink registry and the init/deliver entry points
//!   the graph engine calls
//! - **Config**: TOML project files listing output nodes
//!
//! ## Example
//!
//! ```ignore
//! use pixelflow_rs::pipeline::{NodeHost, NodeId, NodeType, OutputDefaults, RawConfig};
//!
//! let host = NodeHost::new(OutputDefaults::default());
//! let raw = RawConfig::new()
//!     .with("count", 2i64)
//!     .with("address0", "10.0.0.1:7890")
//!     .with("address1", "10.0.0.2:7890");
//! host.on_init(NodeId(1), NodeType::OpcMultiOutput, &raw).await?;
//! host.on_deliver(NodeId(1), batch).await?;
//! host.shutdown().await;
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod mapping;
pub mod pattern;
pub mod pipeline;

// Re-export commonly used types
pub use backend::{AnySink, FrameSink, SinkConfig};
pub use config::ProjectFile;
pub use error::{PixelFlowError, Result};
pub use mapping::{FrameMappingTransform, MappingParams};
pub use pipeline::{Frame, FrameBatch, NodeHost, NodeId, NodeType};
