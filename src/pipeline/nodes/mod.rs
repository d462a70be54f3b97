//! Built-in output node configuration.
//!
//! Each output node turns its raw editor config into a [`NodeSetup`]: the
//! sink it needs and the module wiring applied to its batches.

pub mod opc_output;
pub mod serial_output;

use crate::backend::opc::DEFAULT_CONNECT_TIMEOUT;
use crate::backend::serial::DEFAULT_OPEN_DELAY;
use crate::backend::SinkConfig;
use crate::mapping::MappingParams;
use std::time::Duration;

pub use opc_output::parse_opc_output;
pub use serial_output::parse_serial_output;

/// Process-wide settings folded into every sink config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDefaults {
    pub serial_open_delay: Duration,
    pub network_connect_timeout: Duration,
}

impl Default for OutputDefaults {
    fn default() -> Self {
        Self {
            serial_open_delay: DEFAULT_OPEN_DELAY,
            network_connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Everything an output node needs after init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSetup {
    pub sink: SinkConfig,
    pub mapping: MappingParams,
}
