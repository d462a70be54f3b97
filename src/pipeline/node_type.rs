//! Output node kinds the host can initialise.

use crate::pipeline::config_value::RawConfig;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::nodes::{parse_opc_output, parse_serial_output, NodeSetup, OutputDefaults};
use serde::{Deserialize, Serialize};

/// Types of output nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Writes every batch to one serial port.
    #[serde(alias = "Serial Output", alias = "serial")]
    SerialOutput,
    /// Sends frame `i` of every batch to OPC server `i`.
    #[serde(alias = "OPC Multi Output", alias = "opc_multi")]
    OpcMultiOutput,
}

impl NodeType {
    /// Get the display name for this node type.
    pub fn display_name(&self) -> &'static str {
        match self {
            NodeType::SerialOutput => "Serial Output",
            NodeType::OpcMultiOutput => "OPC Multi Output",
        }
    }

    /// Get all available node types.
    pub fn all() -> &'static [NodeType] {
        &[NodeType::SerialOutput, NodeType::OpcMultiOutput]
    }

    /// Turns a raw node config into the sink and mapping it needs.
    pub fn parse_config(
        &self,
        raw: &RawConfig,
        defaults: &OutputDefaults,
    ) -> PipelineResult<NodeSetup> {
        match self {
            NodeType::SerialOutput => parse_serial_output(raw, defaults),
            NodeType::OpcMultiOutput => parse_opc_output(raw, defaults),
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
