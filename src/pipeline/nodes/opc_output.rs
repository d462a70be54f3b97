//! OPC Multi Output node.
//!
//! Sends frame `i` to `address{i}`. The editor stores the number of
//! addresses under `count` and each address under its own numbered key:
//!
//! ```text
//! { count: 2, address0: "10.0.0.1:7890", address1: "10.0.0.2" }
//! ```

use crate::backend::{FanoutConfig, SinkConfig};
use crate::mapping::MappingParams;
use crate::pipeline::config_value::RawConfig;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::nodes::{NodeSetup, OutputDefaults};

pub const COUNT_KEY: &str = "count";
pub const CHANNEL_KEY: &str = "channel";

pub fn address_key(index: u64) -> String {
    format!("address{}", index)
}

/// Reads an OPC Multi Output node's config.
///
/// Missing `count`, or any `address{N}` with `N < count`, is
/// `ConfigIncomplete`. Address keys at or beyond `count` are ignored.
pub fn parse_opc_output(raw: &RawConfig, defaults: &OutputDefaults) -> PipelineResult<NodeSetup> {
    let count = raw
        .uint(&[COUNT_KEY])?
        .ok_or_else(|| PipelineError::ConfigIncomplete("address count not set".into()))?;

    let mut addresses = Vec::new();
    for index in 0..count {
        let key = address_key(index);
        let address = raw
            .string(&[key.as_str()])?
            .ok_or_else(|| PipelineError::ConfigIncomplete(format!("'{}' not set", key)))?;
        addresses.push(address);
    }

    let channel = match raw.uint(&[CHANNEL_KEY])? {
        None => 0,
        Some(c) => u8::try_from(c).map_err(|_| PipelineError::InvalidConfig {
            key: CHANNEL_KEY.to_string(),
            message: format!("OPC channel must be 0-255, got {}", c),
        })?,
    };

    let fanout = FanoutConfig::new(addresses)
        .with_channel(channel)
        .with_connect_timeout(defaults.network_connect_timeout);

    Ok(NodeSetup {
        sink: SinkConfig::NetworkFanout(fanout),
        mapping: MappingParams::from_raw(raw)?,
    })
}
