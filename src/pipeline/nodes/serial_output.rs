//! Serial output node.
//!
//! Config keys: `portName` (or `port`), `baudRate` (or `baudrate`), optional
//! `minDelay` in milliseconds, and the optional mapping keys.

use crate::backend::{SerialConfig, SinkConfig};
use crate::mapping::MappingParams;
use crate::pipeline::config_value::RawConfig;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::nodes::{NodeSetup, OutputDefaults};
use std::time::Duration;

pub const PORT_KEYS: &[&str] = &["portName", "port"];
pub const BAUD_KEYS: &[&str] = &["baudRate", "baudrate"];
pub const MIN_DELAY_KEYS: &[&str] = &["minDelay"];

/// Reads a serial output node's config.
///
/// Missing port or baud rate is `ConfigIncomplete`.
pub fn parse_serial_output(
    raw: &RawConfig,
    defaults: &OutputDefaults,
) -> PipelineResult<NodeSetup> {
    let port_name = raw
        .string(PORT_KEYS)?
        .ok_or_else(|| PipelineError::ConfigIncomplete("serial port name not set".into()))?;

    let baud = raw
        .uint(BAUD_KEYS)?
        .ok_or_else(|| PipelineError::ConfigIncomplete("baud rate not set".into()))?;
    let baud_rate = u32::try_from(baud)
        .ok()
        .filter(|b| *b > 0)
        .ok_or_else(|| PipelineError::InvalidConfig {
            key: BAUD_KEYS[0].to_string(),
            message: format!("{} is not a usable baud rate", baud),
        })?;

    let min_delay = Duration::from_millis(raw.uint(MIN_DELAY_KEYS)?.unwrap_or(0));

    let serial = SerialConfig::new(port_name, baud_rate)
        .with_min_delay(min_delay)
        .with_open_delay(defaults.serial_open_delay);

    Ok(NodeSetup {
        sink: SinkConfig::Serial(serial),
        mapping: MappingParams::from_raw(raw)?,
    })
}
