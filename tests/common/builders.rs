//! Test data builders for creating test objects

use pixelflow_rs::pipeline::{Frame, FrameBatch, RawConfig};

/// Builder for frame batches where module `i` carries distinguishable bytes
pub struct BatchBuilder {
    width: u32,
    height: u32,
    bytes_per_module: usize,
}

impl BatchBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bytes_per_module: 1,
        }
    }

    pub fn bytes_per_module(mut self, bytes: usize) -> Self {
        self.bytes_per_module = bytes;
        self
    }

    /// Module `i` is filled with the byte `i`.
    pub fn build(self) -> FrameBatch {
        let frames = (0..self.width * self.height)
            .map(|i| Frame::filled(self.bytes_per_module, i as u8))
            .collect();
        FrameBatch::new(self.width, self.height, frames)
    }
}

/// Single-byte frames `A`, `B`, `C`, ... in row-major order.
pub fn lettered(width: u32, height: u32) -> FrameBatch {
    let frames = (0..width * height)
        .map(|i| Frame::from(vec![b'A' + i as u8]))
        .collect();
    FrameBatch::new(width, height, frames)
}

/// First byte of every frame, as text.
pub fn letters(batch: &FrameBatch) -> String {
    batch.iter().map(|f| f.as_bytes()[0] as char).collect()
}

/// Raw config of an OPC Multi Output node.
pub fn opc_config<S: AsRef<str>>(addresses: &[S]) -> RawConfig {
    let mut raw = RawConfig::new().with("count", addresses.len() as i64);
    for (i, address) in addresses.iter().enumerate() {
        raw.insert(format!("address{}", i), address.as_ref());
    }
    raw
}

/// Raw config of a Serial Output node.
pub fn serial_config(port: &str, baud: i64) -> RawConfig {
    RawConfig::new().with("portName", port).with("baudRate", baud)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_builder() {
        let batch = BatchBuilder::new(3, 2).bytes_per_module(4).build();
        assert_eq!(batch.len(), 6);
        assert_eq!(batch.get(5).unwrap().as_bytes(), &[5, 5, 5, 5]);
    }

    #[test]
    fn test_opc_config() {
        let raw = opc_config(&["a", "b"]);
        assert_eq!(raw.int(&["count"]).unwrap(), Some(2));
        assert_eq!(raw.string(&["address1"]).unwrap().as_deref(), Some("b"));
    }
}
