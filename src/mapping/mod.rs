//! Module mapping: logical frame order → physical wiring order.
//!
//! A display is a `width × height` grid of modules. Upstream nodes produce
//! frames in row-major order, but the modules are daisy-chained in whatever
//! order they were wired. [`MappingParams`] describes that wiring,
//! [`generate`] turns it into a [`Permutation`], and
//! [`FrameMappingTransform`] reorders batches with cached permutations.
//!
//! ```text
//! logical (row-major)      flip horizontal        physical order
//!   A B                      B A
//!   C D          ──►         D C          ──►     [B, A, D, C]
//! ```

pub mod generator;
pub mod params;
pub mod transform;

pub use generator::{generate, Permutation};
pub use params::{MapFlip, MapOrientation, MapStart, MapType, MappingParams};
pub use transform::{FrameMappingTransform, MappingStats};
