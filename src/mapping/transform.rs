//! Frame reordering from logical to physical module order.

use crate::mapping::generator::{generate, Permutation};
use crate::mapping::params::MappingParams;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::frame::FrameBatch;
use std::collections::HashMap;
use std::sync::Arc;

/// Upper bound on cached permutations before the cache is reset.
pub const MAX_CACHED_PERMUTATIONS: usize = 32;

/// Counters describing how batches went through the transform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingStats {
    /// Batches passed through untouched because the wiring is the identity.
    pub identity_skips: u64,
    /// Batches that were reordered.
    pub reordered: u64,
    /// Permutations computed by the generator.
    pub generated: u64,
    /// Reorders served from the permutation cache.
    pub cache_hits: u64,
}

/// Applies module wiring to frame batches, caching one permutation per
/// `(params, width, height)`.
#[derive(Debug, Default)]
pub struct FrameMappingTransform {
    cache: HashMap<(MappingParams, u32, u32), Arc<Permutation>>,
    stats: MappingStats,
}

impl FrameMappingTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reorders `batch` into physical order.
    ///
    /// Identity wiring returns the batch as-is without computing anything.
    /// Any other wiring requires `len == width * height`.
    pub fn apply(
        &mut self,
        params: &MappingParams,
        batch: FrameBatch,
    ) -> PipelineResult<FrameBatch> {
        if params.is_identity() {
            self.stats.identity_skips += 1;
            return Ok(batch);
        }

        batch.validate()?;

        let permutation = self.permutation(params, batch.width, batch.height);
        let (width, height) = (batch.width, batch.height);
        let frames = permutation
            .apply(batch.frames())
            .ok_or(PipelineError::DimensionMismatch {
                expected: permutation.len(),
                actual: batch.len(),
            })?;

        self.stats.reordered += 1;
        Ok(FrameBatch::new(width, height, frames))
    }

    /// Cached permutation for the given wiring and grid size.
    pub fn permutation(
        &mut self,
        params: &MappingParams,
        width: u32,
        height: u32,
    ) -> Arc<Permutation> {
        let key = (*params, width, height);
        if let Some(p) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            return p.clone();
        }

        if self.cache.len() >= MAX_CACHED_PERMUTATIONS {
            tracing::debug!(
                "Permutation cache full ({} entries), clearing",
                self.cache.len()
            );
            self.cache.clear();
        }

        let p = Arc::new(generate(params, width, height));
        self.stats.generated += 1;
        tracing::debug!("Generated permutation for {} at {}x{}", params, width, height);
        self.cache.insert(key, p.clone());
        p
    }

    pub fn stats(&self) -> MappingStats {
        self.stats
    }

    pub fn cached_permutations(&self) -> usize {
        self.cache.len()
    }
}
