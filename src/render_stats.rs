//! Per-frame render statistics.
//!
//! The executor fills a [`FrameStats`] while issuing draws. The renderer
//! keeps the last one around and logs it at debug level, which is usually
//! enough to tell why a frame got expensive:
//! ```bash
//! RUST_LOG=lamina=debug cargo test
//! ```

/// Counters for one executed frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Elements produced by the builder
    pub elements: u32,
    /// Quads drawn, including layer composites and blur passes
    pub draws: u32,
    /// Subtrees flattened into offscreen textures
    pub layers: u32,
    /// Projection groups depth-sorted
    pub projection_groups: u32,
    /// Times the active program changed
    pub program_switches: u32,
    /// Projection uniform uploads
    pub projection_uploads: u32,
    /// Layer textures taken from the pool
    pub textures_acquired: u32,
}

impl FrameStats {
    pub(crate) fn log(&self) {
        log::debug!(
            "Frame: {} elements, {} draws, {} layers, {} projection groups, {} program switches, {} projection uploads, {} layer textures",
            self.elements,
            self.draws,
            self.layers,
            self.projection_groups,
            self.program_switches,
            self.projection_uploads,
            self.textures_acquired
        );
    }
}
