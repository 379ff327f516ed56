use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Something that can report an instantaneous audio level
///
/// Levels are average frequency-bin magnitudes on a 0..=255 scale.
pub trait AudioLevelSource: Send + Sync {
    fn level(&self) -> f32;
}

/// Lock-free level cell written by an audio pipeline and read by the detector
///
/// Stores the level as f32 bits so writers never block the poll loop.
#[derive(Debug, Clone, Default)]
pub struct AudioLevelMonitor {
    level: Arc<AtomicU32>,
}

impl AudioLevelMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, level: f32) {
        self.level.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Compute and store the average magnitude of a frequency snapshot
    pub fn set_from_bins(&self, bins: &[u8]) {
        self.set(average_magnitude(bins));
    }
}

impl AudioLevelSource for AudioLevelMonitor {
    fn level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }
}

pub fn average_magnitude(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| u32::from(b)).sum();
    sum as f32 / bins.len() as f32
}
