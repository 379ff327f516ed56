//! Audio-level sampling and active speaker selection

mod level;
mod speaker;

pub use level::{AudioLevelMonitor, AudioLevelSource, average_magnitude};
pub use speaker::{ActiveSpeakerDetector, SpeakerChange};
