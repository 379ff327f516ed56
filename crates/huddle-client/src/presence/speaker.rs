use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::AudioLevelSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerChange {
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// Picks the loudest participant above a threshold
///
/// The designation is sticky: when nobody exceeds the threshold the previous
/// active speaker is kept.
pub struct ActiveSpeakerDetector {
    threshold: f32,
    active: Option<String>,
    sources: BTreeMap<String, Arc<dyn AudioLevelSource>>,
}

impl ActiveSpeakerDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            active: None,
            sources: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, participant_id: &str, source: Arc<dyn AudioLevelSource>) {
        tracing::debug!("Tracking audio level for {}", participant_id);
        self.sources.insert(participant_id.to_string(), source);
    }

    /// Stop tracking a participant; clears the designation if they held it
    pub fn unregister(&mut self, participant_id: &str) -> Option<SpeakerChange> {
        self.sources.remove(participant_id);
        if self.active.as_deref() == Some(participant_id) {
            let previous = self.active.take();
            return Some(SpeakerChange {
                previous,
                current: None,
            });
        }
        None
    }

    /// Sample every registered source once
    pub fn poll(&mut self) -> Option<SpeakerChange> {
        let samples: Vec<(String, f32)> = self
            .sources
            .iter()
            .map(|(id, source)| (id.clone(), source.level()))
            .collect();
        self.select(&samples)
    }

    /// Apply one round of samples; returns the change if the designation moved
    ///
    /// Strictly louder wins, so the first of equally loud samples is kept.
    pub fn select(&mut self, samples: &[(String, f32)]) -> Option<SpeakerChange> {
        let mut loudest: Option<(&str, f32)> = None;
        for (id, level) in samples {
            if *level <= self.threshold {
                continue;
            }
            match loudest {
                Some((_, max)) if *level <= max => {}
                _ => loudest = Some((id, *level)),
            }
        }

        let (id, _) = loudest?;
        if self.active.as_deref() == Some(id) {
            return None;
        }
        let previous = self.active.replace(id.to_string());
        Some(SpeakerChange {
            previous,
            current: Some(id.to_string()),
        })
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn tracked(&self) -> usize {
        self.sources.len()
    }

    pub fn clear(&mut self) {
        self.sources.clear();
        self.active = None;
    }
}

impl fmt::Debug for ActiveSpeakerDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveSpeakerDetector")
            .field("threshold", &self.threshold)
            .field("active", &self.active)
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
