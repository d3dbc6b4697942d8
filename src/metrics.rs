use std::path::Path;
use serde::Serialize;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeStats {
    pub episode: usize,
    pub total_reward: f32,
    pub steps: usize,
    pub captured: bool,
    pub epsilon: f32,
    // None when the buffer was still too small to train
    pub mean_loss: Option<f32>
}

#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    episodes: Vec<EpisodeStats>
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stats: EpisodeStats) {
        self.episodes.push(stats);
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn last(&self) -> Option<&EpisodeStats> {
        self.episodes.last()
    }

    pub fn episodes(&self) -> &[EpisodeStats] {
        &self.episodes
    }

    fn recent(&self, window: usize) -> &[EpisodeStats] {
        let start = self.episodes.len().saturating_sub(window);
        &self.episodes[start..]
    }

    // mean over the last `window` episodes, or fewer if that many have not run
    pub fn rolling_average_reward(&self, window: usize) -> f32 {
        let recent = self.recent(window);
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().map(|stats| stats.total_reward).sum::<f32>() / recent.len() as f32
    }

    pub fn capture_rate(&self, window: usize) -> f32 {
        let recent = self.recent(window);
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().filter(|stats| stats.captured).count() as f32 / recent.len() as f32
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for stats in &self.episodes {
            writer.serialize(stats)?;
        }
        writer.flush().map_err(|e| Error::io("flush history file", path, e))?;
        Ok(())
    }
}
