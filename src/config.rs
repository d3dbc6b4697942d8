use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// gradient update rule for the online estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd
}

// which way the scripted player steps along the axis of greater separation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OpponentStyle {
    #[default]
    Pursue,
    Evade
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub episodes: usize,
    pub max_steps: usize, // reaching it without a capture costs the timeout penalty
    pub gamma: f32,
    pub lr: f32,
    pub batch_size: usize,
    pub memory_capacity: usize,

    pub epsilon_start: f32,
    pub epsilon_end: f32,
    pub epsilon_decay: f32, // applied once per episode

    pub target_update_interval: usize, // in episodes

    pub model_path: PathBuf,
    pub seed: Option<u64>, // None seeds from the OS
    pub optimizer: OptimizerKind,
    pub opponent: OpponentStyle,
    pub history_path: Option<PathBuf> // one CSV row per episode
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            episodes: 1500,
            max_steps: 400,
            gamma: 0.99,
            lr: 1e-3,
            batch_size: 64,
            memory_capacity: 50_000,
            epsilon_start: 1.0,
            epsilon_end: 0.05,
            epsilon_decay: 0.997,
            target_update_interval: 10,
            model_path: PathBuf::from("enemy_dqn.bin"),
            seed: None,
            optimizer: OptimizerKind::Adam,
            opponent: OpponentStyle::Pursue,
            history_path: None
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(Error::config("episodes must be at least 1"));
        }
        if self.max_steps == 0 {
            return Err(Error::config("max_steps must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(Error::config(format!("gamma must be in [0, 1], got {}", self.gamma)));
        }
        if !(self.lr > 0.0 && self.lr.is_finite()) {
            return Err(Error::config(format!("lr must be positive, got {}", self.lr)));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        if self.memory_capacity == 0 {
            return Err(Error::config("memory_capacity must be at least 1"));
        }
        if self.batch_size > self.memory_capacity {
            return Err(Error::config(format!(
                "batch_size ({}) cannot exceed memory_capacity ({})",
                self.batch_size, self.memory_capacity
            )));
        }
        if !(0.0..=1.0).contains(&self.epsilon_start) || !(0.0..=1.0).contains(&self.epsilon_end) {
            return Err(Error::config(format!(
                "epsilon bounds must be in [0, 1], got start {} end {}",
                self.epsilon_start, self.epsilon_end
            )));
        }
        if self.epsilon_end > self.epsilon_start {
            return Err(Error::config(format!(
                "epsilon_end ({}) cannot exceed epsilon_start ({})",
                self.epsilon_end, self.epsilon_start
            )));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(Error::config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            )));
        }
        if self.target_update_interval == 0 {
            return Err(Error::config("target_update_interval must be at least 1"));
        }
        Ok(())
    }
}
