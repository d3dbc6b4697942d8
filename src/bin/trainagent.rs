use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dungeonrs::agent::Agent;
use dungeonrs::config::{OpponentStyle, OptimizerKind, TrainConfig};

// every default comes from TrainConfig::default()
fn defaults() -> TrainConfig {
    TrainConfig::default()
}

#[derive(Parser)]
#[command(name = "trainagent", about = "Train the arena enemy with deep Q-learning")]
struct Args {
    #[arg(long, default_value_t = defaults().episodes)]
    episodes: usize,
    #[arg(long, default_value_t = defaults().max_steps)]
    max_steps: usize,
    #[arg(long, default_value_t = defaults().gamma)]
    gamma: f32,
    #[arg(long, default_value_t = defaults().lr)]
    lr: f32,
    #[arg(long, default_value_t = defaults().batch_size)]
    batch_size: usize,
    #[arg(long, default_value_t = defaults().memory_capacity)]
    memory_capacity: usize,
    #[arg(long, default_value_t = defaults().epsilon_start)]
    epsilon_start: f32,
    #[arg(long, default_value_t = defaults().epsilon_end)]
    epsilon_end: f32,
    #[arg(long, default_value_t = defaults().epsilon_decay)]
    epsilon_decay: f32,
    #[arg(long, default_value_t = defaults().target_update_interval)]
    target_update_interval: usize,
    #[arg(long, default_value_os_t = defaults().model_path)]
    model_path: PathBuf,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, value_enum, default_value_t = defaults().optimizer)]
    optimizer: OptimizerKind,
    #[arg(long, value_enum, default_value_t = defaults().opponent)]
    opponent: OpponentStyle,
    /// Write one CSV row per episode here
    #[arg(long)]
    history: Option<PathBuf>
}

impl From<Args> for TrainConfig {
    fn from(args: Args) -> Self {
        TrainConfig {
            episodes: args.episodes,
            max_steps: args.max_steps,
            gamma: args.gamma,
            lr: args.lr,
            batch_size: args.batch_size,
            memory_capacity: args.memory_capacity,
            epsilon_start: args.epsilon_start,
            epsilon_end: args.epsilon_end,
            epsilon_decay: args.epsilon_decay,
            target_update_interval: args.target_update_interval,
            model_path: args.model_path,
            seed: args.seed,
            optimizer: args.optimizer,
            opponent: args.opponent,
            history_path: args.history
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let config = TrainConfig::from(Args::parse());
    let mut agent = Agent::new(&config).context("failed to set up the agent")?;

    info!(episodes = config.episodes, optimizer = ?config.optimizer, opponent = ?config.opponent, "starting training");
    let history = agent.train().context("training failed")?;

    info!(
        episodes = history.len(),
        avg_reward = history.rolling_average_reward(50),
        capture_rate = history.capture_rate(50),
        model = %config.model_path.display(),
        "training finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_gives_default_config() {
        let config = TrainConfig::from(Args::parse_from(["trainagent"]));
        assert_eq!(config, TrainConfig::default());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "trainagent",
            "--episodes", "20",
            "--gamma", "0.9",
            "--optimizer", "sgd",
            "--opponent", "evade",
            "--model-path", "out.bin",
            "--seed", "7"
        ]);
        let config = TrainConfig::from(args);

        assert_eq!(config.episodes, 20);
        assert_eq!(config.gamma, 0.9);
        assert_eq!(config.optimizer, OptimizerKind::Sgd);
        assert_eq!(config.opponent, OpponentStyle::Evade);
        assert_eq!(config.model_path, PathBuf::from("out.bin"));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.batch_size, TrainConfig::default().batch_size);
    }
}
