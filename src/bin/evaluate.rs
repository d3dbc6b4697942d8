use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use dungeonrs::agent::controller::{BlendedPolicy, DEFAULT_SCRIPTED_PROBABILITY};
use dungeonrs::agent::qnetwork::QNetwork;
use dungeonrs::config::{OpponentStyle, TrainConfig};
use dungeonrs::game::Arena;
use dungeonrs::metrics::{EpisodeStats, TrainingHistory};

#[derive(Parser)]
#[command(name = "evaluate", about = "Play headless episodes with a trained enemy")]
struct Args {
    #[arg(long, default_value_os_t = TrainConfig::default().model_path)]
    model_path: PathBuf,
    #[arg(long, default_value_t = 100)]
    episodes: usize,
    #[arg(long, default_value_t = TrainConfig::default().max_steps)]
    max_steps: usize,
    /// Chance per decision that the scripted chaser acts instead of the model
    #[arg(long, default_value_t = DEFAULT_SCRIPTED_PROBABILITY)]
    scripted_probability: f64,
    #[arg(long, value_enum, default_value_t = TrainConfig::default().opponent)]
    opponent: OpponentStyle,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    history: Option<PathBuf>
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let args = Args::parse();

    let network = QNetwork::load(&args.model_path)
        .with_context(|| format!("failed to load model from {}", args.model_path.display()))?;
    let mut policy = BlendedPolicy::new(network, args.scripted_probability, args.seed)?;
    let mut arena = Arena::new(args.max_steps, args.opponent, args.seed.map(|seed| seed.wrapping_add(1)));

    let mut history = TrainingHistory::new();
    for episode in 1..=args.episodes {
        arena.reset();
        let mut total_reward = 0.0;
        while !arena.is_done() {
            let action = policy.choose(&arena)?;
            let (_, reward, _) = arena.step(action);
            total_reward += reward;
        }
        debug!(episode, reward = total_reward, steps = arena.steps(), captured = arena.captured(), "episode finished");

        history.record(EpisodeStats {
            episode,
            total_reward,
            steps: arena.steps(),
            captured: arena.captured(),
            epsilon: 0.0,
            mean_loss: None
        });
    }

    if let Some(path) = &args.history {
        history.write_csv(path).context("failed to write evaluation history")?;
    }

    info!(
        episodes = history.len(),
        scripted_probability = policy.scripted_probability(),
        avg_reward = history.rolling_average_reward(history.len()),
        capture_rate = history.capture_rate(history.len()),
        "evaluation finished"
    );
    Ok(())
}
