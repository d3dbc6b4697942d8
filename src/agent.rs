pub mod replaybuffer;
pub mod qnetwork;
pub mod controller;

use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::{debug, info};

use replaybuffer::{ReplayBuffer, Transition};
use qnetwork::QNetwork;
use crate::config::TrainConfig;
use crate::error::Result;
use crate::game::{Action, Arena, State, ACTION_DIM};
use crate::metrics::{EpisodeStats, TrainingHistory};
use crate::sequential::tensor::Tensor;

const REPORT_INTERVAL: usize = 50;

// bootstrapped one-step target, no bootstrap past a terminal transition
pub fn td_target(reward: f32, gamma: f32, next_max: f32, done: bool) -> f32 {
    reward + gamma * next_max * if done { 0.0 } else { 1.0 }
}

pub struct Agent {
    q_network: QNetwork,
    target_network: QNetwork,
    replay_buffer: ReplayBuffer,
    config: TrainConfig,
    epsilon: f32,
    rng: StdRng
}

impl Agent {
    pub fn new(config: &TrainConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let q_network = QNetwork::new(config.optimizer, config.lr, &mut rng);
        let target_network = q_network.clone();

        Ok(Self {
            q_network,
            target_network,
            replay_buffer: ReplayBuffer::new(config.memory_capacity),
            config: config.clone(),
            epsilon: config.epsilon_start,
            rng
        })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn q_network(&self) -> &QNetwork {
        &self.q_network
    }

    pub fn target_network(&self) -> &QNetwork {
        &self.target_network
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.replay_buffer
    }

    pub fn remember(&mut self, transition: Transition) {
        self.replay_buffer.push(transition);
    }

    // the arena is built here so its step cap and timeout penalty follow the config
    pub fn train(&mut self) -> Result<TrainingHistory> {
        let mut arena = Arena::from_config(&self.config);
        let mut history = TrainingHistory::new();

        for episode in 1..=self.config.episodes {
            let stats = self.run_episode(&mut arena, episode)?;
            debug!(
                episode,
                reward = stats.total_reward,
                steps = stats.steps,
                captured = stats.captured,
                "episode finished"
            );
            history.record(stats);
            self.finish_episode(episode);

            if episode % REPORT_INTERVAL == 0 {
                info!(
                    episode,
                    avg_reward = history.rolling_average_reward(REPORT_INTERVAL),
                    epsilon = self.epsilon,
                    "training progress"
                );
            }
        }

        self.q_network.save(&self.config.model_path)?;
        if let Some(path) = &self.config.history_path {
            history.write_csv(path)?;
            info!(path = %path.display(), "wrote training history");
        }

        Ok(history)
    }

    pub fn run_episode(&mut self, arena: &mut Arena, episode: usize) -> Result<EpisodeStats> {
        let mut state = arena.reset();
        let mut total_reward = 0.0;
        let mut steps = 0;
        let mut losses = Vec::new();

        while steps < self.config.max_steps {
            let action = self.select_action(&state)?;
            let (next_state, reward, done) = arena.step(action);
            total_reward += reward;
            steps += 1;

            self.remember(Transition {state, action, reward, next_state, done});
            state = next_state;

            if let Some(loss) = self.train_step()? {
                losses.push(loss);
            }
            if done {
                break;
            }
        }

        let mean_loss = if losses.is_empty() {
            None
        } else {
            Some(losses.iter().sum::<f32>() / losses.len() as f32)
        };

        Ok(EpisodeStats {
            episode,
            total_reward,
            steps,
            captured: arena.captured(),
            epsilon: self.epsilon,
            mean_loss
        })
    }

    // epsilon-greedy over the online estimator
    pub fn select_action(&mut self, state: &State) -> Result<Action> {
        if self.rng.random::<f32>() < self.epsilon {
            Ok(Action::ALL[self.rng.random_range(0..ACTION_DIM)])
        } else {
            self.greedy_action(state)
        }
    }

    pub fn greedy_action(&mut self, state: &State) -> Result<Action> {
        self.q_network.best_action(state)
    }

    // returns None until the buffer holds a full batch
    pub fn train_step(&mut self) -> Result<Option<f32>> {
        if self.replay_buffer.len() < self.config.batch_size {
            return Ok(None);
        }

        let batch = self.replay_buffer.sample(self.config.batch_size, &mut self.rng)?;
        let states = Tensor::from_rows(&batch.states);
        let next_states = Tensor::from_rows(&batch.next_states);

        let next_max = self.target_network.forward(&next_states)?.max_rows();

        // only the taken action's entry differs from the prediction, so the
        // other three contribute no gradient
        let mut q_targets = self.q_network.forward(&states)?;
        {
            let q_targets_data = q_targets.write();
            for i in 0..batch.len() {
                let target = td_target(batch.rewards[i], self.config.gamma, next_max[i], batch.dones[i]);
                q_targets_data[i * ACTION_DIM + batch.actions[i]] = target;
            }
        }

        let loss = self.q_network.update(&states, &q_targets)?;
        Ok(Some(loss))
    }

    pub fn finish_episode(&mut self, episode: usize) {
        if self.epsilon > self.config.epsilon_end {
            self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_end);
        }

        if episode % self.config.target_update_interval == 0 {
            self.target_network.sync_from(&self.q_network);
            debug!(episode, "synced target network");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TrainConfig {
        TrainConfig {
            episodes: 3,
            max_steps: 30,
            batch_size: 8,
            memory_capacity: 200,
            seed: Some(11),
            ..Default::default()
        }
    }

    fn transition(i: usize) -> Transition {
        Transition {
            state: [i as f32 * 0.01; 11],
            action: Action::ALL[i % ACTION_DIM],
            reward: if i % 5 == 0 { 10.14 } else { -0.11 },
            next_state: [(i + 1) as f32 * 0.01; 11],
            done: i % 5 == 0
        }
    }

    fn zero_online_network(agent: &mut Agent) {
        let zeros: Vec<Tensor> = agent
            .q_network
            .snapshot()
            .iter()
            .map(|t| Tensor::zeros(t.rows(), t.cols()))
            .collect();
        agent.q_network.restore(&zeros).unwrap();
    }

    #[test]
    fn test_td_target() {
        assert!((td_target(1.0, 0.99, 2.0, false) - 2.98).abs() < 1e-6);
        assert_eq!(td_target(10.14, 0.99, 100.0, true), 10.14);
        assert_eq!(td_target(-0.11, 0.0, 5.0, false), -0.11);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = TrainConfig { batch_size: 0, ..test_config() };
        assert!(Agent::new(&config).is_err());
    }

    #[test]
    fn test_target_starts_as_copy() {
        let agent = Agent::new(&test_config()).unwrap();
        assert_eq!(agent.q_network().snapshot(), agent.target_network().snapshot());
        assert_eq!(agent.epsilon(), 1.0);
    }

    #[test]
    fn test_epsilon_decays_to_floor() {
        let config = TrainConfig { epsilon_decay: 0.9, epsilon_end: 0.3, ..test_config() };
        let mut agent = Agent::new(&config).unwrap();

        let mut previous = agent.epsilon();
        for episode in 1..=50 {
            agent.finish_episode(episode);
            assert!(agent.epsilon() <= previous);
            assert!(agent.epsilon() >= 0.3);
            previous = agent.epsilon();
        }
        assert_eq!(agent.epsilon(), 0.3);
    }

    #[test]
    fn test_target_changes_only_at_sync() {
        let config = TrainConfig { target_update_interval: 3, ..test_config() };
        let mut agent = Agent::new(&config).unwrap();
        for i in 0..20 {
            agent.remember(transition(i));
        }

        let mut target_before = agent.target_network().snapshot();
        for episode in 1..=6 {
            assert!(agent.train_step().unwrap().is_some());
            assert_ne!(agent.q_network().snapshot(), agent.target_network().snapshot());
            agent.finish_episode(episode);

            let target_after = agent.target_network().snapshot();
            if episode % 3 == 0 {
                assert_eq!(target_after, agent.q_network().snapshot());
                assert_ne!(target_after, target_before);
            } else {
                assert_eq!(target_after, target_before);
            }
            target_before = target_after;
        }
    }

    #[test]
    fn test_train_step_waits_for_full_batch() {
        let mut agent = Agent::new(&test_config()).unwrap();
        for i in 0..7 {
            agent.remember(transition(i));
            assert_eq!(agent.train_step().unwrap(), None);
        }
        agent.remember(transition(7));
        assert!(agent.train_step().unwrap().is_some());
    }

    #[test]
    fn test_greedy_selection_with_zero_epsilon() {
        let config = TrainConfig { epsilon_start: 0.0, epsilon_end: 0.0, ..test_config() };
        let mut agent = Agent::new(&config).unwrap();
        zero_online_network(&mut agent);

        // all four values tie, so the lowest index wins every time
        for i in 0..100 {
            let state = [i as f32 * 0.01; 11];
            assert_eq!(agent.select_action(&state).unwrap(), Action::Up);
        }
    }

    #[test]
    fn test_random_selection_with_full_epsilon() {
        let mut agent = Agent::new(&test_config()).unwrap();
        zero_online_network(&mut agent);

        let mut counts = [0usize; ACTION_DIM];
        for _ in 0..10000 {
            counts[agent.select_action(&[0.5; 11]).unwrap().index()] += 1;
        }
        for count in counts {
            assert!((2200..=2800).contains(&count), "count {} is far from uniform", count);
        }
    }

    #[test]
    fn test_short_training_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            model_path: dir.path().join("enemy.bin"),
            history_path: Some(dir.path().join("history.csv")),
            target_update_interval: 2,
            ..test_config()
        };
        let mut agent = Agent::new(&config).unwrap();

        let history = agent.train().unwrap();

        assert_eq!(history.len(), 3);
        for (i, stats) in history.episodes().iter().enumerate() {
            assert_eq!(stats.episode, i + 1);
            assert!(stats.steps >= 1 && stats.steps <= 30);
        }
        assert!(agent.replay_buffer().len() <= 90);
        assert!(history.episodes().iter().any(|stats| stats.mean_loss.is_some()));
        assert!((agent.epsilon() - 0.997f32.powi(3)).abs() < 1e-6);

        let mut loaded = QNetwork::load(&config.model_path).unwrap();
        assert_eq!(loaded.snapshot(), agent.q_network().snapshot());
        let state = Arena::from_config(&config).reset();
        assert_eq!(loaded.best_action(&state).unwrap(), agent.greedy_action(&state).unwrap());

        let csv = std::fs::read_to_string(config.history_path.unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn test_training_episodes_use_configured_step_cap() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainConfig {
            episodes: 4,
            max_steps: 3,
            model_path: dir.path().join("enemy.bin"),
            ..test_config()
        };
        let mut agent = Agent::new(&config).unwrap();

        // the actors start 21 cells apart, so every episode times out
        let history = agent.train().unwrap();
        for stats in history.episodes() {
            assert_eq!(stats.steps, 3);
            assert!(!stats.captured);
            // three shaping rewards of at most 0.14 each plus the -5 penalty
            assert!(stats.total_reward < -4.5, "no timeout penalty in {}", stats.total_reward);
        }
    }
}
