// during play the enemy is driven by a scripted chaser, a trained network,
// or a per-decision coin flip between the two

use rand::prelude::*;
use rand::rngs::StdRng;

use super::qnetwork::QNetwork;
use crate::error::{Error, Result};
use crate::game::{axis_step, Action, Arena};

pub const DEFAULT_SCRIPTED_PROBABILITY: f64 = 0.5;

pub enum ActionSource {
    Scripted, // steps toward the player along the axis of greater separation
    Learned(QNetwork)
}

impl ActionSource {
    pub fn choose(&mut self, arena: &Arena) -> Result<Action> {
        match self {
            ActionSource::Scripted => Ok(chase(arena)),
            ActionSource::Learned(network) => network.best_action(&arena.get_state())
        }
    }
}

fn chase(arena: &Arena) -> Action {
    match axis_step(arena.enemy(), arena.player()) {
        (0, 1) => Action::Down,
        (-1, 0) => Action::Left,
        (1, 0) => Action::Right,
        // (0, -1), or no separation at all
        _ => Action::Up
    }
}

pub struct BlendedPolicy {
    scripted: ActionSource,
    learned: ActionSource,
    scripted_probability: f64,
    rng: StdRng
}

impl BlendedPolicy {
    pub fn new(learned: QNetwork, scripted_probability: f64, seed: Option<u64>) -> Result<Self> {
        if !(0.0..=1.0).contains(&scripted_probability) {
            return Err(Error::config(format!(
                "scripted probability must be in [0, 1], got {}",
                scripted_probability
            )));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            scripted: ActionSource::Scripted,
            learned: ActionSource::Learned(learned),
            scripted_probability,
            rng
        })
    }

    pub fn scripted_probability(&self) -> f64 {
        self.scripted_probability
    }

    pub fn choose(&mut self, arena: &Arena) -> Result<Action> {
        if self.rng.random_bool(self.scripted_probability) {
            self.scripted.choose(arena)
        } else {
            self.learned.choose(arena)
        }
    }
}
