use std::collections::VecDeque;
use rand::Rng;
use crate::error::{Error, Result};
use crate::game::{Action, State};

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: State,
    pub action: Action,
    pub reward: f32,
    pub next_state: State,
    pub done: bool
}

// five parallel columns, index i of each belongs to the same transition
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub states: Vec<State>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    pub next_states: Vec<State>,
    pub dones: Vec<bool>
}

impl Batch {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity
        }
    }

    // evicts the oldest transition once full
    pub fn push(&mut self, transition: Transition) {
        if self.capacity == 0 {
            return;
        }
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    // uniform, without replacement
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<Batch> {
        if self.buffer.len() < batch_size {
            return Err(Error::InsufficientSamples {
                requested: batch_size,
                available: self.buffer.len()
            });
        }

        let indices = rand::seq::index::sample(rng, self.buffer.len(), batch_size);

        let mut batch = Batch {
            states: Vec::with_capacity(batch_size),
            actions: Vec::with_capacity(batch_size),
            rewards: Vec::with_capacity(batch_size),
            next_states: Vec::with_capacity(batch_size),
            dones: Vec::with_capacity(batch_size)
        };
        for index in indices.iter() {
            let transition = &self.buffer[index];
            batch.states.push(transition.state);
            batch.actions.push(transition.action.index());
            batch.rewards.push(transition.reward);
            batch.next_states.push(transition.next_state);
            batch.dones.push(transition.done);
        }

        Ok(batch)
    }
}
