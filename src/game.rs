use std::collections::HashSet;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Serialize, Deserialize};
use crate::config::{OpponentStyle, TrainConfig};
use crate::error::{Error, Result};

pub const GRID_WIDTH: i32 = 28; // cells
pub const GRID_HEIGHT: i32 = 18; // cells
pub const STATE_DIM: usize = 11;
pub const ACTION_DIM: usize = 4;

const CAPTURE_REWARD: f32 = 10.0;
const TIMEOUT_PENALTY: f32 = 5.0;
const APPROACH_REWARD: f32 = 0.1;
const CLOSE_RANGE: i32 = 3;
const CLOSE_RANGE_BONUS: f32 = 0.05;
const STEP_PENALTY: f32 = 0.01;
const SCRIPTED_AXIS_PROBABILITY: f64 = 0.6;

pub type Cell = (i32, i32);
pub type State = [f32; STATE_DIM];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up,
    Down,
    Left,
    Right
}

impl Action {
    pub const ALL: [Action; ACTION_DIM] = [Action::Up, Action::Down, Action::Left, Action::Right];

    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL.get(index).copied().ok_or(Error::InvalidAction(index))
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn delta(self) -> Cell {
        match self {
            Action::Up => (0, -1),
            Action::Down => (0, 1),
            Action::Left => (-1, 0),
            Action::Right => (1, 0),
        }
    }
}

// two broken horizontal corridors at mid-height, vertical corridors at x=3 and x=w-4
pub fn generate_walls(width: i32, height: i32) -> HashSet<Cell> {
    let mut walls = HashSet::new();
    let y_mid = height / 2;

    for x in 3..width - 3 {
        if x < width / 2 - 3 || x > width / 2 + 3 {
            walls.insert((x, y_mid));
        }
    }
    for y in 3..height - 3 {
        if y < y_mid - 2 || y > y_mid + 2 {
            walls.insert((3, y));
            walls.insert((width - 4, y));
        }
    }

    walls
}

pub fn manhattan(a: Cell, b: Cell) -> i32 {
    (a.0 - b.0).abs() + (a.1 - b.1).abs()
}

// [dx, dy, dist, up, down, left, right, px, py, ex, ey], all seen from the enemy.
// Evaluated in f64 and rounded once so saved models see the same bits.
pub fn encode_state(enemy: Cell, player: Cell, walls: &HashSet<Cell>) -> State {
    let (ex, ey) = enemy;
    let (px, py) = player;
    let w = GRID_WIDTH as f64;
    let h = GRID_HEIGHT as f64;
    let blocked = |cell: Cell| {
        let off_grid = cell.0 < 0 || cell.0 >= GRID_WIDTH || cell.1 < 0 || cell.1 >= GRID_HEIGHT;
        if off_grid || walls.contains(&cell) { 1.0 } else { 0.0 }
    };

    [
        ((px - ex) as f64 / w) as f32,
        ((py - ey) as f64 / h) as f32,
        (manhattan(enemy, player) as f64 / (w + h)) as f32,
        blocked((ex, ey - 1)),
        blocked((ex, ey + 1)),
        blocked((ex - 1, ey)),
        blocked((ex + 1, ey)),
        (px as f64 / w) as f32,
        (py as f64 / h) as f32,
        (ex as f64 / w) as f32,
        (ey as f64 / h) as f32,
    ]
}

// unit step along the axis of greater separation (vertical on ties)
pub fn axis_step(from: Cell, to: Cell) -> Cell {
    let diff_x = to.0 - from.0;
    let diff_y = to.1 - from.1;
    if diff_x.abs() > diff_y.abs() {
        (diff_x.signum(), 0)
    } else {
        (0, diff_y.signum())
    }
}

// the enemy is RL controlled, the player follows a scripted policy
pub struct Arena {
    walls: HashSet<Cell>,
    enemy: Cell,
    player: Cell,
    steps: usize,
    max_steps: usize,
    done: bool,
    captured: bool,
    opponent: OpponentStyle,
    rng: StdRng
}

impl Arena {
    pub fn new(max_steps: usize, opponent: OpponentStyle, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut instance = Self {
            walls: HashSet::new(),
            enemy: (0, 0),
            player: (0, 0),
            steps: 0,
            max_steps,
            done: false,
            captured: false,
            opponent,
            rng
        };
        instance.reset();

        instance
    }

    // the arena stream is offset from the agent's so the two never share draws
    pub fn from_config(config: &TrainConfig) -> Self {
        Self::new(config.max_steps, config.opponent, config.seed.map(|seed| seed.wrapping_add(1)))
    }

    pub fn enemy(&self) -> Cell {self.enemy}
    pub fn player(&self) -> Cell {self.player}
    pub fn walls(&self) -> &HashSet<Cell> {&self.walls}
    pub fn steps(&self) -> usize {self.steps}
    pub fn max_steps(&self) -> usize {self.max_steps}
    pub fn is_done(&self) -> bool {self.done}
    pub fn captured(&self) -> bool {self.captured}

    pub fn is_blocked(&self, cell: Cell) -> bool {
        cell.0 < 0 || cell.0 >= GRID_WIDTH || cell.1 < 0 || cell.1 >= GRID_HEIGHT || self.walls.contains(&cell)
    }

    // blocked moves leave the mover where it was
    fn moved(&self, from: Cell, delta: Cell) -> Cell {
        let target = (from.0 + delta.0, from.1 + delta.1);
        if self.is_blocked(target) { from } else { target }
    }

    // returns state
    pub fn reset(&mut self) -> State {
        self.walls = generate_walls(GRID_WIDTH, GRID_HEIGHT);
        self.player = (3, GRID_HEIGHT / 2);
        self.enemy = (GRID_WIDTH - 4, GRID_HEIGHT / 2);
        // both start cells sit on the mid-height corridor
        self.walls.remove(&self.player);
        self.walls.remove(&self.enemy);

        self.steps = 0;
        self.done = false;
        self.captured = false;

        self.get_state()
    }

    pub fn get_state(&self) -> State {
        encode_state(self.enemy, self.player, &self.walls)
    }

    // returns (next_state, reward, done)
    pub fn step(&mut self, action: Action) -> (State, f32, bool) {
        // unreachable from the training loop, which stops on done
        if self.done {
            return (self.get_state(), 0.0, true);
        }
        let player_delta = self.scripted_player_delta();
        self.resolve(action, player_delta)
    }

    fn scripted_player_delta(&mut self) -> Cell {
        if self.rng.random_bool(SCRIPTED_AXIS_PROBABILITY) {
            let toward = axis_step(self.player, self.enemy);
            match self.opponent {
                OpponentStyle::Pursue => toward,
                OpponentStyle::Evade => (-toward.0, -toward.1),
            }
        } else {
            const MOVES: [Cell; 5] = [(1, 0), (-1, 0), (0, 1), (0, -1), (0, 0)];
            MOVES[self.rng.random_range(0..MOVES.len())]
        }
    }

    fn resolve(&mut self, action: Action, player_delta: Cell) -> (State, f32, bool) {
        self.steps += 1;
        let dist_before = manhattan(self.enemy, self.player);

        self.enemy = self.moved(self.enemy, action.delta());
        self.player = self.moved(self.player, player_delta);

        let dist_after = manhattan(self.enemy, self.player);

        let mut reward = if dist_after < dist_before { APPROACH_REWARD } else { -APPROACH_REWARD };
        if dist_after <= CLOSE_RANGE {
            reward += CLOSE_RANGE_BONUS;
        }
        reward -= STEP_PENALTY;

        if self.enemy == self.player {
            reward += CAPTURE_REWARD;
            self.captured = true;
            self.done = true;
        }
        if self.steps >= self.max_steps && !self.done {
            reward -= TIMEOUT_PENALTY;
            self.done = true;
        }

        (self.get_state(), reward, self.done)
    }
}
