pub mod sequential;

pub use sequential::tensor::Tensor;
pub use sequential::layer::{
    Layer,
    Dense,
    ReLU,
};
pub use sequential::loss::{
    Loss,
    MeanSquaredError
};
pub use sequential::optimizer::{
    Optimizer,
    Adam,
    SGD,
};
pub use sequential::Sequential;

pub mod error;
pub mod config;
pub mod game;
pub mod agent;
pub mod metrics;

pub use error::{Error, Result};
pub use config::{TrainConfig, OptimizerKind, OpponentStyle};
pub use game::{Arena, Action, State};
pub use agent::Agent;
pub use agent::replaybuffer::{ReplayBuffer, Transition, Batch};
pub use agent::qnetwork::QNetwork;
pub use agent::controller::{ActionSource, BlendedPolicy};
pub use metrics::{EpisodeStats, TrainingHistory};
