#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]

pub mod cells;
pub mod error;
pub mod frame;
pub mod gravity;
pub mod queue;
pub mod simulation;
pub mod system;
pub mod tableau;
pub mod two_dim;
pub mod types;
pub mod worker;

pub use error::PhysicsError;
pub use frame::FrameBuffer;
pub use queue::WorkQueue;
pub use simulation::SphereSim;
pub use system::{SimulatedSystem, Variable};
pub use tableau::{ButcherTableau, IntegratorMethod};
pub use types::{Scalar, Sphere, Vec3, FLOATING_TYPE_NAME};
pub use worker::{FrameSink, SharedFrameRing, SharedSim, WorkerHandle};
