//! Service lifecycle: states, verbs and the controller that drives them.

mod controller;
mod state;

pub use controller::LifecycleController;
pub use state::{LifecycleState, Verb};
