//! Priority task dispatch.

pub mod queue;

pub use queue::{Task, TaskQueue, TaskQueueHandle};
