pub mod tasks;

pub use tasks::{CompletedTask, Purpose, SessionToken, TaskOutcome, TaskQueue, TaskStats, Ticket};
