mod client;
mod runner;
mod types;


pub use client::{ClientSettings, RundeckClient};
pub use runner::{JobRunner, PollPolicy};
pub use types::{ExecutionStatus, Job, JobOptions, Project};
