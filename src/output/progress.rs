use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::rundeck::ExecutionStatus;

use super::styling::{bright, bright_green, bright_red, bright_yellow};

/// Spinner shown while an execution is polled
pub struct PollProgress {
    pb: ProgressBar,
    execution_id: String,
}

impl PollProgress {
    pub fn start(execution_id: &str) -> Self {
        eprintln!("{}  {}", bright("⏳"), bright("Execution").underlined());
        let pb = create_spinner(
            bright_yellow(format!("Waiting for execution #{execution_id}")).to_string(),
        );
        Self {
            pb,
            execution_id: execution_id.to_string(),
        }
    }

    pub fn update(&self, checks: u32) {
        self.pb.set_message(
            bright_yellow(format!(
                "Waiting for execution #{} (running, {checks} checks)",
                self.execution_id
            ))
            .to_string(),
        );
    }

    /// `None` means polling stopped on an error; the spinner is left as is.
    pub fn finish(self, status: Option<&ExecutionStatus>) {
        match status {
            Some(ExecutionStatus::Succeeded) => self.pb.finish_with_message(
                bright_green(format!("Execution #{} succeeded ✓", self.execution_id)).to_string(),
            ),
            Some(status) => self.pb.finish_with_message(
                bright_red(format!("Execution #{} ended as {status} ✗", self.execution_id))
                    .to_string(),
            ),
            None => self.pb.abandon(),
        }
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
