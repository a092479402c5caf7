mod progress;
mod result;
mod styling;
mod tables;

pub use progress::PollProgress;
pub use result::RunOutcome;
pub use styling::{dim, magenta_bold};
pub use tables::{print_jobs, print_projects};

/// Prints the banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚀 rundeck-job"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Run Rundeck jobs by name")
    );
}
