use thiserror::Error;

#[derive(Error, Debug)]
pub enum RundeckError {
    #[error("Couldn't login to rundeck server {url}, user/password incorrect")]
    Authentication { url: String },

    #[error("Rundeck API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Job {0} not found: job name incorrect")]
    JobNotFound(String),

    #[error(
        "Execution's last status is: {status}, check Activity tab in the rundeck server for further details"
    )]
    ExecutionFailed { status: String },

    #[error("Execution {execution_id} still running after {attempts} status checks")]
    PollLimitExceeded { execution_id: String, attempts: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Unexpected response from rundeck: {0}")]
    UnexpectedResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RundeckError>;
