use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Result, RundeckError};
use crate::output::PollProgress;

use super::client::RundeckClient;
use super::types::{Execution, ExecutionStatus, Job, JobOptions, Project, RunJobRequest};

/// How `await_completion` waits for an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two status checks
    pub interval: Duration,
    /// Give up after this many status checks; `None` waits forever
    pub max_attempts: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: None,
        }
    }
}

/// Drives one job from "run it by name" to "here is its output".
///
/// Every step talks to the server through the owned [`RundeckClient`]; nothing
/// is cached between calls, so each lookup reflects the server's current state.
pub struct JobRunner {
    client: RundeckClient,
    poll: PollPolicy,
    show_progress: bool,
}

impl JobRunner {
    pub fn new(client: RundeckClient, poll: PollPolicy) -> Self {
        debug!("Job runner using {} with {:?}", client.api_url(), poll);
        Self {
            client,
            poll,
            show_progress: false,
        }
    }

    /// Draw a spinner on stderr while waiting for an execution.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.client.get(&["projects"], &[]).await?.decode()
    }

    pub async fn list_jobs_in_project(&self, project: &str) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .client
            .get(&["project", project, "jobs"], &[])
            .await?
            .decode()?;

        for job in jobs.iter_mut().filter(|job| job.project.is_empty()) {
            job.project = project.to_string();
        }

        Ok(jobs)
    }

    /// Jobs of every project, in the server's project order.
    pub async fn list_all_jobs(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for project in self.list_projects().await? {
            jobs.extend(self.list_jobs_in_project(&project.name).await?);
        }
        debug!("Found {} jobs across all projects", jobs.len());
        Ok(jobs)
    }

    /// Looks a job up by its exact name.
    ///
    /// Searches `project` when given, otherwise every project. When several
    /// jobs share the name the last one listed wins.
    ///
    /// # Errors
    ///
    /// Returns [`RundeckError::JobNotFound`] when no job has that name.
    pub async fn find_job_by_name(&self, name: &str, project: Option<&str>) -> Result<Job> {
        let jobs = match project {
            Some(project) => self.list_jobs_in_project(project).await?,
            None => self.list_all_jobs().await?,
        };
        select_job(jobs, name)
    }

    /// Triggers the named job and returns as soon as the server accepts it.
    pub async fn run_job(
        &self,
        name: &str,
        options: &JobOptions,
        project: Option<&str>,
    ) -> Result<Execution> {
        let job = self.find_job_by_name(name, project).await?;
        info!(
            "Running job {} ({}) in project {}",
            job.full_name(),
            job.id,
            job.project
        );

        let body = serde_json::to_value(RunJobRequest { options })?;
        let execution: Execution = self
            .client
            .post(&["job", &job.id, "run"], Some(&body))
            .await?
            .decode()?;

        info!(
            "Started execution {} in project {}",
            execution.id,
            execution.project.as_deref().unwrap_or(&job.project)
        );
        if let Some(permalink) = &execution.permalink {
            debug!("Execution {} is at {permalink}", execution.id);
        }

        Ok(execution)
    }

    pub async fn get_execution(&self, execution_id: &str) -> Result<Execution> {
        self.client
            .get(&["execution", execution_id], &[])
            .await?
            .decode()
    }

    /// Waits until the execution leaves `running`.
    ///
    /// # Errors
    ///
    /// Returns [`RundeckError::ExecutionFailed`] when the execution ends in
    /// any state other than `succeeded`, and
    /// [`RundeckError::PollLimitExceeded`] when the poll policy runs out of
    /// attempts first.
    pub async fn await_completion(&self, execution_id: &str) -> Result<Execution> {
        let progress = self
            .show_progress
            .then(|| PollProgress::start(execution_id));

        let outcome = self.poll_until_terminal(execution_id, progress.as_ref()).await;

        if let Some(progress) = progress {
            progress.finish(outcome.as_ref().ok().map(|execution| &execution.status));
        }

        let execution = outcome?;
        log_elapsed(&execution);

        if execution.status != ExecutionStatus::Succeeded {
            return Err(RundeckError::ExecutionFailed {
                status: execution.status.to_string(),
            });
        }

        Ok(execution)
    }

    async fn poll_until_terminal(
        &self,
        execution_id: &str,
        progress: Option<&PollProgress>,
    ) -> Result<Execution> {
        let mut attempts: u32 = 0;

        loop {
            let execution = self.get_execution(execution_id).await?;
            attempts += 1;

            if !execution.status.is_running() {
                debug!(
                    "Execution {execution_id} is {} after {attempts} checks",
                    execution.status
                );
                return Ok(execution);
            }

            if let Some(max_attempts) = self.poll.max_attempts {
                if attempts >= max_attempts {
                    return Err(RundeckError::PollLimitExceeded {
                        execution_id: execution_id.to_string(),
                        attempts,
                    });
                }
            }

            if let Some(progress) = progress {
                progress.update(attempts);
            }

            tokio::time::sleep(self.poll.interval).await;
        }
    }

    /// Plain-text log of an execution.
    pub async fn get_execution_output(&self, execution_id: &str) -> Result<String> {
        let payload = self
            .client
            .get(&["execution", execution_id, "output"], &[("format", "text")])
            .await?;
        Ok(payload.text())
    }

    /// Runs the job, waits for it and returns its output.
    ///
    /// Stops at the first failing step; no output is fetched for an
    /// execution that did not succeed.
    pub async fn run_to_completion(
        &self,
        name: &str,
        options: &JobOptions,
        project: Option<&str>,
    ) -> Result<String> {
        let execution = self.run_job(name, options, project).await?;
        self.await_completion(&execution.id).await?;
        self.get_execution_output(&execution.id).await
    }
}

fn select_job(jobs: Vec<Job>, name: &str) -> Result<Job> {
    let mut matches = 0;
    let mut selected = None;

    for job in jobs {
        if job.name == name {
            matches += 1;
            selected = Some(job);
        }
    }

    if matches > 1 {
        warn!("{matches} jobs are named {name}, using the last one listed");
    }

    selected.ok_or_else(|| RundeckError::JobNotFound(name.to_string()))
}

fn log_elapsed(execution: &Execution) {
    if let (Some(started), Some(ended)) = (&execution.date_started, &execution.date_ended) {
        let elapsed = ended.date - started.date;
        info!(
            "Execution {} {} after {}s",
            execution.id,
            execution.status,
            elapsed.num_seconds()
        );
    }
}
