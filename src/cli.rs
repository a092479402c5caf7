use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::auth::Auth;
use crate::config::Config;
use crate::output::{self, RunOutcome};
use crate::rundeck::{ClientSettings, JobOptions, JobRunner, PollPolicy, RundeckClient};

const INTERRUPTED: &str = "Interrupted while waiting; the execution keeps running on the server";

#[derive(Parser)]
#[command(name = "rundeck-job")]
#[command(author, version, about = "Run Rundeck jobs by name", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    connection: ConnectionArgs,

    /// Config file (defaults to ./rundeck-job.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write the result to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Args, Debug, Default)]
struct ConnectionArgs {
    /// Rundeck URL including port
    #[arg(short, long, global = true, env = "RUNDECK_URL")]
    url: Option<String>,

    #[arg(short, long, global = true, env = "RUNDECK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, global = true, env = "RUNDECK_USER")]
    user: Option<String>,

    #[arg(long, global = true, env = "RUNDECK_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, global = true)]
    api_version: Option<u32>,

    /// Accept invalid TLS certificates
    #[arg(long, global = true, default_value_t = false)]
    insecure: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a job, wait for it and print its output
    Run {
        #[arg(short, long)]
        job: String,

        /// Only search this project for the job
        #[arg(short = 'P', long)]
        project: Option<String>,

        /// Job option as KEY=VALUE, repeatable
        #[arg(short = 'O', long = "option", value_parser = parse_option_pair)]
        option: Vec<(String, String)>,

        /// Job options as a JSON object, e.g. '{"var1":"value1"}'
        #[arg(long)]
        options: Option<String>,

        /// Seconds between status checks
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        poll_interval: Option<u64>,

        /// Give up after this many status checks
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_polls: Option<u32>,
    },
    /// List projects
    Projects,
    /// List jobs of one or all projects
    Jobs {
        #[arg(short = 'P', long)]
        project: Option<String>,
    },
}

/// Connection settings after merging flags over the config file.
struct Connection {
    url: String,
    auth: Auth,
    settings: ClientSettings,
}

impl Connection {
    fn resolve(args: &ConnectionArgs, config: &Config) -> crate::error::Result<Self> {
        let url = args
            .url
            .clone()
            .or_else(|| config.rundeck.url.clone())
            .ok_or_else(|| crate::error::RundeckError::Config("rundeck url is required".into()))?;

        // Credentials given on the command line replace the file's as a whole.
        let auth = if args.token.is_some() || args.user.is_some() || args.password.is_some() {
            Auth::from_parts(args.token.clone(), args.user.clone(), args.password.clone())?
        } else {
            Auth::from_parts(
                config.rundeck.token.clone(),
                config.rundeck.user.clone(),
                config.rundeck.password.clone(),
            )?
        };

        debug!(
            "Authenticating to {url} with {}",
            if auth.is_token() { "an API token" } else { "user/password" }
        );

        let settings = ClientSettings {
            api_version: args.api_version.unwrap_or(config.rundeck.api_version),
            insecure: args.insecure || config.rundeck.insecure,
            login_timeout: Duration::from_secs(config.rundeck.login_timeout_secs),
        };

        Ok(Self {
            url,
            auth,
            settings,
        })
    }

    async fn open(self, poll: PollPolicy) -> crate::error::Result<JobRunner> {
        let client = RundeckClient::connect(&self.url, self.auth, &self.settings).await?;
        Ok(JobRunner::new(client, poll))
    }
}

impl Cli {
    #[allow(clippy::too_many_arguments)]
    async fn execute_run(
        &self,
        config: &Config,
        job: &str,
        project: Option<&str>,
        option: &[(String, String)],
        options_json: Option<&str>,
        poll_interval: Option<u64>,
        max_polls: Option<u32>,
    ) -> Result<ExitCode> {
        info!("Running rundeck job: {job}");

        let work = async {
            let options = merge_options(&config.run.options, options_json, option)?;
            let poll = poll_policy(config, poll_interval, max_polls)?;
            let project = project.or(config.run.project.as_deref());

            let runner = Connection::resolve(&self.connection, config)?
                .open(poll)
                .await?
                .with_progress(true);

            runner.run_to_completion(job, &options, project).await
        };

        let outcome = tokio::select! {
            result = work => match result {
                Ok(output) => RunOutcome::success(output),
                Err(err) => RunOutcome::failure(err.to_string()),
            },
            Ok(()) = tokio::signal::ctrl_c() => RunOutcome::failure(INTERRUPTED),
        };

        self.finish(&outcome)
    }

    async fn execute_list(&self, config: &Config, jobs_of: Option<Option<&str>>) -> Result<()> {
        let runner = Connection::resolve(&self.connection, config)?
            .open(PollPolicy::default())
            .await?;

        match jobs_of {
            None => {
                let projects = runner.list_projects().await?;
                info!("Found {} projects", projects.len());
                output::print_projects(&projects);
            }
            Some(project) => {
                let jobs = match project {
                    Some(project) => runner.list_jobs_in_project(project).await?,
                    None => runner.list_all_jobs().await?,
                };
                info!("Found {} jobs", jobs.len());
                output::print_jobs(&jobs);
            }
        }

        Ok(())
    }

    /// Prints the result payload and maps it to the process exit code.
    fn finish(&self, outcome: &RunOutcome) -> Result<ExitCode> {
        let json_output = outcome.to_json(self.pretty)?;
        println!("{json_output}");

        if let Some(output_path) = &self.output {
            std::fs::write(output_path, &json_output)
                .with_context(|| format!("Failed to write result: {}", output_path.display()))?;
            info!("Result written to: {}", output_path.display());
        }

        if outcome.is_failure() {
            Ok(ExitCode::FAILURE)
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }

    pub async fn execute(&self) -> Result<ExitCode> {
        let config = Config::load(self.config.as_deref());

        match &self.command {
            Commands::Run {
                job,
                project,
                option,
                options,
                poll_interval,
                max_polls,
            } => {
                // `run` always answers with a result payload, even for a bad config file.
                let config = match config {
                    Ok(config) => config,
                    Err(err) => return self.finish(&RunOutcome::failure(format!("{err:#}"))),
                };
                self.execute_run(
                    &config,
                    job,
                    project.as_deref(),
                    option,
                    options.as_deref(),
                    *poll_interval,
                    *max_polls,
                )
                .await
            }
            Commands::Projects => {
                self.execute_list(&config?, None).await?;
                Ok(ExitCode::SUCCESS)
            }
            Commands::Jobs { project } => {
                self.execute_list(&config?, Some(project.as_deref())).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Poll settings from flags over the config file; both must be positive.
fn poll_policy(
    config: &Config,
    poll_interval: Option<u64>,
    max_polls: Option<u32>,
) -> crate::error::Result<PollPolicy> {
    let interval = poll_interval.unwrap_or(config.run.poll_interval_secs);
    if interval == 0 {
        return Err(crate::error::RundeckError::Config(
            "poll interval must be at least 1 second".into(),
        ));
    }

    let max_attempts = max_polls.or(config.run.max_polls);
    if max_attempts == Some(0) {
        return Err(crate::error::RundeckError::Config(
            "max polls must be at least 1".into(),
        ));
    }

    Ok(PollPolicy {
        interval: Duration::from_secs(interval),
        max_attempts,
    })
}

fn parse_option_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Parses a JSON object of job options.
///
/// Numbers and booleans are sent as their text; nested values are rejected.
fn parse_options_json(raw: &str) -> crate::error::Result<JobOptions> {
    let object: serde_json::Map<String, Value> = serde_json::from_str(raw).map_err(|e| {
        crate::error::RundeckError::Config(format!("job options must be a JSON object: {e}"))
    })?;

    object
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text,
                Value::Number(number) => number.to_string(),
                Value::Bool(flag) => flag.to_string(),
                Value::Null => String::new(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(crate::error::RundeckError::Config(format!(
                        "job option {key} must be a string, number or boolean"
                    )))
                }
            };
            Ok((key, value))
        })
        .collect()
}

/// Config file options, then the JSON object, then `--option` pairs; later wins.
fn merge_options(
    defaults: &JobOptions,
    options_json: Option<&str>,
    pairs: &[(String, String)],
) -> crate::error::Result<JobOptions> {
    let mut options = defaults.clone();

    if let Some(raw) = options_json {
        options.extend(parse_options_json(raw)?);
    }

    options.extend(pairs.iter().cloned());

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RundeckError;

    #[test]
    fn test_parse_option_pair() {
        assert_eq!(
            parse_option_pair("env=prod").unwrap(),
            ("env".to_string(), "prod".to_string())
        );
        assert_eq!(
            parse_option_pair("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_option_pair("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_option_pair("novalue").is_err());
        assert!(parse_option_pair("=value").is_err());
    }

    #[test]
    fn test_parse_options_json_keeps_order_and_values() {
        let options =
            parse_options_json(r#"{"var2": "value2", "var1": "value1", "count": 3, "dry": false}"#)
                .unwrap();

        let pairs: Vec<_> = options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("var2", "value2"),
                ("var1", "value1"),
                ("count", "3"),
                ("dry", "false")
            ]
        );
    }

    #[test]
    fn test_parse_options_json_rejects_nested_values() {
        assert!(matches!(
            parse_options_json(r#"{"list": [1, 2]}"#),
            Err(RundeckError::Config(_))
        ));
        assert!(parse_options_json("[]").is_err());
        assert!(parse_options_json("not json").is_err());
    }

    #[test]
    fn test_merge_options_precedence() {
        let mut defaults = JobOptions::new();
        defaults.insert("env".to_string(), "staging".to_string());
        defaults.insert("region".to_string(), "eu".to_string());

        let pairs = vec![("region".to_string(), "us".to_string())];
        let options =
            merge_options(&defaults, Some(r#"{"env": "prod", "version": "2"}"#), &pairs).unwrap();

        assert_eq!(options["env"], "prod");
        assert_eq!(options["region"], "us");
        assert_eq!(options["version"], "2");
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn test_resolve_requires_url() {
        let err = Connection::resolve(&ConnectionArgs::default(), &Config::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("url is required"));
    }

    #[test]
    fn test_resolve_requires_credentials() {
        let args = ConnectionArgs {
            url: Some("http://rundeck".to_string()),
            ..ConnectionArgs::default()
        };
        let err = Connection::resolve(&args, &Config::default()).err().unwrap();
        assert!(matches!(err, RundeckError::Config(_)));
    }

    #[test]
    fn test_resolve_flags_override_config() {
        let mut config = Config::default();
        config.rundeck.url = Some("http://from-file".to_string());
        config.rundeck.user = Some("admin".to_string());
        config.rundeck.password = Some("admin".to_string());
        config.rundeck.login_timeout_secs = 10;

        let args = ConnectionArgs {
            token: Some("abc".to_string()),
            api_version: Some(41),
            ..ConnectionArgs::default()
        };
        let connection = Connection::resolve(&args, &config).unwrap();

        assert_eq!(connection.url, "http://from-file");
        assert!(connection.auth.is_token());
        assert_eq!(connection.settings.api_version, 41);
        assert_eq!(connection.settings.login_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_poll_policy_flags_override_config() {
        let mut config = Config::default();
        config.run.poll_interval_secs = 10;
        config.run.max_polls = Some(5);

        let policy = poll_policy(&config, None, None).unwrap();
        assert_eq!(policy.interval, Duration::from_secs(10));
        assert_eq!(policy.max_attempts, Some(5));

        let policy = poll_policy(&config, Some(1), Some(2)).unwrap();
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, Some(2));
    }

    #[test]
    fn test_poll_policy_rejects_zero_from_config() {
        let mut config = Config::default();
        config.run.poll_interval_secs = 0;
        assert!(matches!(
            poll_policy(&config, None, None),
            Err(RundeckError::Config(_))
        ));

        let mut config = Config::default();
        config.run.max_polls = Some(0);
        assert!(matches!(
            poll_policy(&config, None, None),
            Err(RundeckError::Config(_))
        ));
    }

    #[test]
    fn test_cli_rejects_zero_poll_settings() {
        let base = [
            "rundeck-job",
            "run",
            "--url",
            "http://rundeck:4440",
            "--token",
            "abc",
            "--job",
            "Deploy",
        ];

        let mut zero_polls = base.to_vec();
        zero_polls.extend(["--max-polls", "0"]);
        assert!(Cli::try_parse_from(zero_polls).is_err());

        let mut zero_interval = base.to_vec();
        zero_interval.extend(["--poll-interval", "0"]);
        assert!(Cli::try_parse_from(zero_interval).is_err());
    }

    #[tokio::test]
    async fn test_run_with_bad_config_reports_failure_payload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "[rundeck\nurl = ").unwrap();
        let result_path = temp_dir.path().join("result.json");

        let cli = Cli::try_parse_from([
            "rundeck-job",
            "-c",
            config_path.to_str().unwrap(),
            "-o",
            result_path.to_str().unwrap(),
            "run",
            "--url",
            "http://127.0.0.1:9",
            "--token",
            "abc",
            "--job",
            "Deploy",
        ])
        .unwrap();

        cli.execute().await.unwrap();

        let payload: Value =
            serde_json::from_str(&std::fs::read_to_string(&result_path).unwrap()).unwrap();
        assert_eq!(payload["failed"], Value::Bool(true));
        assert!(payload["msg"]
            .as_str()
            .unwrap()
            .starts_with("Failed to parse TOML config"));
        assert!(payload.get("changed").is_none());
    }

    #[test]
    fn test_cli_parses_run_command() {
        let cli = Cli::try_parse_from([
            "rundeck-job",
            "run",
            "--url",
            "http://rundeck:4440",
            "--token",
            "abc",
            "--job",
            "Deploy",
            "-O",
            "env=prod",
            "-O",
            "version=1.2",
            "--max-polls",
            "10",
        ])
        .unwrap();

        assert_eq!(cli.connection.url.as_deref(), Some("http://rundeck:4440"));
        match cli.command {
            Commands::Run {
                job,
                option,
                max_polls,
                ..
            } => {
                assert_eq!(job, "Deploy");
                assert_eq!(option.len(), 2);
                assert_eq!(max_polls, Some(10));
            }
            _ => panic!("expected run command"),
        }
    }
}
