use crate::client;
use crate::config::{DispatchbroConfig, TrackerConfig};
use crate::github::{DefaultGithubClient, GithubClient, RepositoryIdentifier};
use crate::processing::tracker::describe;
use crate::processing::{self, CompletionTracker, Dispatcher, RunQueryWindow, TrackerOutcome};
use config::ConfigError;
use log::info;
use std::sync::Arc;
use structopt::StructOpt;
use thiserror::Error;

/// Action inputs. The runner exposes each `with:` input as an `INPUT_<NAME>` variable.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "dispatchbro",
    about = "Dispatch a repository event and wait for the workflow run it triggers"
)]
pub struct ActionInputs {
    #[structopt(long, env = "INPUT_GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Target repository, in `owner/name` form
    #[structopt(long, env = "INPUT_REPOSITORY")]
    pub repository: RepositoryIdentifier,

    /// Title of the run the dispatch is expected to create
    #[structopt(long, env = "INPUT_WORKFLOW_NAME")]
    pub workflow_name: String,

    /// JSON object sent as the event's client payload
    #[structopt(long, env = "INPUT_CLIENT_PAYLOAD")]
    pub client_payload: Option<String>,

    /// Wait for the dispatched run to finish when set to "true"
    #[structopt(long, env = "INPUT_VERIFY_JOB", default_value = "false")]
    pub verify_job: String,

    /// Event type to dispatch, defaults to the workflow name
    #[structopt(long, env = "INPUT_EVENT_TYPE")]
    pub event_type: Option<String>,

    #[structopt(long, default_value = "~/.config/dispatchbro.yaml")]
    pub config: String,
}

impl ActionInputs {
    pub fn verify_enabled(&self) -> bool {
        self.verify_job.eq_ignore_ascii_case("true")
    }

    pub fn event_type(&self) -> &str {
        match self.event_type.as_deref() {
            Some(event_type) if !event_type.is_empty() => event_type,
            _ => &self.workflow_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Dispatched,
    Tracked(TrackerOutcome),
}

impl ActionOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Dispatched | Self::Tracked(TrackerOutcome::Succeeded(_)) => 0,
            Self::Tracked(_) => 1,
        }
    }

    pub fn failure_message(&self) -> Option<String> {
        match self {
            Self::Tracked(TrackerOutcome::Failed(run)) => {
                Some(format!("Workflow run failed: {}", run.html_url))
            }
            Self::Tracked(TrackerOutcome::TimedOut {
                attempts,
                status,
                conclusion,
            }) => Some(format!(
                "Max attempts ({}) reached without completion (last status: {}, conclusion: {})",
                attempts,
                describe(status),
                describe(conclusion)
            )),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] client::Error),

    #[error(transparent)]
    Processing(#[from] processing::Error),
}

pub async fn run(inputs: &ActionInputs) -> Result<ActionOutcome, Error> {
    let config = DispatchbroConfig::new(&inputs.config)?;
    let github = DefaultGithubClient::new(
        inputs.github_token.as_str(),
        config.github.api_base.as_str(),
        config.github.rate_limit_budget(),
    )?;
    execute(Arc::new(github), inputs, config.tracker).await
}

/// Dispatches the event and, when asked to, waits for the run it triggers.
pub async fn execute(
    github: Arc<dyn GithubClient>,
    inputs: &ActionInputs,
    tracker_config: TrackerConfig,
) -> Result<ActionOutcome, Error> {
    // Opened before dispatching so the run can't be created ahead of the window
    let window = RunQueryWindow::starting_now(tracker_config.window());
    info!("Current time: {}", window.start().to_rfc3339());

    Dispatcher::new(github.clone())
        .dispatch(
            &inputs.repository,
            inputs.event_type(),
            inputs.client_payload.as_deref(),
        )
        .await?;
    if !inputs.verify_enabled() {
        info!(
            "VERIFY_JOB is not enabled. {} was dispatched from {}.",
            inputs.workflow_name, inputs.repository.repo
        );
        return Ok(ActionOutcome::Dispatched);
    }

    let tracker = CompletionTracker::new(
        github,
        inputs.repository.clone(),
        inputs.workflow_name.clone(),
        tracker_config,
    );
    let outcome = tracker.track(window).await?;
    Ok(ActionOutcome::Tracked(outcome))
}
