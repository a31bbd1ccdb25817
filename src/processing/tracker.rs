use super::window::{RunFilter, RunQueryWindow};
use super::Error;
use crate::config::TrackerConfig;
use crate::github::{
    GithubClient, RepositoryIdentifier, WorkflowRun, WorkflowRunConclusion, WorkflowRunStatus,
    REPOSITORY_DISPATCH_EVENT,
};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::time::sleep;

/// The terminal state the tracker ended up in.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerOutcome {
    Succeeded(WorkflowRun),
    Failed(WorkflowRun),
    /// Carries the last status and conclusion seen on a matching run, if any.
    TimedOut {
        attempts: u32,
        status: Option<WorkflowRunStatus>,
        conclusion: Option<WorkflowRunConclusion>,
    },
}

impl TrackerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Loop state, owned by a single `track` call and discarded once it returns.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackerState {
    pub attempt: u32,
    pub status: Option<WorkflowRunStatus>,
    pub conclusion: Option<WorkflowRunConclusion>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollStatus {
    Waiting,
    Done(TrackerOutcome),
}

/// Polls the run listing until the dispatched run completes or attempts run out.
pub struct CompletionTracker {
    github: Arc<dyn GithubClient>,
    repo: RepositoryIdentifier,
    workflow_name: String,
    config: TrackerConfig,
}

impl CompletionTracker {
    pub fn new<S: Into<String>>(
        github: Arc<dyn GithubClient>,
        repo: RepositoryIdentifier,
        workflow_name: S,
        config: TrackerConfig,
    ) -> Self {
        Self {
            github,
            repo,
            workflow_name: workflow_name.into(),
            config,
        }
    }

    pub async fn track(&self, window: RunQueryWindow) -> Result<TrackerOutcome, Error> {
        info!("Looking for runs of '{}' created within {}", self.workflow_name, window);
        let filter = RunFilter::new(self.workflow_name.clone(), window)
            .require_dispatch_event(self.config.require_dispatch_event);
        let mut state = TrackerState::default();
        loop {
            if let PollStatus::Done(outcome) = self.poll(&filter, &mut state).await? {
                return Ok(outcome);
            }
            state.attempt += 1;
            info!("Attempt: {}", state.attempt);
            if state.attempt >= self.config.max_attempts {
                error!(
                    "Max attempts reached without completion (last status: {}, conclusion: {})",
                    describe(&state.status),
                    describe(&state.conclusion)
                );
                return Ok(TrackerOutcome::TimedOut {
                    attempts: state.attempt,
                    status: state.status,
                    conclusion: state.conclusion,
                });
            }
            let interval = self.config.poll_interval();
            debug!("Sleeping for {} seconds", interval.as_secs());
            sleep(interval).await;
        }
    }

    async fn poll(&self, filter: &RunFilter, state: &mut TrackerState) -> Result<PollStatus, Error> {
        let runs = match self
            .github
            .workflow_runs(&self.repo, REPOSITORY_DISPATCH_EVENT)
            .await
        {
            Ok(runs) => runs,
            Err(e) if self.config.continue_on_query_error => {
                error!("Error fetching workflow runs: {}", e);
                return Ok(PollStatus::Waiting);
            }
            Err(e) => {
                error!("Error fetching workflow runs, giving up: {}", e);
                return Err(e.into());
            }
        };
        Ok(evaluate(filter, &runs.workflow_runs, state))
    }
}

/// Inspects one listing and records what was observed in `state`.
pub fn evaluate(filter: &RunFilter, runs: &[WorkflowRun], state: &mut TrackerState) -> PollStatus {
    let matching = filter.select(runs);
    let run = match matching.first() {
        Some(run) => *run,
        None => {
            info!("No matching workflow runs found");
            return PollStatus::Waiting;
        }
    };
    if matching.len() > 1 {
        warn!(
            "{} workflow runs match, following the most recent one ({})",
            matching.len(),
            run.id
        );
    }
    state.status = run.status;
    state.conclusion = run.conclusion;
    info!(
        "Status of the matching run: {} at ({})",
        describe(&run.status),
        run.html_url
    );
    if run.succeeded() {
        info!("Workflow completed successfully!");
        PollStatus::Done(TrackerOutcome::Succeeded(run.clone()))
    } else if run.failed() {
        error!("Workflow failed...");
        PollStatus::Done(TrackerOutcome::Failed(run.clone()))
    } else {
        match run.status {
            Some(WorkflowRunStatus::Completed) => info!(
                "Workflow completed with conclusion {}. Waiting for completion...",
                describe(&run.conclusion)
            ),
            Some(status) => info!("Workflow status is {}. Waiting for completion...", status),
            None => info!("Workflow status is unknown. Waiting for completion..."),
        };
        PollStatus::Waiting
    }
}

pub fn describe<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client;
    use crate::github::client::tests::serve_status;
    use crate::github::client::MockGithubClient;
    use crate::github::{DefaultGithubClient, WorkflowRuns};
    use crate::processing::window::tests::{make_run, window_start};
    use reqwest::StatusCode;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::Instant;

    fn window() -> RunQueryWindow {
        RunQueryWindow::starting_at(window_start(), Duration::from_secs(30))
    }

    fn config(max_attempts: u32) -> TrackerConfig {
        TrackerConfig {
            max_attempts,
            poll_interval_secs: 30,
            ..Default::default()
        }
    }

    fn completed(id: u64, offset_secs: i64, conclusion: WorkflowRunConclusion) -> WorkflowRun {
        let mut run = make_run(id, "deploy", offset_secs);
        run.status = Some(WorkflowRunStatus::Completed);
        run.conclusion = Some(conclusion);
        run
    }

    fn listing(runs: Vec<WorkflowRun>) -> WorkflowRuns {
        WorkflowRuns {
            total_count: runs.len() as u64,
            workflow_runs: runs,
        }
    }

    fn tracker(github: MockGithubClient, config: TrackerConfig) -> CompletionTracker {
        CompletionTracker::new(
            Arc::new(github),
            RepositoryIdentifier::new("octo-org", "octo-repo"),
            "deploy",
            config,
        )
    }

    fn server_error() -> client::Error {
        client::Error::Http {
            status: StatusCode::BAD_GATEWAY,
            message: "Bad Gateway".into(),
        }
    }

    #[test]
    fn no_match_keeps_polling() {
        let filter = RunFilter::new("deploy", window());
        let runs = vec![make_run(1, "other", 5), make_run(2, "deploy", 31)];
        let mut state = TrackerState::default();
        assert_eq!(evaluate(&filter, &runs, &mut state), PollStatus::Waiting);
        assert_eq!(state, TrackerState::default());
    }

    #[test]
    fn success_is_idempotent() {
        let filter = RunFilter::new("deploy", window());
        let runs = vec![completed(1, 5, WorkflowRunConclusion::Success)];
        for _ in 0..2 {
            let mut state = TrackerState::default();
            assert_eq!(
                evaluate(&filter, &runs, &mut state),
                PollStatus::Done(TrackerOutcome::Succeeded(runs[0].clone()))
            );
            assert_eq!(state.conclusion, Some(WorkflowRunConclusion::Success));
        }
    }

    #[test]
    fn other_conclusions_keep_polling() {
        let filter = RunFilter::new("deploy", window());
        let runs = vec![completed(1, 5, WorkflowRunConclusion::Other)];
        let mut state = TrackerState::default();
        assert_eq!(evaluate(&filter, &runs, &mut state), PollStatus::Waiting);
        assert_eq!(state.status, Some(WorkflowRunStatus::Completed));
        assert_eq!(state.conclusion, Some(WorkflowRunConclusion::Other));
    }

    #[test]
    fn multiple_matches_pick_is_stable() {
        let filter = RunFilter::new("deploy", window());
        let runs = vec![
            completed(1, 5, WorkflowRunConclusion::Failure),
            completed(2, 5, WorkflowRunConclusion::Success),
        ];
        for _ in 0..3 {
            let mut state = TrackerState::default();
            assert_eq!(
                evaluate(&filter, &runs, &mut state),
                PollStatus::Done(TrackerOutcome::Failed(runs[0].clone()))
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_max_attempts() {
        let mut github = MockGithubClient::new();
        github
            .expect_workflow_runs()
            .times(8)
            .returning(|_, _| Ok(listing(vec![make_run(1, "deploy", 5)])));
        let started = Instant::now();

        let outcome = tracker(github, config(8)).track(window()).await.unwrap();
        assert_eq!(
            outcome,
            TrackerOutcome::TimedOut {
                attempts: 8,
                status: Some(WorkflowRunStatus::Queued),
                conclusion: None,
            }
        );
        // No sleep after the last attempt
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(7 * 30));
        assert!(elapsed < Duration::from_secs(8 * 30));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_run_completes() {
        let mut calls = 0;
        let mut github = MockGithubClient::new();
        github.expect_workflow_runs().times(3).returning(move |_, _| {
            calls += 1;
            let runs = match calls {
                1 => vec![],
                2 => vec![make_run(1, "deploy", 5)],
                _ => vec![completed(1, 5, WorkflowRunConclusion::Success)],
            };
            Ok(listing(runs))
        });

        let outcome = tracker(github, config(8)).track(window()).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_polling() {
        let mut github = MockGithubClient::new();
        github
            .expect_workflow_runs()
            .times(1)
            .returning(|_, _| Ok(listing(vec![completed(1, 5, WorkflowRunConclusion::Failure)])));

        let outcome = tracker(github, config(8)).track(window()).await.unwrap();
        assert!(matches!(outcome, TrackerOutcome::Failed(run) if run.id == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn query_errors_count_as_attempts() {
        let mut calls = 0;
        let mut github = MockGithubClient::new();
        github.expect_workflow_runs().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Err(server_error())
            } else {
                Ok(listing(vec![completed(1, 5, WorkflowRunConclusion::Success)]))
            }
        });

        let outcome = tracker(github, config(8)).track(window()).await.unwrap();
        assert!(outcome.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn query_errors_exhaust_attempts() {
        let mut github = MockGithubClient::new();
        github
            .expect_workflow_runs()
            .times(3)
            .returning(|_, _| Err(server_error()));

        let outcome = tracker(github, config(3)).track(window()).await.unwrap();
        assert_eq!(
            outcome,
            TrackerOutcome::TimedOut {
                attempts: 3,
                status: None,
                conclusion: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_listings_time_out() {
        let mut github = MockGithubClient::new();
        github
            .expect_workflow_runs()
            .times(5)
            .returning(|_, _| Ok(listing(vec![])));

        let outcome = tracker(github, config(5)).track(window()).await.unwrap();
        assert_eq!(
            outcome,
            TrackerOutcome::TimedOut {
                attempts: 5,
                status: None,
                conclusion: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reports_last_seen_run() {
        let mut calls = 0;
        let mut github = MockGithubClient::new();
        github.expect_workflow_runs().times(3).returning(move |_, _| {
            calls += 1;
            let runs = match calls {
                1 => vec![make_run(1, "deploy", 5)],
                2 => vec![completed(1, 5, WorkflowRunConclusion::Other)],
                _ => vec![],
            };
            Ok(listing(runs))
        });

        let outcome = tracker(github, config(3)).track(window()).await.unwrap();
        assert_eq!(
            outcome,
            TrackerOutcome::TimedOut {
                attempts: 3,
                status: Some(WorkflowRunStatus::Completed),
                conclusion: Some(WorkflowRunConclusion::Other),
            }
        );
    }

    #[tokio::test]
    async fn rate_limited_listing_fails_fast() {
        let (api_base, requests) = serve_status("429 Too Many Requests");
        let github = DefaultGithubClient::new("token", api_base, None).unwrap();
        let tracker = CompletionTracker::new(
            Arc::new(github),
            RepositoryIdentifier::new("octo-org", "octo-repo"),
            "deploy",
            TrackerConfig {
                continue_on_query_error: false,
                ..config(8)
            },
        );

        let result = tracker.track(window()).await;
        match result {
            Err(Error::Client(e)) => assert!(e.too_many_requests()),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fail_fast_on_query_error() {
        let mut github = MockGithubClient::new();
        github
            .expect_workflow_runs()
            .times(1)
            .returning(|_, _| Err(server_error()));
        let config = TrackerConfig {
            continue_on_query_error: false,
            ..config(8)
        };

        let result = tracker(github, config).track(window()).await;
        assert!(matches!(result, Err(Error::Client(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn queries_dispatch_runs_only() {
        let mut github = MockGithubClient::new();
        github
            .expect_workflow_runs()
            .withf(|repo, event| repo.to_string() == "octo-org/octo-repo" && event == "repository_dispatch")
            .times(1)
            .returning(|_, _| Ok(listing(vec![completed(1, 5, WorkflowRunConclusion::Success)])));

        let outcome = tracker(github, config(1)).track(window()).await.unwrap();
        assert!(outcome.is_success());
    }
}
