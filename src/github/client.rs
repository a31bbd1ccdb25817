use super::models::{DispatchEventRequest, RepositoryIdentifier, WorkflowRuns};
use crate::client::{ApiClient, Result};
use async_trait::async_trait;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GithubClient: Send + Sync {
    async fn create_dispatch_event(
        &self,
        repo: &RepositoryIdentifier,
        request: &DispatchEventRequest,
    ) -> Result<()>;
    async fn workflow_runs(&self, repo: &RepositoryIdentifier, event: &str)
        -> Result<WorkflowRuns>;
}

#[derive(Clone)]
pub struct DefaultGithubClient {
    client: ApiClient,
    api_base: String,
}

impl DefaultGithubClient {
    pub fn new<T: Into<String>, B: Into<String>>(
        token: T,
        api_base: B,
        rate_limit_budget: Option<Duration>,
    ) -> Result<Self> {
        let api_base = api_base.into().trim_end_matches('/').to_string();
        let client = ApiClient::from_token(token)?.with_rate_limit_budget(rate_limit_budget);
        Ok(Self { client, api_base })
    }

    fn make_repository_url(&self, repo: &RepositoryIdentifier) -> String {
        format!("{}/repos/{}/{}", self.api_base, repo.owner, repo.repo)
    }
}

#[async_trait]
impl GithubClient for DefaultGithubClient {
    async fn create_dispatch_event(
        &self,
        repo: &RepositoryIdentifier,
        request: &DispatchEventRequest,
    ) -> Result<()> {
        let url = format!("{}/dispatches", self.make_repository_url(repo));
        self.client.post_no_content(&url, request).await
    }

    async fn workflow_runs(
        &self,
        repo: &RepositoryIdentifier,
        event: &str,
    ) -> Result<WorkflowRuns> {
        let url = format!(
            "{}/actions/runs?event={}",
            self.make_repository_url(repo),
            event
        );
        self.client.get(&url).await
    }
}
