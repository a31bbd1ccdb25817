use chrono::{DateTime, Utc};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The event name GitHub assigns to runs triggered through repository dispatch.
pub const REPOSITORY_DISPATCH_EVENT: &str = "repository_dispatch";

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RepositoryIdentifier {
    pub owner: String,
    pub repo: String,
}

impl RepositoryIdentifier {
    pub fn new<O: Into<String>, R: Into<String>>(owner: O, repo: R) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl FromStr for RepositoryIdentifier {
    type Err = InvalidRepositoryError;

    fn from_str(s: &str) -> Result<Self, InvalidRepositoryError> {
        let (owner, repo) = s
            .trim()
            .split_once('/')
            .ok_or(InvalidRepositoryError::MissingSeparator)?;
        if repo.contains('/') {
            return Err(InvalidRepositoryError::TooManySeparators);
        }
        if owner.is_empty() || repo.is_empty() {
            return Err(InvalidRepositoryError::EmptyComponent);
        }
        Ok(Self::new(owner, repo))
    }
}

impl fmt::Display for RepositoryIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum InvalidRepositoryError {
    #[error("repository must be in 'owner/name' form")]
    MissingSeparator,

    #[error("repository contains too many slashes")]
    TooManySeparators,

    #[error("empty owner/repository name")]
    EmptyComponent,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DispatchEventRequest {
    pub event_type: String,
    pub client_payload: serde_json::Value,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowRuns {
    #[serde(default)]
    pub total_count: u64,
    pub workflow_runs: Vec<WorkflowRun>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    pub id: u64,
    pub name: Option<String>,
    /// Missing on older GitHub Enterprise Server releases.
    #[serde(default)]
    pub display_title: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    pub status: Option<WorkflowRunStatus>,
    pub conclusion: Option<WorkflowRunConclusion>,
    pub created_at: DateTime<Utc>,
    pub html_url: String,
}

impl WorkflowRun {
    pub fn succeeded(&self) -> bool {
        self.status == Some(WorkflowRunStatus::Completed)
            && self.conclusion == Some(WorkflowRunConclusion::Success)
    }

    pub fn failed(&self) -> bool {
        self.status == Some(WorkflowRunStatus::Completed)
            && self.conclusion == Some(WorkflowRunConclusion::Failure)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum WorkflowRunStatus {
    #[serde(rename = "completed")]
    Completed,

    #[serde(rename = "queued")]
    Queued,

    #[serde(rename = "in_progress")]
    InProgress,

    #[serde(other)]
    Unknown,
}

impl fmt::Display for WorkflowRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Completed => "completed",
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Unknown => "unknown",
        };
        write!(f, "{}", status)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum WorkflowRunConclusion {
    #[serde(rename = "success")]
    Success,

    #[serde(rename = "failure")]
    Failure,

    #[serde(other)]
    Other,
}

impl fmt::Display for WorkflowRunConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let conclusion = match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Other => "other",
        };
        write!(f, "{}", conclusion)
    }
}
