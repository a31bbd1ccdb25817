use crate::github::{WorkflowRun, REPOSITORY_DISPATCH_EVENT};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;
use std::time::Duration;

/// The fixed time range a freshly dispatched run must have been created in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunQueryWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl RunQueryWindow {
    /// Builds a window spanning `span` after `start`. A zero span is widened to one second
    /// so that `end > start` always holds.
    pub fn starting_at(start: DateTime<Utc>, span: Duration) -> Self {
        let span = ChronoDuration::from_std(span)
            .unwrap_or_else(|_| ChronoDuration::weeks(52))
            .max(ChronoDuration::seconds(1));
        let end = start.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { start, end }
    }

    pub fn starting_now(span: Duration) -> Self {
        Self::starting_at(Utc::now(), span)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Both ends are exclusive.
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        self.start < *timestamp && *timestamp < self.end
    }
}

impl fmt::Display for RunQueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Decides which listed runs belong to the dispatch being tracked.
#[derive(Debug, Clone)]
pub struct RunFilter {
    workflow_name: String,
    window: RunQueryWindow,
    require_dispatch_event: bool,
}

impl RunFilter {
    pub fn new<S: Into<String>>(workflow_name: S, window: RunQueryWindow) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            window,
            require_dispatch_event: false,
        }
    }

    pub fn require_dispatch_event(mut self, required: bool) -> Self {
        self.require_dispatch_event = required;
        self
    }

    pub fn matches(&self, run: &WorkflowRun) -> bool {
        let dispatched = run.event.as_deref() == Some(REPOSITORY_DISPATCH_EVENT);
        if self.require_dispatch_event && !dispatched {
            return false;
        }
        self.window.contains(&run.created_at)
            && run.display_title.as_deref() == Some(self.workflow_name.as_str())
    }

    /// Returns matching runs, most recently created first. Runs created at the same
    /// instant keep the order they were listed in.
    pub fn select<'a>(&self, runs: &'a [WorkflowRun]) -> Vec<&'a WorkflowRun> {
        let mut matching: Vec<_> = runs.iter().filter(|run| self.matches(run)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }
}
