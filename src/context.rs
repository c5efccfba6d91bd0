//! Per-run state shared by the pipeline stages
//!
//! A fresh `RunContext` is created for every run. Counters and the error
//! report sit behind mutexes so concurrent fetch and ATS workers update them
//! one at a time; presentation layers read snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Representative messages kept per error kind
const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub documents_discovered: usize,
    pub documents_fetched: usize,
    pub fetch_failures: usize,
    pub sections_seen: usize,
    pub records_parsed: usize,
    pub records_fallback: usize,
    pub parse_failures: usize,
    pub companies_searched: usize,
    pub ats_queries: usize,
    pub ats_failures: usize,
    pub postings_seen: usize,
    pub postings_included: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
            RunStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    ExtractionParse,
    AtsQuery,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorTally {
    pub count: usize,
    pub samples: Vec<String>,
}

/// Recoverable failures of one run: counts plus a few example messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub by_kind: BTreeMap<ErrorKind, ErrorTally>,
}

impl ErrorReport {
    pub fn record(&mut self, kind: ErrorKind, message: impl Into<String>) {
        let tally = self.by_kind.entry(kind).or_default();
        tally.count += 1;
        if tally.samples.len() < MAX_SAMPLES {
            tally.samples.push(message.into());
        }
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.by_kind.get(&kind).map(|t| t.count).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.by_kind.values().map(|t| t.count).sum()
    }
}

pub struct RunContext {
    counters: Mutex<RunCounters>,
    errors: Mutex<ErrorReport>,
    status: Mutex<RunStatus>,
    cancel: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(RunCounters::default()),
            errors: Mutex::new(ErrorReport::default()),
            status: Mutex::new(RunStatus::Pending),
            cancel: CancellationToken::new(),
        }
    }

    /// Apply an update to the counters under the lock.
    pub fn update(&self, f: impl FnOnce(&mut RunCounters)) {
        let mut counters = lock(&self.counters);
        f(&mut *counters);
    }

    pub fn snapshot(&self) -> RunCounters {
        lock(&self.counters).clone()
    }

    pub fn record_error(&self, kind: ErrorKind, message: impl Into<String>) {
        lock(&self.errors).record(kind, message);
    }

    pub fn error_report(&self) -> ErrorReport {
        lock(&self.errors).clone()
    }

    pub fn set_status(&self, status: RunStatus) {
        *lock(&self.status) = status;
    }

    pub fn status(&self) -> RunStatus {
        *lock(&self.status)
    }

    /// Stop scheduling new work and abandon in-flight fetches and queries.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
