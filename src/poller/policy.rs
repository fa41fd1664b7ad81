//! Poll decision logic
//!
//! [`PollPolicy::decide`] is a pure function of the attempt number and the
//! latest status snapshot. It never sleeps and never performs I/O, so every
//! branch of the state machine can be tested without time passing.

use std::time::Duration;

use crate::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL_SECS};
use crate::{ProcessingStatus, ReportDocumentId, ReportStatusSnapshot};

/// Fixed polling budget: at most `max_attempts` queries, `interval` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    max_attempts: u32,
    interval: Duration,
}

/// What to do after observing a status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// Report finished with a document
    Ready(ReportDocumentId),
    /// Still in flight; query again after the delay
    Wait(Duration),
    /// Still in flight on the last allowed attempt; wait out the delay,
    /// then give up
    Exhausted(Duration),
    /// Stop polling
    Fail(PollFailure),
}

/// Terminal failures the policy can reach
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollFailure {
    /// Upstream reported `CANCELLED` or `FATAL`
    Terminal(ProcessingStatus),
    /// `DONE` without a document id
    MissingDocument,
}

impl PollPolicy {
    /// Create a policy
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Maximum number of status queries
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay between queries
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Total time spent waiting when the budget runs out
    pub fn total_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    /// Decide the next step after attempt `attempt` (1-based) saw `snapshot`.
    ///
    /// Only `DONE`, `CANCELLED` and `FATAL` are terminal; every other status,
    /// including unrecognized or missing ones, means wait. A wait on attempt
    /// `max_attempts` or later becomes [`PollDecision::Exhausted`].
    pub fn decide(&self, attempt: u32, snapshot: &ReportStatusSnapshot) -> PollDecision {
        match &snapshot.processing_status {
            Some(ProcessingStatus::Done) => match snapshot
                .report_document_id
                .as_deref()
                .filter(|id| !id.is_empty())
            {
                Some(id) => PollDecision::Ready(ReportDocumentId::new(id)),
                None => PollDecision::Fail(PollFailure::MissingDocument),
            },
            Some(status) if status.is_terminal() => {
                PollDecision::Fail(PollFailure::Terminal(status.clone()))
            }
            _ if attempt >= self.max_attempts => PollDecision::Exhausted(self.interval),
            _ => PollDecision::Wait(self.interval),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        )
    }
}
