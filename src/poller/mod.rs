//! Report status polling
//!
//! Drives the report lifecycle from submission to a terminal state:
//!
//! ```text
//! SUBMITTED → POLLING ─┬→ DONE       (document id returned)
//!                      ├→ CANCELLED  (PollError::Terminal)
//!                      ├→ FATAL      (PollError::Terminal)
//!                      └→ EXHAUSTED  (PollError::Timeout)
//! ```
//!
//! Decisions come from [`PollPolicy::decide`]; waiting goes through a
//! [`Sleeper`] so tests can observe delays instead of serving them.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::fetcher::{AccessToken, FetcherError, ReportsApi};
use crate::metrics::record_poll_attempt;
use crate::{ProcessingStatus, ReportDocumentId, ReportId};

pub mod policy;

pub use policy::{PollDecision, PollFailure, PollPolicy};

/// Polling errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    /// Upstream reported `CANCELLED` or `FATAL`
    #[error("report {report_id} failed with status: {status}")]
    Terminal {
        /// Report being polled
        report_id: ReportId,
        /// Status that ended polling
        status: ProcessingStatus,
    },

    /// `DONE` arrived without a document id
    #[error("report {report_id} is DONE but no document id was returned")]
    MissingDocument {
        /// Report being polled
        report_id: ReportId,
    },

    /// Attempt budget used up
    #[error("report {report_id} not ready after {attempts} attempts ({}s total)", .waited.as_secs())]
    Timeout {
        /// Report being polled
        report_id: ReportId,
        /// Queries made
        attempts: u32,
        /// Time spent waiting between queries
        waited: Duration,
    },

    /// A status query itself failed
    #[error(transparent)]
    Query(#[from] FetcherError),
}

/// Suspends the poll loop between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Polls a report until it reaches a terminal state or the budget runs out
#[derive(Clone)]
pub struct ReportPoller {
    policy: PollPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ReportPoller {
    /// Poller with the tokio sleeper
    pub fn new(policy: PollPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    /// Poller with an injected sleeper
    pub fn with_sleeper(policy: PollPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    /// Active policy
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Query status until the report is ready
    ///
    /// Never sleeps after a terminal status. A non-terminal status is
    /// followed by exactly one policy interval of waiting, including after
    /// the final attempt, so a timeout always reports `max_attempts × interval`.
    ///
    /// # Errors
    /// See [`PollError`]; a failed status query aborts polling immediately.
    pub async fn wait_for_document(
        &self,
        api: &dyn ReportsApi,
        token: &AccessToken,
        report_id: &ReportId,
    ) -> Result<ReportDocumentId, PollError> {
        let max_attempts = self.policy.max_attempts();
        let mut waited = Duration::ZERO;

        for attempt in 1..=max_attempts {
            let snapshot = api.get_report(token, report_id).await?;
            record_poll_attempt(snapshot.metric_label());

            match self.policy.decide(attempt, &snapshot) {
                PollDecision::Ready(document_id) => {
                    info!(
                        report_id = %report_id,
                        document_id = %document_id,
                        attempt,
                        "Report ready"
                    );
                    return Ok(document_id);
                }
                PollDecision::Fail(PollFailure::Terminal(status)) => {
                    warn!(report_id = %report_id, status = %status, attempt, "Report failed upstream");
                    return Err(PollError::Terminal {
                        report_id: report_id.clone(),
                        status,
                    });
                }
                PollDecision::Fail(PollFailure::MissingDocument) => {
                    warn!(report_id = %report_id, attempt, "Report DONE without document id");
                    return Err(PollError::MissingDocument {
                        report_id: report_id.clone(),
                    });
                }
                PollDecision::Wait(delay) => {
                    info!(
                        report_id = %report_id,
                        status = %snapshot.status_label(),
                        attempt,
                        "[{attempt}/{max_attempts}] Report not ready; retrying in {}s",
                        delay.as_secs()
                    );
                    self.sleeper.sleep(delay).await;
                    waited += delay;
                }
                PollDecision::Exhausted(delay) => {
                    info!(
                        report_id = %report_id,
                        status = %snapshot.status_label(),
                        attempt,
                        "[{attempt}/{max_attempts}] Report not ready; giving up after {}s",
                        delay.as_secs()
                    );
                    self.sleeper.sleep(delay).await;
                    waited += delay;
                    return Err(PollError::Timeout {
                        report_id: report_id.clone(),
                        attempts: attempt,
                        waited,
                    });
                }
            }
        }

        // Only reachable with a zero-attempt budget
        Err(PollError::Timeout {
            report_id: report_id.clone(),
            attempts: 0,
            waited,
        })
    }
}
