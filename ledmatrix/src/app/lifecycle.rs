use std::future::Future;
use std::time::Duration;

use log::{debug, trace};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::cancel::{CancelScope, CancelToken};
use crate::core::config::DEFAULT_BACKGROUND_GRACE;
use crate::core::error::{AppError, MatrixError};
use crate::core::logging::report_failure;
use crate::core::util::panic_message;

/// Outcome of [`AppLifecycle::shutdown`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ShutdownReport {
    pub finished: usize,
    pub failed: usize,
    pub abandoned: usize,
}

/// Supervises the background jobs of one app instance.
///
/// Every job receives a token from the instance's own cancellation scope.
/// [`shutdown`](Self::shutdown) cancels the scope and then waits up to the
/// grace period for each outstanding job. Jobs that outlive the grace period
/// are abandoned, not aborted; anything they fail with later is routed
/// through [`report_failure`] and goes nowhere else.
#[derive(Debug)]
pub struct AppLifecycle {
    owner: String,
    scope: CancelScope,
    jobs: Mutex<Vec<JoinHandle<()>>>,
    grace: Duration,
}

impl AppLifecycle {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            scope: CancelScope::new(),
            jobs: Mutex::new(Vec::new()),
            grace: DEFAULT_BACKGROUND_GRACE,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn token(&self) -> CancelToken {
        self.scope.token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.scope.is_cancelled()
    }

    /// Jobs spawned and not yet drained by a shutdown.
    pub fn outstanding(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Spawns `job` on the current tokio runtime and returns immediately.
    /// The job is responsible for watching its token and exiting promptly.
    pub fn run_in_background<F, Fut>(&self, job: F)
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            report_failure(&MatrixError::BackgroundJob {
                id: self.owner.clone(),
                source: AppError::msg("no async runtime to spawn job on"),
            });
            return;
        };

        let owner = self.owner.clone();
        let work = job(self.token());

        let task = handle.spawn(async move {
            if let Err(source) = work.await {
                report_failure(&MatrixError::BackgroundJob {
                    id: owner,
                    source,
                });
            }
        });

        let mut jobs = self.jobs.lock();
        jobs.retain(|job| !job.is_finished());
        jobs.push(task);
        trace!(
            "[{}] background job spawned ({} running)",
            self.owner,
            jobs.len()
        );
    }

    pub async fn shutdown(&self) -> ShutdownReport {
        self.scope.cancel();

        let jobs = std::mem::take(&mut *self.jobs.lock());
        let mut report = ShutdownReport::default();

        for mut job in jobs {
            match tokio::time::timeout(self.grace, &mut job).await {
                Ok(Ok(())) => report.finished += 1,
                Ok(Err(err)) => {
                    report.failed += 1;
                    report_join_error(&self.owner, err);
                }
                Err(_) => {
                    report.abandoned += 1;
                    let owner = self.owner.clone();
                    tokio::spawn(async move {
                        if let Err(err) = job.await {
                            report_join_error(&owner, err);
                        }
                    });
                }
            }
        }

        debug!(
            "[{}] lifecycle shut down: {} finished, {} failed, {} abandoned",
            self.owner, report.finished, report.failed, report.abandoned
        );

        report
    }
}

fn report_join_error(owner: &str, err: tokio::task::JoinError) {
    let source = if err.is_panic() {
        AppError::Panicked(panic_message(err.into_panic().as_ref()))
    } else {
        AppError::msg("background job was cancelled by the runtime")
    };

    report_failure(&MatrixError::BackgroundJob {
        id: owner.to_string(),
        source,
    });
}
