//! Fixed-interval job status polling.
//!
//! A [`JobPoller`] owns at most one poll loop. [`JobPoller::start`]
//! returns a `watch` receiver that sees every state the loop publishes,
//! starting with `pending`. The loop:
//!
//! 1. waits one interval, then asks the [`JobStatusSource`] for a status;
//! 2. applies the response to the [`AnalysisJob`] (see
//!    [`AnalysisJob::apply`]);
//! 3. stops once the job is `completed` or `failed`.
//!
//! Any other status keeps the loop going with no upper bound on the
//! number of polls. A failed request is logged, recorded in
//! `last_error`, and retried on the next tick.
//!
//! Starting a new job cancels and awaits the previous loop first, so at
//! most one timer is live per poller. Once cancelled, a loop never
//! touches the published state again, even if a request was in flight.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use paperscope_core::job::AnalysisJob;

use crate::api::JobStatusSource;

/// Shortest interval a poller will use; `interval_at` cannot tick at zero.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

struct ActiveLoop {
    job_id: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct JobPoller<S: JobStatusSource> {
    source: Arc<S>,
    interval: Duration,
    active: Option<ActiveLoop>,
    live: Arc<AtomicUsize>,
}

impl<S: JobStatusSource> JobPoller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self::with_source(Arc::new(source), interval)
    }

    /// Intervals below [`MIN_INTERVAL`] are raised to it.
    pub fn with_source(source: Arc<S>, interval: Duration) -> Self {
        if interval < MIN_INTERVAL {
            warn!(interval_ms = interval.as_millis() as u64, "poll interval too short, using minimum");
        }
        Self {
            source,
            interval: interval.max(MIN_INTERVAL),
            active: None,
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Begin polling `job_id`, replacing any loop already running.
    pub async fn start(&mut self, job_id: &str) -> watch::Receiver<AnalysisJob> {
        self.stop().await;

        let (tx, rx) = watch::channel(AnalysisJob::pending(job_id));
        let token = CancellationToken::new();
        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = LoopGuard(self.live.clone());

        let handle = tokio::spawn(poll_loop(
            self.source.clone(),
            job_id.to_string(),
            self.interval,
            tx,
            token.clone(),
            guard,
        ));
        debug!(job_id, interval_ms = self.interval.as_millis() as u64, "poll loop started");

        self.active = Some(ActiveLoop {
            job_id: job_id.to_string(),
            token,
            handle,
        });
        rx
    }

    /// Cancel the current loop, if any, and wait for it to exit.
    ///
    /// Calling this with nothing running is a no-op.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            if let Err(e) = active.handle.await {
                if e.is_panic() {
                    warn!(job_id = %active.job_id, "poll loop panicked");
                }
            }
            debug!(job_id = %active.job_id, "poll loop stopped");
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The job the current loop is polling, if one was started.
    pub fn current_job(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.job_id.as_str())
    }

    /// Number of poll loops still running (0 or 1).
    pub fn active_loops(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl<S: JobStatusSource> Drop for JobPoller<S> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            active.handle.abort();
        }
    }
}

/// Decrements the live-loop count when the loop task ends, however it ends.
struct LoopGuard(Arc<AtomicUsize>);

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn poll_loop<S: JobStatusSource>(
    source: Arc<S>,
    job_id: String,
    period: Duration,
    tx: watch::Sender<AnalysisJob>,
    token: CancellationToken,
    _guard: LoopGuard,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let response = tokio::select! {
            _ = token.cancelled() => return,
            r = source.job_status(&job_id) => r,
        };
        if token.is_cancelled() {
            return;
        }

        match response {
            Ok(response) => {
                let reported = response.status.clone();
                let mut changed = false;
                let mut terminal = false;
                tx.send_modify(|job| {
                    changed = job.status != reported;
                    terminal = job.apply(response);
                });
                debug!(job_id = %job_id, status = %reported, "job status");
                if changed {
                    info!(job_id = %job_id, status = %reported, "job status changed");
                }
                if terminal {
                    let job = tx.borrow();
                    match &job.error {
                        Some(err) => warn!(job_id = %job_id, error = %err, "job failed"),
                        None => info!(job_id = %job_id, polls = job.polls, "job completed"),
                    }
                    return;
                }
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "status poll failed");
                tx.send_modify(|job| job.last_error = Some(e.to_string()));
            }
        }

        if tx.is_closed() {
            debug!(job_id = %job_id, "no receivers left, stopping poll loop");
            return;
        }
    }
}

/// Wait until the published job reaches a terminal state.
///
/// If the loop is stopped first, returns the last published state.
pub async fn wait_terminal(mut rx: watch::Receiver<AnalysisJob>) -> AnalysisJob {
    if let Ok(job) = rx.wait_for(AnalysisJob::is_terminal).await {
        return job.clone();
    }
    let job = rx.borrow().clone();
    job
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use async_trait::async_trait;
    use paperscope_core::job::{JobStatus, JobStatusResponse};
    use std::sync::Mutex;

    /// Replays scripted responses, then repeats the last one.
    struct Script {
        responses: Mutex<Vec<JobStatusResponse>>,
        calls: AtomicUsize,
    }

    impl Script {
        fn new(statuses: &[&str]) -> Self {
            let responses = statuses
                .iter()
                .rev()
                .map(|s| JobStatusResponse {
                    status: JobStatus::parse(s),
                    result: None,
                    error: None,
                })
                .collect();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobStatusSource for Script {
        async fn job_status(&self, _job_id: &str) -> Result<JobStatusResponse, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.len() > 1 {
                Ok(responses.pop().unwrap())
            } else {
                Ok(responses[0].clone())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_after_one_interval() {
        let source = Arc::new(Script::new(&["running"]));
        let mut poller = JobPoller::with_source(source.clone(), Duration::from_millis(2000));
        let rx = poller.start("j1").await;
        assert_eq!(rx.borrow().status, JobStatus::Pending);

        tokio::time::sleep(Duration::from_millis(1999)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.borrow().status, JobStatus::Running);
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_terminal() {
        let source = Arc::new(Script::new(&["pending", "running", "completed"]));
        let mut poller = JobPoller::with_source(source.clone(), Duration::from_millis(100));
        let rx = poller.start("j1").await;

        let job = wait_terminal(rx).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.polls, 3);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(poller.active_loops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let source = Arc::new(Script::new(&["running", "completed"]));
        let mut poller = JobPoller::with_source(source.clone(), Duration::ZERO);
        assert_eq!(poller.interval(), MIN_INTERVAL);

        let job = wait_terminal(poller.start("j1").await).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_start_is_noop() {
        let mut poller = JobPoller::new(Script::new(&["running"]), Duration::from_millis(100));
        poller.stop().await;
        poller.stop().await;
        assert_eq!(poller.active_loops(), 0);
        assert!(poller.current_job().is_none());
    }
}
