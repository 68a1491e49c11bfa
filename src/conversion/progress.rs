//! Simulated progress for running jobs.
//!
//! The extraction provider reports no progress of its own, so while a job is
//! processing a background ticker nudges its progress upward by a random amount
//! each interval, never past [`PROGRESS_CEILING`]. The jump to 100 is left to
//! the orchestrator once completion is confirmed.
//!
//! [`PROGRESS_CEILING`]: super::models::PROGRESS_CEILING

use super::models::TickOutcome;
use super::registry::JobRegistry;
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Upper bound of the random increment applied on each tick.
pub const MAX_TICK_INCREMENT: f64 = 5.0;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to the ticker task of one job.
///
/// Owned by whoever drives the job. Cancelling consumes the handle, and
/// dropping it without cancelling still stops the ticker.
pub struct ProgressSimulator {
    job_id: String,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProgressSimulator {
    /// Sets the job's initial progress and starts ticking every `interval`.
    pub async fn start(registry: JobRegistry, job_id: String, interval: Duration) -> Self {
        if let Err(e) = registry.mutate(&job_id, |job| job.start_progress()).await {
            warn!("Cannot start progress for job {}: {}", job_id, e);
        }

        let token = CancellationToken::new();
        let task = tokio::spawn(run_ticker(
            registry,
            job_id.clone(),
            interval,
            token.clone(),
        ));

        Self {
            job_id,
            token,
            task: Some(task),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stops the ticker and waits for its task to exit, so no tick can land
    /// after this returns.
    pub async fn cancel(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Progress ticker for job {} ended abnormally: {}", self.job_id, e);
                }
            }
        }
        debug!("Progress ticker for job {} cancelled", self.job_id);
    }
}

impl Drop for ProgressSimulator {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run_ticker(
    registry: JobRegistry,
    job_id: String,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick of an interval completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let increment = rand::rng().random_range(0.0..=MAX_TICK_INCREMENT);
                if tick(&registry, &job_id, increment).await == TickOutcome::Finished {
                    break;
                }
            }
        }
    }
}

/// Applies one tick to the job. A job that is terminal or gone reports
/// [`TickOutcome::Finished`] and is left untouched.
pub async fn tick(registry: &JobRegistry, job_id: &str, increment: f64) -> TickOutcome {
    match registry
        .mutate(job_id, |job| job.tick_progress(increment))
        .await
    {
        Ok(outcome) => {
            trace!("Progress tick for job {}: {:?}", job_id, outcome);
            outcome
        }
        Err(_) => TickOutcome::Finished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversion::models::{
        ConversionJob, JobStatus, INITIAL_PROGRESS, PROGRESS_CEILING,
    };
    use crate::extractor::Quality;

    async fn registry_with_job(id: &str) -> JobRegistry {
        let registry = JobRegistry::new();
        registry
            .create(ConversionJob::new(id, Quality::new("192")))
            .await
            .unwrap();
        registry
    }

    #[tokio::test(start_paused = true)]
    async fn starts_at_initial_progress_and_advances() {
        let registry = registry_with_job("a").await;
        let simulator =
            ProgressSimulator::start(registry.clone(), "a".to_string(), DEFAULT_TICK_INTERVAL)
                .await;
        assert_eq!(registry.get("a").await.unwrap().progress, INITIAL_PROGRESS);

        let mut last = INITIAL_PROGRESS;
        for _ in 0..60 {
            tokio::time::sleep(DEFAULT_TICK_INTERVAL).await;
            let progress = registry.get("a").await.unwrap().progress;
            assert!(progress >= last, "progress went from {} to {}", last, progress);
            assert!(progress <= PROGRESS_CEILING);
            last = progress;
        }

        simulator.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_ceiling() {
        let registry = registry_with_job("a").await;
        let simulator =
            ProgressSimulator::start(registry.clone(), "a".to_string(), DEFAULT_TICK_INTERVAL)
                .await;

        tokio::time::sleep(DEFAULT_TICK_INTERVAL * 1000).await;
        let job = registry.get("a").await.unwrap();
        assert!(job.progress <= PROGRESS_CEILING);
        assert_eq!(job.status, JobStatus::Processing);

        simulator.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_tick_mutates_after_cancel() {
        let registry = registry_with_job("a").await;
        let simulator =
            ProgressSimulator::start(registry.clone(), "a".to_string(), DEFAULT_TICK_INTERVAL)
                .await;
        tokio::time::sleep(DEFAULT_TICK_INTERVAL * 3).await;

        simulator.cancel().await;
        let frozen = registry.get("a").await.unwrap().progress;

        tokio::time::sleep(DEFAULT_TICK_INTERVAL * 30).await;
        assert_eq!(registry.get("a").await.unwrap().progress, frozen);
    }

    #[tokio::test]
    async fn ticks_after_terminal_transition_are_noops() {
        let registry = registry_with_job("a").await;
        registry.mutate("a", |j| j.start_progress()).await.unwrap();
        registry
            .mutate("a", |j| j.fail("boom"))
            .await
            .unwrap()
            .unwrap();
        let frozen = registry.get("a").await.unwrap();

        for _ in 0..20 {
            assert_eq!(
                tick(&registry, "a", MAX_TICK_INCREMENT).await,
                TickOutcome::Finished
            );
        }
        let after = registry.get("a").await.unwrap();
        assert_eq!(after.progress, frozen.progress);
        assert_eq!(after.status, JobStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_on_its_own_when_job_terminates() {
        let registry = registry_with_job("a").await;
        let simulator =
            ProgressSimulator::start(registry.clone(), "a".to_string(), DEFAULT_TICK_INTERVAL)
                .await;

        registry
            .mutate("a", |j| j.complete())
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(DEFAULT_TICK_INTERVAL * 5).await;

        assert_eq!(registry.get("a").await.unwrap().progress, 100);
        simulator.cancel().await;
    }

    #[tokio::test]
    async fn tick_on_deleted_job_finishes() {
        let registry = JobRegistry::new();
        assert_eq!(tick(&registry, "gone", 1.0).await, TickOutcome::Finished);
        assert!(registry.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_ticker() {
        let registry = registry_with_job("a").await;
        let simulator =
            ProgressSimulator::start(registry.clone(), "a".to_string(), DEFAULT_TICK_INTERVAL)
                .await;
        assert_eq!(simulator.job_id(), "a");
        drop(simulator);

        tokio::time::sleep(DEFAULT_TICK_INTERVAL * 10).await;
        assert_eq!(registry.get("a").await.unwrap().progress, INITIAL_PROGRESS);
    }
}
