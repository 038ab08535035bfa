use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use fillout_logging::{LogEvent, Logger};
use fillout_replay::ReplayScript;
use fillout_transport::{TransportError, TransportFactory};

use crate::outcome::{InterviewOutcome, RunReport};
use crate::{
    AnswerSource, DriverConfig, ReplayCursor, SessionDriver, SessionError, SynthesizedAnswers,
};

/// How often the in-flight count is recomputed
const ACTIVE_REFRESH: Duration = Duration::from_millis(500);

/// Where sessions get their answers
#[derive(Debug, Clone)]
pub enum RunMode {
    /// Random answers for every page
    Complete,
    /// Answers from a recorded script, each session with its own cursor
    Replay(Arc<ReplayScript>),
}

impl RunMode {
    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Complete => "complete",
            RunMode::Replay(_) => "replay",
        }
    }

    fn answer_source(&self) -> Box<dyn AnswerSource> {
        match self {
            RunMode::Complete => Box::new(SynthesizedAnswers),
            RunMode::Replay(script) => Box::new(ReplayCursor::new(script.clone())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub target: usize,
    pub max_concurrency: usize,
    /// Delay between worker starts
    pub stagger: Duration,
    pub driver: DriverConfig,
    pub mode: RunMode,
}

impl SchedulerConfig {
    pub fn new(target: usize, max_concurrency: usize, driver: DriverConfig, mode: RunMode) -> Self {
        Self {
            target,
            max_concurrency,
            stagger: Duration::ZERO,
            driver,
            mode,
        }
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Target of at least one, concurrency within `[1, target]`
    fn clamped(mut self) -> Self {
        self.target = self.target.max(1);
        self.max_concurrency = self.max_concurrency.clamp(1, self.target);
        self
    }
}

/// Counters of a running scheduler. Only the aggregator writes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub target: usize,
    /// Sessions that finished, successfully or not
    pub completed: usize,
    pub errored: usize,
    /// Sessions in flight, for display only
    pub active: usize,
}

impl ProgressState {
    pub fn fraction(&self) -> f64 {
        if self.target == 0 {
            return 0.0;
        }
        self.completed as f64 / self.target as f64
    }
}

/// A failed session, queued for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub session: usize,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionJob {
    /// Zero-based session index, also used for the respondent key
    pub index: usize,
}

/// Jobs waiting for a worker, loaded in full before any worker starts
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<SessionJob>>,
}

impl JobQueue {
    pub fn preloaded(target: usize) -> Self {
        Self {
            jobs: Mutex::new((0..target).map(|index| SessionJob { index }).collect()),
        }
    }

    pub fn pop(&self) -> Option<SessionJob> {
        self.jobs.lock().ok()?.pop_front()
    }

    pub fn remaining(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }
}

/// Runs `target` sessions on at most `max_concurrency` workers
pub struct Scheduler {
    config: Arc<SchedulerConfig>,
    factory: Arc<dyn TransportFactory>,
    logger: Arc<Logger>,
    interrupted: Arc<AtomicBool>,
    progress_tx: watch::Sender<ProgressState>,
    failures_tx: mpsc::UnboundedSender<SessionFailure>,
    failures_rx: Option<mpsc::UnboundedReceiver<SessionFailure>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        factory: Arc<dyn TransportFactory>,
        logger: Arc<Logger>,
    ) -> Self {
        let config = config.clamped();
        let (progress_tx, _) = watch::channel(ProgressState {
            target: config.target,
            ..Default::default()
        });
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();

        Self {
            config: Arc::new(config),
            factory,
            logger,
            interrupted: Arc::new(AtomicBool::new(false)),
            progress_tx,
            failures_tx,
            failures_rx: Some(failures_rx),
        }
    }

    /// Get a handle to signal interruption
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupted.clone()
    }

    /// Subscribe to progress updates
    pub fn progress(&self) -> watch::Receiver<ProgressState> {
        self.progress_tx.subscribe()
    }

    /// Take the queue of failed sessions. Only the first call gets it.
    pub fn take_failures(&mut self) -> Option<mpsc::UnboundedReceiver<SessionFailure>> {
        self.failures_rx.take()
    }

    /// Run every session and return the totals.
    ///
    /// Every session gets a transport of its own, so no cookie outlives the
    /// session that received it. Fails before any session starts when a
    /// transport cannot be built.
    pub async fn run(self) -> Result<RunReport, TransportError> {
        let started = Instant::now();
        let config = &self.config;

        // Bad client settings fail the run here rather than every session
        self.factory.create()?;

        self.logger.log(&LogEvent::RunStarted {
            mode: config.mode.name().to_string(),
            target: config.target,
            max_concurrency: config.max_concurrency,
            wait_between_posts_secs: config.driver.wait_between_posts.as_secs_f64(),
        });

        let queue = Arc::new(JobQueue::preloaded(config.target));
        let (results_tx, mut results_rx) = mpsc::channel(config.target);

        for worker in 0..config.max_concurrency {
            tokio::spawn(run_worker(
                worker,
                self.factory.clone(),
                queue.clone(),
                self.config.clone(),
                self.logger.clone(),
                self.interrupted.clone(),
                results_tx.clone(),
            ));
        }
        // Workers hold the only senders now, so the channel closes when the last one exits
        drop(results_tx);

        let mut progress = ProgressState {
            target: config.target,
            ..Default::default()
        };
        let mut refresh = tokio::time::interval(ACTIVE_REFRESH);

        loop {
            tokio::select! {
                received = results_rx.recv() => {
                    let Some(outcome) = received else { break };
                    self.record(&mut progress, outcome);
                }
                _ = refresh.tick() => {}
            }

            progress.active = config
                .target
                .saturating_sub(queue.remaining())
                .saturating_sub(progress.completed);
            self.progress_tx.send_replace(progress);
        }

        progress.active = 0;
        self.progress_tx.send_replace(progress);

        let report = RunReport {
            target: config.target,
            completed: progress.completed,
            errored: progress.errored,
            interrupted: self.interrupted.load(Ordering::SeqCst),
            duration_secs: started.elapsed().as_secs_f64(),
        };

        info!(
            completed = report.completed,
            errored = report.errored,
            interrupted = report.interrupted,
            "Run finished"
        );
        self.logger.log(&LogEvent::RunFinished {
            target: report.target,
            completed: report.completed,
            errored: report.errored,
            interrupted: report.interrupted,
            duration_secs: report.duration_secs,
        });

        Ok(report)
    }

    fn record(&self, progress: &mut ProgressState, outcome: InterviewOutcome) {
        match outcome {
            InterviewOutcome::Completed { .. } => progress.completed += 1,
            InterviewOutcome::Failed { session, error, .. } => {
                progress.completed += 1;
                progress.errored += 1;
                // Nobody may be listening
                let _ = self.failures_tx.send(SessionFailure { session, error });
            }
            InterviewOutcome::Interrupted { session, .. } => {
                debug!(session, "Session stopped by interrupt, not counted");
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    factory: Arc<dyn TransportFactory>,
    queue: Arc<JobQueue>,
    config: Arc<SchedulerConfig>,
    logger: Arc<Logger>,
    interrupted: Arc<AtomicBool>,
    results: mpsc::Sender<InterviewOutcome>,
) {
    if worker > 0 && !config.stagger.is_zero() {
        tokio::time::sleep(config.stagger * worker as u32).await;
    }

    logger.log(&LogEvent::WorkerStarted { worker });

    while !interrupted.load(Ordering::SeqCst) {
        let Some(job) = queue.pop() else { break };

        let outcome = match factory.create() {
            Ok(transport) => {
                let driver = SessionDriver::new(
                    transport.as_ref(),
                    &config.driver,
                    logger.clone(),
                    interrupted.clone(),
                );
                let mut source = config.mode.answer_source();
                driver.run(job.index, source.as_mut()).await
            }
            Err(e) => {
                let error = SessionError::from(e).to_string();
                logger.log(&LogEvent::SessionFailed {
                    session: job.index,
                    error: error.clone(),
                });
                InterviewOutcome::failed(job.index, 0, error, Duration::ZERO)
            }
        };

        if results.send(outcome).await.is_err() {
            warn!(worker, "Result channel closed, stopping worker");
            break;
        }
    }

    logger.log(&LogEvent::WorkerFinished { worker });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_clamping() {
        let driver = DriverConfig::new("http://localhost/");

        let config = SchedulerConfig::new(0, 0, driver.clone(), RunMode::Complete).clamped();
        assert_eq!((config.target, config.max_concurrency), (1, 1));

        let config = SchedulerConfig::new(3, 10, driver, RunMode::Complete).clamped();
        assert_eq!((config.target, config.max_concurrency), (3, 3));
    }

    #[test]
    fn test_job_queue_is_preloaded_in_order() {
        let queue = JobQueue::preloaded(3);
        assert_eq!(queue.remaining(), 3);
        assert_eq!(queue.pop(), Some(SessionJob { index: 0 }));
        assert_eq!(queue.pop(), Some(SessionJob { index: 1 }));
        assert_eq!(queue.pop(), Some(SessionJob { index: 2 }));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_progress_fraction() {
        let progress = ProgressState {
            target: 4,
            completed: 1,
            errored: 0,
            active: 2,
        };
        assert_eq!(progress.fraction(), 0.25);
    }
}
