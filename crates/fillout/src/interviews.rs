//! `fillout complete` and `fillout replay`.

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use fillout_core::{
    DriverConfig, RespondentKeyTemplate, RunMode, RunReport, Scheduler, SchedulerConfig,
};
use fillout_logging::Logger;
use fillout_replay::ReplayScript;
use fillout_transport::{HttpTransportFactory, TransportConfig};

use crate::ui::ProgressReporter;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(50);
pub const DEFAULT_REPLAY_FILE: &str = "interview.replay";

/// Fully resolved settings of a `complete` or `replay` run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub target: usize,
    pub url: String,
    pub concurrency: usize,
    pub wait_time: Duration,
    pub stagger: Duration,
    pub max_steps: usize,
    pub respondent_key: Option<String>,
    pub request_timeout: Duration,
    pub verbose: bool,
}

/// Where answers come from, before anything is loaded
#[derive(Debug, Clone)]
pub enum AnswerSourceSetting {
    Synthesize,
    ReplayFile(PathBuf),
}

impl RunSettings {
    fn driver_config(&self) -> Result<DriverConfig> {
        let mut driver = DriverConfig::new(self.url.clone())
            .with_wait_between_posts(self.wait_time)
            .with_max_steps(self.max_steps);

        if let Some(ref template) = self.respondent_key {
            let template = RespondentKeyTemplate::parse(template)
                .context("Invalid respondent key template")?;
            driver = driver.with_respondent_key(template);
        }

        Ok(driver)
    }
}

/// Load everything that can fail before any session starts
pub fn prepare_mode(source: &AnswerSourceSetting) -> Result<RunMode> {
    match source {
        AnswerSourceSetting::Synthesize => Ok(RunMode::Complete),
        AnswerSourceSetting::ReplayFile(path) => {
            let script = ReplayScript::load(path)?;
            if script.is_empty() {
                anyhow::bail!("Replay file {} contains no answers", path.display());
            }
            Ok(RunMode::Replay(Arc::new(script)))
        }
    }
}

pub async fn run_interviews(
    settings: RunSettings,
    source: AnswerSourceSetting,
    logger: Arc<Logger>,
) -> Result<RunReport> {
    let mode = prepare_mode(&source)?;
    let driver = settings.driver_config()?;

    let config = SchedulerConfig::new(settings.target, settings.concurrency, driver, mode)
        .with_stagger(settings.stagger);
    let factory = Arc::new(HttpTransportFactory::new(
        TransportConfig::default().with_timeout(settings.request_timeout),
    ));
    let mut scheduler = Scheduler::new(config, factory, logger);

    // Handle Ctrl+C gracefully, a second one quits right away
    let interrupt_handle = scheduler.interrupt_handle();
    ctrlc::set_handler(move || {
        if interrupt_handle.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nInterrupted. Finishing interviews in progress, press Ctrl+C again to quit...");
    })
    .context("Failed to set Ctrl+C handler")?;

    let reporter = scheduler
        .take_failures()
        .map(|failures| ProgressReporter::new(scheduler.progress(), failures, settings.verbose))
        .map(|reporter| tokio::spawn(reporter.run()));

    let report = scheduler
        .run()
        .await
        .context("Failed to create HTTP client")?;

    if let Some(reporter) = reporter {
        let _ = reporter.await;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings() -> RunSettings {
        RunSettings {
            target: 2,
            url: "https://host/Interviews/abc".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            wait_time: Duration::ZERO,
            stagger: DEFAULT_STAGGER,
            max_steps: 500,
            respondent_key: None,
            request_timeout: Duration::from_secs(30),
            verbose: false,
        }
    }

    #[test]
    fn test_driver_config_with_template() {
        let mut settings = settings();
        settings.respondent_key = Some("r%02d".to_string());

        let driver = settings.driver_config().unwrap();
        assert_eq!(driver.start_url(1), "https://host/Interviews/abc/r01");
    }

    #[test]
    fn test_bad_template_is_a_config_error() {
        let mut settings = settings();
        settings.respondent_key = Some("respondent".to_string());

        let error = settings.driver_config().unwrap_err();
        assert!(format!("{:#}", error).contains("Invalid respondent key template"));
    }

    #[test]
    fn test_missing_replay_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let source = AnswerSourceSetting::ReplayFile(dir.path().join("missing.replay"));
        assert!(prepare_mode(&source).is_err());
    }

    #[test]
    fn test_empty_replay_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.replay");
        std::fs::write(&path, "\n---\n").unwrap();

        let error = prepare_mode(&AnswerSourceSetting::ReplayFile(path)).unwrap_err();
        assert!(error.to_string().contains("contains no answers"));
    }

    #[test]
    fn test_replay_file_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ok.replay");
        std::fs::write(&path, "button-next=Next\n---\n").unwrap();

        let mode = prepare_mode(&AnswerSourceSetting::ReplayFile(path)).unwrap();
        assert_eq!(mode.name(), "replay");
    }
}
