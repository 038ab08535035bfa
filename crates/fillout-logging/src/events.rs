use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Structured log events for a fillout run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted {
        mode: String,
        target: usize,
        max_concurrency: usize,
        wait_between_posts_secs: f64,
    },
    WorkerStarted {
        worker: usize,
    },
    WorkerFinished {
        worker: usize,
    },
    SessionStarted {
        session: usize,
        url: String,
    },
    PageClassified {
        session: usize,
        step: usize,
        question_type: String,
        url: String,
    },
    AnswerSubmitted {
        session: usize,
        step: usize,
        fields: Vec<String>,
    },
    /// A replay script holding several interviews started the next one
    ReplayRestarted {
        session: usize,
        step: usize,
    },
    SessionCompleted {
        session: usize,
        submissions: usize,
        duration_secs: f64,
    },
    SessionFailed {
        session: usize,
        error: String,
    },
    ProxyListening {
        url: String,
    },
    ProxyRequest {
        method: String,
        path: String,
        remote_url: String,
    },
    StepRecorded {
        step: usize,
        fields: Vec<String>,
    },
    InterviewRecorded {
        completed: usize,
        target: usize,
    },
    RecordingFinished {
        interviews: usize,
        steps: usize,
        path: PathBuf,
    },
    RunFinished {
        target: usize,
        completed: usize,
        errored: usize,
        interrupted: bool,
        duration_secs: f64,
    },
}

impl LogEvent {
    /// Add a timestamp to serialize with the event
    fn with_timestamp(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "timestamp".to_string(),
                serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }
        value
    }

    /// Events describing single steps, only shown in verbose mode
    fn is_detail(&self) -> bool {
        matches!(
            self,
            LogEvent::WorkerStarted { .. }
                | LogEvent::WorkerFinished { .. }
                | LogEvent::SessionStarted { .. }
                | LogEvent::PageClassified { .. }
                | LogEvent::AnswerSubmitted { .. }
                | LogEvent::ReplayRestarted { .. }
                | LogEvent::SessionCompleted { .. }
                | LogEvent::SessionFailed { .. }
                | LogEvent::ProxyRequest { .. }
                | LogEvent::StepRecorded { .. }
        )
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors
    #[default]
    Pretty,
    /// JSON lines format for machine consumption
    Json,
    /// Compact single-line format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// Logger for fillout events - handles both console output and file logging
pub struct Logger {
    format: LogFormat,
    verbose: bool,
    file_writer: Option<Mutex<File>>,
}

impl Logger {
    pub fn new(format: LogFormat) -> Self {
        Self {
            format,
            verbose: false,
            file_writer: None,
        }
    }

    /// Create a logger with file output in addition to console
    pub fn with_file(format: LogFormat, log_path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            format,
            verbose: false,
            file_writer: Some(Mutex::new(file)),
        })
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn log(&self, event: &LogEvent) {
        // The file always gets every event, as JSON
        if let Some(ref writer) = self.file_writer {
            if let Ok(mut file) = writer.lock() {
                // One write per line keeps lines whole when several writers append
                let line = format!("{}\n", event.with_timestamp());
                let _ = file.write_all(line.as_bytes());
            }
        }

        if event.is_detail() && !self.verbose {
            return;
        }

        match self.format {
            LogFormat::Json => self.log_json(event),
            LogFormat::Pretty => self.log_pretty(event),
            LogFormat::Compact => self.log_compact(event),
        }
    }

    fn log_json(&self, event: &LogEvent) {
        let _ = writeln!(std::io::stderr(), "{}", event.with_timestamp());
    }

    fn log_pretty(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        match event {
            LogEvent::RunStarted {
                mode,
                target,
                max_concurrency,
                wait_between_posts_secs,
            } => {
                let verb = if mode == "replay" { "replay" } else { "complete" };
                let plural = if *target == 1 { "" } else { "s" };
                let _ = writeln!(stderr);
                if *target > 1 {
                    let _ = writeln!(
                        stderr,
                        "Will {} {} interview{}, at most {} concurrently.",
                        verb,
                        target.to_string().bold(),
                        plural,
                        max_concurrency.to_string().bold()
                    );
                } else {
                    let _ = writeln!(
                        stderr,
                        "Will {} {} interview{}.",
                        verb,
                        target.to_string().bold(),
                        plural
                    );
                }
                if *wait_between_posts_secs > 0.0 {
                    let _ = writeln!(
                        stderr,
                        "Waiting {:.1}s between questions.",
                        wait_between_posts_secs
                    );
                }
                let _ = writeln!(stderr);
            }
            LogEvent::WorkerStarted { worker } => {
                let _ = writeln!(stderr, "{} Starting worker {}", "[thread]".dimmed(), worker);
            }
            LogEvent::WorkerFinished { worker } => {
                let _ = writeln!(stderr, "{} Worker {} finished", "[thread]".dimmed(), worker);
            }
            LogEvent::SessionStarted { session, url } => {
                let _ = writeln!(
                    stderr,
                    "{} #{} {}",
                    "[get]".bright_blue(),
                    session,
                    url.dimmed()
                );
            }
            LogEvent::PageClassified {
                session,
                step,
                question_type,
                ..
            } => {
                let _ = writeln!(
                    stderr,
                    "{} #{} step {}: {}",
                    "[page]".bright_cyan(),
                    session,
                    step + 1,
                    question_type.bold()
                );
            }
            LogEvent::AnswerSubmitted {
                session,
                step,
                fields,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} #{} step {}: {}",
                    "[post]".bright_magenta(),
                    session,
                    step + 1,
                    fields.join(", ").dimmed()
                );
            }
            LogEvent::ReplayRestarted { session, step } => {
                let _ = writeln!(
                    stderr,
                    "{} #{} Starting new interview at step {}, because replay file is longer.",
                    "[replay]".bright_yellow(),
                    session,
                    step + 1
                );
            }
            LogEvent::SessionCompleted {
                session,
                submissions,
                duration_secs,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} #{} completed after {} answers ({:.1}s)",
                    "✓".bright_green(),
                    session,
                    submissions,
                    duration_secs
                );
            }
            LogEvent::SessionFailed { session, error } => {
                let _ = writeln!(
                    stderr,
                    "{} #{}: {}",
                    "ERROR".bright_red().bold(),
                    session,
                    error.bright_red()
                );
            }
            LogEvent::ProxyListening { url } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "  {} {}",
                    "->".bright_green(),
                    format!("Serving on {}", url).bold()
                );
                let _ = writeln!(stderr, "  {} Press {} to stop", "->".dimmed(), "Ctrl+C".bold());
                let _ = writeln!(stderr);
            }
            LogEvent::ProxyRequest {
                method,
                path,
                remote_url,
            } => {
                let _ = writeln!(
                    stderr,
                    "{} {} {} -> {}",
                    "[proxy]".bright_blue(),
                    method,
                    path,
                    remote_url.dimmed()
                );
            }
            LogEvent::StepRecorded { step, fields } => {
                let _ = writeln!(
                    stderr,
                    "{} step {}: {}",
                    "[recording]".bright_magenta(),
                    step,
                    fields.join(", ").dimmed()
                );
            }
            LogEvent::InterviewRecorded { completed, target } => {
                let _ = writeln!(
                    stderr,
                    "{} Recorded interview {} of {}",
                    "✓".bright_green(),
                    completed,
                    target
                );
            }
            LogEvent::RecordingFinished {
                interviews,
                steps,
                path,
            } => {
                let _ = writeln!(stderr);
                let _ = writeln!(
                    stderr,
                    "Completed {} interview{} ({} answers). Recording written to \"{}\".",
                    interviews,
                    if *interviews == 1 { "" } else { "s" },
                    steps,
                    path.display()
                );
            }
            LogEvent::RunFinished { .. } => {
                // The final summary is printed by the binary
            }
        }
    }

    fn log_compact(&self, event: &LogEvent) {
        let mut stderr = std::io::stderr();
        let timestamp = chrono::Utc::now().format("%H:%M:%S");
        let msg = match event {
            LogEvent::RunStarted {
                mode,
                target,
                max_concurrency,
                ..
            } => format!(
                "[{}] run:start {} n={} c={}",
                timestamp, mode, target, max_concurrency
            ),
            LogEvent::WorkerStarted { worker } => format!("[{}] worker:start:{}", timestamp, worker),
            LogEvent::WorkerFinished { worker } => format!("[{}] worker:done:{}", timestamp, worker),
            LogEvent::SessionStarted { session, .. } => {
                format!("[{}] session:start:{}", timestamp, session)
            }
            LogEvent::PageClassified {
                session,
                step,
                question_type,
                ..
            } => format!(
                "[{}] page:{}:{} {}",
                timestamp,
                session,
                step + 1,
                question_type
            ),
            LogEvent::AnswerSubmitted {
                session,
                step,
                fields,
            } => format!(
                "[{}] post:{}:{} {}f",
                timestamp,
                session,
                step + 1,
                fields.len()
            ),
            LogEvent::ReplayRestarted { session, step } => {
                format!("[{}] replay:restart:{}:{}", timestamp, session, step + 1)
            }
            LogEvent::SessionCompleted {
                session,
                submissions,
                duration_secs,
            } => format!(
                "[{}] session:done:{} {} {:.1}s",
                timestamp, session, submissions, duration_secs
            ),
            LogEvent::SessionFailed { session, error } => {
                format!("[{}] error:{}:{}", timestamp, session, error)
            }
            LogEvent::ProxyListening { url } => format!("[{}] proxy:listen {}", timestamp, url),
            LogEvent::ProxyRequest {
                method, remote_url, ..
            } => format!("[{}] proxy:{} {}", timestamp, method, remote_url),
            LogEvent::StepRecorded { step, fields } => {
                format!("[{}] record:step:{} {}f", timestamp, step, fields.len())
            }
            LogEvent::InterviewRecorded { completed, target } => {
                format!("[{}] record:interview {}/{}", timestamp, completed, target)
            }
            LogEvent::RecordingFinished {
                interviews, path, ..
            } => format!(
                "[{}] record:done:{} {}",
                timestamp,
                interviews,
                path.display()
            ),
            LogEvent::RunFinished {
                target,
                completed,
                errored,
                duration_secs,
                ..
            } => format!(
                "[{}] run:done {}/{} errors={} {:.1}s",
                timestamp, completed, target, errored, duration_secs
            ),
        };
        let _ = writeln!(stderr, "{}", msg);
    }
}
