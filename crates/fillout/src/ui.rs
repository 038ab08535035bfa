//! Terminal progress display for `complete` and `replay` runs.

use std::io::{self, Write};
use std::time::Duration;

use colored::Colorize;
use crossterm::{
    cursor::MoveUp,
    queue,
    terminal::{self, Clear, ClearType},
};
use tokio::sync::{mpsc, watch};

use fillout_core::{ProgressState, RunReport, SessionFailure};

const SPINNER: [char; 4] = ['/', '-', '\\', '|'];
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);
const VERBOSE_INTERVAL: Duration = Duration::from_secs(4);
const FALLBACK_WIDTH: usize = 80;

/// Redraws the progress block until the scheduler finishes
pub struct ProgressReporter {
    progress: watch::Receiver<ProgressState>,
    failures: mpsc::UnboundedReceiver<SessionFailure>,
    verbose: bool,
    frame: usize,
    lines_drawn: u16,
}

impl ProgressReporter {
    pub fn new(
        progress: watch::Receiver<ProgressState>,
        failures: mpsc::UnboundedReceiver<SessionFailure>,
        verbose: bool,
    ) -> Self {
        Self {
            progress,
            failures,
            verbose,
            frame: 0,
            lines_drawn: 0,
        }
    }

    /// Run until the progress sender is dropped, then clear the block
    pub async fn run(mut self) {
        let interval = if self.verbose {
            VERBOSE_INTERVAL
        } else {
            REDRAW_INTERVAL
        };

        loop {
            self.print_failures();
            self.draw();

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = closed(&mut self.progress) => break,
            }
        }

        self.print_failures();
        self.clear();
    }

    fn print_failures(&mut self) {
        let mut stderr = io::stderr();
        while let Ok(failure) = self.failures.try_recv() {
            if self.verbose {
                // The logger already printed it
                continue;
            }
            let _ = queue!(stderr, Clear(ClearType::CurrentLine));
            let _ = writeln!(
                stderr,
                "{} #{}: {}",
                "ERROR".bright_red().bold(),
                failure.session,
                failure.error
            );
            let _ = queue!(stderr, Clear(ClearType::FromCursorDown));
        }
        let _ = stderr.flush();
    }

    fn draw(&mut self) {
        let state = *self.progress.borrow();
        let mut stderr = io::stderr();

        if self.verbose {
            let _ = writeln!(stderr, "{}", status_summary(&state, true));
            return;
        }

        let status = format!(
            "[{}] {} of {} interviews ({}%)",
            SPINNER[self.frame],
            state.completed,
            state.target,
            percent(&state)
        );
        let width = terminal_width().saturating_sub(status.chars().count() + 1);
        let lines = [
            format!("{} {}", status, progress_bar(state.fraction(), width)),
            String::new(),
            status_summary(&state, false),
        ];

        for line in &lines {
            let _ = queue!(stderr, Clear(ClearType::CurrentLine));
            let _ = writeln!(stderr, "{}", line);
        }
        self.lines_drawn = lines.iter().map(|line| line.lines().count().max(1) as u16).sum();
        let _ = queue!(stderr, MoveUp(self.lines_drawn));
        let _ = stderr.flush();

        self.frame = (self.frame + 1) % SPINNER.len();
    }

    fn clear(&mut self) {
        if self.verbose || self.lines_drawn == 0 {
            return;
        }
        let mut stderr = io::stderr();
        let _ = queue!(stderr, Clear(ClearType::FromCursorDown));
        let _ = stderr.flush();
        self.lines_drawn = 0;
    }
}

/// Resolves once the sender side of `progress` is gone
async fn closed(progress: &mut watch::Receiver<ProgressState>) {
    while progress.changed().await.is_ok() {}
}

fn terminal_width() -> usize {
    terminal::size()
        .map(|(columns, _)| columns as usize)
        .unwrap_or(FALLBACK_WIDTH)
}

fn percent(state: &ProgressState) -> usize {
    if state.target == 0 {
        return 0;
    }
    state.completed * 100 / state.target
}

/// Bar of `size` cells, rounding the done part up
pub fn progress_bar(fraction: f64, size: usize) -> String {
    let done = ((fraction.clamp(0.0, 1.0) * size as f64).ceil() as usize).min(size);
    format!("{}{}", "▓".repeat(done), "░".repeat(size - done))
}

fn status_summary(state: &ProgressState, single_line: bool) -> String {
    let successful = state.completed.saturating_sub(state.errored);
    if single_line {
        format!(
            "Successful: {:4}, Error: {:4}, Active: {:4}",
            successful, state.errored, state.active
        )
    } else {
        format!(
            "Successful : {:4}\nError      : {:4}",
            successful, state.errored
        )
    }
}

/// Final block printed after the run
pub fn print_final_summary(report: &RunReport) {
    let reason = if report.interrupted {
        "Interrupted.".bright_yellow().to_string()
    } else if report.errored > 0 {
        "Done with errors.".bright_red().to_string()
    } else {
        "Done.".bright_green().to_string()
    };

    eprintln!("Successful : {:4}", report.successful());
    eprintln!("Error      : {:4}", report.errored);
    eprintln!();
    eprintln!(
        "{} Completed {} of {} interviews in {:.1}s.",
        reason, report.completed, report.target, report.duration_secs
    );
}
