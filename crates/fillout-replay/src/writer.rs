use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use fillout_questions::AnswerForm;

use crate::ReplayScript;

/// Appends recorded steps to a replay file as they happen.
///
/// Every step is written and flushed as a whole, so an interrupted
/// recording leaves a file that still parses.
pub struct ReplayWriter {
    file: Mutex<BufWriter<File>>,
    path: PathBuf,
    steps: AtomicUsize,
}

impl ReplayWriter {
    /// Create (or truncate) the replay file at `path`, creating parent
    /// directories as needed.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(path)?;

        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            steps: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one step; the screenId field is left out.
    pub fn append_step(&self, step: &AnswerForm) -> io::Result<()> {
        let text = ReplayScript::format_step(step);

        let mut writer = self
            .file
            .lock()
            .map_err(|_| io::Error::other("replay file lock poisoned"))?;
        writer.write_all(text.as_bytes())?;
        writer.flush()?;

        self.steps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub fn steps_written(&self) -> usize {
        self.steps.load(Ordering::SeqCst)
    }
}
