mod driver;
mod error;
mod outcome;
mod respondent;
mod scheduler;
mod source;

pub use driver::{DriverConfig, SessionDriver, DEFAULT_MAX_STEPS};
pub use error::SessionError;
pub use outcome::{InterviewOutcome, RunReport};
pub use respondent::{RespondentKeyTemplate, TemplateError};
pub use scheduler::{
    JobQueue, ProgressState, RunMode, Scheduler, SchedulerConfig, SessionFailure, SessionJob,
};
pub use source::{AnswerSource, ReplayCursor, SynthesizedAnswers};
