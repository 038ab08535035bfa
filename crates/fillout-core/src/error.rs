use thiserror::Error;

use fillout_questions::{PageError, SynthesisError};
use fillout_transport::TransportError;

/// Everything that can end a single interview session early
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Could not parse page: {0}")]
    Page(#[from] PageError),

    #[error("Could not answer page: {0}")]
    Synthesis(#[from] SynthesisError),

    #[error("Answer was rejected: page with historyOrder {history_order} was served again")]
    ValidationRejected { history_order: String },

    #[error("end of replay file did not result in completed interview")]
    ReplayExhausted,

    #[error("Interview not completed after {0} submissions")]
    StepLimitExceeded(usize),

    #[error("Session was interrupted")]
    Interrupted,

    #[error("Protocol error: {0}")]
    Protocol(String),
}
