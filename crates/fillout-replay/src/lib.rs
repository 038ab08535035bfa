//! # fillout-replay
//!
//! Recorded answer sequences that can be replayed against fresh interview
//! sessions.
//!
//! ## File format
//!
//! Plain text, one step per answered page. Each line of a step is
//! `key=value`; a line holding exactly `---` closes the step. Keys recorded
//! with several values are written once with the values joined by `,`;
//! a comma inside a value is written as `\,`.
//! The `screenId` field is never written because it only makes sense for
//! the session it came from.
//!
//! ```text
//! historyOrder=1
//! button-next=Next
//! answer-q1-m=2,5
//! ---
//! ```

mod script;
mod writer;

pub use script::{ReplayParseError, ReplayScript, STEP_SEPARATOR};
pub use writer::ReplayWriter;
