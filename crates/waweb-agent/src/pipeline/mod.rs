//! Shared message pipeline used by both the webhook and the REST chat route.
//!
//! Callers only handle transport concerns (TwiML, JSON, outbound sends).
//! Classification, history and the model call happen here, once.

pub mod process;

pub use process::{process_message, MessageKind, ProcessedMessage};
