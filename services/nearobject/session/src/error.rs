//! Error types for the session crate.
//!
//! Device and session operations report protocol outcomes as
//! [`uwb_fira::UwbStatus`]; only failures outside the protocol live here.

use thiserror::Error;

/// Task queue failures
#[derive(Error, Debug)]
pub enum TaskQueueError {
    /// The worker thread could not be spawned
    #[error("failed to spawn task queue worker '{name}': {source}")]
    Spawn {
        /// Queue name
        name: String,
        /// OS error
        #[source]
        source: std::io::Error,
    },
}
