use thiserror::Error;

/// Startup failures surfaced by [`crate::ProcessController::launch`].
///
/// Steady-state failures (a thread that cannot be opened, a priority change
/// that is refused) are never propagated; they are logged and the control
/// loop keeps going.
#[derive(Error, Debug)]
pub enum Error {
    /// Another controller already holds the activation mutex for this target.
    #[error("cpulimit already started!")]
    AlreadyRunning,

    /// A close request was made but no controller governs this target.
    #[error("no process exists with MUTEX: {0}")]
    NothingToClose(String),

    /// The minimum per-thread suspend primitive could not be resolved.
    #[error("your system is not supported")]
    Unsupported,

    /// The activation mutex could not be created.
    #[error("failed to create coordination mutex: {0}")]
    Token(#[from] windows::core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
