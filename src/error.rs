//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Providers crate error enum.
pub enum Error {
    /// The manager's worker thread is no longer running.
    #[error("provider manager was shutdown")]
    Shutdown,

    /// The caller's deadline elapsed while waiting on the manager.
    #[error("deadline elapsed while waiting on the provider manager")]
    Timeout,

    /// A [crate::Config] value that the manager can't run with.
    #[error("invalid provider manager config: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),
}
