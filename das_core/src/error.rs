use thiserror::Error;

/// Errors surfaced by the calibration and diagnostics pipeline.
#[derive(Debug, Error)]
pub enum DasError {
    /// Invalid or inconsistent configuration, including channel demands the
    /// rate table cannot satisfy.
    #[error("configuration error: {0}")]
    Config(String),

    /// A DMA buffer failed to fill within the acquisition timeout.
    #[error("acquisition timed out waiting for sample buffers")]
    Timeout,

    /// The hardware refused a command or returned garbage.
    #[error("hardware error: {0}")]
    Hardware(String),

    /// The hardware answered, but the optical plant is in a state the
    /// calibration cannot work with (dark fiber, gain floor, ...).
    #[error("hardware fault: {0}")]
    HardwareFault(String),

    /// Digitizer boards disagree about system identity or ordering.
    #[error("board consistency check failed: {0}")]
    Consistency(String),

    /// The report document could not be opened for writing.
    #[error("report document is busy: {0}")]
    ReportBusy(String),

    /// An operation was requested out of order, e.g. fiber-end detection
    /// before a fiber map exists.
    #[error("invalid calibration state: {0}")]
    State(String),
}

pub type Result<T> = eyre::Result<T>;
