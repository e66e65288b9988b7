use thiserror::Error;

/// Typed hardware-layer errors. Crossed back into `das_core`'s taxonomy by
/// downcast when the `hardware-errors` feature is on there.
#[derive(Debug, Error)]
pub enum HwError {
    /// A DMA buffer did not fill within the per-buffer timeout.
    #[error("sample buffer not filled within {timeout_s} s")]
    BufferTimeout { timeout_s: u64 },

    /// The clock-master digitizer board must enumerate first.
    #[error("master digitizer board is not first in the enumeration")]
    MasterNotFirst,

    /// All boards must belong to the same interrogator system.
    #[error("digitizer board belongs to system {found}, expected {expected}")]
    SystemMismatch { expected: u32, found: u32 },

    /// Channel bounds the digitizer cannot express.
    #[error("invalid channel range {first}-{last}")]
    InvalidChannelRange { first: u32, last: u32 },

    /// A register command was refused.
    #[error("command failed: {0}")]
    Command(String),
}
