//! Mapping of boxed collaborator errors onto the typed [`DasError`] taxonomy.
//!
//! The `das_traits` contracts deliberately return boxed errors so hardware
//! crates stay decoupled from the core. With the `hardware-errors` feature
//! enabled the core downcasts those boxes back into `das_hardware::HwError`
//! and classifies them; without it everything becomes a generic hardware
//! error.

use crate::error::DasError;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(feature = "hardware-errors")]
pub(crate) fn map_hw_error(err: BoxedError) -> DasError {
    use das_hardware::HwError;

    match err.downcast::<HwError>() {
        Ok(hw) => {
            let msg = hw.to_string();
            match *hw {
                HwError::BufferTimeout { .. } => DasError::Timeout,
                HwError::MasterNotFirst | HwError::SystemMismatch { .. } => {
                    DasError::Consistency(msg)
                }
                HwError::InvalidChannelRange { .. } => DasError::Config(msg),
                HwError::Command(_) => DasError::Hardware(msg),
            }
        }
        Err(other) => DasError::Hardware(other.to_string()),
    }
}

#[cfg(not(feature = "hardware-errors"))]
pub(crate) fn map_hw_error(err: BoxedError) -> DasError {
    DasError::Hardware(err.to_string())
}
