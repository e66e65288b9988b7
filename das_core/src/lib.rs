//! Calibration and diagnostics core for DAS interrogator assemblies.
//!
//! Everything hardware- and UI-shaped is reached through the `das_traits`
//! contracts; this crate holds the algorithms: EDFA gain calibration,
//! sensing-fiber topology detection, pulse-repetition-rate optimization,
//! and the acoustic noise floor procedures, tied together by
//! [`session::CalibrationSession`].

pub mod amplifier;
pub mod config;
pub mod conversions;
pub mod error;
pub mod fiber;
mod hw_error;
pub mod iq;
pub mod mocks;
pub mod noise;
pub mod rate;
pub mod recinfo;
pub mod session;
pub mod transform;

pub use config::{AmplifierCfg, DitherCfg, FiberCfg, NoiseCfg, SessionCfg};
pub use error::{DasError, Result};
pub use fiber::{FiberMap, FiberSensingRegion};
pub use recinfo::RecordingInfo;
pub use session::{CalibrationSession, CalibrationState, NoiseProcedure, NoiseReport};
