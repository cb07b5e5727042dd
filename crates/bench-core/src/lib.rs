#![deny(missing_docs)]
#![doc = "Core error types and the parameter combination model for the benchmark sweep engine."]

pub mod axis;
pub mod errors;

pub use axis::{AxisValue, Combination, CombinationKey};
pub use errors::{config_error, BenchError, ErrorInfo};
