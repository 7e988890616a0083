#![warn(clippy::pedantic)]
// Noisy doc/signature lints, would require annotating every pub function
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Style preference: keeping format!("{}", x) over format!("{x}") for readability with complex exprs
#![allow(clippy::uninlined_format_args)]
// Backoff arithmetic casts between integer delays and f64
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod pipeline;
pub mod reply;
pub mod signature;
pub(crate) mod utils;

/// Re-exports for fuzz targets. Not part of the public API.
#[doc(hidden)]
pub mod fuzz_api {
    pub use crate::commands::Command;
    pub use crate::events::decode_events;
    pub use crate::signature::verify_signature;
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
