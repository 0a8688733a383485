//! Sample provider implementations

pub mod fit_file;

pub use fit_file::{FitFileProvider, RideInput};
