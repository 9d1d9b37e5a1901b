mod config;
mod gate;
#[allow(clippy::module_inception)]
mod registry;

pub use config::*;
pub use registry::*;
