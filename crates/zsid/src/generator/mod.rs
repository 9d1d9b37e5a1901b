mod buffered;
mod direct;
mod error;
mod handle;
mod interface;
mod status;
#[cfg(test)]
mod tests;

pub use buffered::*;
pub use direct::*;
pub use error::*;
pub use handle::*;
pub use interface::*;
pub use status::*;
