mod error;
mod interface;
mod random;
mod sequential;
mod timeout;

pub use error::*;
pub use interface::*;
pub use random::*;
pub use sequential::*;
pub use timeout::*;
