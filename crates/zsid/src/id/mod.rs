mod fields;
mod layout;

pub use fields::*;
pub use layout::*;
