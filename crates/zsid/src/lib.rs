#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
mod generator;
mod id;
mod registry;
mod time;
mod worker;

pub use crate::error::*;
pub use crate::generator::*;
pub use crate::id::*;
pub use crate::registry::*;
pub use crate::time::*;
pub use crate::worker::*;
