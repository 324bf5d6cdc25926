//! Re-exports used by the exported macros. Not public API.

extern crate alloc;

pub use alloc::{collections::BTreeMap, string::String, vec::Vec};
