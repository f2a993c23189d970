//! `.context()` support shared by the bpi crates' error types.

pub mod context;

pub use context::FromMessage;
