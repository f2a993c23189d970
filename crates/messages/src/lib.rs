//! Pattern matching over fulfillment messages and value-returning transforms
//! of whole responses.
//!
//! - [`matcher`]: check, extract and substitute a regex in one message
//! - [`response`]: the same operations over every message of a response
//! - [`dates`]: date and time rewriting in message text
//! - [`params`]: reading and editing output-context parameters

pub mod dates;
pub mod matcher;
pub mod params;
pub mod response;

pub use {
    dates::DayNames,
    matcher::{
        Substitution, check, compile, extract, extract_with, matches, substitute, substitute_with,
    },
};
