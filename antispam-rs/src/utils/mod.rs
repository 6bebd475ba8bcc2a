//! Utility functions
//!
//! - [`text`]: Content heuristics shared by the pipeline stages

pub mod text;

pub use text::{byte_len_below, same_char};
