//! Utility functions for string formatting and matching.

pub mod format;

pub use format::{clip, contains_ignore_case, format_date, format_optional, parse_api_date};
