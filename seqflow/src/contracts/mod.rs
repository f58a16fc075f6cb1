//! Contracts for stage outputs.
//!
//! Every stage declares a typed schema; model output is coerced into it with
//! the tolerant parser so that downstream stages always see a complete shape.

mod tolerant;

pub use tolerant::{normalize, parse_with_report, tolerant_parse, Parsed};
