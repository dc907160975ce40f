//! detection.raw_record.v1 input schema
//!
//! This module defines how raw detection records are decoded from tabular and
//! JSON feeds, and how a batch is checked before it reaches the normalizer.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
