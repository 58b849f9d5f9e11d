//! Per-channel variable maps extracted from `ChanVariable` and `Variable` lines.

mod buckets;

pub use buckets::{VariableBuckets, VariableMap};
