//! Common primitives and error types

pub mod errors;
pub mod primitives;
