//! Compiled artifact backend: loading, execution and on-disk lifecycle

pub mod artifact;

pub use artifact::*;
