//! CLI command implementations

pub mod health;
pub mod load;
pub mod samples;
