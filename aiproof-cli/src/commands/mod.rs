//! Subcommand implementations.

pub mod attacks;
pub mod detect;
pub mod health;
pub mod pipeline;
pub mod stamp;
