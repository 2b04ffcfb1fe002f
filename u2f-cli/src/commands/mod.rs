//! Subcommand implementations.

pub mod demo;
pub mod parse;
pub mod register;
pub mod route;
pub mod sign;
