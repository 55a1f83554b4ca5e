//! Domain types for the HTTP surface.

pub mod config;
pub mod problem;

pub use config::HttpConfig;
pub use problem::{standard_status, Problem, PROBLEM_CONTENT_TYPE};
