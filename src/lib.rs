pub mod cli;
pub mod config;
pub mod global;
pub mod jobs;
pub mod validation;
