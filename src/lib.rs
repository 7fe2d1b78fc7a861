pub mod cli;
pub mod config;
pub mod engine;
pub mod job;
pub mod naming;
pub mod orchestrator;
pub mod scratch;
pub mod util;
