pub mod commands_tests;
pub mod config_tests;
pub mod crew_tests;
pub mod llm_tests;

pub use test_utils::*;
