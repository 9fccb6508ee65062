pub mod agent;
pub mod commands;
pub mod config;
pub mod crew;
pub mod crews;
pub mod llm;
pub mod task;
pub mod tools;

pub use agent::*;
pub use crew::*;
pub use task::*;

#[cfg(test)]
mod tests;
