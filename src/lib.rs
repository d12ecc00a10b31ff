pub mod config;
pub mod error;
pub mod identity;
pub mod orchestrator;
pub mod presenter;
pub mod reveal;
pub mod settlement;
pub mod stake;
pub mod types;

#[cfg(test)]
mod test_helpers;
