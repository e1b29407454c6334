//! Command handlers for the agentrag CLI.

pub mod ask;
pub mod health;
pub mod index;
pub mod init;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use health::HealthCommand;
pub use index::IndexCommand;
pub use init::InitCommand;
