pub mod config;
pub mod copilot;
pub mod scheduler;
pub mod session;
