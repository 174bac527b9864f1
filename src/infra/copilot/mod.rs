pub mod client;

pub use client::CopilotClient;
