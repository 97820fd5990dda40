pub mod app;
pub mod client;
pub mod config;
pub mod handler;
pub mod highlight;
pub mod markdown;
pub mod orchestrator;
pub mod reveal;
pub mod state;
pub mod tui;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use client::{GenerateClient, RequestError};
pub use config::Config;
pub use orchestrator::{deliver, RequestOrchestrator};
pub use reveal::{RevealEvent, RevealScheduler};
pub use state::{Conversation, Message, Origin};
