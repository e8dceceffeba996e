//! Telegram integration: outbound notifier, command dispatch and the
//! service that runs the queue worker and update polling.

pub mod commands;
pub mod formatters;
pub mod notifier;
pub mod service;

pub use commands::Command;
pub use notifier::{Notification, TelegramNotifier};
pub use service::TelegramService;
