pub mod apis;
pub mod arguments;
pub mod collector;
pub mod config;
pub mod database; // Append-only snapshot storage
pub mod errors;
pub mod http;
pub mod logger;
pub mod metrics; // PnL math and display formatting
pub mod run;
pub mod scheduler;
pub mod services;
pub mod telegram;
