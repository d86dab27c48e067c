pub mod config;
pub mod eth;
pub mod models;
pub mod poll_stats;
pub mod scheduler;
pub mod telegram;
pub mod watcher;
