//! Live settings reload.
//!
//! Publishes freshly loaded, validated configs on a `tokio::sync::watch`
//! channel whenever the config file changes on disk.

mod manager;


pub use manager::ReloadManager;
