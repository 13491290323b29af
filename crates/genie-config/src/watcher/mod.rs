//! File watcher for live settings reload.
//!
//! Uses `notify` on the config file's parent directory and coalesces bursts
//! of events (editors often write then rename) into one signal.

mod config_watcher;


pub use config_watcher::{ConfigWatcher, DEFAULT_DEBOUNCE};
