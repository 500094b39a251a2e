//! Alert notification channels.
//!
//! This crate provides:
//! - Console, GitHub job summary, webhook and email channels
//! - Channel configuration from the environment
//! - A dispatcher that fans a batch of alerts out to every channel

pub mod config;
pub mod console;
pub mod email;
pub mod format;
pub mod github;
pub mod notifier;
pub mod webhook;

pub use config::{ChannelConfig, EmailConfig, WebhookConfig, WebhookFormat};
pub use console::ConsoleChannel;
pub use email::EmailChannel;
pub use github::GithubSummaryChannel;
pub use notifier::{AlertChannel, DispatchSummary, Dispatcher, NotifyError};
pub use webhook::WebhookChannel;
