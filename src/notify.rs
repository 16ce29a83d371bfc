//! Notification delivery seam.
//!
//! The engine only ever talks to the `Notifier` trait; real chat delivery
//! lives outside this crate. The console notifier is the delivery channel
//! for CLI runs and makes a full coaching pass observable without any
//! external service.

use colored::*;
use tracing::info;

use crate::error::NotifyError;
use crate::models::EligibleUser;

/// Trait for delivering coaching messages to a user
pub trait Notifier {
    /// Deliver one message to the user's chat address
    fn notify(&self, user: &EligibleUser, text: &str) -> Result<(), NotifyError>;

    /// Get the channel name for this notifier
    fn channel_name(&self) -> &'static str;
}

/// Prints messages to stdout instead of a chat channel.
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        ConsoleNotifier
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, user: &EligibleUser, text: &str) -> Result<(), NotifyError> {
        println!(
            "{} {}",
            format!("→ user {} (chat {}):", user.user_id, user.chat_id).cyan(),
            text
        );
        info!(user_id = user.user_id, chat_id = user.chat_id, "notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &'static str {
        "console"
    }
}
