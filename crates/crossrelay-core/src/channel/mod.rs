//! Platform adapters: the Telegram client and operator notifiers.

mod notifier;
mod telegram;

pub use notifier::{LogNotifier, TelegramNotifier};
pub use telegram::TelegramClient;
