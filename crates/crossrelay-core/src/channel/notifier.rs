//! Operator notifiers.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};

use crossrelay_traits::{
    Alert, ChatId, Destination, GENERAL_THREAD, OperatorNotifier, OutboundText, RelayPlatform,
};

use crate::translate::escape_html_text;

/// Posts alerts into an operator chat.
pub struct TelegramNotifier {
    platform: Arc<dyn RelayPlatform>,
    admin_chat: ChatId,
}

impl TelegramNotifier {
    pub fn new(platform: Arc<dyn RelayPlatform>, admin_chat: ChatId) -> Self {
        Self {
            platform,
            admin_chat,
        }
    }

    fn render(alert: &Alert) -> String {
        format!(
            "⚠️ <b>Relay failure</b>\n{}\n<i>{}</i>",
            escape_html_text(&alert.summary()),
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

#[async_trait]
impl OperatorNotifier for TelegramNotifier {
    async fn notify(&self, alert: &Alert) {
        let message = OutboundText {
            dest: Destination::new(self.admin_chat, GENERAL_THREAD),
            html: Self::render(alert),
            reply_to: None,
        };
        // Single attempt: alerting must not stall the relay.
        if let Err(e) = self.platform.send_text(&message).await {
            warn!(
                admin_chat = self.admin_chat,
                error = %e,
                alert = %alert.summary(),
                "Failed to deliver operator alert"
            );
        }
    }
}

/// Writes alerts to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl OperatorNotifier for LogNotifier {
    async fn notify(&self, alert: &Alert) {
        error!(
            source_chat = alert.source_chat,
            message_id = alert.source_message_id,
            dest = %alert.dest,
            operation = %alert.operation,
            error = %alert.error,
            "Operator alert"
        );
    }
}
