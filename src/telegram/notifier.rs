//! Telegram notifier: the single send path for alerts, command replies and
//! system notices.
//!
//! The bot client reuses the proxied HTTP client, so Telegram traffic goes
//! through the same SOCKS5 proxy as the metric APIs. Every send runs under
//! the shared retry policy.

use crate::config::{self, Config};
use crate::errors::{WatchError, WatchResult};
use crate::http::{self, RetryPolicy};
use crate::logger::{self, LogTag};
use crate::telegram::formatters;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile, ParseMode};
use teloxide::RequestError;
use tokio::sync::mpsc;

/// Out-of-cycle notice routed through the queue worker. Cycle alerts do not
/// use this; the collector sends those directly to keep their order and
/// spacing.
#[derive(Debug, Clone)]
pub enum Notification {
    Online { version: String },
    Offline { reason: String },
    Unauthorized { principal: i64, name: String, text: String },
}

/// Telegram sender bound to the admin chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    admin_chat_id: ChatId,
    retry: RetryPolicy,
}

impl TelegramNotifier {
    pub fn new(
        bot_token: &str,
        admin_chat_id: i64,
        client: reqwest::Client,
        retry: RetryPolicy,
    ) -> WatchResult<Self> {
        if bot_token.is_empty() {
            return Err(WatchError::Config("Telegram bot token is empty".to_string()));
        }
        if admin_chat_id == 0 {
            return Err(WatchError::Config(
                "Telegram admin_chat_id is not set".to_string(),
            ));
        }

        Ok(Self {
            bot: Bot::with_client(bot_token, client),
            admin_chat_id: ChatId(admin_chat_id),
            retry,
        })
    }

    /// Build a notifier from a config snapshot, proxy settings included.
    pub fn from_config(config: &Config) -> WatchResult<Self> {
        let client = http::build_client_from_config(config)?;
        let retry = RetryPolicy::from_config(&config.api);
        Self::new(&config.telegram.bot_token, config.telegram.admin_chat_id, client, retry)
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn admin_chat_id(&self) -> ChatId {
        self.admin_chat_id
    }

    /// Call getMe to confirm the token works. Returns the bot username.
    pub async fn verify_identity(&self) -> WatchResult<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(classify_request_error)?;
        Ok(me.username.clone().unwrap_or_else(|| "unknown".to_string()))
    }

    /// Send an HTML message to the admin chat.
    pub async fn send_message(&self, text: &str) -> WatchResult<()> {
        self.send_message_to(self.admin_chat_id, text).await
    }

    /// Send an HTML message to an arbitrary chat, with retry.
    pub async fn send_message_to(&self, chat_id: ChatId, text: &str) -> WatchResult<()> {
        self.retry
            .run("telegram send_message", || async {
                self.bot
                    .send_message(chat_id, text.to_string())
                    .parse_mode(ParseMode::Html)
                    .await
                    .map(|_| ())
                    .map_err(classify_request_error)
            })
            .await?;

        logger::debug(
            LogTag::Telegram,
            &format!("Sent message to {} (length={})", chat_id, text.len()),
        );
        Ok(())
    }

    /// Send an HTML message with an inline keyboard.
    pub async fn send_with_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: InlineKeyboardMarkup,
    ) -> WatchResult<()> {
        self.retry
            .run("telegram send_keyboard", || async {
                self.bot
                    .send_message(chat_id, text.to_string())
                    .parse_mode(ParseMode::Html)
                    .reply_markup(keyboard.clone())
                    .await
                    .map(|_| ())
                    .map_err(classify_request_error)
            })
            .await?;
        Ok(())
    }

    /// Upload a local file as a document. Used by /logfile.
    pub async fn send_document(&self, chat_id: ChatId, path: &Path) -> WatchResult<()> {
        if !path.exists() {
            return Err(WatchError::Notify(format!(
                "File not found: {}",
                path.display()
            )));
        }

        self.retry
            .run("telegram send_document", || async {
                self.bot
                    .send_document(chat_id, InputFile::file(path.to_path_buf()))
                    .await
                    .map(|_| ())
                    .map_err(classify_request_error)
            })
            .await?;

        logger::debug(
            LogTag::Telegram,
            &format!("Sent document {} to {}", path.display(), chat_id),
        );
        Ok(())
    }

    /// Render and send a queued notification to the admin chat.
    pub async fn send_notification(&self, notification: &Notification) -> WatchResult<()> {
        let message = render_notification(notification);
        self.send_message(&message).await
    }
}

/// Map a Telegram API error onto our error kinds so the retry policy can
/// classify it.
fn classify_request_error(err: RequestError) -> WatchError {
    match err {
        RequestError::RetryAfter(_) => WatchError::RateLimit {
            service: "telegram".to_string(),
        },
        RequestError::Network(e) => WatchError::Network(e.to_string()),
        RequestError::Io(e) => WatchError::Network(e.to_string()),
        other => WatchError::Notify(other.to_string()),
    }
}

fn render_notification(notification: &Notification) -> String {
    match notification {
        Notification::Online { version } => formatters::msg_online(version),
        Notification::Offline { reason } => formatters::msg_offline(reason),
        Notification::Unauthorized { principal, name, text } => {
            formatters::msg_unauthorized(*principal, name, text)
        }
    }
}

// ============================================================================
// GLOBAL NOTIFIER ACCESS
// ============================================================================

use once_cell::sync::Lazy;
use std::sync::RwLock;

static NOTIFIER: Lazy<RwLock<Option<TelegramNotifier>>> = Lazy::new(|| RwLock::new(None));

static NOTIFICATION_QUEUE: Lazy<RwLock<Option<mpsc::Sender<Notification>>>> =
    Lazy::new(|| RwLock::new(None));

/// Initialize the global notifier from the current config. A bad Telegram
/// section logs a warning and leaves notifications off; the watcher itself
/// keeps running.
pub fn init_notifier() -> WatchResult<()> {
    let config = config::get_config_clone();

    if !config.telegram.enabled {
        logger::info(LogTag::Telegram, "Telegram disabled in config");
        return Ok(());
    }

    match TelegramNotifier::from_config(&config) {
        Ok(notifier) => {
            if let Ok(mut guard) = NOTIFIER.write() {
                *guard = Some(notifier);
            }
            logger::info(LogTag::Telegram, "Telegram notifier initialized");
        }
        Err(e) => {
            logger::warning(
                LogTag::Telegram,
                &format!("Notifier unavailable, continuing without Telegram: {}", e),
            );
        }
    }
    Ok(())
}

pub fn is_enabled() -> bool {
    NOTIFIER.read().map(|guard| guard.is_some()).unwrap_or(false)
}

/// Clone the global notifier for use in a task.
pub fn get_notifier() -> Option<TelegramNotifier> {
    NOTIFIER.read().ok().and_then(|guard| guard.clone())
}

/// Drop the global notifier. Used on shutdown so late sends become no-ops.
pub fn clear_notifier() {
    if let Ok(mut guard) = NOTIFIER.write() {
        *guard = None;
    }
    if let Ok(mut guard) = NOTIFICATION_QUEUE.write() {
        *guard = None;
    }
}

/// Queue a notification without blocking. Safe from sync contexts; drops
/// the message with a warning when the queue is full or absent.
pub fn queue_notification(notification: Notification) {
    if let Ok(guard) = NOTIFICATION_QUEUE.read() {
        if let Some(ref sender) = *guard {
            if sender.try_send(notification).is_err() {
                logger::warning(LogTag::Telegram, "Notification queue full, dropping message");
            }
            return;
        }
    }
    logger::debug(LogTag::Telegram, "Notification queue not running, message dropped");
}

/// Install the queue sender. Called by the Telegram service when its worker
/// starts.
pub fn set_notification_queue(sender: mpsc::Sender<Notification>) {
    if let Ok(mut guard) = NOTIFICATION_QUEUE.write() {
        *guard = Some(sender);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[test]
    fn test_new_rejects_missing_token() {
        let result = TelegramNotifier::new("", 100, plain_client(), RetryPolicy::default());
        assert!(matches!(result, Err(WatchError::Config(_))));
    }

    #[test]
    fn test_new_rejects_unset_chat() {
        let result = TelegramNotifier::new("123:abc", 0, plain_client(), RetryPolicy::default());
        assert!(matches!(result, Err(WatchError::Config(_))));
    }

    #[test]
    fn test_new_accepts_valid_input() {
        let result = TelegramNotifier::new("123:abc", 100, plain_client(), RetryPolicy::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_render_notification_variants() {
        let online = render_notification(&Notification::Online {
            version: "0.1.0".to_string(),
        });
        assert!(online.contains("0.1.0"));
        assert!(online.contains("online"));

        let offline = render_notification(&Notification::Offline {
            reason: "signal".to_string(),
        });
        assert!(offline.contains("offline"));
        assert!(offline.contains("signal"));

        let unauthorized = render_notification(&Notification::Unauthorized {
            principal: 42,
            name: "Mallory".to_string(),
            text: "/restart".to_string(),
        });
        assert!(unauthorized.contains("42"));
        assert!(unauthorized.contains("Mallory"));
        assert!(unauthorized.contains("/restart"));
    }
}
