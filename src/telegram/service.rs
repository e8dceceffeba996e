//! Telegram service: notification queue worker and the long-poll command
//! loop.
//!
//! Both tasks exit on the shared shutdown notify. Polling tracks its own
//! update offset; an update is considered consumed once its handler
//! returned, errors included.

use crate::config;
use crate::logger::{self, LogTag};
use crate::services::{Service, ServiceHealth};
use crate::telegram::commands::{self, Screening};
use crate::telegram::formatters;
use crate::telegram::notifier::{self, Notification, TelegramNotifier};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::requests::Request;
use teloxide::types::UpdateKind;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

const NOTIFICATION_QUEUE_SIZE: usize = 100;
const POLL_TIMEOUT_SECS: u32 = 30;
const POLL_ERROR_BACKOFF_SECS: u64 = 5;

pub struct TelegramService;

#[async_trait]
impl Service for TelegramService {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn initialize(&mut self) -> Result<(), String> {
        notifier::init_notifier().map_err(|e| e.to_string())?;

        if let Some(notifier) = notifier::get_notifier() {
            match notifier.verify_identity().await {
                Ok(username) => {
                    logger::info(LogTag::Telegram, &format!("Authenticated as @{}", username));
                }
                Err(e) => {
                    logger::warning(
                        LogTag::Telegram,
                        &format!("getMe failed, token may be invalid: {}", e),
                    );
                }
            }
        }
        Ok(())
    }

    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String> {
        let notifier = match notifier::get_notifier() {
            Some(notifier) => notifier,
            None => {
                logger::info(LogTag::Telegram, "Telegram disabled, service idle");
                return Ok(vec![]);
            }
        };

        let (sender, receiver) = mpsc::channel(NOTIFICATION_QUEUE_SIZE);
        notifier::set_notification_queue(sender);

        let mut handles = Vec::new();
        handles.push(tokio::spawn(queue_worker(
            notifier.clone(),
            receiver,
            shutdown.clone(),
        )));

        if config::with_config(|c| c.telegram.commands_enabled) {
            handles.push(tokio::spawn(poll_updates(notifier, shutdown)));
        } else {
            logger::info(LogTag::Telegram, "Command polling disabled in config");
        }

        notifier::queue_notification(Notification::Online {
            version: env!("CARGO_PKG_VERSION").to_string(),
        });

        Ok(handles)
    }

    async fn stop(&mut self) -> Result<(), String> {
        if let Some(notifier) = notifier::get_notifier() {
            // Direct send, the queue worker is already gone by now.
            let offline = Notification::Offline {
                reason: "shutdown".to_string(),
            };
            if let Err(e) = notifier.send_notification(&offline).await {
                logger::warning(LogTag::Telegram, &format!("Offline notice failed: {}", e));
            }
        }
        notifier::clear_notifier();
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        if !config::with_config(|c| c.telegram.enabled) {
            return ServiceHealth::Degraded("disabled in config".to_string());
        }
        if notifier::is_enabled() {
            ServiceHealth::Healthy
        } else {
            ServiceHealth::Unhealthy("notifier not initialized".to_string())
        }
    }
}

/// Drains the notification queue until shutdown or all senders drop.
async fn queue_worker(
    notifier: TelegramNotifier,
    mut receiver: mpsc::Receiver<Notification>,
    shutdown: Arc<Notify>,
) {
    logger::debug(LogTag::Telegram, "Notification queue worker started");

    loop {
        tokio::select! {
            received = receiver.recv() => {
                match received {
                    Some(notification) => {
                        if let Err(e) = notifier.send_notification(&notification).await {
                            logger::error(
                                LogTag::Telegram,
                                &format!("Notification send failed: {}", e),
                            );
                        }
                    }
                    None => break,
                }
            }
            _ = shutdown.notified() => break,
        }
    }

    logger::debug(LogTag::Telegram, "Notification queue worker stopped");
}

/// Long-poll getUpdates and feed messages and callbacks through screening
/// and dispatch.
async fn poll_updates(notifier: TelegramNotifier, shutdown: Arc<Notify>) {
    let bot = notifier.bot().clone();
    let mut offset: i32 = 0;

    logger::info(LogTag::Telegram, "Command polling started");

    loop {
        let request = bot.get_updates().timeout(POLL_TIMEOUT_SECS).offset(offset);

        let updates = tokio::select! {
            result = request.send() => result,
            _ = shutdown.notified() => break,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = update.id.0 as i32 + 1;
                    handle_update(&notifier, update).await;
                }
            }
            Err(e) => {
                logger::warning(LogTag::Telegram, &format!("get_updates failed: {}", e));
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(POLL_ERROR_BACKOFF_SECS)) => {}
                    _ = shutdown.notified() => break,
                }
            }
        }
    }

    logger::info(LogTag::Telegram, "Command polling stopped");
}

async fn handle_update(notifier: &TelegramNotifier, update: Update) {
    match update.kind {
        UpdateKind::Message(message) => {
            let text = match message.text() {
                Some(text) => text.to_string(),
                None => return,
            };
            let (principal, name) = match &message.from {
                Some(user) => (user.id.0 as i64, user.full_name()),
                None => (message.chat.id.0, "unknown".to_string()),
            };

            let telegram_config = config::with_config(|c| c.telegram.clone());
            match commands::screen_message(&telegram_config, principal, &name, &text) {
                Screening::Allowed(command) => {
                    if let Err(e) = commands::dispatch(notifier, message.chat.id, command).await {
                        logger::error(
                            LogTag::Telegram,
                            &format!("Command {:?} failed: {}", command, e),
                        );
                    }
                }
                Screening::Unknown => {
                    if let Err(e) = commands::reply_unknown(notifier, message.chat.id).await {
                        logger::error(LogTag::Telegram, &format!("Help reply failed: {}", e));
                    }
                }
                Screening::Denied(alert) => {
                    logger::warning(
                        LogTag::Telegram,
                        &format!("Unauthorized command from {} ({}): {}", principal, name, text),
                    );
                    notifier::queue_notification(alert);
                    // The requester still gets an answer, just not the data.
                    if let Err(e) = notifier
                        .send_message_to(message.chat.id, &formatters::msg_denied())
                        .await
                    {
                        logger::warning(LogTag::Telegram, &format!("Denial reply failed: {}", e));
                    }
                }
                Screening::Ignored => {}
            }
        }

        UpdateKind::CallbackQuery(query) => {
            // Ack first so the button stops spinning even if the handler
            // fails later.
            let _ = notifier.bot().answer_callback_query(query.id.clone()).await;

            let data = match &query.data {
                Some(data) => data.clone(),
                None => return,
            };
            let principal = query.from.id.0 as i64;
            let name = query.from.full_name();
            let chat_id = query
                .message
                .as_ref()
                .map(|m| m.chat().id)
                .unwrap_or(ChatId(principal));

            let telegram_config = config::with_config(|c| c.telegram.clone());
            match commands::screen_callback(&telegram_config, principal, &name, &data) {
                Screening::Allowed(command) => {
                    if let Err(e) = commands::dispatch(notifier, chat_id, command).await {
                        logger::error(
                            LogTag::Telegram,
                            &format!("Callback {:?} failed: {}", command, e),
                        );
                    }
                }
                Screening::Denied(alert) => {
                    logger::warning(
                        LogTag::Telegram,
                        &format!("Unauthorized callback from {}: {}", principal, data),
                    );
                    notifier::queue_notification(alert);
                    if let Err(e) = notifier
                        .send_message_to(chat_id, &formatters::msg_denied())
                        .await
                    {
                        logger::warning(LogTag::Telegram, &format!("Denial reply failed: {}", e));
                    }
                }
                _ => {}
            }
        }

        _ => {}
    }
}
