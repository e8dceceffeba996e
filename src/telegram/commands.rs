//! Bot commands: parsing, authorization screening and dispatch.
//!
//! Slash commands and inline-keyboard callbacks parse into one `Command`
//! enum and go through the same handlers, so /gas and the Gas button can
//! never drift apart. Screening is a pure function over the config
//! allow-list, which keeps the deny-and-alert rule testable without a bot.

use crate::config::TelegramConfig;
use crate::database;
use crate::errors::WatchResult;
use crate::logger::{self, LogTag};
use crate::scheduler;
use crate::telegram::formatters;
use crate::telegram::notifier::{Notification, TelegramNotifier};
use teloxide::types::ChatId;

/// Everything the bot responds to, from either entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Start,
    Gas,
    Info,
    Status,
    Restart,
    LogFile,
}

impl Command {
    /// Parse a slash command: `/gas`, `/GAS`, `/gas@WatchBot args`.
    pub fn parse_text(text: &str) -> Option<Command> {
        let first = text.split_whitespace().next()?;
        let keyword = first.strip_prefix('/')?;
        let keyword = keyword.split('@').next().unwrap_or(keyword);
        Self::from_keyword(&keyword.to_lowercase())
    }

    /// Parse inline-keyboard callback data: `gas`, `log_file`, ...
    pub fn parse_callback(data: &str) -> Option<Command> {
        Self::from_keyword(&data.to_lowercase())
    }

    fn from_keyword(keyword: &str) -> Option<Command> {
        match keyword {
            "help" => Some(Command::Help),
            "start" => Some(Command::Start),
            "gas" => Some(Command::Gas),
            "info" => Some(Command::Info),
            "status" => Some(Command::Status),
            "restart" => Some(Command::Restart),
            "logfile" | "log_file" => Some(Command::LogFile),
            _ => None,
        }
    }
}

/// Outcome of screening an incoming message against the allow-list.
#[derive(Debug, Clone)]
pub enum Screening {
    Allowed(Command),
    /// Authorized sender, but the command is not one of ours.
    Unknown,
    /// Sender outside the allow-list. Carries the single admin alert for
    /// this attempt; the sender only gets a denial notice.
    Denied(Notification),
    /// Plain chatter, nothing to do.
    Ignored,
}

/// Screen a text message. Only slash commands are acted on; everything
/// else is ignored regardless of sender.
pub fn screen_message(
    config: &TelegramConfig,
    principal: i64,
    name: &str,
    text: &str,
) -> Screening {
    if !text.starts_with('/') {
        return Screening::Ignored;
    }
    if !config.is_authorized(principal) {
        return Screening::Denied(Notification::Unauthorized {
            principal,
            name: name.to_string(),
            text: text.to_string(),
        });
    }
    match Command::parse_text(text) {
        Some(command) => Screening::Allowed(command),
        None => Screening::Unknown,
    }
}

/// Screen a callback query. Unknown callback data is ignored rather than
/// answered, it can only come from a stale keyboard.
pub fn screen_callback(
    config: &TelegramConfig,
    principal: i64,
    name: &str,
    data: &str,
) -> Screening {
    if !config.is_authorized(principal) {
        return Screening::Denied(Notification::Unauthorized {
            principal,
            name: name.to_string(),
            text: data.to_string(),
        });
    }
    match Command::parse_callback(data) {
        Some(command) => Screening::Allowed(command),
        None => Screening::Ignored,
    }
}

/// Run one command and reply to the chat it came from.
pub async fn dispatch(
    notifier: &TelegramNotifier,
    chat_id: ChatId,
    command: Command,
) -> WatchResult<()> {
    logger::debug(LogTag::Telegram, &format!("Dispatching {:?} for {}", command, chat_id));

    match command {
        Command::Help => handle_help(notifier, chat_id).await,
        Command::Start => handle_start(notifier, chat_id).await,
        Command::Gas => handle_gas(notifier, chat_id).await,
        Command::Info => handle_info(notifier, chat_id).await,
        Command::Status => handle_status(notifier, chat_id).await,
        Command::Restart => handle_restart(notifier, chat_id).await,
        Command::LogFile => handle_logfile(notifier, chat_id).await,
    }
}

/// Reply to an authorized but unrecognized slash command with the
/// capability list.
pub async fn reply_unknown(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    notifier
        .send_with_keyboard(chat_id, &formatters::msg_help(), formatters::help_keyboard())
        .await
}

async fn handle_help(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    notifier
        .send_with_keyboard(chat_id, &formatters::msg_help(), formatters::help_keyboard())
        .await
}

async fn handle_start(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    let message = format!(
        "{}\n\n{}",
        formatters::msg_online(env!("CARGO_PKG_VERSION")),
        formatters::msg_help()
    );
    notifier
        .send_with_keyboard(chat_id, &message, formatters::help_keyboard())
        .await
}

async fn handle_gas(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    let gas = database::get_database()?.latest_gas_snapshot()?;
    notifier
        .send_message_to(chat_id, &formatters::msg_gas(gas.as_ref()))
        .await
}

async fn handle_info(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    let db = database::get_database()?;
    let snapshots = db.latest_token_set()?;
    let gas = db.latest_gas_snapshot()?;
    notifier
        .send_message_to(chat_id, &formatters::msg_portfolio_report(&snapshots, gas.as_ref()))
        .await
}

async fn handle_status(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    let status = scheduler::get_scheduler().status();
    notifier
        .send_message_to(chat_id, &formatters::msg_status(&status))
        .await
}

async fn handle_restart(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    let handle = scheduler::get_scheduler();
    let message = if handle.restart_now() {
        "🔄 <code>collection cycle started</code>"
    } else if handle.status().busy {
        "⏳ <code>busy, a cycle is already in flight</code>"
    } else {
        "🔴 <code>scheduler is not running</code>"
    };
    notifier.send_message_to(chat_id, message).await
}

async fn handle_logfile(notifier: &TelegramNotifier, chat_id: ChatId) -> WatchResult<()> {
    let path = logger::get_log_file_path();
    if !path.exists() {
        return notifier
            .send_message_to(chat_id, "<code>No log file yet.</code>")
            .await;
    }
    notifier.send_document(chat_id, &path).await
}
