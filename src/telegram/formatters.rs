//! Telegram message formatting.
//!
//! Every message the bot sends is built here as an HTML string, so the
//! notifier and command handlers stay free of layout code. Cards use
//! `<code>` lines with padded labels to keep value columns aligned in the
//! Telegram monospace font.

use crate::database::{GasPriceSnapshot, TokenSnapshot};
use crate::metrics;
use crate::scheduler::SchedulerStatus;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// PnL direction marker: red below zero, green above, neutral at zero.
fn pnl_char(pnl_percent: f64) -> &'static str {
    if pnl_percent < 0.0 {
        "🔴"
    } else if pnl_percent > 0.0 {
        "🟢"
    } else {
        "🔄"
    }
}

/// Accumulated-move marker relative to the alert thresholds.
fn delta_char(delta: f64, up_threshold: f64, down_threshold: f64) -> &'static str {
    if delta > up_threshold {
        "⬆️"
    } else if delta < down_threshold {
        "⬇️"
    } else {
        "🔄"
    }
}

/// Two decimal places with trailing zeros trimmed: 50.0 -> "50", -3.50 -> "-3.5".
fn fmt_trim2(value: f64) -> String {
    let rendered = format!("{:.2}", value);
    let rendered = rendered.trim_end_matches('0').trim_end_matches('.');
    rendered.to_string()
}

/// Whole-dollar rendering for position costs.
fn fmt_usd_int(value: f64) -> String {
    format!("{}", value.round() as i64)
}

/// Escape text that ends up inside HTML parse mode. Only needed for
/// user-supplied strings; our own labels are clean.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Per-token alert card sent when the accumulated PnL move crosses a
/// threshold. The label rides outside the code span so Telegram renders
/// `#LABEL` as a clickable hashtag.
pub fn msg_token_alert(
    snapshot: &TokenSnapshot,
    accumulated_delta: f64,
    up_threshold: f64,
    down_threshold: f64,
) -> String {
    format!(
        "<code>▪️ {:<9} </code>#{}\n\
         <code>▪️ {:<9} {}</code>\n\
         <code>▪️ {:<9} {}</code>\n\n\
         <code>▪️ {:<9} {}</code>\n\
         <code>▪️ {:<9} {}$</code>\n\n\
         <code>{} {}%</code>\n\
         <code>▪️ {:<9} {}</code>\n\
         <code>▪️ {:<9} {}$</code>\n\
         <code>{} {:<9} {}%</code>",
        "Token:",
        snapshot.label,
        "Mktcap:",
        metrics::format_compact(snapshot.market_cap_usd),
        "Volume:",
        metrics::format_compact(snapshot.volume_24h_usd),
        "Quantity:",
        metrics::format_compact(snapshot.quantity),
        "Buy:",
        fmt_usd_int(snapshot.cost_basis),
        delta_char(accumulated_delta, up_threshold, down_threshold),
        fmt_trim2(accumulated_delta),
        "Price:",
        metrics::format_price(snapshot.price_usd),
        "Cost:",
        fmt_usd_int(snapshot.current_worth),
        pnl_char(snapshot.pnl_percent),
        "Pnl:",
        fmt_trim2(snapshot.pnl_percent),
    )
}

/// Portfolio report for /info: totals header plus one aligned row per
/// tracked token, built from the latest snapshot set.
pub fn msg_portfolio_report(
    snapshots: &[TokenSnapshot],
    gas: Option<&GasPriceSnapshot>,
) -> String {
    if snapshots.is_empty() {
        return "<code>No snapshots collected yet.</code>".to_string();
    }

    let purchased: f64 = snapshots.iter().map(|s| s.cost_basis).sum();
    let worth: f64 = snapshots.iter().map(|s| s.current_worth).sum();
    let pnl = metrics::percentage_pnl(purchased, worth);
    let latest_ts = snapshots.iter().map(|s| s.timestamp).max().unwrap_or(0);
    let gas_line = match gas {
        Some(g) => format!("{}$", fmt_trim2(g.price_usd)),
        None => "n/a".to_string(),
    };

    let mut message = format!(
        "<code>▪️ {:<10} {}</code>\n\
         <code>▪️ {:<10} {}</code>\n\n\
         <code>▪️ {:<10} {}$</code>\n\
         <code>{} {:<10} {}$</code>\n\
         <code>{} {:<10} {}%</code>\n\n",
        "Date:",
        metrics::format_datetime_msk(latest_ts),
        "Gas price:",
        gas_line,
        "Purchased:",
        fmt_usd_int(purchased),
        pnl_char(worth - purchased),
        "Worth:",
        fmt_usd_int(worth),
        pnl_char(pnl),
        "PNL:",
        fmt_trim2(pnl),
    );

    for snapshot in snapshots {
        message.push_str(&format!(
            "<code>{} {:<8} {:>8} {:>8}</code>\n",
            pnl_char(snapshot.pnl_percent),
            snapshot.label,
            format!("{}%", snapshot.pnl_percent.round() as i64),
            format!("{}$", snapshot.current_worth.round() as i64),
        ));
    }

    message.trim_end().to_string()
}

/// Latest gas price for /gas.
pub fn msg_gas(gas: Option<&GasPriceSnapshot>) -> String {
    match gas {
        Some(g) => format!(
            "<code>▪️ {:<10} {}$ ({} gwei)</code>\n\
             <code>▪️ {:<10} {}</code>",
            "Gas price:",
            fmt_trim2(g.price_usd),
            fmt_trim2(g.price_gwei),
            "Updated:",
            metrics::format_datetime_msk(g.timestamp),
        ),
        None => "<code>No gas price collected yet.</code>".to_string(),
    }
}

/// Scheduler state for /status.
pub fn msg_status(status: &SchedulerStatus) -> String {
    let state = if !status.running {
        "stopped"
    } else if status.busy {
        "collecting"
    } else {
        "idle"
    };
    let fmt_ts = |ts: Option<i64>| match ts {
        Some(ts) => metrics::format_datetime_msk(ts),
        None => "n/a".to_string(),
    };

    let mut message = format!(
        "<code>▪️ {:<11} {}</code>\n\
         <code>▪️ {:<11} {}</code>\n\
         <code>▪️ {:<11} {}</code>\n\
         <code>▪️ {:<11} {}</code>",
        "State:",
        state,
        "Last cycle:",
        fmt_ts(status.last_cycle_unix),
        "Next cycle:",
        fmt_ts(status.next_cycle_unix),
        "Missed:",
        status.missed_ticks,
    );

    if let Some(outcome) = &status.last_outcome {
        let gas_line = match outcome.gas_price_usd {
            Some(usd) => format!("{}$", fmt_trim2(usd)),
            None => "n/a".to_string(),
        };
        message.push_str(&format!(
            "\n\n<code>▪️ {:<11} {}</code>\n\
             <code>▪️ {:<11} {}</code>\n\
             <code>▪️ {:<11} {}</code>\n\
             <code>▪️ {:<11} {}</code>",
            "Updated:",
            outcome.tokens_updated,
            "Failed:",
            outcome.chains_failed,
            "Alerts:",
            outcome.alerts_sent,
            "Gas price:",
            gas_line,
        ));
    }

    message
}

/// Command overview for /help and /start.
pub fn msg_help() -> String {
    "🤖 <b>WatchBot</b>\n\n\
     /gas - latest gas price in USD\n\
     /info - portfolio report\n\
     /status - scheduler status\n\
     /logfile - send the current log file\n\
     /restart - run a collection cycle now\n\
     /help - show this menu"
        .to_string()
}

/// Inline keyboard attached to the help menu. Callback data mirrors the
/// slash commands so both entry points share one dispatch path.
pub fn help_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![btn("⛽ Gas", "gas"), btn("📊 Info", "info")],
        vec![btn("📟 Status", "status"), btn("📄 Log file", "log_file")],
        vec![btn("🔄 Restart", "restart")],
    ])
}

fn btn(text: &str, data: &str) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.to_string(), data.to_string())
}

/// Startup notice sent to the admin chat.
pub fn msg_online(version: &str) -> String {
    format!("🟢 <code>watchbot v{} online</code>", version)
}

/// Shutdown notice sent to the admin chat.
pub fn msg_offline(reason: &str) -> String {
    format!("🔴 <code>watchbot offline: {}</code>", reason)
}

/// Denial notice sent back to the requester.
pub fn msg_denied() -> String {
    "⛔ <code>access denied</code>".to_string()
}

/// Admin alert for a command from a principal outside the allow-list.
pub fn msg_unauthorized(principal: i64, name: &str, text: &str) -> String {
    format!(
        "⚠️ <b>Unauthorized access</b>\n\n\
         <code>▪️ {:<8} {}</code>\n\
         <code>▪️ {:<8} {}</code>\n\
         <code>▪️ {:<8} {}</code>",
        "ID:",
        principal,
        "Name:",
        escape_html(name),
        "Message:",
        escape_html(text),
    )
}
