//! Log formatting: colorized console output plus a plain file mirror.

use super::file::write_to_file;
use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Column widths for aligned output.
const TAG_WIDTH: usize = 10;
const LEVEL_WIDTH: usize = 8;

/// Format and output a log message to console and file.
pub fn format_and_log(tag: LogTag, level: &str, message: &str) {
    let now = Local::now();
    let time = now.format("%H:%M:%S").to_string();
    let timestamp = now.format("%Y-%m-%d %H:%M:%S").to_string();

    let tag_plain = tag.to_plain_string();
    let tag_str = colorize_tag(&tag, &format!("{:<width$}", tag_plain, width = TAG_WIDTH));
    let level_str = colorize_level(&format!("{:<width$}", level, width = LEVEL_WIDTH));

    let prefix = format!("{} [{}] [{}] ", time.dimmed(), tag_str, level_str);
    // Visible width of the prefix, for continuation-line indentation.
    let indent = " ".repeat(time.len() + TAG_WIDTH + LEVEL_WIDTH + 7);

    for (i, line) in message.split('\n').enumerate() {
        if i == 0 {
            print_stdout_safe(&format!("{}{}", prefix, line));
        } else {
            print_stdout_safe(&format!("{}{}", indent, line));
        }
        write_to_file(&format!("{} [{}] [{}] {}", timestamp, tag_plain, level, line));
    }
}

fn colorize_tag(tag: &LogTag, padded: &str) -> ColoredString {
    match tag {
        LogTag::System => padded.bright_yellow().bold(),
        LogTag::Config => padded.bright_white().bold(),
        LogTag::Scheduler => padded.bright_cyan().bold(),
        LogTag::Collector => padded.bright_green().bold(),
        LogTag::Api => padded.bright_purple().bold(),
        LogTag::Gas => padded.bright_blue().bold(),
        LogTag::Storage => padded.bright_magenta().bold(),
        LogTag::Telegram => padded.bright_cyan().bold(),
        LogTag::Test => padded.bright_blue().bold(),
        LogTag::Other(_) => padded.white().bold(),
    }
}

fn colorize_level(padded: &str) -> ColoredString {
    match padded.trim() {
        "ERROR" => padded.bright_red().bold(),
        "WARNING" => padded.bright_yellow(),
        "DEBUG" | "VERBOSE" => padded.dimmed(),
        _ => padded.white(),
    }
}

/// Print to stdout but ignore broken pipe errors.
fn print_stdout_safe(message: &str) {
    if let Err(e) = writeln!(stdout(), "{}", message) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
    if let Err(e) = stdout().flush() {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}
