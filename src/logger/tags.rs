/// Log tags identifying the subsystem a message originates from.
///
/// Tags drive both console coloring and per-module debug filtering
/// (`--debug-scheduler`, `--debug-api`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTag {
    System,
    Config,
    Scheduler,
    Collector,
    Api,
    Gas,
    Storage,
    Telegram,
    Test,
    Other(String),
}

impl LogTag {
    /// Uncolored tag text used for file output.
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Config => "CONFIG".to_string(),
            LogTag::Scheduler => "SCHEDULER".to_string(),
            LogTag::Collector => "COLLECTOR".to_string(),
            LogTag::Api => "API".to_string(),
            LogTag::Gas => "GAS".to_string(),
            LogTag::Storage => "STORAGE".to_string(),
            LogTag::Telegram => "TELEGRAM".to_string(),
            LogTag::Test => "TEST".to_string(),
            LogTag::Other(s) => s.to_uppercase(),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
