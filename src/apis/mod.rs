//! External API clients.
//!
//! Each client owns a proxied reqwest client, a request pacer, and the
//! crate retry policy. Construction is from the loaded configuration.

pub mod etherscan;
pub mod geckoterminal;

pub use etherscan::{gas_price_usd, EtherscanClient};
pub use geckoterminal::{GeckoTerminalClient, TokenQuote};
