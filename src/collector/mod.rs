//! Collection cycle: fetch token metrics per chain, compute PnL against the
//! configured cost basis, persist snapshots and send threshold alerts.
//!
//! One `Collector` is built per cycle from an immutable config snapshot, so
//! a config reload mid-cycle never changes what the running cycle sees. Per
//! item isolation holds throughout: a failed chain or token is logged and
//! skipped, the rest of the cycle proceeds.

use crate::apis::{gas_price_usd, EtherscanClient, GeckoTerminalClient, TokenQuote};
use crate::config::{AlertsConfig, Config, TrackedToken};
use crate::database::{Database, GasPriceSnapshot, TokenSnapshot};
use crate::errors::WatchResult;
use crate::logger::{self, LogTag};
use crate::metrics;
use crate::telegram::formatters;
use crate::telegram::notifier::TelegramNotifier;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one cycle did, for status reporting and logs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleOutcome {
    /// Tokens fetched, computed and persisted.
    pub tokens_updated: usize,
    /// Chains whose multi-token fetch failed entirely.
    pub chains_failed: usize,
    /// Alert messages actually delivered.
    pub alerts_sent: usize,
    /// Gas price collected this cycle, if the oracle was reachable.
    pub gas_price_usd: Option<f64>,
    pub duration_ms: u64,
}

/// Result of the accumulated-movement check for one token.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Evaluation {
    /// Movement value carried by the alert message.
    accumulated: f64,
    /// Accumulator value persisted with the snapshot.
    stored_delta: f64,
    alert: bool,
}

type ChainFetch = (String, Vec<TrackedToken>, WatchResult<Vec<TokenQuote>>);

/// Group configured tokens by chain, dropping case-insensitive duplicate
/// addresses within a chain. BTreeMap keeps chain order stable.
pub fn merge_addresses(tokens: &[TrackedToken]) -> BTreeMap<String, Vec<TrackedToken>> {
    let mut chains: BTreeMap<String, Vec<TrackedToken>> = BTreeMap::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for token in tokens {
        let key = (token.chain.clone(), token.address.to_lowercase());
        if !seen.insert(key) {
            logger::debug(
                LogTag::Collector,
                &format!(
                    "Duplicate address {} on {}, keeping the first entry",
                    token.address, token.chain
                ),
            );
            continue;
        }
        chains.entry(token.chain.clone()).or_default().push(token.clone());
    }

    chains
}

/// Accumulated PnL movement against the previous snapshot.
///
/// A token with no history is a first observation: it is reported as a
/// baseline and its accumulator starts at the current PnL. Afterwards the
/// accumulator grows by the per-cycle PnL step and resets to 0 whenever it
/// crosses a threshold. The optional single-cycle price-move trigger
/// reports without touching the accumulator.
fn evaluate_movement(
    alerts: &AlertsConfig,
    prev: Option<&TokenSnapshot>,
    pnl_percent: f64,
) -> Evaluation {
    let prev = match prev {
        Some(prev) => prev,
        None => {
            return Evaluation {
                accumulated: pnl_percent,
                stored_delta: pnl_percent,
                alert: true,
            };
        }
    };

    let step = metrics::round2(pnl_percent - prev.pnl_percent);
    let accumulated = metrics::round2(prev.pnl_delta + step);
    let crossed = accumulated > alerts.pnl_delta_up || accumulated < alerts.pnl_delta_down;
    let price_moved = alerts.price_move_percent > 0.0 && step.abs() >= alerts.price_move_percent;

    Evaluation {
        accumulated,
        stored_delta: if crossed { 0.0 } else { accumulated },
        alert: crossed || price_moved,
    }
}

/// Runs one collection cycle over an immutable config snapshot.
pub struct Collector {
    config: Config,
    db: Arc<Database>,
    gecko: GeckoTerminalClient,
    etherscan: EtherscanClient,
    notifier: Option<TelegramNotifier>,
}

impl Collector {
    pub fn new(
        config: Config,
        db: Arc<Database>,
        notifier: Option<TelegramNotifier>,
    ) -> WatchResult<Self> {
        let gecko = GeckoTerminalClient::from_config(&config)?;
        let etherscan = EtherscanClient::from_config(&config)?;
        Ok(Self {
            config,
            db,
            gecko,
            etherscan,
            notifier,
        })
    }

    /// Run the full cycle: merge, fetch, compute, persist, gas, report.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let started = Instant::now();
        let timestamp = Utc::now().timestamp();
        let mut outcome = CycleOutcome::default();

        if self.config.tokens.is_empty() {
            logger::warning(LogTag::Collector, "No tokens configured, nothing to collect");
            return outcome;
        }

        let chains = merge_addresses(&self.config.tokens);
        let limit = self.config.watcher.max_parallel_fetches.max(1);

        let mut fetches: Vec<ChainFetch> = stream::iter(chains.into_iter().map(
            |(chain, tokens)| async move {
                let addresses: Vec<String> =
                    tokens.iter().map(|t| t.address.clone()).collect();
                let result = self.gecko.fetch_tokens_multi(&chain, &addresses).await;
                (chain, tokens, result)
            },
        ))
        .buffer_unordered(limit)
        .collect()
        .await;

        // Completion order varies with the network; restore chain order so
        // alert messages come out the same way every cycle.
        fetches.sort_by(|a, b| a.0.cmp(&b.0));

        let alerts = self.process_fetches(fetches, timestamp, &mut outcome);

        match self.collect_gas(timestamp).await {
            Ok(snapshot) => {
                outcome.gas_price_usd = Some(snapshot.price_usd);
                if let Err(e) = self.db.append_gas_snapshot(&snapshot) {
                    logger::error(
                        LogTag::Storage,
                        &format!("Failed to persist gas snapshot: {}", e),
                    );
                }
            }
            Err(e) => {
                logger::warning(LogTag::Gas, &format!("Gas price unavailable this cycle: {}", e));
            }
        }

        self.send_alerts(&alerts, &mut outcome).await;

        outcome.duration_ms = started.elapsed().as_millis() as u64;
        logger::info(
            LogTag::Collector,
            &format!(
                "Cycle done: {} updated, {} alerts, {} failed chains, {}ms",
                outcome.tokens_updated, outcome.alerts_sent, outcome.chains_failed, outcome.duration_ms
            ),
        );
        outcome
    }

    /// Process fetch results chain by chain. Failed chains are counted and
    /// skipped; the others are computed and persisted.
    fn process_fetches(
        &self,
        fetches: Vec<ChainFetch>,
        timestamp: i64,
        outcome: &mut CycleOutcome,
    ) -> Vec<(TokenSnapshot, f64)> {
        let mut alerts = Vec::new();

        for (chain, tokens, result) in fetches {
            match result {
                Ok(quotes) => {
                    self.process_chain(&chain, &tokens, &quotes, timestamp, outcome, &mut alerts)
                }
                Err(e) => {
                    outcome.chains_failed += 1;
                    logger::error(
                        LogTag::Collector,
                        &format!("Chain {} fetch failed: {}", chain, e),
                    );
                }
            }
        }

        alerts
    }

    fn process_chain(
        &self,
        chain: &str,
        tokens: &[TrackedToken],
        quotes: &[TokenQuote],
        timestamp: i64,
        outcome: &mut CycleOutcome,
        alerts: &mut Vec<(TokenSnapshot, f64)>,
    ) {
        let by_address: HashMap<String, &TokenQuote> =
            quotes.iter().map(|q| (q.address.to_lowercase(), q)).collect();

        for token in tokens {
            let quote = match by_address.get(&token.address.to_lowercase()) {
                Some(quote) => *quote,
                None => {
                    logger::debug(
                        LogTag::Collector,
                        &format!("No quote returned for {} on {}", token.label, chain),
                    );
                    continue;
                }
            };

            let computed = metrics::worth(token.cost_basis, quote.price_usd, token.quantity);
            if computed.total_cost == 0.0 {
                logger::warning(
                    LogTag::Collector,
                    &format!("Skipping {}: zero buy cost", token.label),
                );
                continue;
            }
            if computed.current_worth == 0.0 {
                logger::warning(
                    LogTag::Collector,
                    &format!("Skipping {}: zero current cost", token.label),
                );
                continue;
            }

            let prev = match self.db.latest_token_snapshot(chain, &token.address) {
                Ok(prev) => prev,
                Err(e) => {
                    logger::error(
                        LogTag::Storage,
                        &format!("History read for {} failed: {}", token.label, e),
                    );
                    continue;
                }
            };

            let evaluation =
                evaluate_movement(&self.config.alerts, prev.as_ref(), computed.pnl_percent);

            let snapshot = TokenSnapshot {
                chain: chain.to_string(),
                address: token.address.clone(),
                label: token.label.clone(),
                timestamp,
                price_usd: quote.price_usd,
                market_cap_usd: quote.market_cap_usd,
                volume_24h_usd: quote.volume_24h_usd,
                cost_basis: computed.total_cost,
                quantity: token.quantity,
                current_worth: computed.current_worth,
                pnl_percent: computed.pnl_percent,
                pnl_delta: evaluation.stored_delta,
            };

            if let Err(e) = self.db.append_token_snapshot(&snapshot) {
                logger::error(
                    LogTag::Storage,
                    &format!("Failed to persist snapshot for {}: {}", token.label, e),
                );
                continue;
            }
            outcome.tokens_updated += 1;

            let last_display = prev
                .as_ref()
                .map(|p| p.pnl_percent.to_string())
                .unwrap_or_else(|| "-".to_string());
            logger::info(
                LogTag::Collector,
                &format!(
                    "token: {:<8} pnl: {:<8} last: {:<8} delta: {:<8}",
                    token.label, computed.pnl_percent, last_display, evaluation.stored_delta
                ),
            );

            if evaluation.alert {
                alerts.push((snapshot, evaluation.accumulated));
            }
        }
    }

    /// Gas oracle gwei plus the reference ETH price give the per-swap USD
    /// estimate. Collected once per cycle, independent of the token loop.
    async fn collect_gas(&self, timestamp: i64) -> WatchResult<GasPriceSnapshot> {
        let gwei = self.etherscan.fetch_gas_gwei().await?;
        let eth_price = self
            .gecko
            .fetch_reference_price(
                &self.config.api.eth_chain,
                &self.config.api.eth_reference_address,
            )
            .await?;

        Ok(GasPriceSnapshot {
            chain: self.config.api.eth_chain.clone(),
            timestamp,
            price_gwei: gwei,
            price_usd: gas_price_usd(gwei, eth_price),
        })
    }

    /// Send alert cards sequentially with the configured pause between
    /// them. A failed send is logged and skipped; the cycle still counts as
    /// done.
    async fn send_alerts(&self, alerts: &[(TokenSnapshot, f64)], outcome: &mut CycleOutcome) {
        if alerts.is_empty() {
            return;
        }

        let notifier = match &self.notifier {
            Some(notifier) => notifier,
            None => {
                logger::info(
                    LogTag::Collector,
                    &format!("{} alerts suppressed, Telegram disabled", alerts.len()),
                );
                return;
            }
        };

        let pause = Duration::from_secs(self.config.watcher.report_send_interval_seconds);
        for (i, (snapshot, accumulated)) in alerts.iter().enumerate() {
            if i > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }

            let message = formatters::msg_token_alert(
                snapshot,
                *accumulated,
                self.config.alerts.pnl_delta_up,
                self.config.alerts.pnl_delta_down,
            );
            match notifier.send_message(&message).await {
                Ok(()) => outcome.alerts_sent += 1,
                Err(e) => {
                    logger::error(
                        LogTag::Telegram,
                        &format!("Alert for {} failed: {}", snapshot.label, e),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WatchError;

    fn tracked(label: &str, chain: &str, address: &str, cost: f64, quantity: f64) -> TrackedToken {
        TrackedToken {
            label: label.to_string(),
            chain: chain.to_string(),
            address: address.to_string(),
            cost_basis: cost,
            quantity,
        }
    }

    fn quote(address: &str, price: f64) -> TokenQuote {
        TokenQuote {
            address: address.to_string(),
            price_usd: price,
            market_cap_usd: 1_000_000.0,
            volume_24h_usd: 50_000.0,
        }
    }

    fn collector_with(tokens: Vec<TrackedToken>, alerts: AlertsConfig) -> (tempfile::TempDir, Collector) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collector.db");
        let db = Arc::new(Database::open(path.to_str().unwrap()).unwrap());

        let mut config = Config::default();
        config.tokens = tokens;
        config.alerts = alerts;

        let collector = Collector::new(config, db, None).unwrap();
        (dir, collector)
    }

    fn run_quotes(
        collector: &Collector,
        chain: &str,
        quotes: Vec<TokenQuote>,
        timestamp: i64,
    ) -> (CycleOutcome, Vec<(TokenSnapshot, f64)>) {
        let tokens: Vec<TrackedToken> = collector
            .config
            .tokens
            .iter()
            .filter(|t| t.chain == chain)
            .cloned()
            .collect();
        let mut outcome = CycleOutcome::default();
        let alerts = collector.process_fetches(
            vec![(chain.to_string(), tokens, Ok(quotes))],
            timestamp,
            &mut outcome,
        );
        (outcome, alerts)
    }

    #[test]
    fn test_merge_addresses_groups_and_dedups() {
        let tokens = vec![
            tracked("PEPE", "eth", "0xAAA", 100.0, 10.0),
            tracked("PEPE2", "eth", "0xaaa", 50.0, 5.0),
            tracked("WOJAK", "eth", "0xBBB", 10.0, 1.0),
            tracked("BONK", "solana", "0xAAA", 20.0, 2.0),
        ];

        let chains = merge_addresses(&tokens);

        assert_eq!(chains.len(), 2);
        // Case-insensitive duplicate within eth dropped, first entry kept.
        let eth: Vec<&str> = chains["eth"].iter().map(|t| t.label.as_str()).collect();
        assert_eq!(eth, vec!["PEPE", "WOJAK"]);
        // Same address on another chain is a distinct key.
        assert_eq!(chains["solana"].len(), 1);
    }

    #[test]
    fn test_evaluate_first_observation_is_baseline_alert() {
        let alerts = AlertsConfig::default();
        let evaluation = evaluate_movement(&alerts, None, 42.5);

        assert!(evaluation.alert);
        assert_eq!(evaluation.accumulated, 42.5);
        assert_eq!(evaluation.stored_delta, 42.5);
    }

    #[test]
    fn test_evaluate_accumulates_below_threshold() {
        let alerts = AlertsConfig::default(); // up 10, down -10
        let prev = TokenSnapshot {
            pnl_percent: 5.0,
            pnl_delta: 4.0,
            ..blank_snapshot()
        };

        // Step +3 on top of 4 accumulated: 7, inside the band.
        let evaluation = evaluate_movement(&alerts, Some(&prev), 8.0);
        assert!(!evaluation.alert);
        assert_eq!(evaluation.accumulated, 7.0);
        assert_eq!(evaluation.stored_delta, 7.0);
    }

    #[test]
    fn test_evaluate_crossing_resets_accumulator() {
        let alerts = AlertsConfig::default();
        let prev = TokenSnapshot {
            pnl_percent: 5.0,
            pnl_delta: 7.0,
            ..blank_snapshot()
        };

        // Step +5: accumulated 12 crosses +10.
        let up = evaluate_movement(&alerts, Some(&prev), 10.0);
        assert!(up.alert);
        assert_eq!(up.accumulated, 12.0);
        assert_eq!(up.stored_delta, 0.0);

        // Step -20: accumulated -13 crosses -10.
        let down = evaluate_movement(&alerts, Some(&prev), -15.0);
        assert!(down.alert);
        assert_eq!(down.accumulated, -13.0);
        assert_eq!(down.stored_delta, 0.0);
    }

    #[test]
    fn test_evaluate_price_move_trigger_keeps_accumulator() {
        let alerts = AlertsConfig {
            pnl_delta_up: 50.0,
            pnl_delta_down: -50.0,
            price_move_percent: 5.0,
        };
        let prev = TokenSnapshot {
            pnl_percent: 0.0,
            pnl_delta: 0.0,
            ..blank_snapshot()
        };

        // Single-cycle move of 8 points: reported, accumulator untouched.
        let evaluation = evaluate_movement(&alerts, Some(&prev), 8.0);
        assert!(evaluation.alert);
        assert_eq!(evaluation.stored_delta, 8.0);

        // Disabled predicate (0.0) never fires on its own.
        let quiet = AlertsConfig {
            price_move_percent: 0.0,
            ..alerts
        };
        assert!(!evaluate_movement(&quiet, Some(&prev), 8.0).alert);
    }

    #[test]
    fn test_cycle_pnl_and_threshold_alert() {
        // 10 units bought for 100 total; price 15 makes worth 150, PnL 50.
        let (_dir, collector) = collector_with(
            vec![tracked("PEPE", "eth", "0xAAA", 100.0, 10.0)],
            AlertsConfig {
                pnl_delta_up: 10.0,
                pnl_delta_down: -10.0,
                price_move_percent: 0.0,
            },
        );

        let (outcome, alerts) = run_quotes(&collector, "eth", vec![quote("0xaaa", 15.0)], 1000);

        assert_eq!(outcome.tokens_updated, 1);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0.pnl_percent, 50.0);
        assert_eq!(alerts[0].1, 50.0);

        let stored = collector
            .db
            .latest_token_snapshot("eth", "0xAAA")
            .unwrap()
            .unwrap();
        assert_eq!(stored.pnl_percent, 50.0);
        assert_eq!(stored.current_worth, 150.0);
    }

    #[test]
    fn test_cycle_high_threshold_persists_without_alert() {
        let (_dir, collector) = collector_with(
            vec![tracked("PEPE", "eth", "0xAAA", 100.0, 10.0)],
            AlertsConfig {
                pnl_delta_up: 60.0,
                pnl_delta_down: -60.0,
                price_move_percent: 0.0,
            },
        );

        // First observation always reports; the second cycle's +50 stays
        // inside the ±60 band.
        run_quotes(&collector, "eth", vec![quote("0xaaa", 10.0)], 1000);
        let (outcome, alerts) = run_quotes(&collector, "eth", vec![quote("0xaaa", 15.0)], 2000);

        assert_eq!(outcome.tokens_updated, 1);
        assert!(alerts.is_empty());

        let stored = collector
            .db
            .latest_token_snapshot("eth", "0xAAA")
            .unwrap()
            .unwrap();
        assert_eq!(stored.timestamp, 2000);
        assert_eq!(stored.pnl_percent, 50.0);
        assert_eq!(stored.pnl_delta, 50.0);
    }

    #[test]
    fn test_cycle_accumulator_resets_after_alert() {
        let (_dir, collector) = collector_with(
            vec![tracked("PEPE", "eth", "0xAAA", 100.0, 10.0)],
            AlertsConfig {
                pnl_delta_up: 10.0,
                pnl_delta_down: -10.0,
                price_move_percent: 0.0,
            },
        );

        // Baseline, then +50 crosses the threshold and resets to 0.
        run_quotes(&collector, "eth", vec![quote("0xaaa", 10.0)], 1000);
        let (_, alerts) = run_quotes(&collector, "eth", vec![quote("0xaaa", 15.0)], 2000);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].1, 50.0);

        let stored = collector
            .db
            .latest_token_snapshot("eth", "0xAAA")
            .unwrap()
            .unwrap();
        assert_eq!(stored.pnl_delta, 0.0);

        // A small move after the reset accumulates from zero, no alert.
        let (_, alerts) = run_quotes(&collector, "eth", vec![quote("0xaaa", 15.5)], 3000);
        assert!(alerts.is_empty());
        let stored = collector
            .db
            .latest_token_snapshot("eth", "0xAAA")
            .unwrap()
            .unwrap();
        assert_eq!(stored.pnl_delta, 5.0);
    }

    #[test]
    fn test_failed_chain_does_not_block_others() {
        let (_dir, collector) = collector_with(
            vec![
                tracked("PEPE", "eth", "0xAAA", 100.0, 10.0),
                tracked("BONK", "solana", "0xBBB", 50.0, 100.0),
            ],
            AlertsConfig::default(),
        );

        let fetches: Vec<ChainFetch> = vec![
            (
                "eth".to_string(),
                vec![tracked("PEPE", "eth", "0xAAA", 100.0, 10.0)],
                Err(WatchError::Network("connection refused".to_string())),
            ),
            (
                "solana".to_string(),
                vec![tracked("BONK", "solana", "0xBBB", 50.0, 100.0)],
                Ok(vec![quote("0xbbb", 1.0)]),
            ),
        ];

        let mut outcome = CycleOutcome::default();
        collector.process_fetches(fetches, 1000, &mut outcome);

        assert_eq!(outcome.chains_failed, 1);
        assert_eq!(outcome.tokens_updated, 1);
        assert!(collector
            .db
            .latest_token_snapshot("solana", "0xBBB")
            .unwrap()
            .is_some());
        assert!(collector
            .db
            .latest_token_snapshot("eth", "0xAAA")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_zero_cost_positions_skipped() {
        let (_dir, collector) = collector_with(
            vec![
                tracked("FREE", "eth", "0xAAA", 0.0, 10.0),
                tracked("DEAD", "eth", "0xBBB", 100.0, 10.0),
            ],
            AlertsConfig::default(),
        );

        let (outcome, _) = run_quotes(
            &collector,
            "eth",
            vec![quote("0xaaa", 5.0), quote("0xbbb", 0.0)],
            1000,
        );

        // Zero buy cost and zero current cost both skip persistence.
        assert_eq!(outcome.tokens_updated, 0);
        assert!(collector
            .db
            .latest_token_snapshot("eth", "0xAAA")
            .unwrap()
            .is_none());
        assert!(collector
            .db
            .latest_token_snapshot("eth", "0xBBB")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_missing_quote_skipped() {
        let (_dir, collector) = collector_with(
            vec![
                tracked("PEPE", "eth", "0xAAA", 100.0, 10.0),
                tracked("GONE", "eth", "0xCCC", 100.0, 10.0),
            ],
            AlertsConfig::default(),
        );

        let (outcome, _) = run_quotes(&collector, "eth", vec![quote("0xaaa", 10.0)], 1000);

        assert_eq!(outcome.tokens_updated, 1);
        assert!(collector
            .db
            .latest_token_snapshot("eth", "0xCCC")
            .unwrap()
            .is_none());
    }

    fn blank_snapshot() -> TokenSnapshot {
        TokenSnapshot {
            chain: "eth".to_string(),
            address: "0xAAA".to_string(),
            label: "PEPE".to_string(),
            timestamp: 0,
            price_usd: 0.0,
            market_cap_usd: 0.0,
            volume_24h_usd: 0.0,
            cost_basis: 0.0,
            quantity: 0.0,
            current_worth: 0.0,
            pnl_percent: 0.0,
            pnl_delta: 0.0,
        }
    }
}
