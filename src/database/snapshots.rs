use rusqlite::{params, Row};

use crate::database::Database;
use crate::errors::WatchResult;

/// One observation of a tracked token. Appended every cycle; `pnl_delta` is
/// the alert accumulator carried between cycles (reset to 0 when an alert
/// fires), so alerting survives restarts.
#[derive(Debug, Clone)]
pub struct TokenSnapshot {
    pub chain: String,
    pub address: String,
    pub label: String,
    pub timestamp: i64,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub volume_24h_usd: f64,
    pub cost_basis: f64,
    pub quantity: f64,
    pub current_worth: f64,
    pub pnl_percent: f64,
    pub pnl_delta: f64,
}

/// One observation of the gas price, taken once per cycle.
#[derive(Debug, Clone)]
pub struct GasPriceSnapshot {
    pub chain: String,
    pub timestamp: i64,
    pub price_gwei: f64,
    pub price_usd: f64,
}

impl Database {
    /// Append a token snapshot.
    pub fn append_token_snapshot(&self, snapshot: &TokenSnapshot) -> WatchResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO token_snapshots (
                chain, address, label, timestamp, price_usd, market_cap_usd,
                volume_24h_usd, cost_basis, quantity, current_worth,
                pnl_percent, pnl_delta
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                snapshot.chain,
                snapshot.address,
                snapshot.label,
                snapshot.timestamp,
                snapshot.price_usd,
                snapshot.market_cap_usd,
                snapshot.volume_24h_usd,
                snapshot.cost_basis,
                snapshot.quantity,
                snapshot.current_worth,
                snapshot.pnl_percent,
                snapshot.pnl_delta
            ],
        )?;

        Ok(())
    }

    /// Latest snapshot for one token, matched case-insensitively on address.
    pub fn latest_token_snapshot(
        &self,
        chain: &str,
        address: &str,
    ) -> WatchResult<Option<TokenSnapshot>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT * FROM token_snapshots
             WHERE chain = ?1 AND LOWER(address) = LOWER(?2)
             ORDER BY timestamp DESC
             LIMIT 1",
        )?;

        let mut rows = stmt.query_map(params![chain, address], row_to_token_snapshot)?;

        if let Some(snapshot) = rows.next() {
            return Ok(Some(snapshot?));
        }

        Ok(None)
    }

    /// Latest snapshot per tracked token, ordered by label.
    pub fn latest_token_set(&self) -> WatchResult<Vec<TokenSnapshot>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT ts.* FROM token_snapshots ts
             INNER JOIN (
                 SELECT chain, address, MAX(timestamp) AS latest_timestamp
                 FROM token_snapshots
                 GROUP BY chain, address
             ) latest ON ts.chain = latest.chain
                     AND ts.address = latest.address
                     AND ts.timestamp = latest.latest_timestamp
             ORDER BY ts.label",
        )?;

        let rows = stmt.query_map([], row_to_token_snapshot)?;

        let mut snapshots = Vec::new();
        for snapshot in rows {
            snapshots.push(snapshot?);
        }

        Ok(snapshots)
    }

    /// Append a gas price snapshot.
    pub fn append_gas_snapshot(&self, snapshot: &GasPriceSnapshot) -> WatchResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO gas_snapshots (chain, timestamp, price_gwei, price_usd)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                snapshot.chain,
                snapshot.timestamp,
                snapshot.price_gwei,
                snapshot.price_usd
            ],
        )?;

        Ok(())
    }

    /// Latest gas snapshot, if any cycle has recorded one.
    pub fn latest_gas_snapshot(&self) -> WatchResult<Option<GasPriceSnapshot>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT chain, timestamp, price_gwei, price_usd FROM gas_snapshots
             ORDER BY timestamp DESC
             LIMIT 1",
        )?;

        let mut rows = stmt.query_map([], |row| {
            Ok(GasPriceSnapshot {
                chain: row.get("chain")?,
                timestamp: row.get("timestamp")?,
                price_gwei: row.get("price_gwei")?,
                price_usd: row.get("price_usd")?,
            })
        })?;

        if let Some(snapshot) = rows.next() {
            return Ok(Some(snapshot?));
        }

        Ok(None)
    }
}

fn row_to_token_snapshot(row: &Row) -> rusqlite::Result<TokenSnapshot> {
    Ok(TokenSnapshot {
        chain: row.get("chain")?,
        address: row.get("address")?,
        label: row.get("label")?,
        timestamp: row.get("timestamp")?,
        price_usd: row.get("price_usd")?,
        market_cap_usd: row.get("market_cap_usd")?,
        volume_24h_usd: row.get("volume_24h_usd")?,
        cost_basis: row.get("cost_basis")?,
        quantity: row.get("quantity")?,
        current_worth: row.get("current_worth")?,
        pnl_percent: row.get("pnl_percent")?,
        pnl_delta: row.get("pnl_delta")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_test_db(dir: &tempfile::TempDir) -> Database {
        let path = dir.path().join("test.db");
        Database::open(path.to_str().unwrap()).unwrap()
    }

    fn sample_snapshot(timestamp: i64, pnl_percent: f64, pnl_delta: f64) -> TokenSnapshot {
        TokenSnapshot {
            chain: "eth".to_string(),
            address: "0xABCDEF".to_string(),
            label: "TEST".to_string(),
            timestamp,
            price_usd: 1.5,
            market_cap_usd: 1_000_000.0,
            volume_24h_usd: 50_000.0,
            cost_basis: 100.0,
            quantity: 100.0,
            current_worth: 150.0,
            pnl_percent,
            pnl_delta,
        }
    }

    #[test]
    fn test_latest_returns_max_timestamp() {
        let dir = tempdir().unwrap();
        let db = open_test_db(&dir);

        db.append_token_snapshot(&sample_snapshot(100, 10.0, 10.0))
            .unwrap();
        db.append_token_snapshot(&sample_snapshot(200, 25.0, 15.0))
            .unwrap();

        let latest = db
            .latest_token_snapshot("eth", "0xABCDEF")
            .unwrap()
            .unwrap();
        assert_eq!(latest.timestamp, 200);
        assert!((latest.pnl_percent - 25.0).abs() < 1e-9);
        assert!((latest.pnl_delta - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_latest_matches_address_case_insensitively() {
        let dir = tempdir().unwrap();
        let db = open_test_db(&dir);

        db.append_token_snapshot(&sample_snapshot(100, 10.0, 10.0))
            .unwrap();

        let latest = db.latest_token_snapshot("eth", "0xabcdef").unwrap();
        assert!(latest.is_some());

        let other_chain = db.latest_token_snapshot("bsc", "0xabcdef").unwrap();
        assert!(other_chain.is_none());
    }

    #[test]
    fn test_latest_on_empty_database() {
        let dir = tempdir().unwrap();
        let db = open_test_db(&dir);

        assert!(db.latest_token_snapshot("eth", "0x1").unwrap().is_none());
        assert!(db.latest_gas_snapshot().unwrap().is_none());
        assert!(db.latest_token_set().unwrap().is_empty());
    }

    #[test]
    fn test_latest_set_one_row_per_key() {
        let dir = tempdir().unwrap();
        let db = open_test_db(&dir);

        let mut a_old = sample_snapshot(100, 1.0, 1.0);
        a_old.label = "AAA".to_string();
        a_old.address = "0xaaa".to_string();
        let mut a_new = a_old.clone();
        a_new.timestamp = 200;
        a_new.pnl_percent = 2.0;

        let mut b = sample_snapshot(150, 5.0, 5.0);
        b.label = "BBB".to_string();
        b.address = "0xbbb".to_string();

        db.append_token_snapshot(&a_old).unwrap();
        db.append_token_snapshot(&a_new).unwrap();
        db.append_token_snapshot(&b).unwrap();

        let set = db.latest_token_set().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set[0].label, "AAA");
        assert_eq!(set[0].timestamp, 200);
        assert!((set[0].pnl_percent - 2.0).abs() < 1e-9);
        assert_eq!(set[1].label, "BBB");
        assert_eq!(set[1].timestamp, 150);
    }

    #[test]
    fn test_gas_snapshot_roundtrip() {
        let dir = tempdir().unwrap();
        let db = open_test_db(&dir);

        db.append_gas_snapshot(&GasPriceSnapshot {
            chain: "eth".to_string(),
            timestamp: 100,
            price_gwei: 25.0,
            price_usd: 17.81,
        })
        .unwrap();
        db.append_gas_snapshot(&GasPriceSnapshot {
            chain: "eth".to_string(),
            timestamp: 200,
            price_gwei: 30.0,
            price_usd: 21.37,
        })
        .unwrap();

        let latest = db.latest_gas_snapshot().unwrap().unwrap();
        assert_eq!(latest.timestamp, 200);
        assert!((latest.price_gwei - 30.0).abs() < 1e-9);
        assert!((latest.price_usd - 21.37).abs() < 1e-9);
    }
}
