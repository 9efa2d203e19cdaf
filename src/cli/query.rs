//! Query command implementation

use crate::config::Config;
use crate::store::{SnapshotQuery, SnapshotStore};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Only show snapshots for this market
    #[arg(long)]
    pub market_id: Option<String>,

    /// Inclusive lower timestamp bound (RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    /// Inclusive upper timestamp bound (RFC 3339)
    #[arg(long)]
    pub until: Option<String>,

    /// Maximum number of rows to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Path to the SQLite snapshot database
    #[arg(long)]
    pub db_path: Option<PathBuf>,
}

impl QueryArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let path = self
            .db_path
            .clone()
            .unwrap_or_else(|| config.recorder.db_path.clone());
        let store = SnapshotStore::new(path);
        store.init()?;

        let query = SnapshotQuery {
            market_id: self.market_id.clone(),
            start: parse_bound(self.since.as_deref()).context("Invalid --since timestamp")?,
            end: parse_bound(self.until.as_deref()).context("Invalid --until timestamp")?,
            limit: self.limit,
        };

        let snapshots = store.query_market_snapshots(&query)?;
        if snapshots.is_empty() {
            println!("No market snapshots matched");
        }
        for snapshot in &snapshots {
            println!(
                "{}  {}  yes={} no={} gap={} spread={}",
                snapshot.timestamp.to_rfc3339(),
                snapshot.market_id,
                snapshot.yes_price,
                snapshot.no_price,
                snapshot.parity_gap,
                snapshot
                    .spread
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }

        println!();
        for (table, count) in store.table_counts()? {
            println!("{:24} {:>10} rows", table, count);
        }

        store.close();
        Ok(())
    }
}

fn parse_bound(value: Option<&str>) -> anyhow::Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(Into::into)
        })
        .transpose()
}
