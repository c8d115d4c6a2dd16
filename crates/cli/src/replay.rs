//! CSV replay: loads recorded bars and option chain rows, groups them into ticks by
//! timestamp and drives them through the orchestrator.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use regime_engine_core::{
    Bar, ContractRecord, OptionChain, PortfolioFacts, RegimeState, SymbolsConfig, Tick,
    TradeIntent,
};
use regime_engine_orchestrator::Orchestrator;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

/// One row of the bars file: `timestamp,symbol,open,high,low,close,volume`.
#[derive(Debug, Clone)]
pub struct BarRow {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub bar: Bar,
}

/// One row of the chains file:
/// `timestamp,underlying,expiry,strike,right,bid,ask,open_interest,volume,delta,implied_volatility`.
#[derive(Debug, Clone)]
pub struct ChainRow {
    pub timestamp: DateTime<Utc>,
    pub underlying: String,
    pub record: ContractRecord,
}

/// One row of the seed file: `date,symbol,close`.
#[derive(Debug, Clone)]
pub struct SeedRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub close: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub ticks: usize,
    pub intents: usize,
    pub regime: Option<RegimeState>,
}

#[derive(Serialize)]
struct IntentLine<'a> {
    timestamp: DateTime<Utc>,
    regime: Option<RegimeState>,
    #[serde(flatten)]
    intent: &'a TradeIntent,
}

/// Loads the bars file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a row fails to parse; the message
/// names the offending line.
pub fn load_bars(path: &Path) -> Result<Vec<BarRow>> {
    read_rows(path, |record| {
        Ok(BarRow {
            timestamp: field(record, 0)?.parse()?,
            symbol: field(record, 1)?.to_uppercase(),
            bar: Bar {
                open: Decimal::from_str(field(record, 2)?)?,
                high: Decimal::from_str(field(record, 3)?)?,
                low: Decimal::from_str(field(record, 4)?)?,
                close: Decimal::from_str(field(record, 5)?)?,
                volume: Decimal::from_str(field(record, 6)?)?,
            },
        })
    })
}

/// Loads the chains file. Empty quote and greek columns become `None`; rights are
/// checked later, when the rows are turned into chains.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a row fails to parse.
pub fn load_chains(path: &Path) -> Result<Vec<ChainRow>> {
    read_rows(path, |record| {
        Ok(ChainRow {
            timestamp: field(record, 0)?.parse()?,
            underlying: field(record, 1)?.to_uppercase(),
            record: ContractRecord {
                expiry: NaiveDate::from_str(field(record, 2)?)?,
                strike: Decimal::from_str(field(record, 3)?)?,
                right: field(record, 4)?.to_string(),
                bid: optional(record, 5, Decimal::from_str)?,
                ask: optional(record, 6, Decimal::from_str)?,
                open_interest: optional(record, 7, u64::from_str)?,
                volume: optional(record, 8, u64::from_str)?,
                delta: optional(record, 9, f64::from_str)?,
                implied_volatility: optional(record, 10, f64::from_str)?,
            },
        })
    })
}

/// Loads completed daily closes used to warm the regime history.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a row fails to parse.
pub fn load_seed(path: &Path) -> Result<Vec<SeedRow>> {
    read_rows(path, |record| {
        Ok(SeedRow {
            date: NaiveDate::from_str(field(record, 0)?)?,
            symbol: field(record, 1)?.to_uppercase(),
            close: f64::from_str(field(record, 2)?)?,
        })
    })
}

/// Splits seed rows into the index and volatility series the classifier reads.
#[must_use]
pub fn split_seed(
    rows: &[SeedRow],
    symbols: &SymbolsConfig,
) -> (Vec<(NaiveDate, f64)>, Vec<(NaiveDate, f64)>) {
    let series = |symbol: &str| {
        rows.iter()
            .filter(|row| row.symbol.eq_ignore_ascii_case(symbol))
            .map(|row| (row.date, row.close))
            .collect::<Vec<_>>()
    };
    (series(&symbols.index), series(&symbols.volatility))
}

#[derive(Default)]
struct Frame {
    bars: Vec<(String, Bar)>,
    chains: BTreeMap<String, Vec<ContractRecord>>,
}

/// Groups rows into chronologically ordered ticks over a flat portfolio of `equity`
/// cash. Every underlying with a chain in a tick joins that tick's universe.
#[must_use]
pub fn build_ticks(bars: Vec<BarRow>, chains: Vec<ChainRow>, equity: Decimal) -> Vec<Tick> {
    let mut frames: BTreeMap<DateTime<Utc>, Frame> = BTreeMap::new();
    for row in bars {
        frames.entry(row.timestamp).or_default().bars.push((row.symbol, row.bar));
    }
    for row in chains {
        frames
            .entry(row.timestamp)
            .or_default()
            .chains
            .entry(row.underlying)
            .or_default()
            .push(row.record);
    }

    frames
        .into_iter()
        .map(|(timestamp, frame)| {
            let mut tick = Tick::new(timestamp, PortfolioFacts::all_cash(equity));
            for (symbol, bar) in frame.bars {
                tick = tick.with_bar(&symbol, bar);
            }
            for (underlying, records) in frame.chains {
                tick.universe.push(underlying.clone());
                tick = tick.with_chain(OptionChain::from_records(&underlying, records));
            }
            tick
        })
        .collect()
}

/// Runs every tick through the engine and writes each intent as one JSON line.
///
/// # Errors
///
/// Returns an error if serialization or the writer fails.
pub fn run<W: Write>(engine: &mut Orchestrator, ticks: &[Tick], out: &mut W) -> Result<ReplaySummary> {
    let mut intents = 0;
    for tick in ticks {
        let produced = engine.on_tick(tick);
        let regime = engine.regime();
        for intent in &produced {
            let line = IntentLine {
                timestamp: tick.timestamp,
                regime,
                intent,
            };
            serde_json::to_writer(&mut *out, &line)?;
            writeln!(out)?;
        }
        if !produced.is_empty() {
            debug!(timestamp = %tick.timestamp, count = produced.len(), "Tick produced intents");
        }
        intents += produced.len();
    }
    out.flush()?;

    let summary = ReplaySummary {
        ticks: ticks.len(),
        intents,
        regime: engine.regime(),
    };
    info!(
        ticks = summary.ticks,
        intents = summary.intents,
        regime = ?summary.regime,
        "Replay complete"
    );
    Ok(summary)
}

fn read_rows<T>(path: &Path, parse: impl Fn(&csv::StringRecord) -> Result<T>) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.with_context(|| format!("Failed to read {}", path.display()))?;
        let line = record.position().map_or(0, csv::Position::line);
        let row = parse(&record)
            .with_context(|| format!("Invalid row at {}:{line}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

fn field(record: &csv::StringRecord, index: usize) -> Result<&str> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| anyhow!("missing column {index}"))
}

fn optional<T, E>(
    record: &csv::StringRecord,
    index: usize,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<Option<T>>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match record.get(index).map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Ok(Some(parse(raw).with_context(|| format!("column {index}: {raw}"))?)),
    }
}
