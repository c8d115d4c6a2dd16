//! Replays CSV fixtures end to end.

use std::io::Write;
use std::path::Path;
use std::process::Command;

use chrono::{Duration, NaiveDate};
use regime_engine_cli::replay;
use regime_engine_core::{ConfigLoader, OptionRight, RegimeState};
use regime_engine_orchestrator::Orchestrator;
use rust_decimal_macros::dec;
use tempfile::{NamedTempFile, TempDir};

const BARS_HEADER: &str = "timestamp,symbol,open,high,low,close,volume";
const CHAINS_HEADER: &str =
    "timestamp,underlying,expiry,strike,right,bid,ask,open_interest,volume,delta,implied_volatility";

fn write_file(dir: &TempDir, name: &str, lines: &[String]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    path
}

/// Sixty-one daily SPY/VIX closes whose returns run stressed, choppy, then calm.
fn calm_seed_lines() -> Vec<String> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut lines = vec!["date,symbol,close".to_string()];
    let (mut index, mut vol) = (400.0_f64, 20.0_f64);
    lines.push(format!("{start},SPY,{index}"));
    lines.push(format!("{start},VIX,{vol}"));
    let mut day = 0;
    for (b, (index_mu, vol_mu)) in [(-0.04, 0.25), (0.0, 0.0), (0.03, -0.2)].iter().enumerate() {
        for i in 0..20 {
            day += 1;
            let wobble = ((i * 13 + b * 5) % 17) as f64 / 17.0 - 0.5;
            index *= (index_mu + 0.01 * wobble).exp();
            vol *= (vol_mu + 0.04 * wobble).exp();
            let date = start + Duration::days(day);
            lines.push(format!("{date},SPY,{index}"));
            lines.push(format!("{date},VIX,{vol}"));
        }
    }
    lines
}

fn config_file(lookback: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[regime]\nlookback = {lookback}").unwrap();
    file
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn chain_rows_become_chains_and_drop_bad_rights() {
    let dir = TempDir::new().unwrap();
    let chains = write_file(
        &dir,
        "chains.csv",
        &[
            CHAINS_HEADER.to_string(),
            "2024-03-05T15:00:00Z,qqq,2024-04-09,400,P,3.10,3.20,5000,120,-0.21,0.18".to_string(),
            "2024-03-05T15:00:00Z,QQQ,2024-04-09,420,X,3.10,3.20,5000,120,-0.35,".to_string(),
            "2024-03-05T15:00:00Z,QQQ,2024-04-09,440,call,,,,,,".to_string(),
        ],
    );
    let rows = replay::load_chains(&chains).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].underlying, "QQQ");
    assert_eq!(rows[2].record.bid, None);

    let ticks = replay::build_ticks(vec![], rows, dec!(100000));
    assert_eq!(ticks.len(), 1);
    assert_eq!(ticks[0].universe, vec!["QQQ".to_string()]);
    let chain = ticks[0].chain("QQQ").unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain.of_right(OptionRight::Put).count(), 1);
}

#[test]
fn malformed_bar_row_names_its_line() {
    let dir = TempDir::new().unwrap();
    let bars = write_file(
        &dir,
        "bars.csv",
        &[
            BARS_HEADER.to_string(),
            "2024-03-05T15:00:00Z,SPY,500,501,499,500.5,1000".to_string(),
            "2024-03-05T16:00:00Z,SPY,500,501,499,not-a-price,1000".to_string(),
        ],
    );
    let err = replay::load_bars(&bars).unwrap_err();
    assert!(format!("{err:#}").contains(":3"), "{err:#}");
}

#[test]
fn seeded_calm_replay_writes_puts() {
    let dir = TempDir::new().unwrap();
    let seed = write_file(&dir, "seed.csv", &calm_seed_lines());
    let bars = write_file(
        &dir,
        "bars.csv",
        &[
            BARS_HEADER.to_string(),
            "2024-03-05T15:00:00Z,SPY,500,500,500,500,1000".to_string(),
            "2024-03-05T15:00:00Z,VIX,15,15,15,15,0".to_string(),
        ],
    );
    let chains = write_file(
        &dir,
        "chains.csv",
        &[
            CHAINS_HEADER.to_string(),
            "2024-03-05T15:00:00Z,QQQ,2024-04-09,400,put,3.10,3.20,5000,120,-0.21,0.18".to_string(),
            "2024-03-05T15:00:00Z,QQQ,2024-04-09,420,put,3.10,3.20,5000,120,-0.35,0.17".to_string(),
        ],
    );
    let config_path = config_file(60);
    let config = ConfigLoader::load_from(path_str(config_path.path())).unwrap();
    let symbols = config.symbols.clone();
    let mut engine = Orchestrator::new(config);

    let rows = replay::load_seed(&seed).unwrap();
    let (index, volatility) = replay::split_seed(&rows, &symbols);
    assert_eq!(index.len(), 61);
    engine.seed_history(&index, &volatility);

    let ticks = replay::build_ticks(
        replay::load_bars(&bars).unwrap(),
        replay::load_chains(&chains).unwrap(),
        dec!(1000000),
    );
    let mut out = Vec::new();
    let summary = replay::run(&mut engine, &ticks, &mut out).unwrap();
    assert_eq!(summary.ticks, 1);
    assert_eq!(summary.regime, Some(RegimeState::Bull));

    let lines: Vec<serde_json::Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), summary.intents);
    let put = lines
        .iter()
        .find(|line| line["source"] == "put_writer")
        .unwrap();
    assert_eq!(put["direction"], "sell");
    assert_eq!(put["size"]["contracts"], 6);
    assert_eq!(put["regime"], "BULL");
    assert_eq!(put["tag"], "CashSecuredPut");
}

#[test]
fn show_config_prints_merged_json() {
    let config = config_file(90);
    let output = Command::new(env!("CARGO_BIN_EXE_regime-engine"))
        .args(["show-config", "--config", path_str(config.path())])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["regime"]["lookback"], 90);
    assert_eq!(json["symbols"]["index"], "SPY");
}

#[test]
fn show_config_applies_profile_overlay() {
    let dir = TempDir::new().unwrap();
    let base = write_file(&dir, "Engine.toml", &["[regime]\nlookback = 90".to_string()]);
    write_file(&dir, "Engine.paper.toml", &["[gap_spread]\nquantity = 2".to_string()]);
    let output = Command::new(env!("CARGO_BIN_EXE_regime-engine"))
        .args(["show-config", "--config", path_str(&base), "--profile", "paper"])
        .env_remove("REGIME_PROFILE")
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["regime"]["lookback"], 90);
    assert_eq!(json["gap_spread"]["quantity"], 2);
}
