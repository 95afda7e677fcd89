//! risk-runner: headless merchant risk scoring.
//!
//! Usage:
//!   risk-runner --input txns.csv [--config cfg.json] [--export out.csv] [--min-score 1]
//!   risk-runner --generate txns.csv [--seed 42] [--count 8500]
//!   risk-runner --input txns.csv --ipc-mode

use anyhow::{bail, Result};
use merchant_risk_core::{
    config::ScoringConfig,
    export::export_high_risk_to_file,
    generator::{generate, GeneratorConfig},
    scorer::{drill_down, MerchantRiskScorer, ReportSummary, RiskReport, DRILL_DOWN_CANDIDATES},
    transaction::{load_transactions, write_transactions, Transaction},
};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetReport,
    SetParam {
        name: String,
        value: f64,
    },
    AddMcc {
        mcc: String,
    },
    RemoveMcc {
        mcc: String,
    },
    DrillDown {
        merchant_id: String,
    },
    Export {
        path: String,
        #[serde(default = "default_min_score")]
        min_score: u32,
    },
    Quit,
}

fn default_min_score() -> u32 {
    1
}

/// One row of the risky-merchant table. `avg_mcc_*` are sector averages.
#[derive(serde::Serialize)]
struct UiRow {
    merchant_id: String,
    mcc: String,
    risk_score: u32,
    total_txn: usize,
    cb_ratio: f64,
    avg_mcc_cb_ratio: Option<f64>,
    refund_ratio: f64,
    avg_mcc_refund_ratio: Option<f64>,
    non_3d_ratio: f64,
    avg_mcc_non3d_ratio: Option<f64>,
    foreign_card_ratio: f64,
    foreign_ip_ratio: f64,
    ip_conc_ratio: f64,
    risk_reasons: String,
}

#[derive(serde::Serialize)]
struct UiState {
    summary: ReportSummary,
    peer_multiplier: f64,
    ip_concentration_pct: f64,
    risky: Vec<UiRow>,
    drill_down_candidates: Vec<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");

    if let Some(out) = flag_value(&args, "--generate") {
        let config = GeneratorConfig {
            seed: parse_arg(&args, "--seed", 42u64),
            txn_count: parse_arg(&args, "--count", 8_500usize),
            ..GeneratorConfig::default()
        };
        let txns = generate(&config);
        write_transactions(&txns, File::create(out)?)?;
        println!("Wrote {} transactions to {out}", txns.len());
        return Ok(());
    }

    let Some(input) = flag_value(&args, "--input") else {
        bail!("missing --input <file.csv> (or --generate <file.csv>)");
    };
    let config = match flag_value(&args, "--config") {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };

    let txns = load_transactions(input, &config)?;
    let mut scorer = MerchantRiskScorer::new(config);

    if ipc_mode {
        return run_ipc_loop(&mut scorer, &txns);
    }

    let report = scorer.score(&txns);
    print_report(&report, scorer.config());

    if let Some(path) = flag_value(&args, "--export") {
        let min_score = parse_arg(&args, "--min-score", default_min_score());
        let written = export_high_risk_to_file(&report, min_score, path)?;
        println!();
        println!("Exported {written} merchants to {path}");
    }
    Ok(())
}

fn run_ipc_loop(scorer: &mut MerchantRiskScorer, txns: &[Transaction]) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                write_error(&mut stdout, &e)?;
                continue;
            }
        };

        if let IpcCommand::Quit = cmd {
            break;
        }

        match handle_command(scorer, txns, cmd) {
            Ok(response) => writeln!(stdout, "{response}")?,
            Err(e) => write_error(&mut stdout, &e)?,
        }
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(
    scorer: &mut MerchantRiskScorer,
    txns: &[Transaction],
    cmd: IpcCommand,
) -> Result<serde_json::Value> {
    match cmd {
        IpcCommand::GetReport | IpcCommand::Quit => {}
        IpcCommand::SetParam { name, value } => scorer.config_mut().set_param(&name, value)?,
        IpcCommand::AddMcc { mcc } => {
            if !scorer.config_mut().add_mcc(&mcc) {
                log::warn!("MCC '{mcc}' already configured or blank");
            }
        }
        IpcCommand::RemoveMcc { mcc } => {
            if !scorer.config_mut().remove_mcc(&mcc) {
                log::warn!("MCC '{mcc}' not configured");
            }
        }
        IpcCommand::DrillDown { merchant_id } => {
            return match drill_down(txns, &merchant_id) {
                Some(detail) => Ok(serde_json::to_value(detail)?),
                None => bail!("unknown merchant '{merchant_id}'"),
            };
        }
        IpcCommand::Export { path, min_score } => {
            let report = scorer.score(txns);
            let written = export_high_risk_to_file(&report, min_score, &path)?;
            return Ok(serde_json::json!({ "exported": written, "path": path }));
        }
    }

    let report = scorer.score(txns);
    Ok(serde_json::to_value(build_ui_state(&report, scorer.config()))?)
}

fn build_ui_state(report: &RiskReport, config: &ScoringConfig) -> UiState {
    let risky = report
        .flagged()
        .map(|m| {
            let a = &m.aggregate;
            UiRow {
                merchant_id: a.merchant_id.clone(),
                mcc: a.mcc.clone(),
                risk_score: m.result.score,
                total_txn: a.txn_count,
                cb_ratio: a.cb_ratio,
                avg_mcc_cb_ratio: a.benchmark.map(|b| b.cb_ratio),
                refund_ratio: a.refund_ratio,
                avg_mcc_refund_ratio: a.benchmark.map(|b| b.refund_ratio),
                non_3d_ratio: a.non_3d_ratio,
                avg_mcc_non3d_ratio: a.benchmark.map(|b| b.non_3d_ratio),
                foreign_card_ratio: a.foreign_card_ratio,
                foreign_ip_ratio: a.foreign_ip_ratio,
                ip_conc_ratio: a.ip_concentration,
                risk_reasons: m.result.reasons_joined(),
            }
        })
        .collect();

    UiState {
        summary: report.summary(),
        peer_multiplier: config.peer_multiplier,
        ip_concentration_pct: config.ip_concentration_pct,
        risky,
        drill_down_candidates: report.top_flagged(DRILL_DOWN_CANDIDATES),
    }
}

fn print_report(report: &RiskReport, config: &ScoringConfig) {
    let summary = report.summary();

    println!("=== SUMMARY ===");
    println!("  merchants:        {}", summary.total_merchants);
    println!("  risky merchants:  {}", summary.risky_merchants);
    println!("  configured MCCs:  {}", summary.configured_mccs);
    println!("  chargeback flags: {}", summary.chargeback_flags);
    println!(
        "  active rules:     peer multiplier {:.1}X | IP limit {}%",
        config.peer_multiplier, config.ip_concentration_pct
    );

    println!();
    println!("=== RISKY MERCHANTS ===");
    if summary.risky_merchants == 0 {
        println!("  (No risky merchants under the current rules)");
        return;
    }
    for m in report.flagged() {
        let a = &m.aggregate;
        let peer_cb = a
            .benchmark
            .map(|b| format!("{:.2}%", b.cb_ratio))
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<14} | MCC {} | score {:>3} | txns {:>5} | CB {:.2}% (sector {}) | IP conc {:.0}% | {}",
            a.merchant_id,
            a.mcc,
            m.result.score,
            a.txn_count,
            a.cb_ratio,
            peer_cb,
            a.ip_concentration * 100.0,
            m.result.reasons_joined()
        );
    }
}

fn write_error(stdout: &mut io::Stdout, e: &dyn std::fmt::Display) -> Result<()> {
    let err_json = serde_json::json!({ "error": e.to_string() });
    writeln!(stdout, "{}", err_json)?;
    stdout.flush()?;
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
