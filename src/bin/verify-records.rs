use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ledger_audit::app::App;
use ledger_audit::config::AppConfig;
use ledger_audit::reconcile::{BatchSummary, Verdict};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("verify-records")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Verify stored records against their ledger anchors")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Enable verbose output"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("verify-all")
                .about("Verify records; exits 1 when any is tampered or inconsistent")
                .arg(
                    Arg::new("limit")
                        .short('l')
                        .long("limit")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .help("Maximum number of records to examine"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the batch summary as JSON"),
                ),
        )
        .subcommand(
            Command::new("reanchor").about("Anchor every record that has no ledger anchor"),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") {
        "ledger_audit=debug"
    } else {
        "ledger_audit=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .init();

    let config = AppConfig::load()?;
    let app = App::build(&config).await?;

    match matches.subcommand() {
        Some(("verify-all", sub)) => {
            let limit = sub.get_one::<usize>("limit").copied();
            let summary = app.service.verify_all(limit).await?;

            if sub.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }

            if summary.has_findings() {
                error!(
                    "Integrity findings: {} tampered, {} inconsistent",
                    summary.tampered, summary.inconsistent
                );
                std::process::exit(1);
            }
        }
        Some(("reanchor", _)) => {
            let summary = app.service.reanchor_missing().await?;
            println!(
                "Scanned {} records: {} already anchored, {} anchored, {} failed",
                summary.scanned, summary.already_anchored, summary.anchored, summary.failed
            );
            if summary.failed > 0 {
                return Err(anyhow!("{} record(s) could not be anchored", summary.failed));
            }
        }
        _ => unreachable!("subcommand_required"),
    }

    info!("Done");
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    for report in &summary.results {
        let mark = match report.verdict {
            Verdict::Verified => "✓",
            Verdict::PendingAnchor => "…",
            Verdict::Tampered | Verdict::Inconsistent => "✗",
        };
        println!(
            "{} {:>6}  {:<24} {}",
            mark, report.record_id, report.name, report.verdict
        );
    }

    println!(
        "\n{} of {} examined: {} verified, {} tampered, {} inconsistent, {} pending, {} failed{}",
        summary.examined,
        summary.total,
        summary.verified,
        summary.tampered,
        summary.inconsistent,
        summary.pending,
        summary.failed,
        if summary.timed_out { " (deadline reached)" } else { "" }
    );
}
