use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of one ping.
#[derive(Debug, Serialize)]
pub struct PingRow {
    pub request_id: u32,
    pub sent: i32,
    pub received: Option<i32>,
    pub error: Option<String>,
    pub rtt_us: u64,
}

#[derive(Debug, Serialize)]
pub struct PingReport<'a> {
    pub path: &'a str,
    pub byte_order: &'a str,
    pub sent: usize,
    pub answered: usize,
    pub elapsed_us: u64,
    pub pings: Vec<PingRow>,
}

#[derive(Debug, Serialize)]
pub struct ServeSummary<'a> {
    pub path: &'a str,
    pub peers: u64,
    pub answered: u64,
}

pub fn print_ping_report(report: &PingReport<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["REQUEST", "SENT", "RECEIVED", "RTT (us)"]);
            for row in &report.pings {
                table.add_row(vec![
                    row.request_id.to_string(),
                    row.sent.to_string(),
                    describe_received(row),
                    row.rtt_us.to_string(),
                ]);
            }
            println!("{table}");
            println!(
                "{}/{} answered in {} us",
                report.answered, report.sent, report.elapsed_us
            );
        }
        OutputFormat::Pretty => {
            for row in &report.pings {
                println!(
                    "request={} sent={} received={} rtt_us={}",
                    row.request_id,
                    row.sent,
                    describe_received(row),
                    row.rtt_us
                );
            }
            println!(
                "path={} order={} answered={}/{} elapsed_us={}",
                report.path, report.byte_order, report.answered, report.sent, report.elapsed_us
            );
        }
    }
}

pub fn print_serve_summary(summary: &ServeSummary<'_>, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_json(summary)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOCKET", "PEERS", "ANSWERED"])
                .add_row(vec![
                    summary.path.to_string(),
                    summary.peers.to_string(),
                    summary.answered.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!(
            "path={} peers={} answered={}",
            summary.path, summary.peers, summary.answered
        ),
    }
}

fn describe_received(row: &PingRow) -> String {
    match (&row.received, &row.error) {
        (Some(message), _) => message.to_string(),
        (None, Some(error)) => format!("error: {error}"),
        (None, None) => "-".to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
