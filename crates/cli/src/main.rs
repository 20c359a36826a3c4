//! rstream - play a stream from an RTSP-style server
//!
//! Sets up a session for one resource, plays it for a while, pauses,
//! prints the reception statistics and tears the session down.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::{debug, info, warn};

use rstream_client_core::client::DEFAULT_RESPONSE_TIMEOUT_MS;
use rstream_client_core::{
    parse_log_level, setup_logging, ClientConfig, FrameSink, LoggingConfig, ReceptionStats,
    RtspSession,
};

#[derive(Parser, Debug)]
#[command(name = "rstream", version, about = "Play a stream from an RTSP-style server")]
struct Args {
    /// Server control address, e.g. 127.0.0.1:8554
    server: SocketAddr,

    /// Resource to request, e.g. movie.mjpeg
    resource: String,

    /// Seconds to play before pausing
    #[arg(long, default_value_t = 10)]
    play_secs: u64,

    /// Bound on waiting for each control response
    #[arg(long, default_value_t = DEFAULT_RESPONSE_TIMEOUT_MS)]
    response_timeout_ms: u64,

    /// Local address for media; port 0 picks a free port
    #[arg(long, default_value = "0.0.0.0:0")]
    media_bind: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Include source file and line in log lines
    #[arg(long)]
    log_source: bool,

    /// Log span enter and exit events
    #[arg(long)]
    log_spans: bool,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn stats_table(stats: &ReceptionStats, bytes: u64) -> Table {
    let rows = vec![
        StatRow { metric: "Packets received", value: stats.packets_received.to_string() },
        StatRow { metric: "Frames delivered", value: stats.frames_delivered.to_string() },
        StatRow { metric: "Bytes delivered", value: bytes.to_string() },
        StatRow { metric: "Duplicates", value: stats.duplicates.to_string() },
        StatRow { metric: "Out of order", value: stats.out_of_order.to_string() },
        StatRow { metric: "Decode errors", value: stats.decode_errors.to_string() },
        StatRow { metric: "Lost", value: stats.packets_lost().to_string() },
        StatRow { metric: "Stream time (s)", value: format!("{:.2}", stats.elapsed_secs()) },
        StatRow { metric: "Frame rate (/s)", value: format!("{:.2}", stats.frame_rate()) },
        StatRow { metric: "Loss rate (/s)", value: format!("{:.2}", stats.loss_rate()) },
        StatRow { metric: "Out-of-order rate (/s)", value: format!("{:.2}", stats.out_of_order_rate()) },
    ];

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table
}

async fn play(session: &mut RtspSession, args: &Args, bytes: &AtomicU64) -> Result<()> {
    session
        .setup(&args.resource)
        .await
        .with_context(|| format!("SETUP {} failed", args.resource))?;
    println!(
        "{} session {}, media on {}",
        "READY".green().bold(),
        session.session_id().unwrap_or("-"),
        session.media_addr()?
    );

    session.play().await.context("PLAY failed")?;
    println!("{} for {}s (Ctrl-C to stop early)", "PLAYING".green().bold(), args.play_secs);

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.play_secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping playback"),
    }

    session.pause().await.context("PAUSE failed")?;
    if let Some(failure) = session.media_failure() {
        warn!("Media reception ended early: {}", failure);
    }

    println!("{}", stats_table(&session.stats(), bytes.load(Ordering::Relaxed)));

    session.teardown().await.context("TEARDOWN failed")?;
    println!("{}", "Session torn down".yellow());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&args.log_level)?);
    if args.json_logs {
        logging = logging.with_json();
    }
    if args.log_source {
        logging = logging.with_file_info();
    }
    if args.log_spans {
        logging = logging.with_spans();
    }
    setup_logging(logging)?;

    let config = ClientConfig::new(args.server)
        .with_media_bind_addr(args.media_bind)
        .with_response_timeout_ms(args.response_timeout_ms);

    let bytes = Arc::new(AtomicU64::new(0));
    let sink_bytes = bytes.clone();
    let sink: Arc<dyn FrameSink> =
        Arc::new(move |pt: u8, marker: bool, seq: u16, ts: u32, payload: Bytes| {
            sink_bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
            debug!(
                "Frame seq={} ts={} pt={} marker={} ({} bytes)",
                seq,
                ts,
                pt,
                marker,
                payload.len()
            );
        });

    let mut session = RtspSession::connect(config, sink)
        .await
        .with_context(|| format!("Failed to connect to {}", args.server))?;

    let result = play(&mut session, &args, &bytes).await;
    if result.is_err() {
        eprintln!("{}", "Playback aborted, closing session".red().bold());
    }

    session.close().await.context("Failed to close session")?;
    result
}
