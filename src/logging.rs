// LOGGING: tracing subscriber setup and structured trading events
// EventLogger writes one JSON object per line; the sink owns storage beyond the file

use crate::config::LoggingCfg;
use crate::utils::timestamp_ms;
use anyhow::Result;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over `logging.level`.
pub fn init_tracing(cfg: &LoggingCfg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let result = if cfg.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("LOGGING: tracing subscriber already installed: {}", e);
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event_type")]
pub enum LogEvent {
    #[serde(rename = "signal_accepted")]
    SignalAccepted {
        timestamp: u64,
        symbol: String,
        direction: String,
        entry_price: f64,
        confidence: f64,
        reason: String,
    },
    #[serde(rename = "signal_rejected")]
    SignalRejected {
        timestamp: u64,
        symbol: String,
        kind: String,
        reason: String,
    },
    #[serde(rename = "entry_skipped")]
    EntrySkipped {
        timestamp: u64,
        symbol: String,
        kind: String,
        reason: String,
    },
    #[serde(rename = "position_opened")]
    PositionOpened {
        timestamp: u64,
        symbol: String,
        direction: String,
        entry_price: f64,
        quantity: f64,
        r_value: f64,
        order_id: String,
    },
    #[serde(rename = "risk_action")]
    RiskAction {
        timestamp: u64,
        symbol: String,
        action: String,
        mark_price: f64,
        r_multiple: f64,
        quantity: f64,
        executed_qty: f64,
    },
    #[serde(rename = "position_closed")]
    PositionClosed {
        timestamp: u64,
        symbol: String,
        direction: String,
        entry_price: f64,
        exit_price: f64,
        quantity: f64,
        realized_pnl: f64,
        reason: String,
    },
    #[serde(rename = "order_failed")]
    OrderFailed {
        timestamp: u64,
        symbol: String,
        intent: String,
        error: String,
    },
    #[serde(rename = "scan_summary")]
    ScanSummary {
        timestamp: u64,
        batch_index: usize,
        batch_count: usize,
        checked: usize,
        skipped: usize,
        signals: usize,
        errors: usize,
    },
}

impl LogEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LogEvent::SignalAccepted { .. } => "signal_accepted",
            LogEvent::SignalRejected { .. } => "signal_rejected",
            LogEvent::EntrySkipped { .. } => "entry_skipped",
            LogEvent::PositionOpened { .. } => "position_opened",
            LogEvent::RiskAction { .. } => "risk_action",
            LogEvent::PositionClosed { .. } => "position_closed",
            LogEvent::OrderFailed { .. } => "order_failed",
            LogEvent::ScanSummary { .. } => "scan_summary",
        }
    }
}

/// Channel-based, non-blocking event logger. Cheap to clone.
#[derive(Clone)]
pub struct EventLogger {
    event_tx: Option<mpsc::Sender<LogEvent>>,
}

const CHANNEL_BUFFER_SIZE: usize = 1000;

impl EventLogger {
    /// Append events to a JSON-lines file from a background task.
    pub fn to_file(log_file: &str) -> Result<(Self, tokio::task::JoinHandle<()>)> {
        let path = PathBuf::from(log_file);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (event_tx, mut event_rx) = mpsc::channel::<LogEvent>(CHANNEL_BUFFER_SIZE);
        let task_handle = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if let Err(e) = writeln!(file, "{}", json) {
                            eprintln!("Failed to write log event: {}", e);
                        } else if let Err(e) = file.flush() {
                            eprintln!("Failed to flush log file: {}", e);
                        }
                    }
                    Err(e) => eprintln!("Failed to serialize log event: {}", e),
                }
            }
            let _ = file.flush();
        });

        Ok((
            Self {
                event_tx: Some(event_tx),
            },
            task_handle,
        ))
    }

    /// Deliver events to a receiver instead of a file.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<LogEvent>) {
        let (event_tx, event_rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                event_tx: Some(event_tx),
            },
            event_rx,
        )
    }

    pub fn disabled() -> Self {
        Self { event_tx: None }
    }

    pub fn timestamp() -> u64 {
        timestamp_ms()
    }

    /// Drops the event when the buffer is full; trading never waits on logging.
    pub fn log(&self, event: LogEvent) {
        let Some(tx) = &self.event_tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(e)) => {
                tracing::debug!(event = e.name(), "LOGGING: event buffer full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                eprintln!("Failed to send log event: channel closed");
            }
        }
    }
}
