// Event bus: scan loop -> position manager
// Signals travel over a bounded mpsc; each one is consumed exactly once

use crate::types::Signal;
use tokio::sync::mpsc;

pub const DEFAULT_SIGNAL_BUFFER: usize = 64;

/// Sending half, held by the scan orchestrator.
#[derive(Clone)]
pub struct ScanChannels {
    pub signal_tx: mpsc::Sender<Signal>,
}

/// Receiving half, held by the position manager loop.
pub struct PositionChannels {
    pub signal_rx: mpsc::Receiver<Signal>,
}

pub struct EventBus;

impl EventBus {
    pub fn new(buffer: usize) -> (ScanChannels, PositionChannels) {
        let (signal_tx, signal_rx) = mpsc::channel(buffer.max(1));
        (ScanChannels { signal_tx }, PositionChannels { signal_rx })
    }
}
