//! Background receive loop and its lifecycle

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{FrameSink, ReceiverConfig};
use crate::buffer::{ReleasedPacket, ReorderBuffer};
use crate::error::Error;
use crate::packet::{FrameAssembler, RtpPacket};
use crate::stats::{ReceptionStats, ReceptionStatsTracker};
use crate::transport::MediaTransport;
use crate::Result;

/// Shortest wait between two loop iterations
const MIN_LOOP_WAIT: Duration = Duration::from_millis(1);

/// Observable state of the receive loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverStatus {
    /// No loop is running
    Idle,
    /// The loop is receiving
    Running,
    /// The loop ended on an unrecoverable transport error
    Failed(String),
}

/// What the loop hands back when it exits
struct LoopExit {
    window: ReorderBuffer,
    result: Result<()>,
}

struct ReceiveTask {
    cancel: CancellationToken,
    handle: JoinHandle<LoopExit>,
}

/// Media receiver driving at most one receive loop at a time
///
/// The reorder window moves into the loop on [`start`](Self::start) and
/// comes back on [`stop`](Self::stop), so it always has a single owner.
pub struct RtpReceiver {
    config: ReceiverConfig,
    transport: Arc<dyn MediaTransport>,
    stats: ReceptionStatsTracker,

    /// Present whenever no loop is running
    window: Option<ReorderBuffer>,

    task: Option<ReceiveTask>,

    /// Terminal loop failure not yet reported through `stop`
    failure: Arc<Mutex<Option<Error>>>,
}

impl RtpReceiver {
    /// Create an idle receiver reading from `transport`
    pub fn new(config: ReceiverConfig, transport: Arc<dyn MediaTransport>) -> Self {
        let stats = ReceptionStatsTracker::new(config.clock_rate);
        let window = ReorderBuffer::new(config.clone(), stats.clone());

        Self {
            config,
            transport,
            stats,
            window: Some(window),
            task: None,
            failure: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the receive loop, delivering frames to `sink`
    ///
    /// Fails if a loop is already active; it has to be stopped first.
    pub fn start(&mut self, sink: Arc<dyn FrameSink>) -> Result<()> {
        if self.task.is_some() {
            return Err(Error::SessionError("Receive loop already running".to_string()));
        }
        self.config.validate()?;

        let window = self
            .window
            .take()
            .ok_or_else(|| Error::SessionError("Reorder window unavailable".to_string()))?;

        *self.failure.lock() = None;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_receive_loop(
            self.config.clone(),
            self.transport.clone(),
            window,
            sink,
            cancel.clone(),
            self.failure.clone(),
        ));

        self.task = Some(ReceiveTask { cancel, handle });
        info!("Started RTP receiver");
        Ok(())
    }

    /// Stop the receive loop and wait for it to exit
    ///
    /// Returns once the loop is gone. A no-op when nothing is running. If
    /// the loop had already ended on a transport failure, that failure is
    /// returned here, once.
    pub async fn stop(&mut self) -> Result<()> {
        let task = match self.task.take() {
            Some(task) => task,
            None => return Ok(()),
        };

        task.cancel.cancel();

        let result = match task.handle.await {
            Ok(exit) => {
                self.window = Some(exit.window);
                exit.result
            }
            Err(e) => {
                error!("Receive loop did not exit cleanly: {}", e);
                self.window = Some(ReorderBuffer::new(self.config.clone(), self.stats.clone()));
                Err(Error::SessionError(format!("Receive loop aborted: {}", e)))
            }
        };

        *self.failure.lock() = None;
        info!("Stopped RTP receiver");
        result
    }

    /// Whether a receive loop is active
    pub fn is_running(&self) -> bool {
        matches!(&self.task, Some(task) if !task.handle.is_finished())
    }

    /// Current loop status
    pub fn status(&self) -> ReceiverStatus {
        if let Some(failure) = self.failure.lock().as_ref() {
            return ReceiverStatus::Failed(failure.to_string());
        }
        if self.is_running() {
            ReceiverStatus::Running
        } else {
            ReceiverStatus::Idle
        }
    }

    /// Drop all reorder state and statistics
    ///
    /// Only allowed while stopped.
    pub fn reset(&mut self) -> Result<()> {
        match self.window.as_mut() {
            Some(window) if self.task.is_none() => {
                window.reset();
                *self.failure.lock() = None;
                Ok(())
            }
            _ => Err(Error::SessionError("Cannot reset a running receiver".to_string())),
        }
    }

    /// Snapshot of the reception statistics
    pub fn stats(&self) -> ReceptionStats {
        self.stats.snapshot()
    }
}

impl Drop for RtpReceiver {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.cancel.cancel();
        }
    }
}

async fn run_receive_loop(
    config: ReceiverConfig,
    transport: Arc<dyn MediaTransport>,
    mut window: ReorderBuffer,
    sink: Arc<dyn FrameSink>,
    cancel: CancellationToken,
    failure: Arc<Mutex<Option<Error>>>,
) -> LoopExit {
    let mut assembler = FrameAssembler::new(config.max_frame_size);
    let mut buf = vec![0u8; config.max_datagram_size];
    let poll_interval = config.recv_poll_interval();

    debug!("Receive loop started");

    let result = loop {
        if cancel.is_cancelled() {
            break Ok(());
        }

        let now = Instant::now();
        for released in window.poll(now) {
            deliver(sink.as_ref(), released);
        }

        let wait = window
            .next_release_at()
            .map(|at| at.saturating_duration_since(now).min(poll_interval))
            .unwrap_or(poll_interval)
            .max(MIN_LOOP_WAIT);

        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            received = tokio::time::timeout(wait, transport.recv_datagram(&mut buf)) => Some(received),
        };

        let received = match received {
            Some(received) => received,
            None => break Ok(()),
        };

        let len = match received {
            // Nothing arrived within the wait
            Err(_) => continue,
            Ok(Ok(len)) => len,
            Ok(Err(e)) if e.is_packet_local() => {
                warn!("Skipping datagram: {}", e);
                continue;
            }
            Ok(Err(e)) => {
                error!("Receive loop stopping on transport failure: {}", e);
                *failure.lock() = Some(e.clone());
                break Err(e);
            }
        };

        let frame = match assembler.push(&buf[..len]) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(e) => {
                window.record_decode_error();
                warn!("Discarding partial frame: {}", e);
                continue;
            }
        };

        match RtpPacket::decode(frame) {
            Ok(packet) => {
                trace!(
                    "Received packet seq={}, ts={}, {} payload bytes",
                    packet.header.sequence_number,
                    packet.header.timestamp,
                    packet.payload.len()
                );
                for released in window.push(packet, Instant::now()) {
                    deliver(sink.as_ref(), released);
                }
            }
            Err(e) => {
                window.record_decode_error();
                warn!("Skipping undecodable packet: {}", e);
            }
        }
    };

    debug!("Receive loop exited");
    LoopExit { window, result }
}

fn deliver(sink: &dyn FrameSink, released: ReleasedPacket) {
    let ReleasedPacket { packet, held_for } = released;
    trace!(
        "Delivering seq={} after {:?}",
        packet.header.sequence_number,
        held_for
    );
    sink.on_frame(
        packet.header.payload_type,
        packet.header.marker,
        packet.header.sequence_number,
        packet.header.timestamp,
        packet.payload,
    );
}
