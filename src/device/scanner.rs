// Scan sources and the scan session that drives them.
//
// A scan source pushes discovered peers into a channel until it is
// cancelled. Two sources exist: the radio feed (newline-delimited peer
// records written by an external BLE adapter) and a timer that synthesizes
// advertisements for every catalog artifact. Which one a device uses is
// decided once, at startup.

use std::io::IsTerminal;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::catalog::Artifact;
use super::detector::Peer;
use crate::config::ScanMode;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// No radio capability, or no permission to use it.
    #[error("Bluetooth LE scanning unavailable: {0}")]
    Unavailable(String),
}

pub trait ScanSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Start pushing peers into `sink` until `cancel` fires or the sink closes.
    fn spawn(&self, sink: mpsc::Sender<Peer>, cancel: CancellationToken) -> JoinHandle<()>;
}

// ── Radio feed ────────────────────────────────────────────────────────

/// Peers reported by an external radio adapter. The feed is shared: every
/// scan subscribes to it afresh, so a session can be restarted.
pub struct RadioScanSource {
    feed: broadcast::Sender<Peer>,
    /// Fired once the adapter goes away; every scan then ends.
    closed: CancellationToken,
}

impl RadioScanSource {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(256);
        Self {
            feed,
            closed: CancellationToken::new(),
        }
    }

    /// Handle for publishing peers into this source.
    pub fn feed(&self) -> broadcast::Sender<Peer> {
        self.feed.clone()
    }

    /// Read newline-delimited peer records from `reader` in the background.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let source = Self::new();
        let feed = source.feed();
        let closed = source.closed.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => {
                        let _ = feed.send(Peer::from_line(&line));
                    }
                    Ok(None) => {
                        tracing::info!("Radio feed closed");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Radio feed read error: {e}");
                        break;
                    }
                }
            }
            closed.cancel();
        });
        source
    }

    /// The adapter feed on stdin. An interactive terminal means no adapter
    /// is attached.
    pub fn open_stdin() -> Result<Self, ScanError> {
        let stdin = std::io::stdin();
        if stdin.is_terminal() {
            return Err(ScanError::Unavailable(
                "no radio adapter attached to stdin".to_string(),
            ));
        }
        Ok(Self::from_reader(tokio::io::stdin()))
    }
}

impl Default for RadioScanSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSource for RadioScanSource {
    fn name(&self) -> &'static str {
        "radio"
    }

    fn spawn(&self, sink: mpsc::Sender<Peer>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.feed.subscribe();
        let closed = self.closed.clone();
        tokio::spawn(async move {
            loop {
                // Peers already queued are delivered before a closed feed ends the scan.
                let peer = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(peer) => peer,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Radio scan lagged, dropped {n} peers");
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = closed.cancelled() => {
                        tracing::info!("Radio scan ended: feed closed");
                        break;
                    }
                };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = sink.send(peer) => if sent.is_err() { break },
                }
            }
        })
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Advertises each catalog artifact in turn, one per tick, forever.
pub struct SimulatedScanSource {
    catalog: Vec<Artifact>,
    interval: Duration,
}

impl SimulatedScanSource {
    pub fn new(catalog: Vec<Artifact>, interval: Duration) -> Self {
        Self { catalog, interval }
    }
}

impl ScanSource for SimulatedScanSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn spawn(&self, sink: mpsc::Sender<Peer>, cancel: CancellationToken) -> JoinHandle<()> {
        let catalog = self.catalog.clone();
        let period = self.interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            if catalog.is_empty() {
                return;
            }
            let mut ticker = tokio::time::interval(period);
            for n in 0.. {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let artifact = &catalog[n % catalog.len()];
                let peer = Peer {
                    id: format!("sim-{}", artifact.id),
                    name: Some(artifact.name.clone()),
                    rssi: Some(-50),
                    service_uuids: vec![artifact.service_identifier.clone()],
                };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = sink.send(peer) => if sent.is_err() { break },
                }
            }
        })
    }
}

// ── Source selection ──────────────────────────────────────────────────

pub struct SelectedSource {
    pub source: Box<dyn ScanSource>,
    /// Shown to the user for as long as the device runs, when set.
    pub notice: Option<String>,
}

/// Pick the scan source once. In radio mode an unavailable radio falls back
/// to simulation and the reason is kept as a notice.
pub fn select_scan_source<F>(
    mode: ScanMode,
    open_radio: F,
    simulated: SimulatedScanSource,
) -> SelectedSource
where
    F: FnOnce() -> Result<RadioScanSource, ScanError>,
{
    let selected = match mode {
        ScanMode::Simulated => SelectedSource {
            source: Box::new(simulated),
            notice: None,
        },
        ScanMode::Radio => match open_radio() {
            Ok(radio) => SelectedSource {
                source: Box::new(radio),
                notice: None,
            },
            Err(e) => {
                tracing::warn!("{e}; falling back to simulated scanning");
                SelectedSource {
                    source: Box::new(simulated),
                    notice: Some(e.to_string()),
                }
            }
        },
    };
    tracing::info!("Using {} scan source", selected.source.name());
    selected
}

// ── Session ───────────────────────────────────────────────────────────

/// Owns at most one running scan.
pub struct ScanSession {
    source: Box<dyn ScanSource>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl ScanSession {
    pub fn new(source: Box<dyn ScanSource>) -> Self {
        Self {
            source,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start scanning into `sink`, stopping any scan already running.
    pub async fn start(&mut self, sink: mpsc::Sender<Peer>) {
        self.stop().await;

        let cancel_token = CancellationToken::new();
        let handle = self.source.spawn(sink, cancel_token.clone());
        tracing::debug!("Started {} scan", self.source.name());

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
    }

    /// Stop the running scan and wait for it to finish. No-op when idle.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!("Scan task failed to join: {e}");
            }
            tracing::debug!("Stopped {} scan", self.source.name());
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
