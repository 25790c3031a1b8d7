extern crate chrono_tz;
extern crate std;
extern crate time;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::arrivals;
use crate::result;

pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_secs(15);

/// Every arrival known at the time of one successful fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub fetched_at: time::OffsetDateTime,
    pub arrivals: Vec<arrivals::Arrival>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        return self.arrivals.len();
    }
}

pub struct PollerConfig {
    pub url: String,
    pub interval: std::time::Duration,
    pub timezone: chrono_tz::Tz,
}

impl PollerConfig {
    pub fn dlr() -> PollerConfig {
        return PollerConfig{
            url: arrivals::DLR_ARRIVALS_URL.to_string(),
            interval: DEFAULT_POLL_INTERVAL,
            timezone: chrono_tz::Europe::London,
        };
    }
}

pub struct Poller {
    config: PollerConfig,
    fetch_fn: arrivals::FetchFn,
    next_sequence: u64,
}

impl Poller {
    pub fn new(config: PollerConfig, fetch_fn: arrivals::FetchFn) -> Poller {
        return Poller{
            config: config,
            fetch_fn: fetch_fn,
            next_sequence: 1,
        };
    }

    /// The sequence number is taken before the request goes out, so it
    /// orders snapshots by when they were asked for.
    pub fn poll_once(&mut self) -> result::DlrMapResult<Snapshot> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let arrivals = arrivals::fetch_arrivals(
            &self.config.url, self.config.timezone, &mut self.fetch_fn)?;

        return Ok(Snapshot{
            sequence: sequence,
            fetched_at: time::OffsetDateTime::now_utc(),
            arrivals: arrivals,
        });
    }
}

/// Owns the polling thread. Cancelling (or dropping) stops the timer and
/// joins the thread; a fetch already in flight is allowed to finish.
pub struct PollerHandle {
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl PollerHandle {
    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender wakes the timer with Disconnected.
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Poller thread panicked");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn spawn(poller: Poller) -> result::DlrMapResult<(PollerHandle, SnapshotSubscriber)> {
    let (snapshot_tx, snapshot_rx) = mpsc::channel();
    let (shutdown_tx, shutdown_rx) = mpsc::channel();

    let thread = std::thread::Builder::new()
        .name("poller".to_string())
        .spawn(move || run_poll_loop(poller, snapshot_tx, shutdown_rx))?;

    return Ok((
        PollerHandle{
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        },
        SnapshotSubscriber::new(snapshot_rx)));
}

fn run_poll_loop(mut poller: Poller, snapshots: mpsc::Sender<Arc<Snapshot>>, shutdown: mpsc::Receiver<()>) {
    info!("Polling {} every {:?}", poller.config.url, poller.config.interval);

    loop {
        // Ticks are a fixed period apart, however long the fetch takes.
        let next_tick = std::time::Instant::now() + poller.config.interval;

        match poller.poll_once() {
            Ok(snapshot) => {
                debug!("Snapshot #{} with {} arrivals", snapshot.sequence, snapshot.len());
                if snapshots.send(Arc::new(snapshot)).is_err() {
                    info!("Snapshot subscriber went away, stopping poller");
                    return;
                }
            },
            Err(err) => warn!("Poll failed, keeping previous snapshot: {}", err),
        }

        match shutdown.recv_timeout(next_tick.saturating_duration_since(std::time::Instant::now())) {
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                info!("Poller cancelled");
                return;
            },
        }
    }
}

/// The newest accepted snapshot, readable from other threads.
#[derive(Clone, Default)]
pub struct LatestSnapshot {
    snapshot: Arc<Mutex<Option<Arc<Snapshot>>>>,
}

impl LatestSnapshot {
    pub fn new() -> LatestSnapshot {
        return LatestSnapshot::default();
    }

    pub fn publish(&self, snapshot: Arc<Snapshot>) {
        *self.lock() = Some(snapshot);
    }

    pub fn get(&self) -> Option<Arc<Snapshot>> {
        return self.lock().clone();
    }

    fn lock(&self) -> std::sync::MutexGuard<Option<Arc<Snapshot>>> {
        return self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    }
}

/// Receiving end of the poller. Drops any snapshot that is not newer than
/// the last one it handed out.
pub struct SnapshotSubscriber {
    receiver: mpsc::Receiver<Arc<Snapshot>>,
    last_sequence: Option<u64>,
}

impl SnapshotSubscriber {
    pub fn new(receiver: mpsc::Receiver<Arc<Snapshot>>) -> SnapshotSubscriber {
        return SnapshotSubscriber{
            receiver: receiver,
            last_sequence: None,
        };
    }

    /// Returns true if `snapshot` is newer than anything seen so far.
    pub fn accept(&mut self, snapshot: &Snapshot) -> bool {
        if let Some(last_sequence) = self.last_sequence {
            if snapshot.sequence <= last_sequence {
                debug!("Discarding stale snapshot #{} (have #{})", snapshot.sequence, last_sequence);
                return false;
            }
        }

        self.last_sequence = Some(snapshot.sequence);
        return true;
    }
}

impl Iterator for SnapshotSubscriber {
    type Item = Arc<Snapshot>;

    /// Blocks until a newer snapshot arrives; None once the poller is gone.
    fn next(&mut self) -> Option<Arc<Snapshot>> {
        loop {
            let snapshot = self.receiver.recv().ok()?;
            if self.accept(&snapshot) {
                return Some(snapshot);
            }
        }
    }
}
