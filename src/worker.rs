use crate::base::{Result, Transport};
use crate::internals::{HOKUYO_IDLE, READER_MAX_ERRORS};
use crate::types::ScanRequest;
use crate::HokuyoDevice;
use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What the continuous worker needs from a device.
pub trait ScanSource {
    fn is_connected(&self) -> bool;

    /// One scan exchange; see [`HokuyoDevice::acquire`].
    fn acquire(&mut self, request: &ScanRequest) -> Result<Vec<u32>>;

    fn stop_laser(&mut self) -> Result<()>;

    /// Skip input up to the next packet terminator.
    fn resynchronize(&mut self) -> Result<()>;
}

impl<T: ?Sized + Transport> ScanSource for HokuyoDevice<T> {
    fn is_connected(&self) -> bool {
        HokuyoDevice::is_connected(self)
    }

    fn acquire(&mut self, request: &ScanRequest) -> Result<Vec<u32>> {
        HokuyoDevice::acquire(self, request)
    }

    fn stop_laser(&mut self) -> Result<()> {
        self.laser_off()
    }

    fn resynchronize(&mut self) -> Result<()> {
        HokuyoDevice::resynchronize(self)
    }
}

#[derive(Debug, Default)]
struct ScanSlot {
    ranges: Vec<u32>,
    ready: bool,
}

/// Latest decoded scan, handed from the worker to consumers.
#[derive(Debug, Default)]
pub(crate) struct SharedScan {
    slot: Mutex<ScanSlot>,
    ready: Condvar,
}

impl SharedScan {
    pub(crate) fn publish(&self, ranges: &[u32]) {
        let mut slot = self.slot.lock();
        slot.ranges.clear();
        slot.ranges.extend_from_slice(ranges);
        slot.ready = true;
        self.ready.notify_all();
    }

    /// Wait up to `timeout` for an unconsumed scan and take a copy of it.
    pub(crate) fn fetch(&self, timeout: Duration) -> Option<Vec<u32>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        while !slot.ready {
            if self.ready.wait_until(&mut slot, deadline).timed_out() {
                break;
            }
        }
        if slot.ready {
            slot.ready = false;
            Some(slot.ranges.clone())
        } else {
            None
        }
    }

    pub(crate) fn invalidate(&self) {
        self.slot.lock().ready = false;
    }
}

/// Counts completed worker rounds so start-up can wait for the first one.
#[derive(Debug, Default)]
pub(crate) struct SettingsSignal {
    rounds: Mutex<u64>,
    cond: Condvar,
}

impl SettingsSignal {
    pub(crate) fn notify(&self) {
        let mut rounds = self.rounds.lock();
        *rounds += 1;
        self.cond.notify_all();
    }

    /// `true` if at least one round completed within `timeout`.
    pub(crate) fn wait_first_round(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut rounds = self.rounds.lock();
        while *rounds == 0 {
            if self.cond.wait_until(&mut rounds, deadline).timed_out() {
                break;
            }
        }
        *rounds > 0
    }
}

/// State shared between a reader handle and its worker thread.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub(crate) scan: SharedScan,
    pub(crate) settings: SettingsSignal,
    pub(crate) cancel: AtomicBool,
    pub(crate) active: AtomicBool,
}

/// The background acquisition loop.
pub(crate) struct ScanWorker<S> {
    source: S,
    shared: Arc<SharedState>,
    request: ScanRequest,
    consecutive_errors: u32,
    stop_laser_pending: bool,
}

impl<S: ScanSource> ScanWorker<S> {
    /// The first round always stops the laser, so streaming restarts cleanly.
    pub(crate) fn new(source: S, shared: Arc<SharedState>, request: ScanRequest) -> ScanWorker<S> {
        ScanWorker {
            source,
            shared,
            request,
            consecutive_errors: 0,
            stop_laser_pending: true,
        }
    }

    /// Loop until cancelled, then hand the source back.
    pub(crate) fn run(mut self) -> S {
        debug!("worker: started");
        while !self.shared.cancel.load(Ordering::Acquire) {
            self.step();
        }
        debug!("worker: stopped");
        self.source
    }

    fn step(&mut self) {
        if self.stop_laser_pending {
            match self.source.stop_laser() {
                Ok(()) => {
                    debug!("worker: laser stopped");
                    self.stop_laser_pending = false;
                }
                Err(e) => warn!("worker: could not stop laser: {}", e),
            }
        }

        self.shared.settings.notify();

        if !(self.source.is_connected() && self.shared.active.load(Ordering::Acquire)) {
            thread::sleep(HOKUYO_IDLE);
            return;
        }

        match self.source.acquire(&self.request) {
            Ok(ranges) => {
                if self.consecutive_errors > 0 {
                    debug!(
                        "worker: recovered after {} failed scans",
                        self.consecutive_errors
                    );
                }
                self.consecutive_errors = 0;
                self.shared.scan.publish(&ranges);
                trace!("worker: published {} values", ranges.len());
            }
            Err(e) => {
                self.consecutive_errors += 1;
                debug!(
                    "worker: scan failed ({} in a row): {}",
                    self.consecutive_errors, e
                );
                if let Err(e) = self.source.resynchronize() {
                    trace!("worker: resynchronization failed: {}", e);
                }
                if self.consecutive_errors >= READER_MAX_ERRORS {
                    warn!(
                        "worker: {} failed scans in a row, restarting laser",
                        self.consecutive_errors
                    );
                    self.stop_laser_pending = true;
                    self.consecutive_errors = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Error;
    use crate::mock::{MockTransport, SimulatedSensor};
    use crate::types::{ChecksumPolicy, HokuyoOptions};
    use std::collections::VecDeque;

    /// Source that fails a scripted number of times, then succeeds.
    struct ScriptedSource {
        outcomes: VecDeque<bool>,
        acquires: usize,
        stops: usize,
        resyncs: usize,
    }

    impl ScriptedSource {
        fn failing(times: usize) -> ScriptedSource {
            let mut outcomes: VecDeque<bool> = std::iter::repeat(false).take(times).collect();
            outcomes.push_back(true);
            ScriptedSource {
                outcomes,
                acquires: 0,
                stops: 0,
                resyncs: 0,
            }
        }
    }

    impl ScanSource for ScriptedSource {
        fn is_connected(&self) -> bool {
            true
        }

        fn acquire(&mut self, _request: &ScanRequest) -> Result<Vec<u32>> {
            self.acquires += 1;
            if self.outcomes.pop_front().unwrap_or(true) {
                Ok(vec![1000, 1001, 1002])
            } else {
                Err(Error::CorruptLine {
                    expected: b'P',
                    actual: b'Q',
                })
            }
        }

        fn stop_laser(&mut self) -> Result<()> {
            self.stops += 1;
            Ok(())
        }

        fn resynchronize(&mut self) -> Result<()> {
            self.resyncs += 1;
            Ok(())
        }
    }

    fn worker(source: ScriptedSource) -> ScanWorker<ScriptedSource> {
        let shared = Arc::new(SharedState::default());
        shared.active.store(true, Ordering::Release);
        let mut worker = ScanWorker::new(source, shared, ScanRequest::default());
        // skip the start-up stop so only escalation stops are counted
        worker.stop_laser_pending = false;
        worker
    }

    fn run_cycles(worker: &mut ScanWorker<ScriptedSource>, cycles: usize) -> Vec<u32> {
        let mut counters = Vec::new();
        for _ in 0..cycles {
            worker.step();
            counters.push(worker.consecutive_errors);
        }
        counters
    }

    #[test]
    fn two_failures_do_not_stop_laser() {
        let mut worker = worker(ScriptedSource::failing(2));
        let counters = run_cycles(&mut worker, 3);
        assert_eq!(counters, vec![1, 2, 0]);
        assert!(!worker.stop_laser_pending);
        assert_eq!(worker.source.stops, 0);
        assert_eq!(worker.source.resyncs, 2);
        assert_eq!(worker.shared.scan.fetch(Duration::ZERO), Some(vec![1000, 1001, 1002]));
    }

    #[test]
    fn three_failures_stop_laser_once() {
        let mut worker = worker(ScriptedSource::failing(3));
        let counters = run_cycles(&mut worker, 3);
        assert_eq!(counters, vec![1, 2, 0]);
        assert!(worker.stop_laser_pending);
        assert_eq!(worker.source.stops, 0);

        // next round stops the laser, then scans cleanly
        worker.step();
        assert_eq!(worker.source.stops, 1);
        assert!(!worker.stop_laser_pending);
        assert_eq!(worker.consecutive_errors, 0);
        assert!(worker.shared.scan.fetch(Duration::ZERO).is_some());
    }

    #[test]
    fn five_failures_reset_at_first_clean_cycle() {
        let mut worker = worker(ScriptedSource::failing(5));
        let counters = run_cycles(&mut worker, 6);
        assert_eq!(counters, vec![1, 2, 0, 1, 2, 0]);
        assert_eq!(worker.source.stops, 1);
        assert_eq!(worker.source.acquires, 6);
    }

    #[test]
    fn idle_when_inactive() {
        let mut worker = worker(ScriptedSource::failing(0));
        worker.shared.active.store(false, Ordering::Release);
        worker.step();
        assert_eq!(worker.source.acquires, 0);
        assert!(worker.shared.settings.wait_first_round(Duration::ZERO));
    }

    #[test]
    fn fetch_times_out_without_data() {
        let scan = SharedScan::default();
        let started = Instant::now();
        assert_eq!(scan.fetch(Duration::from_millis(50)), None);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(50));
        assert!(waited < Duration::from_secs(2));
    }

    #[test]
    fn fetch_consumes_scan() {
        let scan = SharedScan::default();
        scan.publish(&[1, 2, 3]);
        assert_eq!(scan.fetch(Duration::ZERO), Some(vec![1, 2, 3]));
        assert_eq!(scan.fetch(Duration::ZERO), None);
        scan.publish(&[4]);
        scan.invalidate();
        assert_eq!(scan.fetch(Duration::ZERO), None);
    }

    #[test]
    fn fetch_wakes_on_publish() {
        let shared = Arc::new(SharedScan::default());
        let producer = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.publish(&[7, 8]);
        });
        assert_eq!(shared.fetch(Duration::from_secs(2)), Some(vec![7, 8]));
        handle.join().unwrap();
    }

    #[test]
    fn corrupted_stream_recovers_on_device() {
        let mock: MockTransport = SimulatedSensor::urg_04lx()
            .with_corrupted_scans(1)
            .into_transport();
        let mut device = HokuyoDevice::with_stream(
            Box::new(mock.clone()),
            &HokuyoOptions::default().checksum_policy(ChecksumPolicy::Strict),
        );
        device.connect(115200).unwrap();

        let shared = Arc::new(SharedState::default());
        shared.active.store(true, Ordering::Release);
        let mut worker = ScanWorker::new(device, Arc::clone(&shared), ScanRequest::default());

        // start-up stop, then the corrupted scan
        worker.step();
        assert_eq!(worker.consecutive_errors, 1);
        assert!(shared.scan.fetch(Duration::ZERO).is_none());

        worker.step();
        assert_eq!(worker.consecutive_errors, 0);
        let ranges = shared.scan.fetch(Duration::ZERO).unwrap();
        assert_eq!(ranges.len(), 682);
        assert_eq!(ranges[0], 1044);
    }
}
