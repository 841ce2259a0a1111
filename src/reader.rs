//! Long-lived handle that keeps a sensor streaming on a background thread.

use crate::base::{Error, Result, Transport};
use crate::internals::{READER_GET_SCAN_TIMEOUT, READER_SET_SCAN_PARAMS_TIMEOUT};
use crate::serial::SerialTransport;
use crate::types::{Calibration, HokuyoOptions, SensorInfo, SensorModel};
use crate::worker::{ScanWorker, SharedState};
use crate::HokuyoDevice;
use log::{debug, error, info, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type DynDevice = HokuyoDevice<dyn Transport>;

/// Connects to a sensor, runs the continuous worker and serves the latest scan.
///
/// # Example
/// ```ignore
/// let mut reader = hokuyo::HokuyoReader::new(false);
/// reader.connect("/dev/ttyACM0", 115200)?;
/// println!("{}", reader.info_string());
/// let ranges = reader.get_scan();
/// ```
pub struct HokuyoReader {
    options: HokuyoOptions,
    shared: Arc<SharedState>,
    worker: Option<JoinHandle<DynDevice>>,
    model: SensorModel,
    calibration: Calibration,
    info: Option<SensorInfo>,
}

impl HokuyoReader {
    pub fn new(debug: bool) -> HokuyoReader {
        HokuyoReader::with_options(HokuyoOptions::with_debug(debug))
    }

    pub fn with_options(options: HokuyoOptions) -> HokuyoReader {
        HokuyoReader {
            options,
            shared: Arc::new(SharedState::default()),
            worker: None,
            model: SensorModel::default(),
            calibration: Calibration::default(),
            info: None,
        }
    }

    /// Open the serial port at `path`, negotiate `baud_rate` and start streaming.
    pub fn connect(&mut self, path: &str, baud_rate: u32) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyConnected);
        }
        let transport = SerialTransport::open(path, baud_rate)?;
        self.connect_with_transport(Box::new(transport), baud_rate)
    }

    /// Negotiate over an already open transport and start streaming.
    ///
    /// Returns once the worker has completed its first round, or after
    /// `READER_SET_SCAN_PARAMS_TIMEOUT`, whichever comes first.
    pub fn connect_with_transport(
        &mut self,
        transport: Box<dyn Transport>,
        baud_rate: u32,
    ) -> Result<()> {
        if self.worker.is_some() {
            return Err(Error::AlreadyConnected);
        }

        let mut device = DynDevice::with_stream(transport, &self.options);
        device.connect(baud_rate)?;

        self.model = device.model();
        self.calibration = device.calibration().clone();
        self.info = Some(device.sensor_info().clone());

        let shared = Arc::new(SharedState::default());
        shared.active.store(true, Ordering::Release);
        let worker = ScanWorker::new(device, Arc::clone(&shared), self.options.scan_request);

        let handle = thread::Builder::new()
            .name("hokuyo-reader".to_owned())
            .spawn(move || worker.run())?;
        self.shared = shared;
        self.worker = Some(handle);

        if !self
            .shared
            .settings
            .wait_first_round(READER_SET_SCAN_PARAMS_TIMEOUT)
        {
            warn!("connect: worker did not report within {:?}", READER_SET_SCAN_PARAMS_TIMEOUT);
        }
        info!("connect: streaming from {}", self.model);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.worker.is_some()
    }

    /// Latest unconsumed scan, or an empty vector when none arrives within
    /// `READER_GET_SCAN_TIMEOUT`.
    pub fn get_scan(&self) -> Vec<u32> {
        self.get_scan_with_timeout(READER_GET_SCAN_TIMEOUT)
    }

    pub fn get_scan_with_timeout(&self, timeout: Duration) -> Vec<u32> {
        if self.worker.is_none() {
            return Vec::new();
        }
        self.shared.scan.fetch(timeout).unwrap_or_default()
    }

    /// Model, firmware, serial number, protocol and vendor, one per line.
    pub fn info_string(&self) -> String {
        match &self.info {
            Some(info) => info.to_string(),
            None => "not connected".to_owned(),
        }
    }

    pub fn model(&self) -> SensorModel {
        self.model
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn dist_min(&self) -> f64 {
        self.calibration.dist_min
    }

    pub fn dist_max(&self) -> f64 {
        self.calibration.dist_max
    }

    pub fn dist_resolution(&self) -> f64 {
        self.calibration.dist_resolution
    }

    pub fn angle_resolution(&self) -> f64 {
        self.calibration.angle_resolution
    }

    pub fn angle_min(&self) -> f64 {
        self.calibration.angle_min
    }

    pub fn angle_max(&self) -> f64 {
        self.calibration.angle_max
    }

    pub fn scan_rate(&self) -> f64 {
        self.calibration.scan_rate
    }

    pub fn count_min(&self) -> i32 {
        self.calibration.count_min
    }

    pub fn count_max(&self) -> i32 {
        self.calibration.count_max
    }

    pub fn count_zero(&self) -> i32 {
        self.calibration.count_zero
    }

    /// Stop the worker, switch the laser off and close the transport.
    /// Does nothing when not connected.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.active.store(false, Ordering::Release);
        self.shared.cancel.store(true, Ordering::Release);
        match handle.join() {
            Ok(mut device) => device.disconnect(),
            Err(_) => error!("shutdown: worker thread panicked"),
        }
        self.shared.scan.invalidate();
        self.model = SensorModel::default();
        self.calibration = Calibration::default();
        self.info = None;
        debug!("shutdown: done");
    }
}

impl Default for HokuyoReader {
    fn default() -> HokuyoReader {
        HokuyoReader::with_options(HokuyoOptions::default())
    }
}

impl Drop for HokuyoReader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::SimulatedSensor;
    use std::time::Instant;

    #[test]
    fn unconnected_reader_returns_nothing() {
        let reader = HokuyoReader::new(false);
        let started = Instant::now();
        assert!(reader.get_scan().is_empty());
        assert!(started.elapsed() < READER_GET_SCAN_TIMEOUT);
        assert_eq!(reader.info_string(), "not connected");
        assert_eq!(reader.dist_min(), -1.0);
        assert_eq!(reader.count_zero(), -1);
    }

    #[test]
    fn second_connect_is_refused() {
        let mut reader = HokuyoReader::new(false);
        reader
            .connect_with_transport(Box::new(SimulatedSensor::urg_04lx().into_transport()), 115200)
            .unwrap();
        assert!(matches!(
            reader.connect_with_transport(
                Box::new(SimulatedSensor::urg_04lx().into_transport()),
                115200
            ),
            Err(Error::AlreadyConnected)
        ));
        assert!(matches!(
            reader.connect("/dev/ttyACM0", 115200),
            Err(Error::AlreadyConnected)
        ));
    }

    #[test]
    fn failed_negotiation_leaves_reader_disconnected() {
        let mut reader = HokuyoReader::new(false);
        let mock = SimulatedSensor::urg_04lx().with_dist_min(0).into_transport();
        assert!(matches!(
            reader.connect_with_transport(Box::new(mock), 115200),
            Err(Error::BadCalibration { .. })
        ));
        assert!(!reader.is_connected());
        assert_eq!(reader.info_string(), "not connected");
    }

    #[test]
    fn shutdown_resets_metadata() {
        let mut reader = HokuyoReader::new(false);
        let mock = SimulatedSensor::urg_04lx().into_transport();
        reader
            .connect_with_transport(Box::new(mock.clone()), 115200)
            .unwrap();
        assert_eq!(reader.count_zero(), 384);

        reader.shutdown();
        assert!(!reader.is_connected());
        assert!(!mock.is_connected());
        assert_eq!(reader.count_zero(), -1);
        assert!(reader.get_scan().is_empty());
        reader.shutdown();
    }
}
