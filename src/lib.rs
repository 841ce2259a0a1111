//! # Hokuyo Driver
//!
//! `hokuyo` is a driver for Hokuyo URG-04LX and UTM-30LX laser range-finders speaking SCIP2.0
//! over a serial link. It negotiates the link with a device in unknown state, reads its
//! calibration, decodes range scans, and can keep a background thread streaming scans
//! for consumers (see [`HokuyoReader`]).

mod answers;
pub mod base;
mod checksum;
mod cmds;
mod internals;
pub mod mock;
mod parsers;
mod protocol;
pub mod reader;
pub mod serial;
pub mod types;
pub mod utils;
mod worker;

pub use crate::answers::{ScipStatus, SensorParameters};
pub use crate::base::{Channel, Error, ErrorClass, Result, Transport};
pub use crate::checksum::Checksum;
pub use crate::cmds::{build_scan_command, ScanCommand};
pub use crate::internals::{HOKUYO_DEFAULT_BAUD_RATE, HOKUYO_GET_SCAN_TIMEOUT};
pub use crate::parsers::packet_parser::extract_packet;
pub use crate::parsers::range_parser::decode_ranges;
pub use crate::protocol::ScipHostProtocol;
pub use crate::reader::HokuyoReader;
pub use crate::serial::SerialTransport;
pub use crate::worker::ScanSource;

use crate::answers::*;
use crate::cmds::*;
use crate::internals::*;
use crate::types::{
    Calibration, HokuyoOptions, ScanKind, ScanRequest, ScanWindow, SensorInfo, SensorModel,
    REPEAT_SINGLE, REPEAT_STREAMING,
};
use log::{debug, error, info, trace, warn};
use std::thread;
use std::time::Duration;

/// Represents a connection to and control interface for one Hokuyo sensor.
///
/// The device owns the link state, the negotiated baud rate, the calibration and
/// the streaming state; all of them change only through its own methods.
#[derive(Debug)]
pub struct HokuyoDevice<T: ?Sized> {
    channel: Channel<T>,
    protocol: ScipHostProtocol,
    debug: bool,
    model: SensorModel,
    baud_rate: u32,
    info: SensorInfo,
    calibration: Calibration,
    scan_window: Option<ScanWindow>,
    streaming: bool,
    packet_length: Option<usize>,
}

impl<T: ?Sized> HokuyoDevice<T>
where
    T: Transport,
{
    /// Constructs a new `HokuyoDevice` over an existing `Channel`.
    ///
    /// # Arguments
    ///
    /// * `channel` - A `Channel` over an open transport.
    /// * `options` - Debug flag and checksum policy.
    pub fn new(channel: Channel<T>, options: &HokuyoOptions) -> HokuyoDevice<T> {
        trace!("Creating new HokuyoDevice (debug: {})", options.debug);
        let baud_rate = channel.baud_rate();
        HokuyoDevice {
            channel,
            protocol: ScipHostProtocol::new(options.checksum_policy),
            debug: options.debug,
            model: SensorModel::default(),
            baud_rate,
            info: SensorInfo::default(),
            calibration: Calibration::default(),
            scan_window: None,
            streaming: false,
            packet_length: None,
        }
    }

    /// Constructs a new `HokuyoDevice` directly from a transport.
    ///
    /// # Example
    /// ```ignore
    /// # use hokuyo::{HokuyoDevice, SerialTransport};
    /// # use hokuyo::types::HokuyoOptions;
    /// let transport = SerialTransport::open("/dev/ttyACM0", 115200)?;
    /// let mut device = HokuyoDevice::with_stream(Box::new(transport), &HokuyoOptions::default());
    /// device.connect(115200)?;
    /// ```
    pub fn with_stream(stream: Box<T>, options: &HokuyoOptions) -> HokuyoDevice<T> {
        HokuyoDevice::new(Channel::new(stream), options)
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    pub fn model(&self) -> SensorModel {
        self.model
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn sensor_info(&self) -> &SensorInfo {
        &self.info
    }

    /// `true` once a streaming request has been confirmed and not yet stopped.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Window of the last successful acquisition.
    pub fn scan_window(&self) -> Option<&ScanWindow> {
        self.scan_window.as_ref()
    }

    /// Byte length of the last data packet, when known for the current window.
    pub fn packet_length_hint(&self) -> Option<usize> {
        self.packet_length
    }

    /// Bring a device in unknown state to a streaming-ready state: find its baud
    /// rate, switch to `baud_rate`, read its metadata and switch the laser on.
    ///
    /// The transport is closed when any step fails.
    pub fn connect(&mut self, baud_rate: u32) -> Result<()> {
        if !self.channel.is_connected() {
            return Err(Error::NotConnected);
        }
        match self.negotiate(baud_rate) {
            Ok(()) => {
                if self.debug {
                    info!("negotiate: connected\n{}", self.info);
                } else {
                    debug!("negotiate: connected to {} ({})", self.model, self.info.serial);
                }
                Ok(())
            }
            Err(e) => {
                error!("negotiate: failed: {}", e);
                self.channel.disconnect();
                Err(e)
            }
        }
    }

    fn negotiate(&mut self, baud_rate: u32) -> Result<()> {
        let detected = self.detect_baud_rate()?;
        if detected == baud_rate {
            trace!("negotiate: device already at {} baud", baud_rate);
        } else {
            self.set_baud_rate(baud_rate)?;
        }
        self.get_sensor_info()?;
        self.get_sensor_params()?;
        self.laser_on()
    }

    /// Stop the laser and close the transport. Does nothing when already disconnected.
    pub fn disconnect(&mut self) {
        if !self.channel.is_connected() {
            trace!("disconnect: already disconnected");
            return;
        }
        if let Err(e) = self.laser_off() {
            warn!("disconnect: could not stop laser: {}", e);
        }
        self.channel.disconnect();
        self.streaming = false;
        self.scan_window = None;
        self.packet_length = None;
        debug!("disconnect: done");
    }

    /// Try the candidate baud rates in order; the first one where the device
    /// answers a stop-laser command cleanly wins.
    pub fn detect_baud_rate(&mut self) -> Result<u32> {
        for &candidate in HOKUYO_BAUD_CANDIDATES.iter() {
            match self.test_baud_rate(candidate) {
                Ok(()) => {
                    debug!("negotiate: device answers at {} baud", candidate);
                    return Ok(candidate);
                }
                Err(e) => debug!("negotiate: no answer at {} baud: {}", candidate, e),
            }
        }
        error!("negotiate: no SCIP2.0 answer at any candidate baud rate");
        Err(Error::BaudRateNotDetected)
    }

    fn test_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.channel.set_baud_rate(baud_rate)?;
        // the first stop also ends any scan left running by a previous session
        if let Err(e) = self.laser_off() {
            trace!("negotiate: first stop at {} baud failed: {}", baud_rate, e);
        }
        self.laser_off()?;
        self.baud_rate = baud_rate;
        Ok(())
    }

    /// Switch the device, then the transport, to `baud_rate`.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        if !HOKUYO_DEVICE_BAUD_RATES.contains(&baud_rate) {
            return Err(Error::UnsupportedBaudRate(baud_rate));
        }
        let command = set_baud_command(baud_rate);
        let status = self.request(&command, &SET_BAUD_STATUSES, HOKUYO_BAUD_TIMEOUT)?;
        self.read_blank_line(HOKUYO_BAUD_TIMEOUT)?;
        trace!("set_baud_rate: device answered {}", status);
        self.channel.set_baud_rate(baud_rate)?;
        self.baud_rate = baud_rate;
        debug!("set_baud_rate: now at {} baud", baud_rate);
        Ok(())
    }

    /// Switch the laser on, stopping it first so the device starts from a known state.
    pub fn laser_on(&mut self) -> Result<()> {
        if let Err(e) = self.laser_on_off(false) {
            trace!("laser_on: preliminary stop failed: {}", e);
        }
        self.laser_on_off(true)
    }

    /// Switch the laser off, retrying a few times.
    pub fn laser_off(&mut self) -> Result<()> {
        let mut last_error = Error::OperationTimeout;
        for attempt in 1..=NUM_STOP_LASER_RETRIES {
            match self.laser_on_off(false) {
                Ok(()) => return Ok(()),
                Err(Error::NotConnected) => return Err(Error::NotConnected),
                Err(e) => {
                    trace!("laser_off: attempt {} failed: {}", attempt, e);
                    last_error = e;
                    thread::sleep(LASER_STOP_DELAY);
                }
            }
        }
        Err(last_error)
    }

    fn laser_on_off(&mut self, on: bool) -> Result<()> {
        let (command, accepted): (&str, &[&str]) = if on {
            (HOKUYO_CMD_LASER_ON, &LASER_ON_STATUSES)
        } else {
            (HOKUYO_CMD_LASER_OFF, &LASER_OFF_STATUSES)
        };
        let result = self
            .request(command, accepted, HOKUYO_LASER_TIMEOUT)
            .and_then(|_| self.read_blank_line(HOKUYO_LASER_TIMEOUT));
        if !on {
            // a stop that reached the device ends streaming even if its answer got lost
            self.streaming = false;
        }
        result
    }

    /// Gets vendor, product, firmware, protocol and serial number, and classifies the
    /// device model from the product line.
    /// Uses the default timeout (`HOKUYO_INFO_TIMEOUT`).
    pub fn get_sensor_info(&mut self) -> Result<SensorInfo> {
        self.get_sensor_info_with_timeout(HOKUYO_INFO_TIMEOUT)
    }

    /// Gets the version information with a specified timeout per line.
    pub fn get_sensor_info_with_timeout(&mut self, timeout: Duration) -> Result<SensorInfo> {
        trace!("get_sensor_info: requesting version information");
        self.request(HOKUYO_CMD_VERSION, &INFO_STATUSES, timeout)?;
        let vendor = self.read_field("VEND", timeout)?;
        let product = self.read_field("PROD", timeout)?;
        let firmware = self.read_field("FIRM", timeout)?;
        let protocol = self.read_field("PROT", timeout)?;
        let serial = self.read_field("SERI", timeout)?;
        self.drain_to_blank_line(timeout)?;

        self.model = SensorModel::from_product(&product).unwrap_or_else(|| {
            warn!(
                "get_sensor_info: unknown product {:?}, assuming {}",
                product,
                SensorModel::Urg04lx
            );
            SensorModel::Urg04lx
        });

        self.info = SensorInfo {
            vendor,
            product,
            firmware,
            protocol,
            serial,
            model: std::mem::take(&mut self.info.model),
        };
        trace!("get_sensor_info: {:?}", self.info);
        Ok(self.info.clone())
    }

    /// Gets the distance, angle and scan rate parameters and derives the calibration.
    /// Uses the default timeout (`HOKUYO_INFO_TIMEOUT`).
    pub fn get_sensor_params(&mut self) -> Result<Calibration> {
        self.get_sensor_params_with_timeout(HOKUYO_INFO_TIMEOUT)
    }

    /// Gets the device parameters with a specified timeout per line.
    pub fn get_sensor_params_with_timeout(&mut self, timeout: Duration) -> Result<Calibration> {
        trace!("get_sensor_params: requesting parameters");
        self.request(HOKUYO_CMD_PARAMETERS, &INFO_STATUSES, timeout)?;
        let mut lines = Vec::with_capacity(PARAMETER_FIELDS.len());
        for _ in PARAMETER_FIELDS.iter() {
            lines.push(
                self.protocol
                    .read_line(&mut self.channel, MAX_LINE_LENGTH, timeout, false)?,
            );
        }
        self.drain_to_blank_line(timeout)?;

        let params = SensorParameters::parse(&lines)?;
        trace!("get_sensor_params: {:?}", params);
        let calibration = Calibration::from_parameters(&params)?;
        self.info.model = params.model;
        self.calibration = calibration.clone();
        Ok(calibration)
    }

    /// Runs one scan exchange and returns the decoded range values.
    /// Uses the default timeout (`HOKUYO_GET_SCAN_TIMEOUT`).
    ///
    /// A streaming request is only sent when the device is not already streaming
    /// the same window; later calls just collect the next scan.
    pub fn acquire(&mut self, request: &ScanRequest) -> Result<Vec<u32>> {
        self.acquire_with_timeout(request, HOKUYO_GET_SCAN_TIMEOUT)
    }

    /// Runs one scan exchange with a specified timeout per read.
    ///
    /// # Arguments
    ///
    /// * `request` - Window and repeat count; only single shots (1) and streaming (0).
    /// * `timeout` - Deadline for each line or packet read.
    pub fn acquire_with_timeout(
        &mut self,
        request: &ScanRequest,
        timeout: Duration,
    ) -> Result<Vec<u32>> {
        let command = build_scan_command(self.model, request)?;
        if request.repeat != REPEAT_SINGLE && request.repeat != REPEAT_STREAMING {
            return Err(Error::InvalidRepeatCount(request.repeat));
        }
        if !self.channel.is_connected() {
            return Err(Error::NotConnected);
        }

        let window = request.window;
        if self.scan_window.as_ref() != Some(&window) {
            trace!("acquire: new scan window {:?}, packet length unknown", window);
            self.packet_length = None;
            if self.streaming {
                debug!("acquire: stopping stream to change scan window");
                match self.laser_off() {
                    Ok(()) => thread::sleep(HOKUYO_IDLE),
                    Err(e) => warn!("acquire: could not stop stream: {}", e),
                }
            }
        }

        let must_send = request.is_single() || !self.streaming;
        if must_send {
            self.send_scan_command(&command, timeout)?;
            if request.is_streaming() || window.kind == ScanKind::Intensity {
                self.read_blank_line(timeout)?;
            }
        } else {
            trace!("acquire: already streaming, collecting next scan");
        }

        match self.read_scan(&command, request, timeout) {
            Ok(ranges) => {
                self.scan_window = Some(window);
                if request.is_streaming() {
                    self.streaming = true;
                }
                trace!("acquire: decoded {} values", ranges.len());
                Ok(ranges)
            }
            Err(e) => {
                self.packet_length = None;
                Err(e)
            }
        }
    }

    /// Discard input up to and including the next packet terminator.
    /// Uses the default timeout (`HOKUYO_GET_SCAN_TIMEOUT`).
    pub fn resynchronize(&mut self) -> Result<()> {
        self.resynchronize_with_timeout(HOKUYO_GET_SCAN_TIMEOUT)
    }

    pub fn resynchronize_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        let skipped = self
            .channel
            .read_until(b"\n\n", MAX_PACKET_LENGTH, timeout)?;
        trace!("resynchronize: skipped {} bytes", skipped.len());
        Ok(())
    }

    /// Flush, send the scan command and confirm it. A laser-off rejection is
    /// answered by switching the laser on and sending once more.
    fn send_scan_command(&mut self, command: &ScanCommand, timeout: Duration) -> Result<()> {
        let mut laser_retry = true;
        loop {
            self.channel.flush_input()?;
            self.send_command(&command.text)?;
            match self.confirm_scan_command(command, timeout) {
                Err(Error::DeviceStatus { status, .. })
                    if laser_retry && status.is_recoverable() =>
                {
                    warn!("acquire: {} rejected with laser off, switching it on", command.text);
                    laser_retry = false;
                    self.laser_on()?;
                }
                other => return other,
            }
        }
    }

    fn confirm_scan_command(&mut self, command: &ScanCommand, timeout: Duration) -> Result<()> {
        self.read_echo(&command.text, timeout)?;
        let status = self.read_status(timeout)?;
        match ScipStatus::from_code(&status) {
            ScipStatus::Ok => Ok(()),
            status => {
                debug!("acquire: {} answered {}", command.text, status);
                Err(Error::DeviceStatus {
                    command: command.text.clone(),
                    status,
                })
            }
        }
    }

    fn read_scan(
        &mut self,
        command: &ScanCommand,
        request: &ScanRequest,
        timeout: Duration,
    ) -> Result<Vec<u32>> {
        if command.expects_ack_echo {
            self.read_data_header(command, timeout)?;
        }

        let timestamp = self.read_status(timeout)?;
        trace!("acquire: timestamp {:?}", String::from_utf8_lossy(&timestamp));

        let raw = self.read_packet(timeout)?;
        let payload = extract_packet(&raw, &self.protocol)?;
        decode_ranges(&payload, request.window.encoding, self.model.max_points())
    }

    /// Echo and `99` status repeated in front of every streamed data block. The
    /// echo's last two characters count down the remaining scans and are ignored.
    fn read_data_header(&mut self, command: &ScanCommand, timeout: Duration) -> Result<()> {
        let echo = self
            .protocol
            .read_line(&mut self.channel, MAX_LINE_LENGTH, timeout, false)?;
        let prefix = &command.text.as_bytes()[..command.text.len() - 2];
        if !echo.starts_with(prefix) {
            return Err(Error::ProtocolError {
                description: format!(
                    "expected data echo of {}, got {:?}",
                    command.text,
                    String::from_utf8_lossy(&echo)
                ),
            });
        }
        let status = self.read_status(timeout)?;
        match ScipStatus::from_code(&status) {
            ScipStatus::DataFollows => Ok(()),
            status => Err(Error::DeviceStatus {
                command: command.text.clone(),
                status,
            }),
        }
    }

    fn read_packet(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        match self.packet_length {
            Some(len) => self.channel.read_exact(len, timeout),
            None => {
                let raw = self
                    .channel
                    .read_until(b"\n\n", MAX_PACKET_LENGTH, timeout)?;
                trace!("acquire: packet length is {} bytes", raw.len());
                self.packet_length = Some(raw.len());
                Ok(raw)
            }
        }
    }

    fn send_command(&mut self, command: &str) -> Result<()> {
        trace!("Sending command {}", command);
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        self.channel.write(&line)?;
        Ok(())
    }

    /// Flush, send `command`, check its echo and that its status is one of `accepted`.
    fn request(&mut self, command: &str, accepted: &[&str], timeout: Duration) -> Result<String> {
        self.channel.flush_input()?;
        self.send_command(command)?;
        self.read_echo(command, timeout)?;
        let status = String::from_utf8_lossy(&self.read_status(timeout)?).into_owned();
        if !accepted.contains(&status.as_str()) {
            return Err(Error::ProtocolError {
                description: format!(
                    "{} answered status {:?}, expected one of {:?}",
                    command, status, accepted
                ),
            });
        }
        Ok(status)
    }

    fn read_echo(&mut self, command: &str, timeout: Duration) -> Result<()> {
        let echo = self
            .protocol
            .read_line(&mut self.channel, MAX_LINE_LENGTH, timeout, false)?;
        if echo != command.as_bytes() {
            return Err(Error::ProtocolError {
                description: format!(
                    "expected echo of {}, got {:?}",
                    command,
                    String::from_utf8_lossy(&echo)
                ),
            });
        }
        Ok(())
    }

    fn read_status(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        self.protocol
            .read_line(&mut self.channel, MAX_LINE_LENGTH, timeout, true)
    }

    fn read_blank_line(&mut self, timeout: Duration) -> Result<()> {
        let line = self
            .protocol
            .read_line(&mut self.channel, MAX_LINE_LENGTH, timeout, false)?;
        if !line.is_empty() {
            return Err(Error::ProtocolError {
                description: format!(
                    "expected blank line, got {:?}",
                    String::from_utf8_lossy(&line)
                ),
            });
        }
        Ok(())
    }

    fn read_field(&mut self, name: &str, timeout: Duration) -> Result<String> {
        let line = self
            .protocol
            .read_line(&mut self.channel, MAX_LINE_LENGTH, timeout, false)?;
        parse_field(&line, name)
    }

    /// Consume the rest of a metadata response, through its closing blank line.
    fn drain_to_blank_line(&mut self, timeout: Duration) -> Result<()> {
        for _ in 0..MAX_TRAILING_LINES {
            let line = self
                .protocol
                .read_line(&mut self.channel, MAX_LINE_LENGTH, timeout, false)?;
            if line.is_empty() {
                return Ok(());
            }
            debug!(
                "Skipping extra response line {:?}",
                String::from_utf8_lossy(&line)
            );
        }
        Err(Error::ProtocolError {
            description: format!("no blank line within {} lines", MAX_TRAILING_LINES),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTransport, SimulatedSensor};
    use crate::types::{ChecksumPolicy, Encoding};

    fn connected(sensor: SimulatedSensor) -> (HokuyoDevice<MockTransport>, MockTransport) {
        let mock = sensor.into_transport();
        let mut device = HokuyoDevice::with_stream(
            Box::new(mock.clone()),
            &HokuyoOptions::default().checksum_policy(ChecksumPolicy::Strict),
        );
        device.connect(115200).unwrap();
        (device, mock)
    }

    #[test]
    fn connect_reads_metadata() {
        let (device, _mock) = connected(SimulatedSensor::urg_04lx());
        assert!(device.is_connected());
        assert_eq!(device.model(), SensorModel::Urg04lx);
        assert_eq!(device.baud_rate(), 115200);
        assert_eq!(device.sensor_info().serial, "H0612345");
        assert_eq!(device.sensor_info().protocol, "SCIP 2.0");
        assert_eq!(device.calibration().count_zero, 384);
        assert!((device.calibration().scan_rate - 10.0).abs() < 1e-9);
    }

    #[test]
    fn utm_is_classified_from_product() {
        let (device, _mock) = connected(SimulatedSensor::utm_30lx());
        assert_eq!(device.model(), SensorModel::Utm30lx);
        assert_eq!(device.sensor_info().model, "UTM-30LX");
    }

    #[test]
    fn unknown_product_defaults_to_urg() {
        let (device, _mock) =
            connected(SimulatedSensor::utm_30lx().with_product("SOKUIKI Sensor UBG-04LX-F01"));
        assert_eq!(device.model(), SensorModel::Urg04lx);
    }

    #[test]
    fn bad_calibration_aborts_connect() {
        let mock = SimulatedSensor::urg_04lx().with_dist_min(0).into_transport();
        let mut device =
            HokuyoDevice::with_stream(Box::new(mock.clone()), &HokuyoOptions::default());
        assert!(matches!(
            device.connect(115200),
            Err(Error::BadCalibration { .. })
        ));
        assert!(!device.is_connected());
    }

    #[test]
    fn single_shot_decodes_window() {
        let (mut device, _mock) = connected(SimulatedSensor::urg_04lx());
        let ranges = device
            .acquire(&ScanRequest::single(ScanWindow::default()))
            .unwrap();
        assert_eq!(ranges.len(), 725 - 44 + 1);
        assert_eq!(ranges[0], 1044);
        assert_eq!(ranges[ranges.len() - 1], 1725);
        assert!(!device.is_streaming());
    }

    #[test]
    fn two_digit_single_shot() {
        let (mut device, _mock) = connected(SimulatedSensor::urg_04lx());
        let window = ScanWindow::new(100, 199).with_encoding(Encoding::TwoDigit);
        let ranges = device.acquire(&ScanRequest::single(window)).unwrap();
        assert_eq!(ranges.len(), 100);
        assert_eq!(ranges[0], 1100);
    }

    #[test]
    fn streaming_is_started_once() {
        let (mut device, mock) = connected(SimulatedSensor::urg_04lx());
        let request = ScanRequest::default();

        let first = device.acquire(&request).unwrap();
        assert!(device.is_streaming());
        assert!(device.packet_length_hint().is_some());
        let second = device.acquire(&request).unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.count_commands("MD"), 1);
    }

    #[test]
    fn window_change_restarts_stream() {
        let (mut device, mock) = connected(SimulatedSensor::urg_04lx());
        device.acquire(&ScanRequest::default()).unwrap();
        let stops_before = mock.count_commands("QT");

        let narrow = ScanRequest::streaming(ScanWindow::new(100, 200));
        let started = std::time::Instant::now();
        let ranges = device.acquire(&narrow).unwrap();
        // the device gets a settling pause between the stop and the new start
        assert!(started.elapsed() >= HOKUYO_IDLE);

        assert_eq!(ranges.len(), 101);
        assert_eq!(mock.count_commands("QT"), stops_before + 1);
        assert_eq!(mock.count_commands("MD"), 2);
        assert_eq!(device.scan_window(), Some(&narrow.window));
    }

    #[test]
    fn laser_off_status_is_retried_with_laser_on() {
        let (mut device, mock) = connected(SimulatedSensor::urg_04lx());
        device.laser_off().unwrap();
        let ranges = device
            .acquire(&ScanRequest::single(ScanWindow::default()))
            .unwrap();
        assert_eq!(ranges.len(), 682);
        assert_eq!(mock.count_commands("GD"), 2);
    }

    #[test]
    fn utm_two_digit_fails_before_io() {
        let (mut device, mock) = connected(SimulatedSensor::utm_30lx());
        mock.clear_commands();
        let request = ScanRequest::streaming(ScanWindow::default().with_encoding(Encoding::TwoDigit));
        assert!(matches!(
            device.acquire(&request),
            Err(Error::UnsupportedEncoding(_))
        ));
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn utm_intensity_single_shot() {
        let (mut device, _mock) = connected(SimulatedSensor::utm_30lx());
        let window = ScanWindow::new(0, 1080).with_kind(ScanKind::Intensity);
        let ranges = device.acquire(&ScanRequest::single(window)).unwrap();
        assert_eq!(ranges.len(), 2 * 1081);
    }

    #[test]
    fn burst_repeat_counts_are_refused() {
        let (mut device, _mock) = connected(SimulatedSensor::urg_04lx());
        let request = ScanRequest {
            window: ScanWindow::default(),
            repeat: 5,
        };
        assert!(matches!(
            device.acquire(&request),
            Err(Error::InvalidRepeatCount(5))
        ));
    }

    #[test]
    fn corrupt_scan_fails_in_strict_mode_and_clears_hint() {
        let (mut device, _mock) = connected(SimulatedSensor::urg_04lx().with_corrupted_scans(1));
        let request = ScanRequest::default();
        assert!(matches!(
            device.acquire(&request),
            Err(Error::CorruptLine { .. })
        ));
        assert!(!device.is_streaming());
        assert_eq!(device.packet_length_hint(), None);
        assert_eq!(device.scan_window(), None);
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut device, mock) = connected(SimulatedSensor::urg_04lx());
        device.disconnect();
        assert!(!device.is_connected());
        let commands = mock.commands().len();
        device.disconnect();
        assert_eq!(mock.commands().len(), commands);
        assert!(matches!(
            device.acquire(&ScanRequest::default()),
            Err(Error::NotConnected)
        ));
    }
}
