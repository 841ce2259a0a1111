//! In-memory transport and a simulated SCIP2.0 sensor for exercising the driver
//! without hardware.

use crate::base::{Result, Transport};
use crate::checksum::Checksum;
use crate::types::{SensorModel, URG_04LX_PRODUCT, UTM_30LX_PRODUCT};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long an empty read waits before reporting a timeout.
const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Intensity reported for every step of an intensity scan.
const SIMULATED_INTENSITY: u32 = 500;

/// The far end of a [`MockTransport`].
pub trait MockDevice: Send {
    /// Answer one command line (terminator stripped) received at `baud_rate`.
    fn on_command(&mut self, command: &str, baud_rate: u32) -> Vec<u8>;

    /// Produce unsolicited bytes when the host finds nothing to read.
    fn on_idle(&mut self, _baud_rate: u32) -> Vec<u8> {
        Vec::new()
    }
}

struct MockTransportInner {
    device: Box<dyn MockDevice>,
    read_buffer: VecDeque<u8>,
    pending_command: Vec<u8>,
    commands: Vec<String>,
    baud_rate: u32,
    connected: bool,
}

/// Transport whose far end is a [`MockDevice`]. Clones share state, so a test
/// can keep one clone to inspect traffic after handing another to the driver.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

impl MockTransport {
    pub fn new(device: Box<dyn MockDevice>, baud_rate: u32) -> MockTransport {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                device,
                read_buffer: VecDeque::new(),
                pending_command: Vec::new(),
                commands: Vec::new(),
                baud_rate,
                connected: true,
            })),
        }
    }

    /// Queue bytes as if the device had sent them.
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Every command line written so far, terminators stripped.
    pub fn commands(&self) -> Vec<String> {
        self.inner.lock().commands.clone()
    }

    /// Number of commands written so far that start with `prefix`.
    pub fn count_commands(&self, prefix: &str) -> usize {
        self.inner
            .lock()
            .commands
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_commands(&self) {
        self.inner.lock().commands.clear();
    }
}

impl io::Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        {
            let mut inner = self.inner.lock();
            if !inner.connected {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "mock closed"));
            }
            if inner.read_buffer.is_empty() {
                let baud_rate = inner.baud_rate;
                let unsolicited = inner.device.on_idle(baud_rate);
                inner.read_buffer.extend(unsolicited);
            }
            if !inner.read_buffer.is_empty() {
                let n = buf.len().min(inner.read_buffer.len());
                for (slot, byte) in buf.iter_mut().zip(inner.read_buffer.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }
        }
        thread::sleep(MOCK_READ_TIMEOUT);
        Err(io::Error::new(io::ErrorKind::TimedOut, "no data"))
    }
}

impl io::Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "mock closed"));
        }
        for &b in buf {
            if b == b'\n' {
                let command = String::from_utf8_lossy(&inner.pending_command).into_owned();
                inner.pending_command.clear();
                let baud_rate = inner.baud_rate;
                let response = inner.device.on_command(&command, baud_rate);
                inner.read_buffer.extend(response);
                inner.commands.push(command);
            } else {
                inner.pending_command.push(b);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MockTransport {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.baud_rate = baud_rate;
        inner.pending_command.clear();
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.inner.lock().baud_rate
    }

    fn clear_input(&mut self) -> Result<()> {
        self.inner.lock().read_buffer.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }

    fn disconnect(&mut self) {
        self.inner.lock().connected = false;
    }
}

/// Appends `payload`, its checksum and a linefeed.
fn push_checked_line(out: &mut Vec<u8>, payload: &[u8]) {
    out.extend_from_slice(payload);
    out.push(Checksum::of(payload));
    out.push(b'\n');
}

fn push_line(out: &mut Vec<u8>, text: &[u8]) {
    out.extend_from_slice(text);
    out.push(b'\n');
}

/// Encodes `value` as `width` 6-bit characters.
fn encode_value(value: u32, width: usize) -> Vec<u8> {
    (0..width)
        .rev()
        .map(|i| (((value >> (6 * i)) & 0x3F) as u8) + 0x30)
        .collect()
}

#[derive(Debug, Clone)]
struct ActiveStream {
    /// Echo of the start command with its repeat count field removed.
    echo_prefix: String,
    shape: ScanShape,
    remaining: Option<u32>,
}

/// Which steps a scan covers and how each is encoded.
#[derive(Debug, Clone, Copy)]
struct ScanShape {
    start: usize,
    skip: usize,
    points: usize,
    width: usize,
    with_intensity: bool,
}

/// A scripted SCIP2.0 sensor.
///
/// Ranges are synthesised as `1000 + step`, using the first step of each
/// cluster. Streams started with `MD`/`MS`/`ME`
/// emit one scan each time the host finds the line idle.
pub struct SimulatedSensor {
    model: SensorModel,
    product: String,
    baud_rate: u32,
    laser_on: bool,
    stream: Option<ActiveStream>,
    corrupt_scans: u32,
    dist_min: i64,
    scans_sent: u32,
}

impl SimulatedSensor {
    pub fn new(model: SensorModel) -> SimulatedSensor {
        let product = match model {
            SensorModel::Urg04lx => URG_04LX_PRODUCT,
            SensorModel::Utm30lx => UTM_30LX_PRODUCT,
        };
        SimulatedSensor {
            model,
            product: product.to_owned(),
            baud_rate: 115200,
            laser_on: false,
            stream: None,
            corrupt_scans: 0,
            dist_min: 20,
            scans_sent: 0,
        }
    }

    pub fn urg_04lx() -> SimulatedSensor {
        SimulatedSensor::new(SensorModel::Urg04lx)
    }

    pub fn utm_30lx() -> SimulatedSensor {
        SimulatedSensor::new(SensorModel::Utm30lx)
    }

    /// Rate the sensor is listening at; commands at any other rate are lost.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> SimulatedSensor {
        self.baud_rate = baud_rate;
        self
    }

    /// Product line reported by the version query.
    pub fn with_product(mut self, product: &str) -> SimulatedSensor {
        self.product = product.to_owned();
        self
    }

    /// Minimum distance reported by the parameters query, in millimetres.
    pub fn with_dist_min(mut self, dist_min: i64) -> SimulatedSensor {
        self.dist_min = dist_min;
        self
    }

    /// Send the first `count` scans with a broken checksum on their first data line.
    pub fn with_corrupted_scans(mut self, count: u32) -> SimulatedSensor {
        self.corrupt_scans = count;
        self
    }

    /// Attach to a new [`MockTransport`] at the sensor's own baud rate.
    pub fn into_transport(self) -> MockTransport {
        let baud_rate = self.baud_rate;
        MockTransport::new(Box::new(self), baud_rate)
    }

    fn status_reply(command: &str, status: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        push_line(&mut out, command.as_bytes());
        push_checked_line(&mut out, status);
        out.push(b'\n');
        out
    }

    fn version_reply(&self) -> Vec<u8> {
        let mut out = Vec::new();
        push_line(&mut out, b"VV");
        push_checked_line(&mut out, b"00");
        for field in [
            "VEND:Hokuyo Automatic Co.,Ltd.".to_owned(),
            format!("PROD:{}", self.product),
            "FIRM:3.3.00,07/06/11".to_owned(),
            "PROT:SCIP 2.0".to_owned(),
            "SERI:H0612345".to_owned(),
        ] {
            out.extend_from_slice(field.as_bytes());
            out.push(b';');
            out.push(Checksum::of(field.as_bytes()));
            out.push(b'\n');
        }
        out.push(b'\n');
        out
    }

    fn parameters_reply(&self) -> Vec<u8> {
        let (model, dmax, ares, amin, amax, afrt, scan) = match self.model {
            SensorModel::Urg04lx => ("URG-04LX(Hokuyo Automatic Co.,Ltd.)", 5600, 1024, 44, 725, 384, 600),
            SensorModel::Utm30lx => ("UTM-30LX", 30000, 1440, 0, 1080, 540, 2400),
        };
        let mut out = Vec::new();
        push_line(&mut out, b"PP");
        push_checked_line(&mut out, b"00");
        for field in [
            format!("MODL:{}", model),
            format!("DMIN:{}", self.dist_min),
            format!("DMAX:{}", dmax),
            format!("ARES:{}", ares),
            format!("AMIN:{}", amin),
            format!("AMAX:{}", amax),
            format!("AFRT:{}", afrt),
            format!("SCAN:{}", scan),
        ] {
            out.extend_from_slice(field.as_bytes());
            out.push(b';');
            out.push(Checksum::of(field.as_bytes()));
            out.push(b'\n');
        }
        out.push(b'\n');
        out
    }

    /// Timestamp line plus data lines plus the closing blank line.
    fn data_block(&mut self, shape: ScanShape) -> Vec<u8> {
        let mut out = Vec::new();
        push_checked_line(&mut out, &encode_value(self.scans_sent, 4));

        let mut payload = Vec::with_capacity(shape.points * shape.width * 2);
        for i in 0..shape.points {
            let step = shape.start + i * shape.skip;
            payload.extend(encode_value(1000 + step as u32, shape.width));
            if shape.with_intensity {
                payload.extend(encode_value(SIMULATED_INTENSITY, shape.width));
            }
        }

        let corrupt = self.corrupt_scans > 0;
        if corrupt {
            self.corrupt_scans -= 1;
        }
        for (i, chunk) in payload.chunks(64).enumerate() {
            let mark = out.len() + chunk.len();
            push_checked_line(&mut out, chunk);
            if corrupt && i == 0 {
                out[mark] = out[mark].wrapping_add(1);
            }
        }
        out.push(b'\n');
        self.scans_sent += 1;
        out
    }

    fn scan_reply(&mut self, command: &str) -> Vec<u8> {
        if command.len() < 12 {
            return SimulatedSensor::status_reply(command, b"0E");
        }
        let opcode = &command[0..2];
        let start: usize = command[2..6].parse().unwrap_or(0);
        let end: usize = command[6..10].parse().unwrap_or(0);
        let skip = usize::from_str_radix(&command[10..12], 16).unwrap_or(1).max(1);
        if end < start {
            return SimulatedSensor::status_reply(command, b"05");
        }
        if end > self.model.max_points() {
            return SimulatedSensor::status_reply(command, b"04");
        }
        let shape = ScanShape {
            start,
            skip,
            points: (end - start) / skip + 1,
            width: if opcode == "GS" || opcode == "MS" { 2 } else { 3 },
            with_intensity: opcode == "ME",
        };

        match opcode {
            "GD" | "GS" => {
                if !self.laser_on {
                    let mut out = Vec::new();
                    push_line(&mut out, command.as_bytes());
                    push_checked_line(&mut out, b"10");
                    out.push(b'\n');
                    return out;
                }
                let mut out = Vec::new();
                push_line(&mut out, command.as_bytes());
                push_checked_line(&mut out, b"00");
                out.extend(self.data_block(shape));
                out
            }
            _ => {
                let repeat: u32 = command.get(13..15).and_then(|r| r.parse().ok()).unwrap_or(0);
                self.laser_on = true;
                self.stream = Some(ActiveStream {
                    echo_prefix: command[..command.len() - 2].to_owned(),
                    shape,
                    remaining: if repeat == 0 { None } else { Some(repeat) },
                });
                // data starts with the next idle read
                SimulatedSensor::status_reply(command, b"00")
            }
        }
    }

    fn stream_scan(&mut self) -> Vec<u8> {
        let Some(stream) = self.stream.clone() else {
            return Vec::new();
        };
        let remaining = match stream.remaining {
            Some(0) => {
                self.stream = None;
                return Vec::new();
            }
            Some(n) => {
                if let Some(active) = self.stream.as_mut() {
                    active.remaining = Some(n - 1);
                }
                n - 1
            }
            None => 0,
        };
        let mut out = Vec::new();
        push_line(
            &mut out,
            format!("{}{:02}", stream.echo_prefix, remaining).as_bytes(),
        );
        push_checked_line(&mut out, b"99");
        out.extend(self.data_block(stream.shape));
        out
    }
}

impl MockDevice for SimulatedSensor {
    fn on_command(&mut self, command: &str, baud_rate: u32) -> Vec<u8> {
        if baud_rate != self.baud_rate {
            return Vec::new();
        }
        match command.get(0..2).unwrap_or("") {
            "QT" => {
                self.laser_on = false;
                self.stream = None;
                SimulatedSensor::status_reply(command, b"00")
            }
            "BM" => {
                let status: &[u8] = if self.laser_on { b"02" } else { b"00" };
                self.laser_on = true;
                SimulatedSensor::status_reply(command, status)
            }
            "VV" => self.version_reply(),
            "PP" => self.parameters_reply(),
            "SS" => match command[2..].parse::<u32>() {
                Ok(rate) if rate == self.baud_rate => {
                    SimulatedSensor::status_reply(command, b"03")
                }
                Ok(rate) => {
                    let reply = SimulatedSensor::status_reply(command, b"00");
                    self.baud_rate = rate;
                    reply
                }
                Err(_) => SimulatedSensor::status_reply(command, b"01"),
            },
            "GD" | "GS" | "MD" | "MS" | "ME" => self.scan_reply(command),
            _ => SimulatedSensor::status_reply(command, b"0E"),
        }
    }

    fn on_idle(&mut self, baud_rate: u32) -> Vec<u8> {
        if baud_rate != self.baud_rate {
            return Vec::new();
        }
        self.stream_scan()
    }
}
