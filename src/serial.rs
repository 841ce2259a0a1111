//! Serial transport for sensors attached over USB-CDC or RS-232.

use crate::base::{Error, Result, Transport};
use crate::internals::TRANSPORT_BAUD_RATES;
use log::{debug, info, warn};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

/// Per-call read timeout; `Channel` enforces the real deadlines.
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// [`Transport`] over a `serialport` device.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    baud_rate: u32,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyACM0")
    /// * `baud_rate` - Initial baud rate; negotiation may change it later
    pub fn open(path: &str, baud_rate: u32) -> Result<SerialTransport> {
        if !TRANSPORT_BAUD_RATES.contains(&baud_rate) {
            return Err(Error::UnsupportedBaudRate(baud_rate));
        }
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(SERIAL_READ_TIMEOUT)
            .open()?;

        info!("Opened serial port {} at {} baud", path, baud_rate);

        Ok(SerialTransport {
            port: Some(port),
            path: path.to_owned(),
            baud_rate,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port closed"))
    }
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl io::Read for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port()?.read(buf)
    }
}

impl io::Write for SerialTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port()?.flush()
    }
}

impl Transport for SerialTransport {
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        if !TRANSPORT_BAUD_RATES.contains(&baud_rate) {
            return Err(Error::UnsupportedBaudRate(baud_rate));
        }
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.set_baud_rate(baud_rate)?;
        self.baud_rate = baud_rate;
        debug!("{}: baud rate set to {}", self.path, baud_rate);
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn clear_input(&mut self) -> Result<()> {
        let port = self.port.as_ref().ok_or(Error::NotConnected)?;
        port.clear(ClearBuffer::Input)?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn disconnect(&mut self) {
        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.flush() {
                warn!("{}: flush on close failed: {}", self.path, e);
            }
            info!("Closed serial port {}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_rejects_unsupported_baud() {
        assert!(matches!(
            SerialTransport::open("/dev/null", 14400),
            Err(Error::UnsupportedBaudRate(14400))
        ));
    }

    #[test]
    fn open_missing_port_fails() {
        assert!(SerialTransport::open("/dev/hokuyo-does-not-exist", 115200).is_err());
    }
}
