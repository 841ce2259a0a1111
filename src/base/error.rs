use crate::answers::ScipStatus;
use std::io;

/// Coarse classification of [`Error`] used by recovery policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Not connected, I/O timeout or write failure.
    Link,
    /// Unexpected echo or status code from the device.
    ProtocolMismatch,
    /// Checksum failure, malformed packet or decode overflow.
    CorruptData,
    /// Implausible device metadata.
    Calibration,
    /// The caller asked for something the device variant cannot do.
    InvalidRequest,
}

/// Represents errors that can occur during Hokuyo operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The transport is not connected.
    #[error("device is not connected")]
    NotConnected,

    /// A reader is already connected to a device.
    #[error("device is already connected")]
    AlreadyConnected,

    /// The execution of operation is timed out.
    #[error("operation timeout")]
    OperationTimeout,

    /// An I/O error occurred while communicating with the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The serial port could not be opened or configured.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The baud rate is not one the transport or device understands.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),

    /// None of the candidate baud rates produced a clean SCIP2.0 exchange.
    #[error("could not detect a SCIP2.0 baud rate")]
    BaudRateNotDetected,

    /// The device answered with an unexpected echo or framing.
    #[error("protocol error: {description}")]
    ProtocolError { description: String },

    /// The device rejected a command with a non-zero status code.
    #[error("command {command} rejected: {status}")]
    DeviceStatus { command: String, status: ScipStatus },

    /// A checksum-terminated line did not match its checksum byte.
    #[error("checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CorruptLine { expected: u8, actual: u8 },

    /// A multi-line data packet could not be framed.
    #[error("malformed packet: {description}")]
    MalformedPacket { description: String },

    /// The payload decoded to more points than the device can produce.
    #[error("decoded {count} points, device maximum is {max}")]
    TooManyPoints { count: usize, max: usize },

    /// The requested encoding is not available.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// The requested scan kind is not available on this device.
    #[error("unsupported scan kind: {0}")]
    UnsupportedScanKind(String),

    /// The scan window is empty or inverted.
    #[error("invalid scan range {start}..{end}")]
    InvalidScanRange { start: u32, end: u32 },

    /// The scan window ends past the device's last step.
    #[error("scan end {end} exceeds device maximum {max}")]
    ScanEndOutOfRange { end: u32, max: usize },

    /// The repeat count is outside 0..=99, or not usable for the operation.
    #[error("invalid repeat count {0}")]
    InvalidRepeatCount(u8),

    /// The device reported parameters that cannot describe a working sensor.
    #[error("bad calibration: {description}")]
    BadCalibration { description: String },
}

impl Error {
    /// Maps the error onto the driver's recovery taxonomy.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::NotConnected
            | Error::AlreadyConnected
            | Error::OperationTimeout
            | Error::Io(_)
            | Error::Serial(_)
            | Error::UnsupportedBaudRate(_)
            | Error::BaudRateNotDetected => ErrorClass::Link,
            Error::ProtocolError { .. } | Error::DeviceStatus { .. } => {
                ErrorClass::ProtocolMismatch
            }
            Error::CorruptLine { .. }
            | Error::MalformedPacket { .. }
            | Error::TooManyPoints { .. } => ErrorClass::CorruptData,
            Error::BadCalibration { .. } => ErrorClass::Calibration,
            Error::UnsupportedEncoding(_)
            | Error::UnsupportedScanKind(_)
            | Error::InvalidScanRange { .. }
            | Error::ScanEndOutOfRange { .. }
            | Error::InvalidRepeatCount(_) => ErrorClass::InvalidRequest,
        }
    }
}

/// A specialized `Result` type for Hokuyo operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_link_errors() {
        assert_eq!(Error::OperationTimeout.class(), ErrorClass::Link);
        let io_err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(io_err.class(), ErrorClass::Link);
    }

    #[test]
    fn checksum_failures_are_corrupt_data() {
        let err = Error::CorruptLine {
            expected: b'P',
            actual: b'Q',
        };
        assert_eq!(err.class(), ErrorClass::CorruptData);
        assert_eq!(err.to_string(), "checksum mismatch: expected 0x50, got 0x51");
    }

    #[test]
    fn device_status_is_protocol_mismatch() {
        let err = Error::DeviceStatus {
            command: "GD0044072501".to_owned(),
            status: ScipStatus::LaserOff,
        };
        assert_eq!(err.class(), ErrorClass::ProtocolMismatch);
    }
}
