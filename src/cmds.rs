use crate::base::{Error, Result};
use crate::types::{
    Encoding, ScanKind, ScanRequest, SensorModel, MAX_REPEAT_COUNT, REPEAT_SINGLE,
};
use log::trace;

// Commands with a fixed text

/// Switches the laser on.
pub const HOKUYO_CMD_LASER_ON: &str = "BM";

/// Switches the laser off and ends any streaming.
pub const HOKUYO_CMD_LASER_OFF: &str = "QT";

/// Requests vendor, product, firmware, protocol and serial number.
pub const HOKUYO_CMD_VERSION: &str = "VV";

/// Requests distance, angle and scan rate parameters.
pub const HOKUYO_CMD_PARAMETERS: &str = "PP";

/// Prefix of the baud-change command; followed by a 6-digit rate.
pub const HOKUYO_CMD_SET_BAUD: &str = "SS";

// Scan commands

/// Single scan, three-digit values.
pub const HOKUYO_CMD_SINGLE_3DIGIT: &str = "GD";

/// Single scan, two-digit values.
pub const HOKUYO_CMD_SINGLE_2DIGIT: &str = "GS";

/// Repeated scans, three-digit values.
pub const HOKUYO_CMD_STREAM_3DIGIT: &str = "MD";

/// Repeated scans, two-digit values.
pub const HOKUYO_CMD_STREAM_2DIGIT: &str = "MS";

/// Range and intensity scans (UTM-30LX).
pub const HOKUYO_CMD_INTENSITY: &str = "ME";

/// Scan interval digit placed before the repeat count; 0 means every scan.
const STREAM_INTERVAL_MARKER: char = '0';

/// Baud-change command text for `baud_rate`.
pub fn set_baud_command(baud_rate: u32) -> String {
    format!("{}{:06}", HOKUYO_CMD_SET_BAUD, baud_rate)
}

/// A scan command ready to send, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCommand {
    pub text: String,
    /// The device repeats the echo and a `99` status before every data block.
    pub expects_ack_echo: bool,
}

/// Validates `request` against `model` and formats the scan command.
///
/// # Arguments
///
/// * `model` - Sensor the command is meant for.
/// * `request` - Window, encoding, scan kind and repeat count.
pub fn build_scan_command(model: SensorModel, request: &ScanRequest) -> Result<ScanCommand> {
    let window = &request.window;

    if window.end_step <= window.start_step {
        return Err(Error::InvalidScanRange {
            start: window.start_step,
            end: window.end_step,
        });
    }

    let max_points = model.max_points();
    if window.end_step as usize > max_points {
        return Err(Error::ScanEndOutOfRange {
            end: window.end_step,
            max: max_points,
        });
    }

    if request.repeat > MAX_REPEAT_COUNT {
        return Err(Error::InvalidRepeatCount(request.repeat));
    }

    if model == SensorModel::Utm30lx && window.encoding == Encoding::TwoDigit {
        return Err(Error::UnsupportedEncoding(format!(
            "{} only sends three-digit values",
            model
        )));
    }

    if window.kind == ScanKind::Intensity && model != SensorModel::Utm30lx {
        return Err(Error::UnsupportedScanKind(format!(
            "{} has no intensity mode",
            model
        )));
    }

    let opcode = match (window.kind, request.repeat == REPEAT_SINGLE, window.encoding) {
        (ScanKind::Intensity, _, _) => HOKUYO_CMD_INTENSITY,
        (ScanKind::Regular, true, Encoding::ThreeDigit) => HOKUYO_CMD_SINGLE_3DIGIT,
        (ScanKind::Regular, true, Encoding::TwoDigit) => HOKUYO_CMD_SINGLE_2DIGIT,
        (ScanKind::Regular, false, Encoding::ThreeDigit) => HOKUYO_CMD_STREAM_3DIGIT,
        (ScanKind::Regular, false, Encoding::TwoDigit) => HOKUYO_CMD_STREAM_2DIGIT,
    };

    let mut text = format!(
        "{}{:04}{:04}{:02x}",
        opcode, window.start_step, window.end_step, window.skip
    );

    let single_regular = window.kind == ScanKind::Regular && request.repeat == REPEAT_SINGLE;
    if !single_regular {
        text.push(STREAM_INTERVAL_MARKER);
        text.push_str(&format!("{:02}", request.repeat));
    }

    trace!("Built scan command {} for {}", text, model);
    Ok(ScanCommand {
        text,
        expects_ack_echo: !single_regular,
    })
}
