use crate::base::{Error, Result};
use crate::internals::HOKUYO_DIST_RESOLUTION;
use crate::types::Calibration;
use std::f64::consts::PI;
use std::fmt;

/// Status code returned for a scan request, as documented for GD/GS/MD/MS/ME.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScipStatus {
    /// `00`
    Ok,
    /// `01`: start step is not a number.
    BadStartStep,
    /// `02`: end step is not a number.
    BadEndStep,
    /// `03`: cluster count is not a number.
    BadClusterCount,
    /// `04`: end step is out of range.
    EndStepOutOfRange,
    /// `05`: end step is smaller than start step.
    EndBeforeStart,
    /// `10`: laser is off.
    LaserOff,
    /// `99`: data follows (streaming cycles).
    DataFollows,
    /// Anything else: hardware trouble.
    HardwareFault(String),
}

impl ScipStatus {
    pub fn from_code(code: &[u8]) -> ScipStatus {
        match code {
            b"00" => ScipStatus::Ok,
            b"01" => ScipStatus::BadStartStep,
            b"02" => ScipStatus::BadEndStep,
            b"03" => ScipStatus::BadClusterCount,
            b"04" => ScipStatus::EndStepOutOfRange,
            b"05" => ScipStatus::EndBeforeStart,
            b"10" => ScipStatus::LaserOff,
            b"99" => ScipStatus::DataFollows,
            other => ScipStatus::HardwareFault(String::from_utf8_lossy(other).into_owned()),
        }
    }

    /// A laser-off status is recovered by switching the laser on and retrying;
    /// every other rejection stands.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScipStatus::LaserOff)
    }
}

impl fmt::Display for ScipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScipStatus::Ok => write!(f, "00 ok"),
            ScipStatus::BadStartStep => write!(f, "01 start step has non-numeric value"),
            ScipStatus::BadEndStep => write!(f, "02 end step has non-numeric value"),
            ScipStatus::BadClusterCount => write!(f, "03 cluster count has non-numeric value"),
            ScipStatus::EndStepOutOfRange => write!(f, "04 end step out of range"),
            ScipStatus::EndBeforeStart => write!(f, "05 end step smaller than start step"),
            ScipStatus::LaserOff => write!(f, "10 laser is off"),
            ScipStatus::DataFollows => write!(f, "99 data follows"),
            ScipStatus::HardwareFault(code) => write!(f, "{} hardware fault", code),
        }
    }
}

/// Laser-on accepts "already on".
pub const LASER_ON_STATUSES: [&str; 2] = ["00", "02"];
pub const LASER_OFF_STATUSES: [&str; 1] = ["00"];
/// Baud change accepts "already at that rate" and "not applicable" (USB link).
pub const SET_BAUD_STATUSES: [&str; 3] = ["00", "03", "04"];
pub const INFO_STATUSES: [&str; 1] = ["00"];

/// Extracts the value of a `NAME:value;<checksum>` metadata line.
pub fn parse_field(line: &[u8], name: &str) -> Result<String> {
    let text = String::from_utf8_lossy(line);
    let (key, rest) = text.split_once(':').ok_or_else(|| Error::ProtocolError {
        description: format!("{} line has no ':' separator: {:?}", name, text),
    })?;
    if key != name {
        return Err(Error::ProtocolError {
            description: format!("expected {} line, got {:?}", name, text),
        });
    }
    let value = rest.split_once(';').map(|(v, _)| v).ok_or_else(|| {
        Error::ProtocolError {
            description: format!("{} line has no ';' terminator: {:?}", name, text),
        }
    })?;
    Ok(value.to_owned())
}

fn parse_count(line: &[u8], name: &str) -> Result<i64> {
    let value = parse_field(line, name)?;
    value.trim().parse::<i64>().map_err(|_| Error::BadCalibration {
        description: format!("{} is not a number: {:?}", name, value),
    })
}

/// Raw values of the parameters query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorParameters {
    pub model: String,
    /// Millimetres.
    pub dist_min: i64,
    /// Millimetres.
    pub dist_max: i64,
    /// Steps per full turn.
    pub angle_resolution: i64,
    pub count_min: i64,
    pub count_max: i64,
    pub count_zero: i64,
    /// Revolutions per minute.
    pub scan_rpm: i64,
}

/// Field names of the parameters response, in the order the device sends them.
pub const PARAMETER_FIELDS: [&str; 8] = [
    "MODL", "DMIN", "DMAX", "ARES", "AMIN", "AMAX", "AFRT", "SCAN",
];

impl SensorParameters {
    /// Parses the eight field lines of a parameters response.
    pub fn parse(lines: &[Vec<u8>]) -> Result<SensorParameters> {
        if lines.len() < PARAMETER_FIELDS.len() {
            return Err(Error::ProtocolError {
                description: format!(
                    "parameters response has {} lines, expected {}",
                    lines.len(),
                    PARAMETER_FIELDS.len()
                ),
            });
        }
        Ok(SensorParameters {
            model: parse_field(&lines[0], "MODL")?,
            dist_min: parse_count(&lines[1], "DMIN")?,
            dist_max: parse_count(&lines[2], "DMAX")?,
            angle_resolution: parse_count(&lines[3], "ARES")?,
            count_min: parse_count(&lines[4], "AMIN")?,
            count_max: parse_count(&lines[5], "AMAX")?,
            count_zero: parse_count(&lines[6], "AFRT")?,
            scan_rpm: parse_count(&lines[7], "SCAN")?,
        })
    }
}

fn bad_calibration(description: String) -> Error {
    Error::BadCalibration { description }
}

fn to_count(value: i64, name: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| bad_calibration(format!("{} out of range: {}", name, value)))
}

impl Calibration {
    /// Derives physical units from raw parameters and checks they describe a
    /// usable sensor.
    pub fn from_parameters(params: &SensorParameters) -> Result<Calibration> {
        let dist_min = params.dist_min as f64 / 1000.0;
        if dist_min <= 0.0 {
            return Err(bad_calibration(format!(
                "minimum distance must be positive, got {} m",
                dist_min
            )));
        }

        let dist_max = params.dist_max as f64 / 1000.0;
        if dist_max < dist_min {
            return Err(bad_calibration(format!(
                "maximum distance {} m is below minimum {} m",
                dist_max, dist_min
            )));
        }

        if params.angle_resolution <= 0 {
            return Err(bad_calibration(format!(
                "angular resolution count must be positive, got {}",
                params.angle_resolution
            )));
        }
        let angle_resolution = 2.0 * PI / params.angle_resolution as f64;

        let count_min = to_count(params.count_min, "AMIN")?;
        let count_max = to_count(params.count_max, "AMAX")?;
        let count_zero = to_count(params.count_zero, "AFRT")?;
        if count_min > count_zero {
            return Err(bad_calibration(format!(
                "minimum count {} is past zero count {}",
                count_min, count_zero
            )));
        }
        if count_max < count_zero {
            return Err(bad_calibration(format!(
                "maximum count {} is before zero count {}",
                count_max, count_zero
            )));
        }

        let scan_rate = params.scan_rpm as f64 / 60.0;
        if scan_rate < 0.0 {
            return Err(bad_calibration(format!(
                "scan rate must not be negative, got {} Hz",
                scan_rate
            )));
        }

        Ok(Calibration {
            dist_min,
            dist_max,
            dist_resolution: HOKUYO_DIST_RESOLUTION,
            angle_resolution,
            angle_min: f64::from(count_min - count_zero) * angle_resolution,
            angle_max: f64::from(count_max - count_zero) * angle_resolution,
            scan_rate,
            count_min,
            count_max,
            count_zero,
        })
    }
}
