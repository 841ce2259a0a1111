use std::fmt;

/// Product string reported by the URG-04LX.
pub const URG_04LX_PRODUCT: &str = "SOKUIKI Sensor URG-04LX";

/// Product string reported by the UTM-30LX.
pub const UTM_30LX_PRODUCT: &str = "SOKUIKI Sensor TOP-URG UTM-30LX";

/// Supported sensor models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorModel {
    #[default]
    Urg04lx,
    Utm30lx,
}

impl SensorModel {
    /// Largest number of range values one scan can carry.
    pub fn max_points(self) -> usize {
        match self {
            SensorModel::Urg04lx => 771,
            SensorModel::Utm30lx => 1081 * 2,
        }
    }

    /// Classifies a device from its version-info product line.
    pub fn from_product(product: &str) -> Option<SensorModel> {
        if product.contains(UTM_30LX_PRODUCT) {
            Some(SensorModel::Utm30lx)
        } else if product.contains(URG_04LX_PRODUCT) {
            Some(SensorModel::Urg04lx)
        } else {
            None
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorModel::Urg04lx => write!(f, "URG-04LX"),
            SensorModel::Utm30lx => write!(f, "UTM-30LX"),
        }
    }
}

/// Character encoding of range values in a data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Two characters per value, 12-bit range.
    TwoDigit,
    /// Three characters per value, 18-bit range.
    ThreeDigit,
}

impl Encoding {
    /// Number of characters per encoded value.
    pub fn width(self) -> usize {
        match self {
            Encoding::TwoDigit => 2,
            Encoding::ThreeDigit => 3,
        }
    }
}

impl TryFrom<u8> for Encoding {
    type Error = crate::Error;

    fn try_from(digits: u8) -> crate::Result<Encoding> {
        match digits {
            2 => Ok(Encoding::TwoDigit),
            3 => Ok(Encoding::ThreeDigit),
            other => Err(crate::Error::UnsupportedEncoding(format!(
                "{}-digit values",
                other
            ))),
        }
    }
}

/// What each returned value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    /// Plain range readings.
    Regular,
    /// Range plus intensity readings (UTM-30LX only).
    Intensity,
}

/// Angular window and decoding shape of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScanWindow {
    pub start_step: u32,
    pub end_step: u32,
    /// Cluster count; adjacent steps merged into one value.
    pub skip: u8,
    pub encoding: Encoding,
    pub kind: ScanKind,
}

impl ScanWindow {
    pub fn new(start_step: u32, end_step: u32) -> ScanWindow {
        ScanWindow {
            start_step,
            end_step,
            ..ScanWindow::default()
        }
    }

    pub fn with_skip(mut self, skip: u8) -> ScanWindow {
        self.skip = skip;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> ScanWindow {
        self.encoding = encoding;
        self
    }

    pub fn with_kind(mut self, kind: ScanKind) -> ScanWindow {
        self.kind = kind;
        self
    }
}

impl Default for ScanWindow {
    /// The full URG-04LX measuring range: steps 44 to 725, no clustering,
    /// three-digit regular readings.
    fn default() -> ScanWindow {
        ScanWindow {
            start_step: 44,
            end_step: 725,
            skip: 1,
            encoding: Encoding::ThreeDigit,
            kind: ScanKind::Regular,
        }
    }
}

/// Repeat count that starts continuous streaming.
pub const REPEAT_STREAMING: u8 = 0;

/// Repeat count for a single scan.
pub const REPEAT_SINGLE: u8 = 1;

/// Largest repeat count the protocol can express.
pub const MAX_REPEAT_COUNT: u8 = 99;

/// A scan window plus how many times the device should deliver it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRequest {
    pub window: ScanWindow,
    pub repeat: u8,
}

impl ScanRequest {
    pub fn single(window: ScanWindow) -> ScanRequest {
        ScanRequest {
            window,
            repeat: REPEAT_SINGLE,
        }
    }

    pub fn streaming(window: ScanWindow) -> ScanRequest {
        ScanRequest {
            window,
            repeat: REPEAT_STREAMING,
        }
    }

    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.repeat == REPEAT_STREAMING
    }

    #[inline]
    pub fn is_single(&self) -> bool {
        self.repeat == REPEAT_SINGLE
    }
}

impl Default for ScanRequest {
    fn default() -> ScanRequest {
        ScanRequest::streaming(ScanWindow::default())
    }
}

/// How checksum mismatches on received lines are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumPolicy {
    /// Log the mismatch and use the line anyway.
    Lenient,
    /// Fail the read with `Error::CorruptLine`.
    Strict,
}

impl ChecksumPolicy {
    /// Debug sessions surface corruption, production ones ride through it.
    pub fn for_debug(debug: bool) -> ChecksumPolicy {
        if debug {
            ChecksumPolicy::Strict
        } else {
            ChecksumPolicy::Lenient
        }
    }
}

/// Driver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HokuyoOptions {
    /// Enables verbose diagnostics and, by default, strict checksums.
    pub debug: bool,

    pub checksum_policy: ChecksumPolicy,

    /// What the continuous worker asks the device for.
    pub scan_request: ScanRequest,
}

impl HokuyoOptions {
    /// Options for a diagnostic session.
    pub fn debug() -> HokuyoOptions {
        HokuyoOptions::with_debug(true)
    }

    pub fn with_debug(debug: bool) -> HokuyoOptions {
        HokuyoOptions {
            debug,
            checksum_policy: ChecksumPolicy::for_debug(debug),
            scan_request: ScanRequest::default(),
        }
    }

    pub fn checksum_policy(mut self, policy: ChecksumPolicy) -> HokuyoOptions {
        self.checksum_policy = policy;
        self
    }

    pub fn scan_request(mut self, request: ScanRequest) -> HokuyoOptions {
        self.scan_request = request;
        self
    }
}

impl Default for HokuyoOptions {
    fn default() -> HokuyoOptions {
        HokuyoOptions::with_debug(false)
    }
}

/// Physical units derived from the device parameters.
///
/// Values are negative until a device has been negotiated.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    /// Metres.
    pub dist_min: f64,
    /// Metres.
    pub dist_max: f64,
    /// Metres per range count.
    pub dist_resolution: f64,
    /// Radians per step.
    pub angle_resolution: f64,
    /// Radians, relative to the forward direction.
    pub angle_min: f64,
    /// Radians, relative to the forward direction.
    pub angle_max: f64,
    /// Scans per second.
    pub scan_rate: f64,
    pub count_min: i32,
    pub count_max: i32,
    /// Step pointing straight ahead.
    pub count_zero: i32,
}

impl Default for Calibration {
    fn default() -> Calibration {
        Calibration {
            dist_min: -1.0,
            dist_max: -1.0,
            dist_resolution: -1.0,
            angle_resolution: -1.0,
            angle_min: -1.0,
            angle_max: -1.0,
            scan_rate: -1.0,
            count_min: -1,
            count_max: -1,
            count_zero: -1,
        }
    }
}

/// Identification strings from the version-info query, plus the model
/// string from the parameters query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SensorInfo {
    pub vendor: String,
    pub product: String,
    pub firmware: String,
    pub protocol: String,
    pub serial: String,
    pub model: String,
}

impl fmt::Display for SensorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Model:    {}\nFirmware: {}\nSerial #: {}\nProtocol: {}\nVendor:   {}",
            self.model, self.firmware, self.serial, self.protocol, self.vendor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_products() {
        assert_eq!(
            SensorModel::from_product("SOKUIKI Sensor TOP-URG UTM-30LX"),
            Some(SensorModel::Utm30lx)
        );
        assert_eq!(
            SensorModel::from_product("SOKUIKI Sensor URG-04LX"),
            Some(SensorModel::Urg04lx)
        );
        assert_eq!(SensorModel::from_product("SOKUIKI Sensor UBG-04LX-F01"), None);
    }

    #[test]
    fn default_request_is_production_stream() {
        let request = ScanRequest::default();
        assert!(request.is_streaming());
        assert_eq!(request.window.start_step, 44);
        assert_eq!(request.window.end_step, 725);
        assert_eq!(request.window.skip, 1);
        assert_eq!(request.window.encoding, Encoding::ThreeDigit);
        assert_eq!(request.window.kind, ScanKind::Regular);
    }

    #[test]
    fn debug_defaults_to_strict_checksums() {
        assert_eq!(HokuyoOptions::debug().checksum_policy, ChecksumPolicy::Strict);
        assert_eq!(
            HokuyoOptions::default().checksum_policy,
            ChecksumPolicy::Lenient
        );
        let relaxed = HokuyoOptions::debug().checksum_policy(ChecksumPolicy::Lenient);
        assert!(relaxed.debug);
        assert_eq!(relaxed.checksum_policy, ChecksumPolicy::Lenient);
    }

    #[test]
    fn encoding_from_digits() {
        assert_eq!(Encoding::try_from(3).unwrap(), Encoding::ThreeDigit);
        assert!(matches!(
            Encoding::try_from(4),
            Err(crate::Error::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn info_layout() {
        let info = SensorInfo {
            vendor: "Hokuyo Automatic Co.,Ltd.".to_owned(),
            product: URG_04LX_PRODUCT.to_owned(),
            firmware: "3.3.00".to_owned(),
            protocol: "SCIP 2.0".to_owned(),
            serial: "H0612345".to_owned(),
            model: "URG-04LX(Hokuyo Automatic Co.,Ltd.)".to_owned(),
        };
        assert_eq!(
            info.to_string(),
            "Model:    URG-04LX(Hokuyo Automatic Co.,Ltd.)\nFirmware: 3.3.00\nSerial #: H0612345\nProtocol: SCIP 2.0\nVendor:   Hokuyo Automatic Co.,Ltd."
        );
    }
}
