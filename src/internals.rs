use std::time::Duration;

/// Longest response line the device sends, terminator included.
pub const MAX_LINE_LENGTH: usize = 100;

/// Longest raw data packet (all lines plus the closing blank line).
pub const MAX_PACKET_LENGTH: usize = 15000;

/// Longest payload left after checksums and terminators are stripped.
pub const MAX_DATA_LENGTH: usize = 10000;

/// Capacity of the channel's receive buffer; must hold a whole packet.
pub const HOKUYO_READ_BUFFER_SIZE: usize = 16384;

pub const NUM_STOP_LASER_RETRIES: usize = 5;
pub const LASER_STOP_DELAY: Duration = Duration::from_millis(50);

/// Pause used when the worker has nothing to do, and after a laser stop
/// before new scan parameters are sent.
pub const HOKUYO_IDLE: Duration = Duration::from_millis(100);

/// Deadline for one whole scan exchange.
pub const HOKUYO_GET_SCAN_TIMEOUT: Duration = Duration::from_millis(500);

pub const HOKUYO_LASER_TIMEOUT: Duration = Duration::from_millis(200);
pub const HOKUYO_INFO_TIMEOUT: Duration = Duration::from_millis(200);
pub const HOKUYO_BAUD_TIMEOUT: Duration = Duration::from_millis(100);

/// Baud rates tried, in order, when looking for a device in SCIP2.0 mode.
pub const HOKUYO_BAUD_CANDIDATES: [u32; 3] = [115200, 19200, 38400];

/// Baud rates the device accepts through the baud-change command.
pub const HOKUYO_DEVICE_BAUD_RATES: [u32; 4] = [19200, 38400, 57600, 115200];

/// Baud rates the host side of a transport may be set to.
pub const TRANSPORT_BAUD_RATES: [u32; 7] = [2400, 4800, 9600, 19200, 38400, 57600, 115200];

pub const HOKUYO_DEFAULT_BAUD_RATE: u32 = 115200;

/// Consecutive failed acquisitions after which the worker restarts the laser.
pub const READER_MAX_ERRORS: u32 = 3;
pub const READER_GET_SCAN_TIMEOUT: Duration = Duration::from_millis(400);
pub const READER_SET_SCAN_PARAMS_TIMEOUT: Duration = Duration::from_millis(500);

/// Distance resolution shared by both supported models, in metres.
pub const HOKUYO_DIST_RESOLUTION: f64 = 0.001;

/// Upper bound on lines drained after a metadata response.
pub const MAX_TRAILING_LINES: usize = 16;
