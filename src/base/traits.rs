use super::error::Result;
use std::io;

/// Byte-stream link to a sensor.
///
/// Reads are expected to return after a short per-call timeout (a few
/// milliseconds) with either `Ok(0)` or an `io::ErrorKind::TimedOut` error when no
/// bytes are pending; `Channel` layers the operation-level deadlines on top.
pub trait Transport: io::Read + io::Write + Send {
    /// Reconfigure the line speed of the host side of the link.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Current line speed of the host side of the link.
    fn baud_rate(&self) -> u32;

    /// Discard any bytes received but not yet read.
    fn clear_input(&mut self) -> Result<()>;

    /// `true` while the link is open.
    fn is_connected(&self) -> bool;

    /// Close the link. Closing an already closed link does nothing.
    fn disconnect(&mut self);
}
