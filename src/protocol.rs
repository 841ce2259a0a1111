use crate::base::{Channel, Error, Result, Transport};
use crate::checksum::Checksum;
use crate::types::ChecksumPolicy;
use log::{trace, warn};
use std::time::Duration;

const LINE_TERMINATOR: &[u8] = b"\n";

/// Host side of the SCIP2.0 line framing: every response is a sequence of
/// linefeed-terminated lines, most of them closed by a checksum character.
#[derive(Debug, Clone)]
pub struct ScipHostProtocol {
    policy: ChecksumPolicy,
}

impl ScipHostProtocol {
    pub fn new(policy: ChecksumPolicy) -> ScipHostProtocol {
        ScipHostProtocol { policy }
    }

    pub fn policy(&self) -> ChecksumPolicy {
        self.policy
    }

    /// Verify a line (terminator already removed) whose last byte is its checksum
    /// and return the part before the checksum.
    ///
    /// An empty line has no checksum and yields an empty payload. Under
    /// `ChecksumPolicy::Lenient` a mismatch is logged and the payload returned anyway.
    pub fn check_line<'a>(&self, line: &'a [u8]) -> Result<&'a [u8]> {
        let Some((&actual, payload)) = line.split_last() else {
            return Ok(line);
        };
        let expected = Checksum::of(payload);
        if expected != actual {
            match self.policy {
                ChecksumPolicy::Strict => {
                    return Err(Error::CorruptLine { expected, actual });
                }
                ChecksumPolicy::Lenient => {
                    warn!(
                        "Checksum mismatch on {:?}: expected {:?}, got {:?}",
                        String::from_utf8_lossy(payload),
                        expected as char,
                        actual as char
                    );
                }
            }
        }
        Ok(payload)
    }

    /// Read one response line.
    ///
    /// # Arguments
    ///
    /// * `channel` - Where the line comes from.
    /// * `max_len` - Longest acceptable line, terminator included.
    /// * `timeout` - Deadline for the terminator.
    /// * `verify` - The line ends in a checksum byte to check and strip.
    pub fn read_line<T: ?Sized + Transport>(
        &self,
        channel: &mut Channel<T>,
        max_len: usize,
        timeout: Duration,
        verify: bool,
    ) -> Result<Vec<u8>> {
        let mut line = channel.read_until(LINE_TERMINATOR, max_len, timeout)?;
        line.truncate(line.len() - LINE_TERMINATOR.len());
        trace!("Read line {:?}", String::from_utf8_lossy(&line));
        if verify {
            Ok(self.check_line(&line)?.to_vec())
        } else {
            Ok(line)
        }
    }
}

impl Default for ScipHostProtocol {
    fn default() -> ScipHostProtocol {
        ScipHostProtocol::new(ChecksumPolicy::Lenient)
    }
}
