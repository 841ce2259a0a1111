use crate::base::{Error, Result};
use crate::internals::{MAX_DATA_LENGTH, MAX_LINE_LENGTH};
use crate::protocol::ScipHostProtocol;
use log::trace;

/// Joins the lines of a raw data packet into one payload.
///
/// `raw` holds checksum-terminated lines followed by an empty line. Each line's
/// checksum byte and linefeed are removed; the empty line ends the packet.
pub fn extract_packet(raw: &[u8], protocol: &ScipHostProtocol) -> Result<Vec<u8>> {
    if raw.is_empty() {
        return Err(Error::MalformedPacket {
            description: "empty packet".to_owned(),
        });
    }

    let mut payload = Vec::with_capacity(raw.len());
    let mut rest = raw;
    let mut lines = 0;

    loop {
        let Some(end) = rest.iter().position(|&b| b == b'\n') else {
            return Err(Error::MalformedPacket {
                description: format!(
                    "line {} has no terminator ({} trailing bytes)",
                    lines,
                    rest.len()
                ),
            });
        };
        if end >= MAX_LINE_LENGTH {
            return Err(Error::MalformedPacket {
                description: format!("line {} is {} bytes long", lines, end + 1),
            });
        }

        let line = &rest[..end];
        rest = &rest[end + 1..];
        if line.is_empty() {
            break;
        }

        payload.extend_from_slice(protocol.check_line(line)?);
        lines += 1;

        if payload.len() > MAX_DATA_LENGTH {
            return Err(Error::MalformedPacket {
                description: format!("payload exceeds {} bytes", MAX_DATA_LENGTH),
            });
        }
    }

    if payload.is_empty() {
        return Err(Error::MalformedPacket {
            description: "packet has no data".to_owned(),
        });
    }

    trace!(
        "Extracted {} payload bytes from {} lines ({} bytes left over)",
        payload.len(),
        lines,
        rest.len()
    );
    Ok(payload)
}
