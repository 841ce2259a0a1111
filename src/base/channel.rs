use crate::base::error::{Error, Result};
use crate::base::ring_byte_buffer::RingByteBuffer;
use crate::base::traits::Transport;
use crate::internals::{HOKUYO_READ_BUFFER_SIZE, TRANSPORT_BAUD_RATES};
use log::{error, trace, warn};
use std::io::Write;
use std::time::{Duration, Instant};

/// Channel buffers bytes received from a transport and hands them out as
/// terminator-delimited chunks or fixed-size blocks, each bounded by a deadline.
///
/// # Examples
/// ```ignore
/// let mut channel = Channel::new(Box::new(SerialTransport::open("/dev/ttyACM0", 115200)?));
/// channel.write(b"VV\n")?;
/// let echo = channel.read_until(b"\n", 100, Duration::from_millis(200))?;
/// ```
#[derive(Debug)]
pub struct Channel<T: ?Sized> {
    stream: Box<T>,
    read_buffer: RingByteBuffer,
}

impl<T: ?Sized> Channel<T>
where
    T: Transport,
{
    /// Create a new `Channel` with a buffer large enough for one full scan packet.
    pub fn new(stream: Box<T>) -> Channel<T> {
        trace!(
            "Creating new Channel with default buffer size {}",
            HOKUYO_READ_BUFFER_SIZE
        );
        Channel::with_read_buffer_size(stream, HOKUYO_READ_BUFFER_SIZE)
    }

    /// Create a new `Channel` with non-default ring buffer capacity
    pub fn with_read_buffer_size(stream: Box<T>, read_buffer_size: usize) -> Channel<T> {
        trace!("Creating new Channel with buffer size {}", read_buffer_size);
        Channel {
            stream,
            read_buffer: RingByteBuffer::with_capacity(read_buffer_size),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    pub fn baud_rate(&self) -> u32 {
        self.stream.baud_rate()
    }

    /// Reconfigure the host side of the link. Buffered bytes received at the old
    /// rate are dropped.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        if !TRANSPORT_BAUD_RATES.contains(&baud_rate) {
            warn!("Rejecting unsupported baud rate {}", baud_rate);
            return Err(Error::UnsupportedBaudRate(baud_rate));
        }
        self.ensure_connected()?;
        trace!("Setting transport baud rate to {}", baud_rate);
        self.stream.set_baud_rate(baud_rate)?;
        self.read_buffer.clear();
        Ok(())
    }

    /// Drop everything received but not yet consumed, both here and in the transport.
    pub fn flush_input(&mut self) -> Result<()> {
        self.ensure_connected()?;
        if !self.read_buffer.is_empty() {
            trace!("Discarding {} buffered bytes", self.read_buffer.len());
        }
        self.read_buffer.clear();
        self.stream.clear_input()
    }

    /// Close the transport. Does nothing when already closed.
    pub fn disconnect(&mut self) {
        if self.stream.is_connected() {
            trace!("Disconnecting transport");
            self.stream.disconnect();
        }
        self.read_buffer.clear();
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.stream.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Pull whatever the transport has pending into the buffer.
    fn fill(&mut self) -> Result<usize> {
        match self.read_buffer.read_from(&mut self.stream) {
            Ok(0) => Ok(0),
            Ok(bytes_read) => {
                trace!(
                    "Read {} bytes from stream (new buffer len: {})",
                    bytes_read,
                    self.read_buffer.len()
                );
                Ok(bytes_read)
            }
            Err(e) => {
                error!("IO error reading from stream: {}", e);
                Err(e.into())
            }
        }
    }

    /// Read up to and including the first occurrence of `terminator`.
    ///
    /// # Arguments
    ///
    /// * `terminator` - One or two byte sequence closing the chunk.
    /// * `max_len` - Longest acceptable chunk, terminator included. When that many
    ///   bytes arrive without a terminator they are discarded and the read fails.
    /// * `timeout` - Deadline for the terminator to show up.
    pub fn read_until(
        &mut self,
        terminator: &[u8],
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let max_len = max_len.min(self.read_buffer.capacity());
        let deadline = Instant::now() + timeout;
        let mut searched = 0;

        loop {
            if let Some(pos) = self.read_buffer.find_from(terminator, searched) {
                let len = pos + terminator.len();
                if len > max_len {
                    warn!(
                        "Terminator found after {} bytes, limit is {}; discarding",
                        len, max_len
                    );
                    self.read_buffer.skip_bytes(max_len);
                    return Err(Error::ProtocolError {
                        description: format!("chunk of {} bytes exceeds limit of {}", len, max_len),
                    });
                }
                return Ok(self.read_buffer.take(len));
            }
            searched = self
                .read_buffer
                .len()
                .saturating_sub(terminator.len().saturating_sub(1));

            if self.read_buffer.len() >= max_len {
                warn!("No terminator within {} bytes; discarding", max_len);
                self.read_buffer.skip_bytes(max_len);
                return Err(Error::ProtocolError {
                    description: format!("no terminator within {} bytes", max_len),
                });
            }

            if Instant::now() >= deadline {
                trace!(
                    "Timed out waiting for terminator ({} bytes buffered)",
                    self.read_buffer.len()
                );
                return Err(Error::OperationTimeout);
            }

            self.fill()?;
        }
    }

    /// Read exactly `len` bytes.
    pub fn read_exact(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        if len > self.read_buffer.capacity() {
            return Err(Error::ProtocolError {
                description: format!(
                    "cannot read {} bytes through a {} byte buffer",
                    len,
                    self.read_buffer.capacity()
                ),
            });
        }
        let deadline = Instant::now() + timeout;

        while self.read_buffer.len() < len {
            if Instant::now() >= deadline {
                trace!(
                    "Timed out reading {} bytes ({} buffered)",
                    len,
                    self.read_buffer.len()
                );
                return Err(Error::OperationTimeout);
            }
            self.fill()?;
        }

        Ok(self.read_buffer.take(len))
    }

    /// Write bytes to the transport and flush them out.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ensure_connected()?;
        trace!("Channel write: {:?}", String::from_utf8_lossy(data));
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(data.len())
    }
}
