use std::cmp::min;
use std::io::{Read, Write};

/// A ring byte buffer holding bytes received from a transport but not yet
/// consumed by the line and packet readers.
///
/// # Example
///
/// ```rust
/// # use std::io::Write;
/// # use hokuyo::base::RingByteBuffer;
/// let mut buffer = RingByteBuffer::with_capacity(100);
/// buffer.write(b"VV\n00P\n").unwrap();
/// assert_eq!(buffer.find_from(b"\n", 0), Some(2));
/// assert_eq!(RingByteBuffer::take(&mut buffer, 3), b"VV\n".to_vec());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RingByteBuffer {
    buf: Vec<u8>,
    head: usize,
    size: usize,
}

impl RingByteBuffer {
    /// Creates a new `RingByteBuffer` with the specified capacity.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The maximum number of bytes the buffer can hold.
    pub fn with_capacity(capacity: usize) -> RingByteBuffer {
        RingByteBuffer {
            buf: vec![0; capacity],
            head: 0,
            size: 0,
        }
    }

    /// Returns the number of bytes currently stored in the buffer.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns `true` if the buffer contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the total capacity of the buffer in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Returns the amount of free space available in the buffer in bytes.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.size
    }

    /// Drops every stored byte.
    pub fn clear(&mut self) {
        self.head = 0;
        self.size = 0;
    }

    fn tail(&self) -> usize {
        (self.head + self.size) % self.buf.len()
    }

    /// Byte at logical offset `index` from the oldest stored byte.
    fn byte_at(&self, index: usize) -> u8 {
        self.buf[(self.head + index) % self.buf.len()]
    }

    /// Returns the offset of the first occurrence of `pattern` starting at or
    /// after logical offset `from`, looking across the wrap point.
    pub fn find_from(&self, pattern: &[u8], from: usize) -> Option<usize> {
        if pattern.is_empty() || self.size < pattern.len() {
            return None;
        }
        let last_start = self.size - pattern.len();
        (from..=last_start).find(|&start| {
            pattern
                .iter()
                .enumerate()
                .all(|(i, &b)| self.byte_at(start + i) == b)
        })
    }

    /// Removes and returns up to `bytes` of the oldest stored bytes.
    pub fn take(&mut self, bytes: usize) -> Vec<u8> {
        let mut out = vec![0; min(bytes, self.size)];
        let read = self.read(&mut out).unwrap_or(0);
        out.truncate(read);
        out
    }

    /// Returns a slice representing the contiguous readable portion of the buffer.
    ///
    /// The slice might not contain all readable data if the data wraps around the end of the internal buffer.
    fn current_read_slice(&self) -> &[u8] {
        let end = min(self.head + self.size, self.buf.len());
        &self.buf[self.head..end]
    }

    /// Removes the specified number of bytes from the beginning of the readable data.
    ///
    /// Returns the actual number of bytes skipped, which may be less than `bytes` if the buffer contains fewer bytes.
    pub fn skip_bytes(&mut self, bytes: usize) -> usize {
        let skipped = min(self.size, bytes);
        self.head = (self.head + skipped) % self.buf.len();
        self.size -= skipped;
        skipped
    }

    fn current_write_slice(&mut self) -> &mut [u8] {
        let current_end = self.tail();
        let write_buf_end = min(self.buf.len(), current_end + self.free_space());
        &mut self.buf[current_end..write_buf_end]
    }

    fn mark_bytes_as_written(&mut self, bytes: usize) {
        let written = min(self.free_space(), bytes);
        self.size += written;
    }

    fn partial_read_from(&mut self, upstream: &mut impl Read) -> std::io::Result<usize> {
        if self.current_write_slice().is_empty() {
            return Ok(0);
        }

        match upstream.read(self.current_write_slice()) {
            Ok(read) => {
                self.mark_bytes_as_written(read);
                Ok(read)
            }
            Err(err) => match err.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::Interrupted => Ok(0),
                _ => Err(err),
            },
        }
    }

    /// Reads whatever the upstream source has pending into the free space,
    /// handling the wrap point. A timed out upstream read counts as zero bytes.
    pub fn read_from(&mut self, upstream: &mut impl Read) -> std::io::Result<usize> {
        let read = self.partial_read_from(upstream)?;
        if read == 0 {
            return Ok(0);
        }
        let latter_read = self.partial_read_from(upstream)?;
        Ok(read + latter_read)
    }
}

impl Read for RingByteBuffer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = {
            let current_read_slice = self.current_read_slice();
            let read = min(current_read_slice.len(), buf.len());
            buf[0..read].clone_from_slice(&current_read_slice[0..read]);
            read
        };
        self.skip_bytes(read);

        let latter_read = {
            let current_read_slice = self.current_read_slice();
            let latter_read = min(current_read_slice.len(), buf.len() - read);
            buf[read..read + latter_read].clone_from_slice(&current_read_slice[0..latter_read]);
            latter_read
        };
        self.skip_bytes(latter_read);

        Ok(read + latter_read)
    }
}

impl Write for RingByteBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = {
            let current_write_slice = self.current_write_slice();
            let written = min(current_write_slice.len(), buf.len());
            current_write_slice[0..written].clone_from_slice(&buf[0..written]);
            written
        };
        self.mark_bytes_as_written(written);

        let latter_written = {
            let current_write_slice = self.current_write_slice();
            let latter_written = min(current_write_slice.len(), buf.len() - written);
            current_write_slice[0..latter_written]
                .clone_from_slice(&buf[written..written + latter_written]);
            latter_written
        };
        self.mark_bytes_as_written(latter_written);

        Ok(written + latter_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_spans_wrap_point() {
        let mut buffer = RingByteBuffer::with_capacity(8);
        buffer.write_all(b"abcdef").unwrap();
        buffer.skip_bytes(5);
        // head now at 5, "f" stored; next write wraps
        buffer.write_all(b"\n\nxy").unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.find_from(b"\n\n", 0), Some(1));
        assert_eq!(RingByteBuffer::take(&mut buffer, 3), b"f\n\n".to_vec());
        assert_eq!(RingByteBuffer::take(&mut buffer, 10), b"xy".to_vec());
        assert!(buffer.is_empty());
    }

    #[test]
    fn find_respects_start_offset() {
        let mut buffer = RingByteBuffer::with_capacity(16);
        buffer.write_all(b"a\nb\nc\n").unwrap();
        assert_eq!(buffer.find_from(b"\n", 0), Some(1));
        assert_eq!(buffer.find_from(b"\n", 2), Some(3));
        assert_eq!(buffer.find_from(b"\n\n", 0), None);
    }

    #[test]
    fn read_copies_across_wrap_point() {
        let mut buffer = RingByteBuffer::with_capacity(6);
        buffer.write_all(b"abcd").unwrap();
        buffer.skip_bytes(3);
        buffer.write_all(b"efg").unwrap();
        let mut out = [0u8; 8];
        let n = buffer.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"defg");
        assert!(buffer.is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut buffer = RingByteBuffer::with_capacity(4);
        buffer.write_all(b"abcd").unwrap();
        assert_eq!(buffer.free_space(), 0);
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.free_space(), 4);
    }
}
