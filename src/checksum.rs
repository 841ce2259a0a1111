/// Calculates the SCIP2.0 line checksum: the low six bits of the byte sum,
/// shifted into the printable range starting at `'0'`.
#[derive(Debug, Default, Clone)]
pub struct Checksum {
    current: u8,
}

impl Checksum {
    /// Creates a new `Checksum` instance, initialized to 0.
    #[inline]
    pub fn new() -> Checksum {
        Checksum { current: 0 }
    }

    /// Includes a slice of bytes in the checksum calculation.
    ///
    /// # Arguments
    ///
    /// * `data` - The bytes to add into the running sum.
    #[inline]
    pub fn push_slice(&mut self, data: &[u8]) {
        for d in data {
            self.current = self.current.wrapping_add(*d);
        }
    }

    /// Returns the checksum character for the bytes pushed so far.
    #[inline]
    pub fn checksum(&self) -> u8 {
        (self.current & 0x3F) + 0x30
    }

    /// Checksum character of a whole slice.
    #[inline]
    pub fn of(data: &[u8]) -> u8 {
        let mut checksum = Checksum::new();
        checksum.push_slice(data);
        checksum.checksum()
    }
}
