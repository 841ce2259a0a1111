use crate::base::{Error, Result};
use crate::types::Encoding;
use log::trace;

const SIXBIT_FIRST: u8 = 0x30;
const SIXBIT_LAST: u8 = 0x30 + 0x3F;

/// Value of one 6-bit SCIP character.
#[inline]
fn sixbit(b: u8) -> Result<u32> {
    if !(SIXBIT_FIRST..=SIXBIT_LAST).contains(&b) {
        return Err(Error::MalformedPacket {
            description: format!("byte {:#04x} is not a 6-bit character", b),
        });
    }
    Ok(u32::from(b - SIXBIT_FIRST))
}

/// Decodes a joined payload into range values.
///
/// The payload is consumed in whole groups of `encoding.width()` characters; a
/// trailing partial group is dropped. A byte outside `'0'..='o'` in a decoded
/// group fails with `Error::MalformedPacket`.
///
/// # Arguments
///
/// * `payload` - Output of `extract_packet`.
/// * `encoding` - Characters per value.
/// * `max_points` - Most values the device can send in one scan.
pub fn decode_ranges(payload: &[u8], encoding: Encoding, max_points: usize) -> Result<Vec<u32>> {
    let width = encoding.width();
    let count = payload.len() / width;
    if count > max_points {
        return Err(Error::TooManyPoints {
            count,
            max: max_points,
        });
    }

    let remainder = payload.len() % width;
    if remainder != 0 {
        trace!("Dropping {} trailing payload bytes", remainder);
    }

    payload
        .chunks_exact(width)
        .map(|group| {
            group
                .iter()
                .try_fold(0u32, |acc, &b| -> Result<u32> { Ok((acc << 6) + sixbit(b)?) })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_digit_value() {
        assert_eq!(
            decode_ranges(&[0x30 + 5, 0x30 + 2], Encoding::TwoDigit, 771).unwrap(),
            vec![322]
        );
    }

    #[test]
    fn three_digit_value() {
        assert_eq!(
            decode_ranges(&[0x30 + 1, 0x30, 0x30 + 5], Encoding::ThreeDigit, 771).unwrap(),
            vec![4101]
        );
    }

    #[test]
    fn trailing_partial_group_is_dropped() {
        let payload = [0x31, 0x30, 0x35, 0x30, 0x32];
        assert_eq!(
            decode_ranges(&payload, Encoding::ThreeDigit, 771).unwrap(),
            vec![4101]
        );
        assert_eq!(
            decode_ranges(&payload[..3], Encoding::TwoDigit, 771).unwrap(),
            vec![64]
        );
        assert!(decode_ranges(&payload[..1], Encoding::TwoDigit, 771)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn characters_outside_alphabet_are_rejected() {
        assert_eq!(
            decode_ranges(b"oo", Encoding::TwoDigit, 771).unwrap(),
            vec![4095]
        );
        assert!(matches!(
            decode_ranges(b"0/", Encoding::TwoDigit, 771),
            Err(Error::MalformedPacket { .. })
        ));
        assert!(matches!(
            decode_ranges(b"10p", Encoding::ThreeDigit, 771),
            Err(Error::MalformedPacket { .. })
        ));
        // the dropped partial group is never inspected
        assert_eq!(
            decode_ranges(b"105\n", Encoding::ThreeDigit, 771).unwrap(),
            vec![4101]
        );
    }

    #[test]
    fn too_many_points() {
        let payload = vec![0x30; 772 * 3];
        assert!(matches!(
            decode_ranges(&payload, Encoding::ThreeDigit, 771),
            Err(Error::TooManyPoints {
                count: 772,
                max: 771
            })
        ));
        assert_eq!(
            decode_ranges(&payload, Encoding::ThreeDigit, 2162)
                .unwrap()
                .len(),
            772
        );
    }
}
