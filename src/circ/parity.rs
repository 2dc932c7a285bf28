//! Parity inversion.
//!
//! ECMA-130 stores the C1 and C2 parity bytes of an F2 frame inverted
//! (bytes 12..16 and 28..32) so that an all-zero channel frame is not a
//! valid codeword. The operation is its own inverse.

/// Invert the P and Q parity bytes of a 32-byte F2 frame in place.
///
/// Panics if the frame is not 32 bytes: only full F2 frames carry parity.
pub fn invert_parity(data: &mut [u8]) {
    if data.len() != 32 {
        panic!(
            "parity::invert_parity: input must be 32 bytes, got {}",
            data.len()
        );
    }

    for b in &mut data[12..16] {
        *b = !*b;
    }
    for b in &mut data[28..32] {
        *b = !*b;
    }
}

#[cfg(test)]
mod test {
    use super::invert_parity;

    #[test]
    fn inverts_parity_regions_only() {
        let mut data: Vec<u8> = (0..32).collect();
        invert_parity(&mut data);

        for (i, &b) in data.iter().enumerate() {
            if (12..16).contains(&i) || (28..32).contains(&i) {
                assert_eq!(b, !(i as u8));
            } else {
                assert_eq!(b, i as u8);
            }
        }
    }

    #[test]
    fn is_involutive() {
        let mut data: Vec<u8> = (0..32).map(|i| i * 7).collect();
        let reference = data.clone();

        invert_parity(&mut data);
        invert_parity(&mut data);
        assert_eq!(data, reference);
    }

    #[test]
    #[should_panic]
    fn wrong_size_is_fatal() {
        invert_parity(&mut [0; 24]);
    }
}
