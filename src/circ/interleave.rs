//! The fixed CIRC 24-byte interleave.
//!
//! ECMA-130 (Annex A) permutes the 24 bytes of an F1 frame before C2
//! encoding so that the two bytes of each audio sample land in different
//! C2 codewords. The permutation is fixed by the standard; `SHUFFLE[i]`
//! is the output position of input byte `i`.

const SHUFFLE: [usize; 24] = [
    0, 1, 6, 7, 12, 13, 18, 19, 2, 3, 8, 9, 14, 15, 20, 21, 4, 5, 10, 11, 16, 17, 22, 23,
];

fn check_len(data: &[u8], what: &str) {
    if data.len() != 24 {
        panic!("interleave::{}: input must be 24 bytes, got {}", what, data.len());
    }
}

/// Apply the encoder-side permutation
pub fn interleave(data: &[u8]) -> Vec<u8> {
    check_len(data, "interleave");

    let mut out = vec![0u8; 24];
    for (i, &b) in data.iter().enumerate() {
        out[SHUFFLE[i]] = b;
    }
    out
}

/// Apply the decoder-side (inverse) permutation
pub fn deinterleave(data: &[u8]) -> Vec<u8> {
    check_len(data, "deinterleave");

    let mut out = vec![0u8; 24];
    for (i, o) in out.iter_mut().enumerate() {
        *o = data[SHUFFLE[i]];
    }
    out
}

#[cfg(test)]
mod test {
    use super::{deinterleave, interleave, SHUFFLE};

    #[test]
    fn is_a_permutation() {
        let mut seen = [false; 24];
        for &d in SHUFFLE.iter() {
            assert!(!seen[d]);
            seen[d] = true;
        }
    }

    #[test]
    fn roundtrip() {
        let input: Vec<u8> = (0..24).collect();

        assert_eq!(deinterleave(&interleave(&input)), input);
        assert_eq!(interleave(&deinterleave(&input)), input);
    }

    #[test]
    fn reference_positions() {
        let input: Vec<u8> = (0..24).collect();
        let out = interleave(&input);

        // Spot values fixed by the standard
        assert_eq!(out[0], 0);
        assert_eq!(out[6], 2);
        assert_eq!(out[12], 4);
        assert_eq!(out[2], 8);
        assert_eq!(out[4], 16);
        assert_eq!(out[23], 23);
    }

    #[test]
    #[should_panic]
    fn wrong_size_is_fatal() {
        interleave(&[0; 23]);
    }
}
