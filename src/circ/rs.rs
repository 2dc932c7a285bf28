//! The C1 and C2 Reed-Solomon codecs.
//!
//! Both codes are shortened RS(255, 251) over GF(2^8) with polynomial
//! 0x11D, first consecutive root alpha^0, root step 1, conventional (not
//! dual) basis: C1 is (32, 28) with the parity appended, C2 is (28, 24)
//! with the parity in the middle of the codeword (bytes 12..16).
//!
//! The decoders are erasure-aware: the pipeline's error flags become the
//! erasure locator, which doubles the correction power over blind
//! decoding. A codeword that cannot be corrected is not passed through
//! quietly; every output byte is flagged so downstream stages treat the
//! frame as lost.

use log::debug;

use super::gf::GaloisField;

/// Parity symbols per codeword, shared by C1 and C2
const PARITY: usize = 4;

/// C1 codeword length
const C1_LEN: usize = 32;
/// C1 payload length
const C1_DATA: usize = 28;
/// C2 codeword length
const C2_LEN: usize = 28;
/// C2 payload length
const C2_DATA: usize = 24;
/// First parity byte position inside a C2 codeword
const C2_PARITY_POS: usize = 12;

/// Erasure-aware C1/C2 codec with correction statistics.
pub struct ReedSolomon {
    gf: GaloisField,
    /// Generator polynomial, descending order, g[0] == 1
    gen: Vec<u8>,

    valid_c1s: u64,
    fixed_c1s: u64,
    error_c1s: u64,
    valid_c2s: u64,
    fixed_c2s: u64,
    error_c2s: u64,
}

impl ReedSolomon {
    /// Build the codec (field tables and generator polynomial)
    pub fn new() -> ReedSolomon {
        let gf = GaloisField::new();

        let mut gen = vec![1u8];
        for j in 0..PARITY {
            // Convolution is order-agnostic, so poly_mul works on the
            // descending representation too; [1, r] is x + alpha^j
            gen = gf.poly_mul(&gen, &[1, gf.alpha_pow(j as i32)]);
        }

        ReedSolomon {
            gf,
            gen,
            valid_c1s: 0,
            fixed_c1s: 0,
            error_c1s: 0,
            valid_c2s: 0,
            fixed_c2s: 0,
            error_c2s: 0,
        }
    }

    /// Evaluate a codeword (descending order, first byte transmitted
    /// first) at `x`
    fn eval_codeword(&self, codeword: &[u8], x: u8) -> u8 {
        let mut acc = 0u8;
        for &c in codeword {
            acc = self.gf.mul(acc, x) ^ c;
        }
        acc
    }

    /// Compute the four parity bytes for a message
    fn parity(&self, msg: &[u8]) -> [u8; PARITY] {
        let mut rem = msg.to_vec();
        rem.extend_from_slice(&[0; PARITY]);

        for i in 0..msg.len() {
            let coef = rem[i];
            if coef != 0 {
                for j in 1..self.gen.len() {
                    rem[i + j] ^= self.gf.mul(self.gen[j], coef);
                }
            }
        }

        let mut parity = [0u8; PARITY];
        parity.copy_from_slice(&rem[msg.len()..]);
        parity
    }

    /// Massey's algorithm over the Forney syndromes: returns the
    /// error-locator polynomial (ascending order) for the errors outside
    /// the known erasures.
    fn berlekamp_massey(&self, synd: &[u8]) -> Vec<u8> {
        let mut lambda = vec![1u8];
        let mut b = vec![1u8];
        let mut l: usize = 0;
        let mut m: usize = 1;
        let mut bcoef: u8 = 1;

        for r in 0..synd.len() {
            let mut delta = synd[r];
            for j in 1..=l {
                if j < lambda.len() && j <= r {
                    delta ^= self.gf.mul(lambda[j], synd[r - j]);
                }
            }

            if delta == 0 {
                m += 1;
                continue;
            }

            let prev = lambda.clone();
            let coef = self.gf.div(delta, bcoef);
            let needed = b.len() + m;
            if lambda.len() < needed {
                lambda.resize(needed, 0);
            }
            for (j, &bj) in b.iter().enumerate() {
                lambda[j + m] ^= self.gf.mul(coef, bj);
            }

            if 2 * l <= r {
                l = r + 1 - l;
                b = prev;
                bcoef = delta;
                m = 1;
            } else {
                m += 1;
            }
        }

        while lambda.len() > 1 && *lambda.last().unwrap() == 0 {
            lambda.pop();
        }
        lambda
    }

    /// Correct `codeword` in place given known erasure positions.
    ///
    /// On success returns the positions whose value actually changed; on
    /// failure the codeword is left as received.
    fn correct(&self, codeword: &mut [u8], erasures: &[usize]) -> Result<Vec<usize>, ()> {
        let n = codeword.len();

        let synd: Vec<u8> = (0..PARITY)
            .map(|j| self.eval_codeword(codeword, self.gf.alpha_pow(j as i32)))
            .collect();

        if synd.iter().all(|&s| s == 0) {
            return Ok(Vec::new());
        }

        // Erasure locator from the known positions
        let mut gamma = vec![1u8];
        for &pos in erasures {
            let x_i = self.gf.alpha_pow((n - 1 - pos) as i32);
            gamma = self.gf.poly_mul(&gamma, &[1, x_i]);
        }

        // Forney syndromes: strip the erasure contribution so Massey only
        // has to find the unknown errors
        let prod = self.gf.poly_mul(&synd, &gamma);
        let e = erasures.len();
        let forney: Vec<u8> = (0..PARITY.saturating_sub(e))
            .map(|j| prod.get(j + e).copied().unwrap_or(0))
            .collect();

        let lambda = self.berlekamp_massey(&forney);

        // Errata locator covering erasures and errors together
        let mut psi = self.gf.poly_mul(&lambda, &gamma);
        while psi.len() > 1 && *psi.last().unwrap() == 0 {
            psi.pop();
        }

        let degree = psi.len() - 1;
        if degree == 0 {
            // Non-zero syndromes with no locatable errata
            return Err(());
        }

        // Chien search over the shortened positions
        let mut positions = Vec::with_capacity(degree);
        for i in 0..n {
            let x_inv = self.gf.alpha_pow(-((n - 1 - i) as i32));
            if self.gf.poly_eval(&psi, x_inv) == 0 {
                positions.push(i);
            }
        }

        if positions.len() != degree {
            return Err(());
        }

        // Forney's algorithm: omega = S * psi mod x^4
        let omega_full = self.gf.poly_mul(&synd, &psi);
        let omega = &omega_full[..omega_full.len().min(PARITY)];
        let psi_der = self.gf.poly_derivative(&psi);

        let mut magnitudes = Vec::with_capacity(positions.len());
        for &i in &positions {
            let x_i = self.gf.alpha_pow((n - 1 - i) as i32);
            let x_inv = self.gf.inv(x_i);

            let denom = self.gf.poly_eval(&psi_der, x_inv);
            if denom == 0 {
                return Err(());
            }

            let num = self.gf.poly_eval(omega, x_inv);
            magnitudes.push((i, self.gf.mul(x_i, self.gf.div(num, denom))));
        }

        let mut changed = Vec::new();
        for &(i, mag) in &magnitudes {
            if mag != 0 {
                codeword[i] ^= mag;
                changed.push(i);
            }
        }

        // A decode that leaves a non-zero syndrome found a phantom
        // codeword; undo and report failure
        let ok = (0..PARITY).all(|j| self.eval_codeword(codeword, self.gf.alpha_pow(j as i32)) == 0);
        if !ok {
            for &(i, mag) in &magnitudes {
                codeword[i] ^= mag;
            }
            return Err(());
        }

        Ok(changed)
    }

    /// C1 encode: 28 data bytes in, 32-byte codeword out (parity
    /// appended).
    pub fn c1_encode(&self, data: &[u8]) -> Vec<u8> {
        if data.len() != C1_DATA {
            panic!(
                "ReedSolomon::c1_encode: input must be {} bytes, got {}",
                C1_DATA,
                data.len()
            );
        }

        let mut codeword = data.to_vec();
        codeword.extend_from_slice(&self.parity(data));
        codeword
    }

    /// C2 encode: 24 data bytes in, 28-byte codeword out with the parity
    /// in bytes 12..16.
    ///
    /// The mid-word parity is produced by treating the four parity slots
    /// as erasures of an otherwise-known codeword and solving for them.
    pub fn c2_encode(&self, data: &[u8]) -> Vec<u8> {
        if data.len() != C2_DATA {
            panic!(
                "ReedSolomon::c2_encode: input must be {} bytes, got {}",
                C2_DATA,
                data.len()
            );
        }

        let mut codeword = Vec::with_capacity(C2_LEN);
        codeword.extend_from_slice(&data[..C2_PARITY_POS]);
        codeword.extend_from_slice(&[0; PARITY]);
        codeword.extend_from_slice(&data[C2_PARITY_POS..]);

        let parity_slots: Vec<usize> = (C2_PARITY_POS..C2_PARITY_POS + PARITY).collect();
        if self.correct(&mut codeword, &parity_slots).is_err() {
            panic!("ReedSolomon::c2_encode: parity generation failed");
        }

        codeword
    }

    /// C1 decode: 32 bytes in, 28 data bytes out.
    ///
    /// More than 2 flagged erasures is beyond the code's guaranteed
    /// erasure power at this stage and is rejected outright; a failed
    /// decode flags every output byte.
    pub fn c1_decode(&mut self, data: Vec<u8>, error_data: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
        if data.len() != C1_LEN || error_data.len() != C1_LEN {
            panic!(
                "ReedSolomon::c1_decode: input must be {} bytes, got {}/{}",
                C1_LEN,
                data.len(),
                error_data.len()
            );
        }

        let erasures: Vec<usize> = error_data
            .iter()
            .enumerate()
            .filter(|(_, &e)| e != 0)
            .map(|(i, _)| i)
            .collect();

        let mut codeword = data;

        if erasures.len() > 2 {
            debug!("ReedSolomon::c1_decode: too many erasures to correct");
            codeword.truncate(C1_DATA);
            self.error_c1s += 1;
            return (codeword, vec![1; C1_DATA]);
        }

        match self.correct(&mut codeword, &erasures) {
            Ok(changed) => {
                codeword.truncate(C1_DATA);
                if changed.is_empty() {
                    self.valid_c1s += 1;
                } else {
                    self.fixed_c1s += 1;
                }
                (codeword, vec![0; C1_DATA])
            }
            Err(()) => {
                debug!("ReedSolomon::c1_decode: C1 corrupt and could not be fixed");
                codeword.truncate(C1_DATA);
                self.error_c1s += 1;
                (codeword, vec![1; C1_DATA])
            }
        }
    }

    /// C2 decode: 28 bytes in, 24 data bytes out (parity positions
    /// 12..16 excised).
    ///
    /// Rejects more than 4 flagged erasures. A decode that has to place
    /// more than 3 corrections outside the flagged positions is treated
    /// as a miscorrection and fails the frame.
    pub fn c2_decode(&mut self, data: Vec<u8>, error_data: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
        if data.len() != C2_LEN || error_data.len() != C2_LEN {
            panic!(
                "ReedSolomon::c2_decode: input must be {} bytes, got {}/{}",
                C2_LEN,
                data.len(),
                error_data.len()
            );
        }

        let erasures: Vec<usize> = error_data
            .iter()
            .enumerate()
            .filter(|(_, &e)| e != 0)
            .map(|(i, _)| i)
            .collect();

        let mut codeword = data;

        if erasures.len() > 4 {
            debug!("ReedSolomon::c2_decode: too many erasures to correct");
            let out = Self::excise_c2_parity(&codeword);
            self.error_c2s += 1;
            return (out, vec![1; C2_DATA]);
        }

        match self.correct(&mut codeword, &erasures) {
            Ok(changed) => {
                let residual = changed.iter().filter(|p| !erasures.contains(p)).count();
                if residual > 3 {
                    debug!("ReedSolomon::c2_decode: implausible correction rejected");
                    let out = Self::excise_c2_parity(&codeword);
                    self.error_c2s += 1;
                    return (out, vec![1; C2_DATA]);
                }

                let out = Self::excise_c2_parity(&codeword);
                if changed.is_empty() {
                    self.valid_c2s += 1;
                } else {
                    self.fixed_c2s += 1;
                }
                (out, vec![0; C2_DATA])
            }
            Err(()) => {
                debug!("ReedSolomon::c2_decode: C2 corrupt and could not be fixed");
                let out = Self::excise_c2_parity(&codeword);
                self.error_c2s += 1;
                (out, vec![1; C2_DATA])
            }
        }
    }

    fn excise_c2_parity(codeword: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(C2_DATA);
        out.extend_from_slice(&codeword[..C2_PARITY_POS]);
        out.extend_from_slice(&codeword[C2_PARITY_POS + PARITY..]);
        out
    }

    /// Codewords that decoded with zero corrections
    pub fn valid_c1s(&self) -> u64 {
        self.valid_c1s
    }

    /// Codewords repaired by the C1 decoder
    pub fn fixed_c1s(&self) -> u64 {
        self.fixed_c1s
    }

    /// Codewords the C1 decoder had to give up on
    pub fn error_c1s(&self) -> u64 {
        self.error_c1s
    }

    /// Codewords that decoded with zero corrections
    pub fn valid_c2s(&self) -> u64 {
        self.valid_c2s
    }

    /// Codewords repaired by the C2 decoder
    pub fn fixed_c2s(&self) -> u64 {
        self.fixed_c2s
    }

    /// Codewords the C2 decoder had to give up on
    pub fn error_c2s(&self) -> u64 {
        self.error_c2s
    }

    /// Log the correction statistics
    pub fn show_statistics(&self) {
        log::info!("Reed-Solomon statistics:");
        log::info!("  C1 decoder:");
        log::info!("    Valid C1s: {}", self.valid_c1s);
        log::info!("    Fixed C1s: {}", self.fixed_c1s);
        log::info!("    Error C1s: {}", self.error_c1s);
        log::info!("  C2 decoder:");
        log::info!("    Valid C2s: {}", self.valid_c2s);
        log::info!("    Fixed C2s: {}", self.fixed_c2s);
        log::info!("    Error C2s: {}", self.error_c2s);
    }
}

impl Default for ReedSolomon {
    fn default() -> ReedSolomon {
        ReedSolomon::new()
    }
}

#[cfg(test)]
mod test {
    use super::ReedSolomon;

    fn sample_28() -> Vec<u8> {
        (0..28).map(|i| (i * 11 + 3) as u8).collect()
    }

    fn sample_24() -> Vec<u8> {
        (0..24).map(|i| (i * 7 + 1) as u8).collect()
    }

    #[test]
    fn c1_clean_roundtrip() {
        let mut rs = ReedSolomon::new();
        let msg = sample_28();

        let codeword = rs.c1_encode(&msg);
        assert_eq!(codeword.len(), 32);

        let (out, err) = rs.c1_decode(codeword, vec![0; 32]);
        assert_eq!(out, msg);
        assert!(err.iter().all(|&e| e == 0));
        assert_eq!(rs.valid_c1s(), 1);
        assert_eq!(rs.fixed_c1s(), 0);
    }

    #[test]
    fn c1_corrects_single_unflagged_error() {
        let mut rs = ReedSolomon::new();
        let msg = sample_28();

        let mut codeword = rs.c1_encode(&msg);
        codeword[5] ^= 0x42;

        let (out, err) = rs.c1_decode(codeword, vec![0; 32]);
        assert_eq!(out, msg);
        assert!(err.iter().all(|&e| e == 0));
        assert_eq!(rs.fixed_c1s(), 1);
    }

    #[test]
    fn c1_corrects_two_erasures() {
        let mut rs = ReedSolomon::new();
        let msg = sample_28();

        let mut codeword = rs.c1_encode(&msg);
        let mut flags = vec![0u8; 32];
        codeword[0] ^= 0xff;
        flags[0] = 1;
        codeword[17] ^= 0x80;
        flags[17] = 1;

        let (out, err) = rs.c1_decode(codeword, flags);
        assert_eq!(out, msg);
        assert!(err.iter().all(|&e| e == 0));
        assert_eq!(rs.fixed_c1s(), 1);
    }

    #[test]
    fn c1_corrects_erasure_plus_error() {
        let mut rs = ReedSolomon::new();
        let msg = sample_28();

        let mut codeword = rs.c1_encode(&msg);
        let mut flags = vec![0u8; 32];
        codeword[3] ^= 0x55;
        flags[3] = 1;
        codeword[20] ^= 0x0a;

        let (out, _) = rs.c1_decode(codeword, flags);
        assert_eq!(out, msg);
        assert_eq!(rs.fixed_c1s(), 1);
    }

    #[test]
    fn c1_rejects_three_erasures() {
        let mut rs = ReedSolomon::new();
        let msg = sample_28();

        let codeword = rs.c1_encode(&msg);
        let mut flags = vec![0u8; 32];
        flags[1] = 1;
        flags[2] = 1;
        flags[3] = 1;

        let (out, err) = rs.c1_decode(codeword, flags);
        assert_eq!(out.len(), 28);
        assert!(err.iter().all(|&e| e == 1));
        assert_eq!(rs.error_c1s(), 1);
    }

    #[test]
    fn c1_flags_uncorrectable_garbage() {
        let mut rs = ReedSolomon::new();
        let msg = sample_28();

        let mut codeword = rs.c1_encode(&msg);
        // Five scattered unflagged errors exceed any correction the code
        // could plausibly claim
        for (n, i) in [0usize, 6, 13, 21, 30].iter().enumerate() {
            codeword[*i] ^= 0x11 + n as u8;
        }

        let (_, err) = rs.c1_decode(codeword, vec![0; 32]);
        // The word is far outside the correction radius, so it must not
        // be reported clean; rejection flags every output byte
        assert_eq!(rs.valid_c1s(), 0);
        assert_eq!(rs.error_c1s(), 1);
        assert!(err.iter().all(|&e| e == 1));
    }

    #[test]
    fn c2_parity_sits_in_the_middle() {
        let rs = ReedSolomon::new();
        let msg = sample_24();

        let codeword = rs.c2_encode(&msg);
        assert_eq!(codeword.len(), 28);
        assert_eq!(&codeword[..12], &msg[..12]);
        assert_eq!(&codeword[16..], &msg[12..]);
    }

    #[test]
    fn c2_clean_roundtrip() {
        let mut rs = ReedSolomon::new();
        let msg = sample_24();

        let codeword = rs.c2_encode(&msg);
        let (out, err) = rs.c2_decode(codeword, vec![0; 28]);
        assert_eq!(out, msg);
        assert!(err.iter().all(|&e| e == 0));
        assert_eq!(rs.valid_c2s(), 1);
    }

    #[test]
    fn c2_corrects_four_erasures() {
        let mut rs = ReedSolomon::new();
        let msg = sample_24();

        let mut codeword = rs.c2_encode(&msg);
        let mut flags = vec![0u8; 28];
        for &i in &[2usize, 9, 18, 25] {
            codeword[i] ^= 0x77;
            flags[i] = 1;
        }

        let (out, err) = rs.c2_decode(codeword, flags);
        assert_eq!(out, msg);
        assert!(err.iter().all(|&e| e == 0));
        assert_eq!(rs.fixed_c2s(), 1);
    }

    #[test]
    fn c2_rejects_five_erasures() {
        let mut rs = ReedSolomon::new();
        let msg = sample_24();

        let codeword = rs.c2_encode(&msg);
        let mut flags = vec![0u8; 28];
        for &i in &[1usize, 5, 11, 19, 27] {
            flags[i] = 1;
        }

        let (out, err) = rs.c2_decode(codeword, flags);
        assert_eq!(out.len(), 24);
        assert!(err.iter().all(|&e| e == 1));
        assert_eq!(rs.error_c2s(), 1);
    }

    #[test]
    fn erasure_with_correct_value_counts_as_clean() {
        let mut rs = ReedSolomon::new();
        let msg = sample_28();

        let codeword = rs.c1_encode(&msg);
        let mut flags = vec![0u8; 32];
        // Flagged but the byte is actually fine
        flags[10] = 1;

        let (out, _) = rs.c1_decode(codeword, flags);
        assert_eq!(out, msg);
        assert_eq!(rs.valid_c1s(), 1);
    }
}
