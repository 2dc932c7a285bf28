//! CIRC (Cross-Interleaved Reed-Solomon Code) primitives.
//!
//! Four building blocks compose the ECMA-130 error-correction engine: the
//! per-lane [`delay::DelayLines`], the fixed 24-byte [`interleave`]
//! permutation, the P/Q [`parity`] inverter and the erasure-aware C1/C2
//! Reed-Solomon codecs in [`rs`]. The decode and encode pipelines in
//! [`crate::decode`] and [`crate::encode`] wire them into the two mirror
//! chains.

pub mod delay;
pub mod gf;
pub mod interleave;
pub mod parity;
pub mod rs;

pub use delay::DelayLines;
pub use rs::ReedSolomon;
