//! Various utilities for hashing Cardano data.
mod hash;
pub use hash::{blake2b_224, blake2b_256};
