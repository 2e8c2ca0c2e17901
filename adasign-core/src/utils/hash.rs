use blake2::{
    digest::consts::{U28, U32},
    Blake2b, Digest,
};

/// Compute the blake2b-256 hash of input bytes.
///
/// This is the hash used for transaction identifiers.
pub fn blake2b_256<T: AsRef<[u8]>>(bytes: T) -> [u8; 32] {
    let mut output = [0u8; 32];

    let mut hasher = Blake2b::<U32>::new();
    hasher.update(bytes.as_ref());
    output.copy_from_slice(&hasher.finalize());

    output
}

/// Compute the blake2b-224 hash of input bytes, as used for key hashes in addresses and
/// certificates.
pub fn blake2b_224<T: AsRef<[u8]>>(bytes: T) -> [u8; 28] {
    let mut output = [0u8; 28];

    let mut hasher = Blake2b::<U28>::new();
    hasher.update(bytes.as_ref());
    output.copy_from_slice(&hasher.finalize());

    output
}
