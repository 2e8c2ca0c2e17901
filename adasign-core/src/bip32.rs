//! BIP32-Ed25519 hierarchical keys, derivation scheme V2.
//!
//! An extended private key is `kL || kR || chain code`. `kL` is the Ed25519 secret scalar and `kR`
//! the nonce prefix, so signing works directly on the expanded key instead of on a seed.
//! Soft (non-hardened) children can be derived from the extended public key alone, which is what
//! lets hardware backends export one account xpub and have every address key derived locally.
use crate::types::{is_hardened, DerivationPath};
use curve25519_dalek::{edwards::CompressedEdwardsY, EdwardsPoint, Scalar};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha512};
use std::{fmt, str::FromStr};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha512 = Hmac<Sha512>;

/// Length of a serialized extended public key
pub const XPUB_LENGTH: usize = 64;

/// Length of a serialized extended private key
pub const XPRV_LENGTH: usize = 96;

#[derive(Error, Debug, PartialEq)]
/// Error when parsing or deriving keys
pub enum KeyError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    /// Hardened children need the private key
    #[error("cannot derive hardened index {0:#x} from a public key")]
    HardenedFromPublic(u32),
    #[error("public key is not a valid curve point")]
    InvalidPoint,
    #[error(transparent)]
    Hex(#[from] hex::FromHexError),
}

/// An extended Ed25519 public key: 32 byte point and 32 byte chain code
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtendedPublicKey {
    pub public_key: [u8; 32],
    pub chain_code: [u8; 32],
}

impl ExtendedPublicKey {
    pub fn new(public_key: [u8; 32], chain_code: [u8; 32]) -> Self {
        Self { public_key, chain_code }
    }

    /// Parses the 64 byte `public key || chain code` form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != XPUB_LENGTH {
            return Err(KeyError::InvalidLength { expected: XPUB_LENGTH, actual: bytes.len() })
        }
        let mut public_key = [0u8; 32];
        let mut chain_code = [0u8; 32];
        public_key.copy_from_slice(&bytes[..32]);
        chain_code.copy_from_slice(&bytes[32..]);
        Ok(Self { public_key, chain_code })
    }

    pub fn to_bytes(&self) -> [u8; XPUB_LENGTH] {
        let mut bytes = [0u8; XPUB_LENGTH];
        bytes[..32].copy_from_slice(&self.public_key);
        bytes[32..].copy_from_slice(&self.chain_code);
        bytes
    }

    /// Derives a soft child key
    pub fn derive(&self, index: u32) -> Result<Self, KeyError> {
        if is_hardened(index) {
            return Err(KeyError::HardenedFromPublic(index))
        }
        let index_bytes = index.to_le_bytes();
        let z = hmac_sha512(&self.chain_code, &[&[0x02], &self.public_key, &index_bytes]);
        let chain_code = hmac_sha512(&self.chain_code, &[&[0x03], &self.public_key, &index_bytes]);

        let parent =
            CompressedEdwardsY(self.public_key).decompress().ok_or(KeyError::InvalidPoint)?;
        let tweak = Scalar::from_bytes_mod_order(add_28_mul8(&[0u8; 32], &z[..28]));
        let child = parent + EdwardsPoint::mul_base(&tweak);

        Ok(Self { public_key: child.compress().to_bytes(), chain_code: right_half(&chain_code) })
    }

    /// Derives along a path of soft indices
    pub fn derive_path(&self, indices: &[u32]) -> Result<Self, KeyError> {
        indices.iter().try_fold(*self, |key, index| key.derive(*index))
    }

    /// Checks an Ed25519 signature made by this key
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> bool {
        VerifyingKey::from_bytes(&self.public_key)
            .map(|key| key.verify(message, &Signature::from_bytes(signature)).is_ok())
            .unwrap_or(false)
    }
}

impl fmt::Debug for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtendedPublicKey({self})")
    }
}

impl fmt::Display for ExtendedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_bytes()))
    }
}

impl FromStr for ExtendedPublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(&hex::decode(s)?)
    }
}

/// An extended Ed25519 private key. The key material is wiped on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ExtendedPrivateKey([u8; XPRV_LENGTH]);

impl ExtendedPrivateKey {
    /// Wraps `kL || kR || chain code`. The caller is responsible for `kL` having been clamped
    /// when the root key was generated.
    pub fn from_bytes(bytes: [u8; XPRV_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; XPRV_LENGTH] {
        &self.0
    }

    fn kl(&self) -> &[u8] {
        &self.0[..32]
    }

    fn kr(&self) -> &[u8] {
        &self.0[32..64]
    }

    fn chain_code(&self) -> [u8; 32] {
        right_half(&self.0[32..])
    }

    fn scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(left_half(&self.0))
    }

    pub fn public_key(&self) -> [u8; 32] {
        EdwardsPoint::mul_base(&self.scalar()).compress().to_bytes()
    }

    pub fn to_public(&self) -> ExtendedPublicKey {
        ExtendedPublicKey { public_key: self.public_key(), chain_code: self.chain_code() }
    }

    /// Derives a child key, hardened or soft
    pub fn derive(&self, index: u32) -> Self {
        let index_bytes = index.to_le_bytes();
        let chain_code = self.chain_code();
        let (z, cc) = if is_hardened(index) {
            let kl_kr = &self.0[..64];
            (
                hmac_sha512(&chain_code, &[&[0x00], kl_kr, &index_bytes]),
                hmac_sha512(&chain_code, &[&[0x01], kl_kr, &index_bytes]),
            )
        } else {
            let public_key = self.public_key();
            (
                hmac_sha512(&chain_code, &[&[0x02], &public_key, &index_bytes]),
                hmac_sha512(&chain_code, &[&[0x03], &public_key, &index_bytes]),
            )
        };

        let mut child = [0u8; XPRV_LENGTH];
        child[..32].copy_from_slice(&add_28_mul8(self.kl(), &z[..28]));
        child[32..64].copy_from_slice(&add_256(self.kr(), &z[32..]));
        child[64..].copy_from_slice(&cc[32..]);
        Self(child)
    }

    pub fn derive_path(&self, path: &DerivationPath) -> Self {
        path.as_slice().iter().fold(self.clone(), |key, index| key.derive(*index))
    }

    /// Signs `message` with the expanded key (Ed25519 without re-hashing a seed)
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let public_key = self.public_key();
        let r = wide_scalar(Sha512::new().chain_update(self.kr()).chain_update(message));
        let big_r = EdwardsPoint::mul_base(&r).compress().to_bytes();
        let k = wide_scalar(
            Sha512::new().chain_update(big_r).chain_update(public_key).chain_update(message),
        );
        let s = r + k * self.scalar();

        let mut signature = [0u8; 64];
        signature[..32].copy_from_slice(&big_r);
        signature[32..].copy_from_slice(s.as_bytes());
        signature
    }
}

impl fmt::Debug for ExtendedPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExtendedPrivateKey(..)")
    }
}

fn hmac_sha512(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 64] {
    let mut mac = HmacSha512::new_from_slice(key).expect("HMAC can take key of any size");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn wide_scalar(hasher: Sha512) -> Scalar {
    let mut wide = [0u8; 64];
    wide.copy_from_slice(&hasher.finalize());
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn left_half(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[..32]);
    out
}

fn right_half(bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes[32..64]);
    out
}

/// `x + 8 * y` over little endian integers, `y` being 28 bytes
fn add_28_mul8(x: &[u8], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry = 0u16;
    for i in 0..32 {
        let y = if i < 28 { u16::from(y[i]) << 3 } else { 0 };
        let r = u16::from(x[i]) + y + carry;
        out[i] = r as u8;
        carry = r >> 8;
    }
    out
}

/// `x + y mod 2^256` over little endian integers
fn add_256(x: &[u8], y: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    let mut carry = 0u16;
    for i in 0..32 {
        let r = u16::from(x[i]) + u16::from(y[i]) + carry;
        out[i] = r as u8;
        carry = r >> 8;
    }
    out
}
