use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Offset which marks a derivation index as hardened
pub const HARDENED: u32 = 0x8000_0000;

/// Purpose of CIP-1852 (Shelley era) paths
pub const SHELLEY_PURPOSE: u32 = 1852 | HARDENED;

/// Purpose of BIP-44 (Byron era) paths
pub const BYRON_PURPOSE: u32 = 44 | HARDENED;

/// Registered coin type of ada
pub const ADA_COIN_TYPE: u32 = 1815 | HARDENED;

/// Hardens a derivation index
pub const fn harden(index: u32) -> u32 {
    index | HARDENED
}

/// Whether the index denotes hardened derivation
pub const fn is_hardened(index: u32) -> bool {
    index >= HARDENED
}

#[derive(Error, Debug, PartialEq, Eq)]
/// Error when parsing a derivation path
pub enum PathError {
    /// The path did not start with the `m` root marker
    #[error("derivation path must start with `m`, got {0:?}")]
    MissingRoot(String),
    /// A segment was not a valid 31 bit index
    #[error("invalid derivation path segment {0:?}")]
    InvalidSegment(String),
}

/// A BIP32-style derivation path. Equality and hashing are structural, so a path can key a
/// cache by value.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivationPath(Vec<u32>);

/// Address era a path belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressEra {
    /// Legacy bootstrap era, purpose 44'
    Byron,
    /// Current era, purpose 1852'
    Shelley,
}

impl DerivationPath {
    pub fn new(indices: Vec<u32>) -> Self {
        Self(indices)
    }

    /// `m/1852'/1815'/{account}'`
    pub fn shelley_account(account: u32) -> Self {
        Self(vec![SHELLEY_PURPOSE, ADA_COIN_TYPE, harden(account)])
    }

    /// `m/44'/1815'/{account}'`
    pub fn byron_account(account: u32) -> Self {
        Self(vec![BYRON_PURPOSE, ADA_COIN_TYPE, harden(account)])
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    /// Returns a new path extended by `index`
    #[must_use]
    pub fn child(&self, index: u32) -> Self {
        let mut indices = self.0.clone();
        indices.push(index);
        Self(indices)
    }

    /// Returns the path without its last segment, or `None` for the root
    pub fn parent(&self) -> Option<Self> {
        self.0.split_last().map(|(_, rest)| Self(rest.to_vec()))
    }

    /// Number of leading segments up to and including the last hardened one
    pub fn hardened_prefix_len(&self) -> usize {
        self.0.iter().rposition(|index| is_hardened(*index)).map_or(0, |pos| pos + 1)
    }

    /// Returns the first `len` segments
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Whether the path lives in the Shelley (CIP-1852) namespace
    pub fn is_shelley(&self) -> bool {
        self.0.first() == Some(&SHELLEY_PURPOSE)
    }

    /// Address era of the path. Anything outside the Shelley namespace is treated as Byron.
    pub fn era(&self) -> AddressEra {
        if self.is_shelley() {
            AddressEra::Shelley
        } else {
            AddressEra::Byron
        }
    }
}

impl From<Vec<u32>> for DerivationPath {
    fn from(indices: Vec<u32>) -> Self {
        Self(indices)
    }
}

impl From<&[u32]> for DerivationPath {
    fn from(indices: &[u32]) -> Self {
        Self(indices.to_vec())
    }
}

impl AsRef<[u32]> for DerivationPath {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split('/');
        if segments.next() != Some("m") {
            return Err(PathError::MissingRoot(s.to_owned()))
        }

        let mut indices = vec![];
        for segment in segments {
            let stripped = segment.strip_suffix('\'').or_else(|| segment.strip_suffix('h'));
            let (digits, hardened) = match stripped {
                Some(digits) => (digits, true),
                None => (segment, false),
            };
            let index = digits
                .parse::<u32>()
                .ok()
                .filter(|index| !is_hardened(*index))
                .ok_or_else(|| PathError::InvalidSegment(segment.to_owned()))?;
            indices.push(if hardened { harden(index) } else { index });
        }

        Ok(Self(indices))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for index in &self.0 {
            if is_hardened(*index) {
                write!(f, "/{}'", index - HARDENED)?;
            } else {
                write!(f, "/{index}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivationPath({self})")
    }
}
