use crate::types::NetworkId;
use bech32::{FromBase32, ToBase32, Variant};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::{
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};
use thiserror::Error;

/// Length of the key hashes embedded in addresses and certificates
pub const KEY_HASH_LENGTH: usize = 28;

const REWARD_ADDRESS_HEADER_TYPE: u8 = 0b1110;

#[derive(Error, Debug)]
/// Error when decoding an address
pub enum AddressError {
    /// The text was neither valid bech32 nor valid base58
    #[error("{0:?} is neither a bech32 nor a base58 address")]
    InvalidEncoding(String),
    #[error(transparent)]
    Bech32(#[from] bech32::Error),
    /// The bytes do not form an address of the expected kind
    #[error("expected a reward address, got header {header:#04x} and {len} bytes")]
    NotARewardAddress { header: u8, len: usize },
}

/// A Cardano address, kept in both its text form and its decoded bytes.
///
/// Shelley-era addresses are bech32 (`addr1...`, `stake1...`), Byron-era addresses are base58.
#[derive(Clone)]
pub struct Address {
    text: String,
    bytes: Vec<u8>,
}

impl Address {
    /// The human readable form the address was parsed from
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The raw address bytes, as embedded in transaction outputs
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Whether the address is a Shelley-era (bech32) address
    pub fn is_shelley_format(&self) -> bool {
        is_bech32(&self.text)
    }

    /// Extracts the staking key hash of a reward address
    pub fn staking_key_hash(&self) -> Result<[u8; KEY_HASH_LENGTH], AddressError> {
        reward_account_key_hash(&self.bytes)
    }
}

/// A reward (staking) address, validated to carry a staking key hash.
///
/// Certificates and withdrawals reference the staking key through this type, so their encoding
/// can never fail on a malformed address.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StakingAddress {
    address: Address,
    key_hash: [u8; KEY_HASH_LENGTH],
}

impl StakingAddress {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn key_hash(&self) -> &[u8; KEY_HASH_LENGTH] {
        &self.key_hash
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.address.as_bytes()
    }
}

impl TryFrom<Address> for StakingAddress {
    type Error = AddressError;

    fn try_from(address: Address) -> Result<Self, Self::Error> {
        let key_hash = address.staking_key_hash()?;
        Ok(Self { address, key_hash })
    }
}

impl FromStr for StakingAddress {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        text.parse::<Address>()?.try_into()
    }
}

impl fmt::Display for StakingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.address.fmt(f)
    }
}

impl fmt::Debug for StakingAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StakingAddress({})", self.address)
    }
}

impl Serialize for StakingAddress {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.address.serialize(s)
    }
}

impl<'de> Deserialize<'de> for StakingAddress {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Address::deserialize(d)?.try_into().map_err(D::Error::custom)
    }
}

/// Extracts the staking key hash of raw reward account bytes (header byte + key hash)
pub fn reward_account_key_hash(bytes: &[u8]) -> Result<[u8; KEY_HASH_LENGTH], AddressError> {
    let header = bytes.first().copied().unwrap_or_default();
    if header >> 4 != REWARD_ADDRESS_HEADER_TYPE || bytes.len() != KEY_HASH_LENGTH + 1 {
        return Err(AddressError::NotARewardAddress { header, len: bytes.len() })
    }
    let mut hash = [0u8; KEY_HASH_LENGTH];
    hash.copy_from_slice(&bytes[1..]);
    Ok(hash)
}

/// Encodes raw reward account bytes as bech32 text, `stake1...` on mainnet and `stake_test1...`
/// elsewhere
pub fn reward_account_to_bech32(
    bytes: &[u8],
    network_id: NetworkId,
) -> Result<String, AddressError> {
    let hrp = match network_id {
        NetworkId::Mainnet => "stake",
        NetworkId::Testnet => "stake_test",
    };
    Ok(bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)?)
}

/// Builds the reward address for a staking key hash
pub fn reward_address_bytes(key_hash: &[u8; KEY_HASH_LENGTH], network_id: NetworkId) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(KEY_HASH_LENGTH + 1);
    bytes.push(REWARD_ADDRESS_HEADER_TYPE << 4 | u8::from(network_id));
    bytes.extend_from_slice(key_hash);
    bytes
}

fn is_bech32(text: &str) -> bool {
    bech32::decode(text).is_ok()
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let bytes = match bech32::decode(text) {
            Ok((_, data, _)) => Vec::<u8>::from_base32(&data)?,
            Err(_) => bs58::decode(text)
                .into_vec()
                .map_err(|_| AddressError::InvalidEncoding(text.to_owned()))?,
        };
        if bytes.is_empty() {
            return Err(AddressError::InvalidEncoding(text.to_owned()))
        }
        Ok(Self { text: text.to_owned(), bytes })
    }
}

impl TryFrom<Vec<u8>> for Address {
    type Error = AddressError;

    /// Wraps raw reward account bytes, rendering them as bech32 text
    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        let network_id = match bytes.first().map(|header| header & 0x0f) {
            Some(1) => NetworkId::Mainnet,
            _ => NetworkId::Testnet,
        };
        reward_account_key_hash(&bytes)?;
        let text = reward_account_to_bech32(&bytes, network_id)?;
        Ok(Self { text, bytes })
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.text)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BYRON: &str = "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi";

    #[test]
    fn byron_addresses_decode_from_base58() {
        let address: Address = BYRON.parse().unwrap();
        assert!(!address.is_shelley_format());
        assert_eq!(address.as_bytes(), bs58::decode(BYRON).into_vec().unwrap().as_slice());
        assert_eq!(address.to_string(), BYRON);
    }

    #[test]
    fn reward_addresses_round_trip_through_bech32() {
        let key_hash = [7u8; KEY_HASH_LENGTH];
        let bytes = reward_address_bytes(&key_hash, NetworkId::Mainnet);
        assert_eq!(bytes[0], 0xe1);

        let text = reward_account_to_bech32(&bytes, NetworkId::Mainnet).unwrap();
        assert!(text.starts_with("stake1"));

        let address: Address = text.parse().unwrap();
        assert!(address.is_shelley_format());
        assert_eq!(address.as_bytes(), bytes.as_slice());
        assert_eq!(address.staking_key_hash().unwrap(), key_hash);
        assert_eq!(Address::try_from(bytes).unwrap(), address);

        let staking: StakingAddress = text.parse().unwrap();
        assert_eq!(staking.key_hash(), &key_hash);
    }

    #[test]
    fn testnet_reward_accounts_use_stake_test_prefix() {
        let bytes = reward_address_bytes(&[1u8; KEY_HASH_LENGTH], NetworkId::Testnet);
        let text = reward_account_to_bech32(&bytes, NetworkId::Testnet).unwrap();
        assert!(text.starts_with("stake_test1"));
    }

    #[test]
    fn base_address_is_not_a_reward_address() {
        let address: Address = BYRON.parse().unwrap();
        assert!(matches!(address.staking_key_hash(), Err(AddressError::NotARewardAddress { .. })));
    }

    #[test]
    fn rejects_garbage() {
        assert!("not an address!".parse::<Address>().is_err());
    }
}
