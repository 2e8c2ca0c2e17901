use super::{reward_address_bytes, Address, Bytes, Lovelace, NetworkId, StakingAddress};
use crate::cbor::{Encode, Encoder};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

const TAG_RATIONAL: u64 = 30;

#[derive(Error, Debug, PartialEq, Eq)]
/// Error when interpreting a certificate
pub enum CertificateError {
    /// The certificate type code is not one of the known variants
    #[error("invalid certificate type {0}")]
    InvalidCertificateType(u8),
    /// A field required by the certificate type is absent
    #[error("{certificate_type} certificate lacks {field}")]
    MissingField { certificate_type: CertificateType, field: &'static str },
}

/// On-chain certificate type codes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[repr(u8)]
pub enum CertificateType {
    StakingKeyRegistration = 0,
    StakingKeyDeregistration = 1,
    Delegation = 2,
    StakepoolRegistration = 3,
}

impl From<CertificateType> for u8 {
    fn from(ty: CertificateType) -> Self {
        ty as u8
    }
}

impl TryFrom<u8> for CertificateType {
    type Error = CertificateError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => CertificateType::StakingKeyRegistration,
            1 => CertificateType::StakingKeyDeregistration,
            2 => CertificateType::Delegation,
            3 => CertificateType::StakepoolRegistration,
            other => return Err(CertificateError::InvalidCertificateType(other)),
        })
    }
}

/// A certificate included in a transaction. Each variant only carries the fields valid for it.
///
/// On the wire a certificate is a [`RawCertificate`], so an unknown type code fails with
/// [`CertificateError::InvalidCertificateType`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCertificate", into = "RawCertificate")]
pub enum TxCertificate {
    StakingKeyRegistration { staking_address: StakingAddress },
    StakingKeyDeregistration { staking_address: StakingAddress },
    Delegation { staking_address: StakingAddress, pool_hash: Bytes },
    StakepoolRegistration {
        staking_address: StakingAddress,
        pool_registration_params: PoolRegistrationParams,
    },
}

/// A certificate as it is exchanged with wallets: the numeric type code next to every field any
/// type may carry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCertificate {
    #[serde(rename = "type")]
    pub certificate_type: u8,
    pub staking_address: StakingAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_hash: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_registration_params: Option<PoolRegistrationParams>,
}

impl TryFrom<RawCertificate> for TxCertificate {
    type Error = CertificateError;

    fn try_from(raw: RawCertificate) -> Result<Self, Self::Error> {
        let certificate_type = CertificateType::try_from(raw.certificate_type)?;
        let missing =
            |field: &'static str| CertificateError::MissingField { certificate_type, field };
        let staking_address = raw.staking_address;
        Ok(match certificate_type {
            CertificateType::StakingKeyRegistration => {
                TxCertificate::StakingKeyRegistration { staking_address }
            }
            CertificateType::StakingKeyDeregistration => {
                TxCertificate::StakingKeyDeregistration { staking_address }
            }
            CertificateType::Delegation => TxCertificate::Delegation {
                staking_address,
                pool_hash: raw.pool_hash.ok_or_else(|| missing("poolHash"))?,
            },
            CertificateType::StakepoolRegistration => TxCertificate::StakepoolRegistration {
                staking_address,
                pool_registration_params: raw
                    .pool_registration_params
                    .ok_or_else(|| missing("poolRegistrationParams"))?,
            },
        })
    }
}

impl From<TxCertificate> for RawCertificate {
    fn from(certificate: TxCertificate) -> Self {
        let certificate_type = certificate.certificate_type().into();
        let (staking_address, pool_hash, pool_registration_params) = match certificate {
            TxCertificate::StakingKeyRegistration { staking_address } |
            TxCertificate::StakingKeyDeregistration { staking_address } => {
                (staking_address, None, None)
            }
            TxCertificate::Delegation { staking_address, pool_hash } => {
                (staking_address, Some(pool_hash), None)
            }
            TxCertificate::StakepoolRegistration { staking_address, pool_registration_params } => {
                (staking_address, None, Some(pool_registration_params))
            }
        };
        RawCertificate { certificate_type, staking_address, pool_hash, pool_registration_params }
    }
}

impl TxCertificate {
    pub fn certificate_type(&self) -> CertificateType {
        match self {
            TxCertificate::StakingKeyRegistration { .. } => CertificateType::StakingKeyRegistration,
            TxCertificate::StakingKeyDeregistration { .. } => {
                CertificateType::StakingKeyDeregistration
            }
            TxCertificate::Delegation { .. } => CertificateType::Delegation,
            TxCertificate::StakepoolRegistration { .. } => CertificateType::StakepoolRegistration,
        }
    }

    pub fn staking_address(&self) -> &StakingAddress {
        match self {
            TxCertificate::StakingKeyRegistration { staking_address } |
            TxCertificate::StakingKeyDeregistration { staking_address } |
            TxCertificate::Delegation { staking_address, .. } |
            TxCertificate::StakepoolRegistration { staking_address, .. } => staking_address,
        }
    }
}

fn stake_credential(encoder: &mut Encoder, staking_address: &StakingAddress) {
    encoder.array(2).u64(0).bytes(staking_address.key_hash());
}

impl Encode for TxCertificate {
    fn encode(&self, encoder: &mut Encoder) {
        let code = u64::from(u8::from(self.certificate_type()));
        match self {
            TxCertificate::StakingKeyRegistration { staking_address } |
            TxCertificate::StakingKeyDeregistration { staking_address } => {
                encoder.array(2).u64(code);
                stake_credential(encoder, staking_address);
            }
            TxCertificate::Delegation { staking_address, pool_hash } => {
                encoder.array(3).u64(code);
                stake_credential(encoder, staking_address);
                encoder.bytes(pool_hash);
            }
            TxCertificate::StakepoolRegistration { pool_registration_params: params, .. } => {
                encoder.array(10).u64(code);
                params.encode_fields(encoder);
            }
        }
    }
}

/// Pool margin as a rational number
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMargin {
    pub numerator: u64,
    pub denominator: u64,
}

/// A pool owner, identified by the hash of its staking key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolOwner {
    pub staking_key_hash: Bytes,
}

impl PoolOwner {
    /// The reward address of the owner, or `None` if the key hash is malformed
    pub fn reward_address(&self, network_id: NetworkId) -> Option<Address> {
        let key_hash = self.staking_key_hash.as_ref().try_into().ok()?;
        Address::try_from(reward_address_bytes(key_hash, network_id)).ok()
    }
}

/// How a pool relay can be reached
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PoolRelay {
    /// A host reachable by IP address
    SingleHostAddr { port: Option<u16>, ipv4: Option<Ipv4Addr>, ipv6: Option<Ipv6Addr> },
    /// A host reachable by a DNS A/AAAA record
    #[serde(rename_all = "camelCase")]
    SingleHostName { port: Option<u16>, dns_name: String },
    /// Several hosts behind a DNS SRV record
    #[serde(rename_all = "camelCase")]
    MultiHostName { dns_name: String },
}

impl PoolRelay {
    /// Relay kind code shared by the ledger encoding and both hardware wallets
    pub fn kind(&self) -> u8 {
        match self {
            PoolRelay::SingleHostAddr { .. } => 0,
            PoolRelay::SingleHostName { .. } => 1,
            PoolRelay::MultiHostName { .. } => 2,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            PoolRelay::SingleHostAddr { port, .. } |
            PoolRelay::SingleHostName { port, .. } => *port,
            PoolRelay::MultiHostName { .. } => None,
        }
    }
}

/// IPv6 addresses go on chain as four 32 bit words, each little endian
pub(crate) fn ipv6_ledger_bytes(ip: &Ipv6Addr) -> [u8; 16] {
    let mut bytes = ip.octets();
    for word in bytes.chunks_mut(4) {
        word.reverse();
    }
    bytes
}

impl Encode for PoolRelay {
    fn encode(&self, encoder: &mut Encoder) {
        let port = |encoder: &mut Encoder, port: &Option<u16>| {
            match port {
                Some(port) => encoder.u64((*port).into()),
                None => encoder.null(),
            };
        };
        match self {
            PoolRelay::SingleHostAddr { port: p, ipv4, ipv6 } => {
                encoder.array(4).u64(self.kind().into());
                port(encoder, p);
                match ipv4 {
                    Some(ip) => encoder.bytes(&ip.octets()),
                    None => encoder.null(),
                };
                match ipv6 {
                    Some(ip) => encoder.bytes(&ipv6_ledger_bytes(ip)),
                    None => encoder.null(),
                };
            }
            PoolRelay::SingleHostName { port: p, dns_name } => {
                encoder.array(3).u64(self.kind().into());
                port(encoder, p);
                encoder.str(dns_name);
            }
            PoolRelay::MultiHostName { dns_name } => {
                encoder.array(2).u64(self.kind().into()).str(dns_name);
            }
        }
    }
}

/// Off-chain pool metadata reference
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMetadata {
    pub url: String,
    pub hash: Bytes,
}

impl Encode for PoolMetadata {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.array(2).str(&self.url).bytes(&self.hash);
    }
}

/// Parameters of a stake pool registration certificate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolRegistrationParams {
    /// Hash of the pool operator's cold key
    pub pool_key_hash: Bytes,
    pub vrf_key_hash: Bytes,
    pub pledge: Lovelace,
    pub cost: Lovelace,
    pub margin: PoolMargin,
    /// Raw reward account bytes
    pub reward_account: Bytes,
    pub owners: Vec<PoolOwner>,
    #[serde(default)]
    pub relays: Vec<PoolRelay>,
    #[serde(default)]
    pub metadata: Option<PoolMetadata>,
}

impl PoolRegistrationParams {
    fn encode_fields(&self, encoder: &mut Encoder) {
        encoder
            .bytes(&self.pool_key_hash)
            .bytes(&self.vrf_key_hash)
            .u64(self.pledge)
            .u64(self.cost)
            .tag(TAG_RATIONAL)
            .array(2)
            .u64(self.margin.numerator)
            .u64(self.margin.denominator)
            .bytes(&self.reward_account);
        encoder.array(self.owners.len());
        for owner in &self.owners {
            encoder.bytes(&owner.staking_key_hash);
        }
        encoder.value(&self.relays).value(&self.metadata);
    }
}
