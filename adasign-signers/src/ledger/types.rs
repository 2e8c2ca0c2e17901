#![allow(clippy::upper_case_acronyms)]
//! Wire records of the Ledger Cardano app
//! [Official Docs](https://github.com/cardano-foundation/ledgerjs-hw-app-cardano)
use crate::{AddressToPathMapper, CryptoProviderError};
use adasign_core::types::{
    group_tokens, DerivationPath, Network, PoolMetadata, PoolOwner, PoolRegistrationParams,
    PoolRelay, Token, TxAux, TxCertificate, TxInput, TxOutput, TxWithdrawal,
};
use serde::{Deserialize, Serialize};

/// Address header nibbles understood by the device
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum AddressTypeNibble {
    Base = 0b0000,
    Enterprise = 0b0110,
    Byron = 0b1000,
    Reward = 0b1110,
}

impl From<AddressTypeNibble> for u8 {
    fn from(nibble: AddressTypeNibble) -> Self {
        nibble as u8
    }
}

impl TryFrom<u8> for AddressTypeNibble {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0b0000 => AddressTypeNibble::Base,
            0b0110 => AddressTypeNibble::Enterprise,
            0b1000 => AddressTypeNibble::Byron,
            0b1110 => AddressTypeNibble::Reward,
            other => return Err(format!("unknown address type nibble {other:#06b}")),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerInput {
    pub tx_hash_hex: String,
    pub output_index: u32,
    /// Set when the input belongs to the wallet
    pub path: Option<DerivationPath>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerToken {
    pub asset_name_hex: String,
    pub amount_str: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAssetGroup {
    pub policy_id_hex: String,
    pub tokens: Vec<LedgerToken>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerOutput {
    /// Output to an external address
    #[serde(rename_all = "camelCase")]
    ToAddress { amount_str: String, address_hex: String, token_bundle: Vec<LedgerAssetGroup> },
    /// Change output, described by the paths of its keys
    #[serde(rename_all = "camelCase")]
    ToPath {
        amount_str: String,
        token_bundle: Vec<LedgerAssetGroup>,
        address_type_nibble: AddressTypeNibble,
        spending_path: DerivationPath,
        staking_path: DerivationPath,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMargin {
    pub numerator_str: String,
    pub denominator_str: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LedgerPoolOwner {
    /// An owner key held by this wallet
    #[serde(rename_all = "camelCase")]
    Path { staking_path: DerivationPath },
    #[serde(rename_all = "camelCase")]
    KeyHash { staking_key_hash_hex: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRelayParams {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port_number: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ipv4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ipv6: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dns_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRelay {
    #[serde(rename = "type")]
    pub kind: u8,
    pub params: LedgerRelayParams,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPoolMetadata {
    pub metadata_url: String,
    pub metadata_hash_hex: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPoolParams {
    pub pool_key_hash_hex: String,
    pub vrf_key_hash_hex: String,
    pub pledge_str: String,
    pub cost_str: String,
    pub margin: LedgerMargin,
    pub reward_account_hex: String,
    pub pool_owners: Vec<LedgerPoolOwner>,
    pub relays: Vec<LedgerRelay>,
    pub metadata: Option<LedgerPoolMetadata>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCertificate {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<DerivationPath>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pool_key_hash_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pool_registration_params: Option<LedgerPoolParams>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerWithdrawal {
    pub path: DerivationPath,
    pub amount_str: String,
}

/// Ledger `signTransaction` arguments. Amounts travel as decimal strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSignTxRequest {
    pub network_id: u8,
    pub protocol_magic: u32,
    pub inputs: Vec<LedgerInput>,
    pub outputs: Vec<LedgerOutput>,
    pub fee_str: String,
    pub ttl_str: String,
    pub certificates: Vec<LedgerCertificate>,
    pub withdrawals: Vec<LedgerWithdrawal>,
}

impl LedgerSignTxRequest {
    /// Projects `tx` onto the Ledger wire shape
    pub fn load(
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> Result<Self, CryptoProviderError> {
        let outputs = tx.outputs.iter().map(Self::output).collect::<Result<_, _>>()?;
        let certificates = tx
            .certificates
            .iter()
            .map(|certificate| Self::certificate(certificate, mapper, network))
            .collect::<Result<_, _>>()?;
        let withdrawals = tx
            .withdrawals
            .iter()
            .map(|withdrawal| Self::withdrawal(withdrawal, mapper))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            network_id: network.network_id.into(),
            protocol_magic: network.protocol_magic,
            inputs: tx.inputs.iter().map(|input| Self::input(input, mapper)).collect(),
            outputs,
            fee_str: tx.fee.to_string(),
            ttl_str: tx.ttl.to_string(),
            certificates,
            withdrawals,
        })
    }

    fn input(input: &TxInput, mapper: &dyn AddressToPathMapper) -> LedgerInput {
        LedgerInput {
            tx_hash_hex: input.tx_hash.to_string(),
            output_index: input.output_index,
            path: mapper.path_for(&input.address),
        }
    }

    fn token_bundle(tokens: &[Token]) -> Result<Vec<LedgerAssetGroup>, CryptoProviderError> {
        let groups = group_tokens(tokens)?;
        Ok(groups
            .into_iter()
            .map(|group| LedgerAssetGroup {
                policy_id_hex: group.policy_id.to_hex(),
                tokens: group
                    .assets
                    .into_iter()
                    .map(|(name, quantity)| LedgerToken {
                        asset_name_hex: name.to_hex(),
                        amount_str: quantity.to_string(),
                    })
                    .collect(),
            })
            .collect())
    }

    fn output(output: &TxOutput) -> Result<LedgerOutput, CryptoProviderError> {
        Ok(match output {
            TxOutput::NoChange { address, coins, tokens } => LedgerOutput::ToAddress {
                amount_str: coins.to_string(),
                address_hex: address.to_hex(),
                token_bundle: Self::token_bundle(tokens)?,
            },
            TxOutput::Change { coins, tokens, spending_path, staking_path, .. } => {
                LedgerOutput::ToPath {
                    amount_str: coins.to_string(),
                    token_bundle: Self::token_bundle(tokens)?,
                    address_type_nibble: AddressTypeNibble::Base,
                    spending_path: spending_path.clone(),
                    staking_path: staking_path.clone(),
                }
            }
        })
    }

    fn certificate(
        certificate: &TxCertificate,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> Result<LedgerCertificate, CryptoProviderError> {
        let kind = certificate.certificate_type().into();
        Ok(match certificate {
            TxCertificate::StakingKeyRegistration { staking_address } |
            TxCertificate::StakingKeyDeregistration { staking_address } => LedgerCertificate {
                kind,
                path: Some(mapper.require_path(staking_address.address())?),
                pool_key_hash_hex: None,
                pool_registration_params: None,
            },
            TxCertificate::Delegation { staking_address, pool_hash } => LedgerCertificate {
                kind,
                path: Some(mapper.require_path(staking_address.address())?),
                pool_key_hash_hex: Some(pool_hash.to_hex()),
                pool_registration_params: None,
            },
            TxCertificate::StakepoolRegistration { staking_address, pool_registration_params } => {
                LedgerCertificate {
                    kind,
                    path: mapper.path_for(staking_address.address()),
                    pool_key_hash_hex: None,
                    pool_registration_params: Some(Self::pool_params(
                        pool_registration_params,
                        mapper,
                        network,
                    )),
                }
            }
        })
    }

    fn pool_params(
        params: &PoolRegistrationParams,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> LedgerPoolParams {
        LedgerPoolParams {
            pool_key_hash_hex: params.pool_key_hash.to_hex(),
            vrf_key_hash_hex: params.vrf_key_hash.to_hex(),
            pledge_str: params.pledge.to_string(),
            cost_str: params.cost.to_string(),
            margin: LedgerMargin {
                numerator_str: params.margin.numerator.to_string(),
                denominator_str: params.margin.denominator.to_string(),
            },
            reward_account_hex: params.reward_account.to_hex(),
            pool_owners: params
                .owners
                .iter()
                .map(|owner| Self::pool_owner(owner, mapper, network))
                .collect(),
            relays: params.relays.iter().map(Self::relay).collect(),
            metadata: params.metadata.as_ref().map(|PoolMetadata { url, hash }| {
                LedgerPoolMetadata { metadata_url: url.clone(), metadata_hash_hex: hash.to_hex() }
            }),
        }
    }

    fn pool_owner(
        owner: &PoolOwner,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> LedgerPoolOwner {
        let path =
            owner.reward_address(network.network_id).and_then(|address| mapper.path_for(&address));
        match path {
            Some(staking_path) => LedgerPoolOwner::Path { staking_path },
            None => {
                LedgerPoolOwner::KeyHash { staking_key_hash_hex: owner.staking_key_hash.to_hex() }
            }
        }
    }

    fn relay(relay: &PoolRelay) -> LedgerRelay {
        let params = match relay {
            PoolRelay::SingleHostAddr { port, ipv4, ipv6 } => LedgerRelayParams {
                port_number: *port,
                ipv4: ipv4.map(|ip| ip.to_string()),
                ipv6: ipv6.map(|ip| ip.to_string()),
                dns_name: None,
            },
            PoolRelay::SingleHostName { port, dns_name } => LedgerRelayParams {
                port_number: *port,
                dns_name: Some(dns_name.clone()),
                ..Default::default()
            },
            PoolRelay::MultiHostName { dns_name } => {
                LedgerRelayParams { dns_name: Some(dns_name.clone()), ..Default::default() }
            }
        };
        LedgerRelay { kind: relay.kind(), params }
    }

    fn withdrawal(
        withdrawal: &TxWithdrawal,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<LedgerWithdrawal, CryptoProviderError> {
        Ok(LedgerWithdrawal {
            path: mapper.require_path(withdrawal.staking_address.address())?,
            amount_str: withdrawal.rewards.to_string(),
        })
    }
}

/// Semantic version reported by the Cardano app
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerExtendedPublicKey {
    pub public_key_hex: String,
    pub chain_code_hex: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerWitness {
    pub path: DerivationPath,
    pub witness_signature_hex: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSignTransactionResponse {
    pub tx_hash_hex: String,
    pub witnesses: Vec<LedgerWitness>,
}

/// A call to the Cardano app
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum LedgerRequest {
    GetVersion,
    GetExtendedPublicKey {
        path: DerivationPath,
    },
    GetExtendedPublicKeys {
        paths: Vec<DerivationPath>,
    },
    #[serde(rename_all = "camelCase")]
    ShowAddress {
        address_type_nibble: AddressTypeNibble,
        network_id: u8,
        spending_path: DerivationPath,
        staking_path: Option<DerivationPath>,
    },
    SignTransaction(LedgerSignTxRequest),
}

/// Answer of the Cardano app. Every call either succeeds with its own payload or fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum LedgerResponse {
    Version(LedgerVersion),
    ExtendedPublicKeys(Vec<LedgerExtendedPublicKey>),
    AddressShown,
    SignedTransaction(LedgerSignTransactionResponse),
    /// The device refused the call, e.g. because the user declined it
    Failure { name: String, message: String },
}
