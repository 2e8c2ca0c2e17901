//! Wire records of the Trezor Connect Cardano methods
//! [Official Docs](https://github.com/trezor/connect/blob/develop/docs/methods/cardanoSignTransaction.md)
use crate::{AddressToPathMapper, CryptoProviderError};
use adasign_core::types::{
    group_tokens, reward_account_to_bech32, DerivationPath, Network, PoolMetadata, PoolOwner,
    PoolRegistrationParams, PoolRelay, Token, TxAux, TxCertificate, TxInput, TxOutput,
    TxWithdrawal,
};
use serde::{Deserialize, Serialize};

/// `CardanoAddressType` of the firmware
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TrezorAddressType {
    Base = 0,
    Enterprise = 6,
    Byron = 8,
    Reward = 14,
}

impl From<TrezorAddressType> for u8 {
    fn from(address_type: TrezorAddressType) -> Self {
        address_type as u8
    }
}

impl TryFrom<u8> for TrezorAddressType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => TrezorAddressType::Base,
            6 => TrezorAddressType::Enterprise,
            8 => TrezorAddressType::Byron,
            14 => TrezorAddressType::Reward,
            other => return Err(format!("unknown cardano address type {other}")),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorInput {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<DerivationPath>,
    pub prev_hash: String,
    pub prev_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorTokenAmount {
    pub asset_name_bytes: String,
    pub amount: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorAssetGroup {
    pub policy_id: String,
    pub token_amounts: Vec<TrezorTokenAmount>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorAddressParameters {
    pub address_type: TrezorAddressType,
    pub path: DerivationPath,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub staking_path: Option<DerivationPath>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrezorOutput {
    #[serde(rename_all = "camelCase")]
    ToAddress { address: String, amount: String, token_bundle: Vec<TrezorAssetGroup> },
    #[serde(rename_all = "camelCase")]
    ToPath {
        amount: String,
        address_parameters: TrezorAddressParameters,
        token_bundle: Vec<TrezorAssetGroup>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorMargin {
    pub numerator: String,
    pub denominator: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrezorPoolOwner {
    /// An owner key held by this wallet
    #[serde(rename_all = "camelCase")]
    Path { staking_key_path: DerivationPath },
    #[serde(rename_all = "camelCase")]
    KeyHash { staking_key_hash: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorPoolRelay {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ipv4_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ipv6_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub host_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorPoolMetadata {
    pub url: String,
    pub hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorPoolParameters {
    pub pool_id: String,
    pub vrf_key_hash: String,
    pub pledge: String,
    pub cost: String,
    pub margin: TrezorMargin,
    /// Bech32 reward address
    pub reward_account: String,
    pub owners: Vec<TrezorPoolOwner>,
    pub relays: Vec<TrezorPoolRelay>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub metadata: Option<TrezorPoolMetadata>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorCertificate {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<DerivationPath>,
    /// Hex hash of the pool delegated to
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pool_parameters: Option<TrezorPoolParameters>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorWithdrawal {
    pub path: DerivationPath,
    pub amount: String,
}

/// `cardanoSignTransaction` parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorSignTxRequest {
    pub inputs: Vec<TrezorInput>,
    pub outputs: Vec<TrezorOutput>,
    pub fee: String,
    pub ttl: String,
    pub protocol_magic: u32,
    pub network_id: u8,
    pub certificates: Vec<TrezorCertificate>,
    pub withdrawals: Vec<TrezorWithdrawal>,
}

impl TrezorSignTxRequest {
    /// Projects `tx` onto the Trezor wire shape
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
            inputs: tx.inputs.iter().map(|input| Self::input(input, mapper)).collect(),
            outputs,
            fee: tx.fee.to_string(),
            ttl: tx.ttl.to_string(),
            protocol_magic: network.protocol_magic,
            network_id: network.network_id.into(),
            certificates,
            withdrawals,
        })
    }

    fn input(input: &TxInput, mapper: &dyn AddressToPathMapper) -> TrezorInput {
        TrezorInput {
            path: mapper.path_for(&input.address),
            prev_hash: input.tx_hash.to_string(),
            prev_index: input.output_index,
        }
    }

    fn token_bundle(tokens: &[Token]) -> Result<Vec<TrezorAssetGroup>, CryptoProviderError> {
        let groups = group_tokens(tokens)?;
        Ok(groups
            .into_iter()
            .map(|group| TrezorAssetGroup {
                policy_id: group.policy_id.to_hex(),
                token_amounts: group
                    .assets
                    .into_iter()
                    .map(|(name, quantity)| TrezorTokenAmount {
                        asset_name_bytes: name.to_hex(),
                        amount: quantity.to_string(),
                    })
                    .collect(),
            })
            .collect())
    }

    fn output(output: &TxOutput) -> Result<TrezorOutput, CryptoProviderError> {
        Ok(match output {
            TxOutput::NoChange { address, coins, tokens } => TrezorOutput::ToAddress {
                address: address.to_string(),
                amount: coins.to_string(),
                token_bundle: Self::token_bundle(tokens)?,
            },
            TxOutput::Change { coins, tokens, spending_path, staking_path, .. } => {
                TrezorOutput::ToPath {
                    amount: coins.to_string(),
                    address_parameters: TrezorAddressParameters {
                        address_type: TrezorAddressType::Base,
                        path: spending_path.clone(),
                        staking_path: Some(staking_path.clone()),
                    },
                    token_bundle: Self::token_bundle(tokens)?,
                }
            }
        })
    }

    fn certificate(
        certificate: &TxCertificate,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> Result<TrezorCertificate, CryptoProviderError> {
        let kind = certificate.certificate_type().into();
        Ok(match certificate {
            TxCertificate::StakingKeyRegistration { staking_address } |
            TxCertificate::StakingKeyDeregistration { staking_address } => TrezorCertificate {
                kind,
                path: Some(mapper.require_path(staking_address.address())?),
                pool: None,
                pool_parameters: None,
            },
            TxCertificate::Delegation { staking_address, pool_hash } => TrezorCertificate {
                kind,
                path: Some(mapper.require_path(staking_address.address())?),
                pool: Some(pool_hash.to_hex()),
                pool_parameters: None,
            },
            TxCertificate::StakepoolRegistration { pool_registration_params, .. } => {
                TrezorCertificate {
                    kind,
                    path: None,
                    pool: None,
                    pool_parameters: Some(Self::pool_parameters(
                        pool_registration_params,
                        mapper,
                        network,
                    )?),
                }
            }
        })
    }

    fn pool_parameters(
        params: &PoolRegistrationParams,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> Result<TrezorPoolParameters, CryptoProviderError> {
        Ok(TrezorPoolParameters {
            pool_id: params.pool_key_hash.to_hex(),
            vrf_key_hash: params.vrf_key_hash.to_hex(),
            pledge: params.pledge.to_string(),
            cost: params.cost.to_string(),
            margin: TrezorMargin {
                numerator: params.margin.numerator.to_string(),
                denominator: params.margin.denominator.to_string(),
            },
            reward_account: reward_account_to_bech32(&params.reward_account, network.network_id)?,
            owners: params
                .owners
                .iter()
                .map(|owner| Self::pool_owner(owner, mapper, network))
                .collect(),
            relays: params.relays.iter().map(Self::relay).collect(),
            metadata: params.metadata.as_ref().map(|PoolMetadata { url, hash }| {
                TrezorPoolMetadata { url: url.clone(), hash: hash.to_hex() }
            }),
        })
    }

    fn pool_owner(
        owner: &PoolOwner,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> TrezorPoolOwner {
        let path =
            owner.reward_address(network.network_id).and_then(|address| mapper.path_for(&address));
        match path {
            Some(staking_key_path) => TrezorPoolOwner::Path { staking_key_path },
            None => TrezorPoolOwner::KeyHash { staking_key_hash: owner.staking_key_hash.to_hex() },
        }
    }

    fn relay(relay: &PoolRelay) -> TrezorPoolRelay {
        let mut wire = TrezorPoolRelay {
            kind: relay.kind(),
            ipv4_address: None,
            ipv6_address: None,
            port: relay.port(),
            host_name: None,
        };
        match relay {
            PoolRelay::SingleHostAddr { ipv4, ipv6, .. } => {
                wire.ipv4_address = ipv4.map(|ip| ip.to_string());
                wire.ipv6_address = ipv6.map(|ip| ip.to_string());
            }
            PoolRelay::SingleHostName { dns_name, .. } | PoolRelay::MultiHostName { dns_name } => {
                wire.host_name = Some(dns_name.clone());
            }
        }
        wire
    }

    fn withdrawal(
        withdrawal: &TxWithdrawal,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<TrezorWithdrawal, CryptoProviderError> {
        Ok(TrezorWithdrawal {
            path: mapper.require_path(withdrawal.staking_address.address())?,
            amount: withdrawal.rewards.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorPublicKeyParams {
    pub path: DerivationPath,
    pub show_on_trezor: bool,
}

/// A Trezor Connect call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum TrezorRequest {
    GetFeatures,
    CardanoGetPublicKey {
        bundle: Vec<TrezorPublicKeyParams>,
    },
    #[serde(rename_all = "camelCase")]
    CardanoGetAddress {
        address_parameters: TrezorAddressParameters,
        network_id: u8,
        protocol_magic: u32,
        show_on_trezor: bool,
    },
    CardanoSignTransaction(TrezorSignTxRequest),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorFeatures {
    pub major_version: u64,
    pub minor_version: u64,
    pub patch_version: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrezorPublicKey {
    pub path: DerivationPath,
    /// Hex of the public key followed by the chain code
    pub public_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorWitness {
    pub path: DerivationPath,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorSignedTx {
    pub hash: String,
    pub witnesses: Vec<TrezorWitness>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrezorPayload {
    Features(TrezorFeatures),
    PublicKeys(Vec<TrezorPublicKey>),
    SignedTx(TrezorSignedTx),
    Address { address: String },
    Failure { error: String },
}

/// Every Trezor Connect answer is `{ success, payload }`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrezorResponse {
    pub success: bool,
    pub payload: TrezorPayload,
}

impl TrezorResponse {
    pub fn ok(payload: TrezorPayload) -> Self {
        Self { success: true, payload }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, payload: TrezorPayload::Failure { error: error.into() } }
    }

    pub fn features(major_version: u64, minor_version: u64, patch_version: u64) -> Self {
        Self::ok(TrezorPayload::Features(TrezorFeatures {
            major_version,
            minor_version,
            patch_version,
        }))
    }

    /// The payload of a successful call
    pub fn into_payload(self) -> Result<TrezorPayload, CryptoProviderError> {
        match (self.success, self.payload) {
            (true, payload) => Ok(payload),
            (false, TrezorPayload::Failure { error }) => {
                Err(CryptoProviderError::BackendOperationFailed(error))
            }
            (false, payload) => Err(CryptoProviderError::BackendOperationFailed(format!(
                "call failed with payload {payload:?}"
            ))),
        }
    }
}
