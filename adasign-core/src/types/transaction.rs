use super::{Address, Bytes, DerivationPath, StakingAddress, TxCertificate, TxHash};
use crate::{
    cbor::{self, Encode, Encoder},
    utils::blake2b_256,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Amount of ada in its smallest unit
pub type Lovelace = u64;

/// A native token amount
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub policy_id: Bytes,
    pub asset_name: Bytes,
    pub quantity: u64,
}

#[derive(Error, Debug, PartialEq, Eq)]
/// Error when bundling native tokens
pub enum TokenError {
    /// Repeated entries of one asset add up to more than fits in a `u64`
    #[error("quantity of asset {asset_name:?} under policy {policy_id} overflows")]
    QuantityOverflow { policy_id: Bytes, asset_name: Bytes },
}

/// Token amounts sharing a minting policy, as they appear in a multi-asset bundle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGroup {
    pub policy_id: Bytes,
    /// `(asset name, quantity)` pairs in canonical order
    pub assets: Vec<(Bytes, u64)>,
}

fn canonical_order(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Groups a flat token list by policy. Policies and asset names come out in canonical CBOR key
/// order and repeated assets are summed, so every backend sees the same bundle.
///
/// Fails with [`TokenError::QuantityOverflow`] when the sum of an asset does not fit in a `u64`.
pub fn group_tokens(tokens: &[Token]) -> Result<Vec<TokenGroup>, TokenError> {
    let mut groups: Vec<TokenGroup> = Vec::new();
    for token in tokens {
        let pos = match groups.iter().position(|g| g.policy_id == token.policy_id) {
            Some(pos) => pos,
            None => {
                groups.push(TokenGroup { policy_id: token.policy_id.clone(), assets: vec![] });
                groups.len() - 1
            }
        };
        let group = &mut groups[pos];
        match group.assets.iter_mut().find(|(name, _)| *name == token.asset_name) {
            Some((_, quantity)) => {
                *quantity = quantity.checked_add(token.quantity).ok_or_else(|| {
                    TokenError::QuantityOverflow {
                        policy_id: token.policy_id.clone(),
                        asset_name: token.asset_name.clone(),
                    }
                })?
            }
            None => group.assets.push((token.asset_name.clone(), token.quantity)),
        }
    }

    for group in &mut groups {
        group.assets.sort_by(|(a, _), (b, _)| canonical_order(a, b));
    }
    groups.sort_by(|a, b| canonical_order(&a.policy_id, &b.policy_id));
    Ok(groups)
}

fn encode_multiasset(encoder: &mut Encoder, groups: &[TokenGroup]) {
    encoder.map(groups.len());
    for group in groups {
        encoder.bytes(&group.policy_id).map(group.assets.len());
        for (name, quantity) in &group.assets {
            encoder.bytes(name).u64(*quantity);
        }
    }
}

/// An unspent output consumed by a transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    pub tx_hash: TxHash,
    /// Address holding the output, used to look up the signing path
    pub address: Address,
    pub coins: Lovelace,
    #[serde(default)]
    pub tokens: Vec<Token>,
    pub output_index: u32,
}

pub type UTxO = TxInput;

impl Encode for TxInput {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.array(2).bytes(self.tx_hash.as_bytes()).u64(self.output_index.into());
    }
}

/// A transaction output. Change outputs belong to the signer and are described to backends by
/// their derivation paths instead of their address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TxOutput {
    NoChange {
        address: Address,
        coins: Lovelace,
        #[serde(default)]
        tokens: Vec<Token>,
    },
    #[serde(rename_all = "camelCase")]
    Change {
        address: Address,
        coins: Lovelace,
        #[serde(default)]
        tokens: Vec<Token>,
        spending_path: DerivationPath,
        staking_path: DerivationPath,
    },
}

impl TxOutput {
    pub fn address(&self) -> &Address {
        match self {
            TxOutput::NoChange { address, .. } | TxOutput::Change { address, .. } => address,
        }
    }

    pub fn coins(&self) -> Lovelace {
        match self {
            TxOutput::NoChange { coins, .. } | TxOutput::Change { coins, .. } => *coins,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        match self {
            TxOutput::NoChange { tokens, .. } | TxOutput::Change { tokens, .. } => tokens,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, TxOutput::Change { .. })
    }

    /// Appends the CBOR encoding of the output. Nothing is written if the tokens can't be grouped.
    pub fn encode_to(&self, encoder: &mut Encoder) -> Result<(), TokenError> {
        let groups = group_tokens(self.tokens())?;
        encoder.array(2).bytes(self.address().as_bytes());
        if groups.is_empty() {
            encoder.u64(self.coins());
        } else {
            encoder.array(2).u64(self.coins());
            encode_multiasset(encoder, &groups);
        }
        Ok(())
    }
}

/// A reward withdrawal from a staking account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxWithdrawal {
    pub staking_address: StakingAddress,
    pub rewards: Lovelace,
}

/// The abstract, backend independent transaction.
///
/// Backends receive a projection of this structure; the identifier they report back is checked
/// against [`TxAux::id`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxAux {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub certificates: Vec<TxCertificate>,
    #[serde(default)]
    pub withdrawals: Vec<TxWithdrawal>,
    pub fee: Lovelace,
    /// Slot after which the transaction is invalid
    pub ttl: u64,
}

impl TxAux {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>, fee: Lovelace, ttl: u64) -> Self {
        Self { inputs, outputs, certificates: vec![], withdrawals: vec![], fee, ttl }
    }

    /// Sets the certificates of the transaction
    #[must_use]
    pub fn certificates(mut self, certificates: Vec<TxCertificate>) -> Self {
        self.certificates = certificates;
        self
    }

    /// Sets the reward withdrawals of the transaction
    #[must_use]
    pub fn withdrawals(mut self, withdrawals: Vec<TxWithdrawal>) -> Self {
        self.withdrawals = withdrawals;
        self
    }

    /// Whether any output carries native tokens
    pub fn has_tokens(&self) -> bool {
        self.outputs.iter().any(|output| !output.tokens().is_empty())
    }

    /// Whether the transaction registers a stake pool
    pub fn has_pool_registration(&self) -> bool {
        self.certificates
            .iter()
            .any(|cert| matches!(cert, TxCertificate::StakepoolRegistration { .. }))
    }

    /// The canonical CBOR encoding of the transaction body
    pub fn body_bytes(&self) -> Result<Vec<u8>, TokenError> {
        let mut encoder = Encoder::new();
        let optional = usize::from(!self.certificates.is_empty()) +
            usize::from(!self.withdrawals.is_empty());
        encoder.map(4 + optional);
        encoder.u64(0).value(&self.inputs);
        encoder.u64(1).array(self.outputs.len());
        for output in &self.outputs {
            output.encode_to(&mut encoder)?;
        }
        encoder.u64(2).u64(self.fee);
        encoder.u64(3).u64(self.ttl);
        if !self.certificates.is_empty() {
            encoder.u64(4).value(&self.certificates);
        }
        if !self.withdrawals.is_empty() {
            let entries = self
                .withdrawals
                .iter()
                .map(|withdrawal| {
                    let mut key = Encoder::new();
                    key.bytes(withdrawal.staking_address.as_bytes());
                    (key.into_bytes(), cbor::to_vec(&withdrawal.rewards))
                })
                .collect();
            encoder.u64(5).canonical_map(entries);
        }
        Ok(encoder.into_bytes())
    }

    /// The transaction identifier: blake2b-256 of the encoded body
    pub fn id(&self) -> Result<TxHash, TokenError> {
        Ok(TxHash(blake2b_256(self.body_bytes()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{reward_account_to_bech32, reward_address_bytes, NetworkId};

    const BYRON: &str = "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi";

    fn input() -> TxInput {
        TxInput {
            tx_hash: TxHash([0xaa; 32]),
            address: BYRON.parse().unwrap(),
            coins: 2_000_000,
            tokens: vec![],
            output_index: 1,
        }
    }

    fn output() -> TxOutput {
        TxOutput::NoChange { address: BYRON.parse().unwrap(), coins: 1_000_000, tokens: vec![] }
    }

    fn staking_address(byte: u8) -> StakingAddress {
        let bytes = reward_address_bytes(&[byte; 28], NetworkId::Mainnet);
        reward_account_to_bech32(&bytes, NetworkId::Mainnet).unwrap().parse().unwrap()
    }

    fn token(policy: u8, name: &[u8], quantity: u64) -> Token {
        Token { policy_id: vec![policy; 28].into(), asset_name: name.into(), quantity }
    }

    fn encoded(output: &TxOutput) -> String {
        let mut encoder = Encoder::new();
        output.encode_to(&mut encoder).unwrap();
        hex::encode(encoder.into_bytes())
    }

    #[test]
    fn body_encoding_layout() {
        let tx = TxAux::new(vec![input()], vec![output()], 170_000, 500_000);
        let body = hex::encode(tx.body_bytes().unwrap());
        // map(4), key 0: [[h'aa..', 1]]
        assert!(body.starts_with(&format!("a40081825820{}01", "aa".repeat(32))));
        // fee and ttl close the map
        assert!(body.ends_with("021a00029810031a0007a120"));
    }

    #[test]
    fn id_is_deterministic_and_content_sensitive() {
        let tx = TxAux::new(vec![input()], vec![output()], 170_000, 500_000);
        assert_eq!(tx.id().unwrap(), tx.clone().id().unwrap());
        assert_eq!(tx.id().unwrap(), TxHash(blake2b_256(tx.body_bytes().unwrap())));

        let mut other = tx.clone();
        other.fee += 1;
        assert_ne!(tx.id().unwrap(), other.id().unwrap());
    }

    #[test]
    fn optional_fields_extend_the_map() {
        let tx = TxAux::new(vec![input()], vec![output()], 1, 2).withdrawals(vec![
            TxWithdrawal { staking_address: staking_address(2), rewards: 5 },
            TxWithdrawal { staking_address: staking_address(1), rewards: 7 },
        ]);
        let body = hex::encode(tx.body_bytes().unwrap());
        assert!(body.starts_with("a5"));
        // withdrawals sorted by reward account bytes
        let first = body.find(&hex::encode([1u8; 28])).unwrap();
        let second = body.find(&hex::encode([2u8; 28])).unwrap();
        assert!(first < second);
        assert!(body.ends_with(&format!("581de1{}05", hex::encode([2u8; 28]))));
    }

    #[test]
    fn groups_tokens_canonically() {
        let groups = group_tokens(&[
            token(2, b"bb", 1),
            token(1, b"long", 2),
            token(1, b"a", 3),
            token(1, b"a", 4),
        ])
        .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].policy_id, Bytes::from(vec![1u8; 28]));
        assert_eq!(
            groups[0].assets,
            vec![(Bytes::from(&b"a"[..]), 7), (Bytes::from(&b"long"[..]), 2)]
        );
        assert_eq!(groups[1].assets, vec![(Bytes::from(&b"bb"[..]), 1)]);
    }

    #[test]
    fn token_outputs_carry_a_multiasset_value() {
        let with_tokens = TxOutput::NoChange {
            address: BYRON.parse().unwrap(),
            coins: 1_000_000,
            tokens: vec![token(9, b"x", 10)],
        };
        assert!(encoded(&output()).ends_with("1a000f4240"));
        // [coins, {policy: {name: qty}}]
        assert!(encoded(&with_tokens).ends_with(&format!(
            "821a000f4240a1581c{}a141780a",
            hex::encode([9u8; 28])
        )));
    }

    #[test]
    fn token_quantity_overflow_is_an_error() {
        let tokens = [token(1, b"a", u64::MAX), token(1, b"b", 1), token(1, b"a", 1)];
        assert_eq!(
            group_tokens(&tokens).unwrap_err(),
            TokenError::QuantityOverflow {
                policy_id: vec![1u8; 28].into(),
                asset_name: Bytes::from(&b"a"[..]),
            }
        );
        assert_eq!(group_tokens(&tokens[..2]).unwrap()[0].assets[0].1, u64::MAX);

        let output = TxOutput::NoChange {
            address: BYRON.parse().unwrap(),
            coins: 1_000_000,
            tokens: tokens.to_vec(),
        };
        let mut encoder = Encoder::new();
        assert!(output.encode_to(&mut encoder).is_err());
        assert!(encoder.into_bytes().is_empty());

        let tx = TxAux::new(vec![input()], vec![output], 170_000, 500_000);
        assert!(matches!(tx.id(), Err(TokenError::QuantityOverflow { .. })));
    }

    #[test]
    fn output_serde_is_tagged() {
        let change = TxOutput::Change {
            address: BYRON.parse().unwrap(),
            coins: 1,
            tokens: vec![],
            spending_path: DerivationPath::from(vec![1, 2]),
            staking_path: DerivationPath::from(vec![3]),
        };
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "Change");
        assert_eq!(json["spendingPath"], serde_json::json!([1, 2]));
        let back: TxOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back, change);
        assert!(back.is_change());
    }
}
