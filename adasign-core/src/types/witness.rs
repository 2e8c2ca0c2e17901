use super::{Bytes, Network, TokenError, TxAux, TxHash};
use crate::{
    cbor::{self, Encode, Encoder},
    utils::blake2b_256,
};
use serde::{Deserialize, Serialize};

const BYRON_ATTRIBUTE_NETWORK_MAGIC: u64 = 2;

/// Witness for a key in the Shelley (CIP-1852) namespace
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShelleyWitness {
    pub public_key: Bytes,
    pub signature: Bytes,
}

/// Bootstrap witness for a key behind a legacy Byron address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByronWitness {
    pub public_key: Bytes,
    pub signature: Bytes,
    pub chain_code: Bytes,
    /// CBOR encoded address attributes, see [`byron_address_attributes`]
    pub address_attributes: Bytes,
}

/// A witness of either era
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Witness {
    Byron(ByronWitness),
    Shelley(ShelleyWitness),
}

/// Attributes of the Byron addresses a wallet derives on `network`: empty on mainnet, the
/// protocol magic elsewhere.
pub fn byron_address_attributes(network: &Network) -> Vec<u8> {
    let mut encoder = Encoder::new();
    if network.is_mainnet() {
        encoder.map(0);
    } else {
        encoder
            .map(1)
            .u64(BYRON_ATTRIBUTE_NETWORK_MAGIC)
            .bytes(&cbor::to_vec(&u64::from(network.protocol_magic)));
    }
    encoder.into_bytes()
}

/// Witnesses of a transaction, split by era
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxWitnesses {
    pub byron: Vec<ByronWitness>,
    pub shelley: Vec<ShelleyWitness>,
}

impl TxWitnesses {
    pub fn len(&self) -> usize {
        self.byron.len() + self.shelley.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Witness> for TxWitnesses {
    fn from_iter<I: IntoIterator<Item = Witness>>(iter: I) -> Self {
        let mut witnesses = TxWitnesses::default();
        for witness in iter {
            match witness {
                Witness::Byron(w) => witnesses.byron.push(w),
                Witness::Shelley(w) => witnesses.shelley.push(w),
            }
        }
        witnesses
    }
}

impl Encode for TxWitnesses {
    fn encode(&self, encoder: &mut Encoder) {
        let groups = usize::from(!self.shelley.is_empty()) + usize::from(!self.byron.is_empty());
        encoder.map(groups);
        if !self.shelley.is_empty() {
            encoder.u64(0).array(self.shelley.len());
            for w in &self.shelley {
                encoder.array(2).bytes(&w.public_key).bytes(&w.signature);
            }
        }
        if !self.byron.is_empty() {
            encoder.u64(2).array(self.byron.len());
            for w in &self.byron {
                encoder
                    .array(4)
                    .bytes(&w.public_key)
                    .bytes(&w.signature)
                    .bytes(&w.chain_code)
                    .bytes(&w.address_attributes);
            }
        }
    }
}

/// A transaction body together with its witness set, ready for submission
#[derive(Clone, Debug)]
pub struct SignedTransactionStructured<'a> {
    pub tx: &'a TxAux,
    pub witnesses: &'a TxWitnesses,
}

impl<'a> SignedTransactionStructured<'a> {
    pub fn new(tx: &'a TxAux, witnesses: &'a TxWitnesses) -> Self {
        Self { tx, witnesses }
    }

    pub fn id(&self) -> Result<TxHash, TokenError> {
        self.tx.id()
    }

    /// Encodes the signed transaction and returns it with its identifier
    pub fn to_signed_tx(&self) -> Result<SignedTx, TokenError> {
        let body = self.tx.body_bytes()?;
        let mut encoder = Encoder::new();
        // no auxiliary data
        encoder.array(3).raw(&body).value(self.witnesses).null();
        Ok(SignedTx {
            tx_hash: TxHash(blake2b_256(&body)).to_string(),
            tx_body: hex::encode(encoder.into_bytes()),
        })
    }
}

/// The result of signing: the transaction identifier and the hex encoded signed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTx {
    pub tx_hash: String,
    pub tx_body: String,
}
