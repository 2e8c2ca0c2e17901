use crate::{
    derivation::{CachedDeriveXpub, ExtendedPublicKeySource},
    CryptoProviderError,
};
use adasign_core::types::{
    byron_address_attributes, AddressEra, ByronWitness, Bytes, DerivationPath, Network,
    ShelleyWitness, TxWitnesses, Witness,
};
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

/// A signature returned by a backend, tagged with the path of the signing key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawWitness {
    pub path: DerivationPath,
    pub signature: Bytes,
}

/// Turns backend signatures into protocol witnesses.
///
/// The public key of each witness comes from the derivation cache. Paths in the Shelley namespace
/// give Shelley witnesses; anything else gives Byron bootstrap witnesses carrying the chain code
/// and the address attributes of `network`. Each group keeps the order of `raw`.
pub async fn assemble_witnesses<S>(
    raw: &[RawWitness],
    xpubs: &CachedDeriveXpub,
    source: &S,
    network: &Network,
) -> Result<TxWitnesses, CryptoProviderError>
where
    S: ExtendedPublicKeySource + ?Sized,
{
    let address_attributes = Bytes::from(byron_address_attributes(network));
    let witnesses = try_join_all(raw.iter().map(|witness| {
        let address_attributes = address_attributes.clone();
        async move {
            let xpub = xpubs.derive(&witness.path, source).await?;
            let public_key = Bytes::from(xpub.public_key);
            Ok::<_, CryptoProviderError>(match witness.path.era() {
                AddressEra::Shelley => Witness::Shelley(ShelleyWitness {
                    public_key,
                    signature: witness.signature.clone(),
                }),
                AddressEra::Byron => Witness::Byron(ByronWitness {
                    public_key,
                    signature: witness.signature.clone(),
                    chain_code: Bytes::from(xpub.chain_code),
                    address_attributes,
                }),
            })
        }
    }))
    .await?;

    Ok(witnesses.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adasign_core::bip32::{ExtendedPrivateKey, ExtendedPublicKey, XPRV_LENGTH};
    use async_trait::async_trait;

    struct LocalSource(ExtendedPrivateKey);

    #[async_trait]
    impl ExtendedPublicKeySource for LocalSource {
        async fn export_xpubs(
            &self,
            paths: &[DerivationPath],
        ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
            Ok(paths.iter().map(|path| self.0.derive_path(path).to_public()).collect())
        }
    }

    fn source() -> LocalSource {
        let mut bytes = [3u8; XPRV_LENGTH];
        bytes[0] &= 0xf8;
        bytes[31] &= 0x1f;
        bytes[31] |= 0x40;
        LocalSource(ExtendedPrivateKey::from_bytes(bytes))
    }

    #[tokio::test]
    async fn splits_witnesses_by_era() {
        let source = source();
        let xpubs = CachedDeriveXpub::new(false);
        let byron_path: DerivationPath = "m/44'/1815'/0'/0/0".parse().unwrap();
        let shelley_path: DerivationPath = "m/1852'/1815'/0'/0/0".parse().unwrap();
        let raw = vec![
            RawWitness { path: byron_path.clone(), signature: vec![1u8; 64].into() },
            RawWitness { path: shelley_path.clone(), signature: vec![2u8; 64].into() },
        ];

        let witnesses =
            assemble_witnesses(&raw, &xpubs, &source, &Network::mainnet()).await.unwrap();
        assert_eq!(witnesses.byron.len(), 1);
        assert_eq!(witnesses.shelley.len(), 1);

        let byron_xpub = source.0.derive_path(&byron_path).to_public();
        assert_eq!(witnesses.byron[0].signature, raw[0].signature);
        assert_eq!(witnesses.byron[0].public_key, Bytes::from(byron_xpub.public_key));
        assert_eq!(witnesses.byron[0].chain_code, Bytes::from(byron_xpub.chain_code));
        assert_eq!(witnesses.byron[0].address_attributes, Bytes::from(vec![0xa0]));

        let shelley_xpub = source.0.derive_path(&shelley_path).to_public();
        assert_eq!(witnesses.shelley[0].signature, raw[1].signature);
        assert_eq!(witnesses.shelley[0].public_key, Bytes::from(shelley_xpub.public_key));
    }

    #[tokio::test]
    async fn keeps_input_order_within_a_group() {
        let source = source();
        let xpubs = CachedDeriveXpub::new(false);
        let raw: Vec<_> = (0..4)
            .map(|i| RawWitness {
                path: format!("m/1852'/1815'/0'/0/{i}").parse().unwrap(),
                signature: vec![i as u8; 64].into(),
            })
            .collect();

        let witnesses =
            assemble_witnesses(&raw, &xpubs, &source, &Network::mary_testnet()).await.unwrap();
        let signatures: Vec<_> = witnesses.shelley.iter().map(|w| w.signature.clone()).collect();
        assert_eq!(signatures, raw.iter().map(|w| w.signature.clone()).collect::<Vec<_>>());
    }
}
