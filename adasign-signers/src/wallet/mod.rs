mod secret;
pub use secret::{MnemonicBuilder, WalletSecret};

use crate::{
    orchestrator, AddressToPathMapper, BackendSignature, CachedDeriveXpub, CryptoProviderError,
    ExtendedPublicKeySource, FeatureGate, RawWitness, Signer, SigningBackend,
};
use adasign_core::{
    bip32::ExtendedPublicKey,
    types::{Bytes, DerivationPath, Network, SignedTx, TxAux, TxCertificate, TxHash},
};
use async_trait::async_trait;
use tracing::trace;

/// What the in-memory backend signs: the identifier, once per key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletSecretSignRequest {
    pub tx_hash: TxHash,
    pub paths: Vec<DerivationPath>,
}

/// Crypto provider deriving and signing with a [`WalletSecret`] held in memory
#[derive(Debug)]
pub struct WalletSecretCryptoProvider {
    network: Network,
    secret: WalletSecret,
    features: FeatureGate,
    xpubs: CachedDeriveXpub,
}

impl WalletSecretCryptoProvider {
    pub fn new(secret: WalletSecret, network: Network) -> Self {
        Self {
            network,
            secret,
            features: FeatureGate::unrestricted(),
            xpubs: CachedDeriveXpub::new(false),
        }
    }

    /// Paths of every key that must sign `tx`, in first-seen order
    pub fn signing_paths(
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
        network: &Network,
    ) -> Result<Vec<DerivationPath>, CryptoProviderError> {
        let mut paths = Vec::new();
        let mut push = |path: DerivationPath| {
            if !paths.contains(&path) {
                paths.push(path);
            }
        };

        for input in &tx.inputs {
            if let Some(path) = mapper.path_for(&input.address) {
                push(path);
            }
        }
        for certificate in &tx.certificates {
            match certificate {
                TxCertificate::StakingKeyRegistration { .. } => {}
                TxCertificate::StakingKeyDeregistration { staking_address } |
                TxCertificate::Delegation { staking_address, .. } => {
                    push(mapper.require_path(staking_address.address())?)
                }
                TxCertificate::StakepoolRegistration { pool_registration_params, .. } => {
                    for owner in &pool_registration_params.owners {
                        if let Some(path) = owner
                            .reward_address(network.network_id)
                            .and_then(|address| mapper.path_for(&address))
                        {
                            push(path);
                        }
                    }
                }
            }
        }
        for withdrawal in &tx.withdrawals {
            push(mapper.require_path(withdrawal.staking_address.address())?);
        }

        Ok(paths)
    }
}

#[async_trait]
impl ExtendedPublicKeySource for WalletSecretCryptoProvider {
    async fn export_xpubs(
        &self,
        paths: &[DerivationPath],
    ) -> Result<Vec<ExtendedPublicKey>, CryptoProviderError> {
        Ok(paths.iter().map(|path| self.secret.root().derive_path(path).to_public()).collect())
    }
}

#[async_trait]
impl SigningBackend for WalletSecretCryptoProvider {
    type Request = WalletSecretSignRequest;

    fn translate(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<Self::Request, CryptoProviderError> {
        Ok(WalletSecretSignRequest {
            tx_hash: tx.id()?,
            paths: Self::signing_paths(tx, mapper, &self.network)?,
        })
    }

    async fn sign_request(
        &self,
        request: Self::Request,
    ) -> Result<BackendSignature, CryptoProviderError> {
        let witnesses = request
            .paths
            .into_iter()
            .map(|path| {
                let key = self.secret.root().derive_path(&path);
                let signature = key.sign(request.tx_hash.as_bytes());
                trace!(%path, "signed transaction");
                RawWitness { path, signature: signature.into() }
            })
            .collect();
        Ok(BackendSignature { tx_hash: request.tx_hash.to_string(), witnesses })
    }
}

#[async_trait]
impl Signer for WalletSecretCryptoProvider {
    fn network(&self) -> &Network {
        &self.network
    }

    fn wallet_name(&self) -> &'static str {
        "WalletSecret"
    }

    fn is_hw_wallet(&self) -> bool {
        false
    }

    fn features(&self) -> &FeatureGate {
        &self.features
    }

    async fn derive_xpub(
        &self,
        path: &DerivationPath,
    ) -> Result<ExtendedPublicKey, CryptoProviderError> {
        self.xpubs.derive(path, self).await
    }

    async fn sign_tx(
        &self,
        tx: &TxAux,
        mapper: &dyn AddressToPathMapper,
    ) -> Result<SignedTx, CryptoProviderError> {
        orchestrator::sign_tx(self, &self.features, &self.xpubs, &self.network, tx, mapper).await
    }

    fn wallet_secret(&self) -> Result<&WalletSecret, CryptoProviderError> {
        Ok(&self.secret)
    }

    fn hd_passphrase(&self) -> Result<[u8; 32], CryptoProviderError> {
        Ok(self.secret.hd_passphrase())
    }

    async fn sign(
        &self,
        message: &[u8],
        path: &DerivationPath,
    ) -> Result<Bytes, CryptoProviderError> {
        Ok(self.secret.root().derive_path(path).sign(message).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adasign_core::types::{
        reward_account_to_bech32, reward_address_bytes, Address, NetworkId, StakingAddress,
        TxInput, TxOutput, TxWithdrawal,
    };

    const PHRASE: &str = "test walk nut penalty hip pave soap entry language right filter choice";
    const BYRON: &str = "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi";

    fn provider() -> WalletSecretCryptoProvider {
        WalletSecretCryptoProvider::new(
            WalletSecret::from_mnemonic(PHRASE, "").unwrap(),
            Network::mainnet(),
        )
    }

    fn staking_address() -> StakingAddress {
        let bytes = reward_address_bytes(&[8; 28], NetworkId::Mainnet);
        reward_account_to_bech32(&bytes, NetworkId::Mainnet).unwrap().parse().unwrap()
    }

    fn mapper(address: &Address) -> Option<DerivationPath> {
        if address.as_str() == BYRON {
            Some("m/44'/1815'/0'/0/0".parse().unwrap())
        } else if address == staking_address().address() {
            Some("m/1852'/1815'/0'/2/0".parse().unwrap())
        } else {
            None
        }
    }

    fn tx() -> TxAux {
        let input = |index: u32| TxInput {
            tx_hash: TxHash([index as u8; 32]),
            address: BYRON.parse().unwrap(),
            coins: 1_000_000,
            tokens: vec![],
            output_index: index,
        };
        TxAux::new(
            vec![input(0), input(1)],
            vec![TxOutput::NoChange { address: BYRON.parse().unwrap(), coins: 1, tokens: vec![] }],
            170_000,
            500_000,
        )
        .certificates(vec![TxCertificate::Delegation {
            staking_address: staking_address(),
            pool_hash: vec![1; 28].into(),
        }])
        .withdrawals(vec![TxWithdrawal { staking_address: staking_address(), rewards: 10 }])
    }

    #[test]
    fn signing_paths_are_unique_in_first_seen_order() {
        let paths =
            WalletSecretCryptoProvider::signing_paths(&tx(), &mapper, &Network::mainnet()).unwrap();
        assert_eq!(
            paths,
            vec![
                "m/44'/1815'/0'/0/0".parse::<DerivationPath>().unwrap(),
                "m/1852'/1815'/0'/2/0".parse().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn witnesses_verify_against_the_derived_keys() {
        let provider = provider();
        let tx = tx();
        let signed = provider.sign_tx(&tx, &mapper).await.unwrap();
        assert_eq!(signed.tx_hash, tx.id().unwrap().to_string());

        let request = provider.translate(&tx, &mapper).unwrap();
        let signature = provider.sign_request(request).await.unwrap();
        for witness in signature.witnesses {
            let xpub = provider.derive_xpub(&witness.path).await.unwrap();
            let bytes: [u8; 64] = witness.signature.as_ref().try_into().unwrap();
            assert!(xpub.verify(tx.id().unwrap().as_bytes(), &bytes));
        }
    }

    #[tokio::test]
    async fn raw_messages_are_signed_with_the_path_key() {
        let provider = provider();
        let path: DerivationPath = "m/1852'/1815'/0'/0/7".parse().unwrap();
        let signature = provider.sign(b"hello", &path).await.unwrap();
        let xpub = provider.derive_xpub(&path).await.unwrap();
        assert!(xpub.verify(b"hello", signature.as_ref().try_into().unwrap()));
    }

    #[tokio::test]
    async fn addresses_cannot_be_displayed() {
        let provider = provider();
        let err = provider
            .display_address_for_path(&DerivationPath::shelley_account(0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoProviderError::UnsupportedOperation(_)));
        assert!(provider.wallet_secret().is_ok());
        assert!(!provider.is_hw_wallet());
    }
}
