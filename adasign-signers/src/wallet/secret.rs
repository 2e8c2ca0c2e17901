use crate::CryptoProviderError;
use adasign_core::bip32::{ExtendedPrivateKey, ExtendedPublicKey, XPRV_LENGTH};
use bip39::{Language, Mnemonic};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;
use std::fmt;
use zeroize::Zeroize;

const MASTER_KEY_ROUNDS: u32 = 4096;
const HD_PASSPHRASE_ROUNDS: u32 = 500;
const HD_PASSPHRASE_SALT: &[u8] = b"address-hashing";

/// The root key of a software wallet. Never printed.
#[derive(Clone)]
pub struct WalletSecret {
    root: ExtendedPrivateKey,
}

impl fmt::Debug for WalletSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSecret").field("root", &"..").finish()
    }
}

impl WalletSecret {
    /// Icarus master key of an English BIP39 mnemonic
    pub fn from_mnemonic(phrase: &str, passphrase: &str) -> Result<Self, CryptoProviderError> {
        MnemonicBuilder::default().phrase(phrase).passphrase(passphrase).build()
    }

    pub fn from_bytes(bytes: [u8; XPRV_LENGTH]) -> Self {
        Self { root: ExtendedPrivateKey::from_bytes(bytes) }
    }

    pub fn root(&self) -> &ExtendedPrivateKey {
        &self.root
    }

    pub fn root_xpub(&self) -> ExtendedPublicKey {
        self.root.to_public()
    }

    /// Key encrypting the derivation paths stored in legacy Byron addresses
    pub fn hd_passphrase(&self) -> [u8; 32] {
        let mut passphrase = [0u8; 32];
        pbkdf2_hmac::<Sha512>(
            &self.root_xpub().to_bytes(),
            HD_PASSPHRASE_SALT,
            HD_PASSPHRASE_ROUNDS,
            &mut passphrase,
        );
        passphrase
    }
}

/// Builds a [`WalletSecret`] from a mnemonic phrase.
///
/// ```
/// # use adasign_signers::MnemonicBuilder;
/// let secret = MnemonicBuilder::default()
///     .phrase("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about")
///     .passphrase("TREZOR")
///     .build()
///     .unwrap();
/// # let _ = secret;
/// ```
#[derive(Clone, Default)]
pub struct MnemonicBuilder {
    phrase: Option<String>,
    passphrase: Option<String>,
}

impl fmt::Debug for MnemonicBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MnemonicBuilder").finish_non_exhaustive()
    }
}

impl Drop for MnemonicBuilder {
    fn drop(&mut self) {
        self.phrase.zeroize();
        self.passphrase.zeroize();
    }
}

impl MnemonicBuilder {
    #[must_use]
    pub fn phrase(mut self, phrase: impl Into<String>) -> Self {
        self.phrase = Some(phrase.into());
        self
    }

    #[must_use]
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn build(&self) -> Result<WalletSecret, CryptoProviderError> {
        let phrase = self
            .phrase
            .as_deref()
            .ok_or_else(|| CryptoProviderError::InvalidWalletSecret("missing phrase".into()))?;
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
            .map_err(|e| CryptoProviderError::InvalidWalletSecret(e.to_string()))?;

        let (mut entropy, len) = mnemonic.to_entropy_array();
        let mut key = [0u8; XPRV_LENGTH];
        pbkdf2_hmac::<Sha512>(
            self.passphrase.as_deref().unwrap_or_default().as_bytes(),
            &entropy[..len],
            MASTER_KEY_ROUNDS,
            &mut key,
        );
        entropy.zeroize();

        key[0] &= 0b1111_1000;
        key[31] &= 0b0001_1111;
        key[31] |= 0b0100_0000;
        let secret = WalletSecret::from_bytes(key);
        key.zeroize();
        Ok(secret)
    }
}
