#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # adasign
//!
//! Signs Cardano transactions through interchangeable crypto providers: a Ledger running the
//! Cardano app, a Trezor, or a wallet secret held in memory.
//!
//! # Quickstart
//!
//! A prelude is provided which imports all the important things for you.
//!
//! ```no_run
//! use adasign::prelude::*;
//!
//! # async fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let secret = WalletSecret::from_mnemonic(
//!     "test walk nut penalty hip pave soap entry language right filter choice",
//!     "",
//! )?;
//! let options = CryptoProviderOptions::new(Network::mainnet()).wallet_secret(secret);
//! let provider = create_crypto_provider("WALLET_SECRET", options).await?;
//!
//! let account = provider.derive_xpub(&DerivationPath::shelley_account(0)).await?;
//! println!("account key {account}");
//! # Ok(())
//! # }
//! ```
//!
//! Hardware providers are built the same way from a [`signers::LedgerConnector`] or a
//! [`signers::TrezorTransport`] supplied by the host application.

/// # adasign-core
///
/// Cardano primitives: addresses, derivation paths, the transaction model and its canonical
/// CBOR encoding, and BIP32-Ed25519 key derivation.
pub mod core {
    pub use adasign_core::*;
}

/// # adasign-signers
///
/// The [`Signer`](crate::signers::Signer) trait and its Ledger, Trezor and wallet secret
/// implementations, plus the factory building them by name.
pub mod signers {
    pub use adasign_signers::*;
}

/// Easy imports of frequently used type definitions and traits
pub mod prelude {
    pub use adasign_core::types::*;

    pub use adasign_signers::{
        create_crypto_provider, AddressToPathMapper, CryptoProvider, CryptoProviderConfig,
        CryptoProviderError, CryptoProviderFeature, CryptoProviderOptions, CryptoProviderType,
        Signer, WalletSecret,
    };
}
