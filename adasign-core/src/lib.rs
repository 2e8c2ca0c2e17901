#![cfg_attr(docsrs, feature(doc_cfg))]
//! Cardano types, canonical encoding and key derivation.
//!
//! This crate provides the data model that every crypto provider in `adasign-signers` consumes:
//! the abstract transaction ([`types::TxAux`]), its inputs, outputs, certificates and withdrawals,
//! the witness types a signer produces, and the signed transaction structure. A transaction is
//! built once and can be handed to any backend.
//!
//! ## Transaction identifiers
//!
//! The identifier of a transaction is the blake2b-256 hash of its canonically encoded body. It is
//! the ground truth against which every backend's reported hash is checked.
//!
//! ```rust
//! use adasign_core::types::{TxAux, TxOutput, TxInput};
//!
//! # fn foo() -> Result<(), Box<dyn std::error::Error>> {
//! let input = TxInput {
//!     tx_hash: "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef".parse()?,
//!     address: "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi".parse()?,
//!     coins: 2_000_000,
//!     tokens: vec![],
//!     output_index: 0,
//! };
//! let output = TxOutput::NoChange {
//!     address: "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi".parse()?,
//!     coins: 1_800_000,
//!     tokens: vec![],
//! };
//! let tx = TxAux::new(vec![input], vec![output], 200_000, 5_000_000);
//! assert_eq!(tx.id()?.to_string().len(), 64);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key derivation
//!
//! The [`bip32`] module implements BIP32-Ed25519 with derivation scheme V2, used by the wallet
//! secret backend to sign and by every backend to derive soft child keys from cached xpubs.
pub mod types;

pub mod bip32;

pub mod cbor;

/// Various utilities
pub mod utils;
