//! Cardano data types
mod bytes;
pub use bytes::{deserialize_bytes, serialize_bytes, Bytes, TxHash};

mod network;
pub use network::{protocol_magic, Network, NetworkId};

mod path;
pub use path::{
    harden, is_hardened, AddressEra, DerivationPath, PathError, ADA_COIN_TYPE, BYRON_PURPOSE,
    HARDENED, SHELLEY_PURPOSE,
};

mod address;
pub use address::{
    reward_account_key_hash, reward_account_to_bech32, reward_address_bytes, Address, AddressError,
    StakingAddress, KEY_HASH_LENGTH,
};

mod transaction;
pub use transaction::{
    group_tokens, Lovelace, Token, TokenError, TokenGroup, TxAux, TxInput, TxOutput, TxWithdrawal,
    UTxO,
};

mod certificate;
pub use certificate::{
    CertificateError, CertificateType, PoolMargin, PoolMetadata, PoolOwner, PoolRegistrationParams,
    PoolRelay, RawCertificate, TxCertificate,
};

mod witness;
pub use witness::{
    byron_address_attributes, ByronWitness, ShelleyWitness, SignedTransactionStructured, SignedTx,
    TxWitnesses, Witness,
};
