use adasign_core::{
    bip32::ExtendedPrivateKey,
    types::{
        reward_account_to_bech32, reward_address_bytes, Address, DerivationPath, NetworkId,
        Network, StakingAddress, Token, TokenError, TxAux, TxCertificate, TxHash, TxInput,
        TxOutput,
    },
};
use adasign_signers::{
    create_crypto_provider,
    ledger::{
        types::{
            LedgerExtendedPublicKey, LedgerOutput, LedgerSignTransactionResponse, LedgerWitness,
        },
        AddressTypeNibble, LedgerChannel, LedgerRequest, LedgerResponse,
    },
    mock::{MockLedgerConnector, MockLedgerTransport, MockTrezorTransport},
    trezor::{
        types::{TrezorPublicKey, TrezorSignedTx, TrezorWitness},
        TrezorPayload, TrezorRequest, TrezorResponse,
    },
    CryptoProvider, CryptoProviderConfig, CryptoProviderError, CryptoProviderFeature,
    CryptoProviderOptions, Signer, WalletSecret,
};

const PHRASE: &str = "test walk nut penalty hip pave soap entry language right filter choice";
const BYRON: &str = "Ae2tdPwUPEZFRbyhz3cpfC2CumGzNkFBN2L42rcUc2yjQpEkxDbkPodpMAi";
const BYRON_PATH: &str = "m/44'/1815'/0'/0/0";
const STAKING_PATH: &str = "m/1852'/1815'/0'/2/0";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn secret() -> WalletSecret {
    WalletSecret::from_mnemonic(PHRASE, "").unwrap()
}

fn path(text: &str) -> DerivationPath {
    text.parse().unwrap()
}

fn staking_address() -> StakingAddress {
    let bytes = reward_address_bytes(&[8; 28], NetworkId::Mainnet);
    reward_account_to_bech32(&bytes, NetworkId::Mainnet).unwrap().parse().unwrap()
}

fn mapper(address: &Address) -> Option<DerivationPath> {
    if address.as_str() == BYRON {
        Some(path(BYRON_PATH))
    } else if address == staking_address().address() {
        Some(path(STAKING_PATH))
    } else {
        None
    }
}

/// One Byron input, a payment, a change output back to the wallet and a delegation
fn tx(tokens: Vec<Token>) -> TxAux {
    let input = TxInput {
        tx_hash: TxHash([0x2a; 32]),
        address: BYRON.parse().unwrap(),
        coins: 10_000_000,
        tokens: vec![],
        output_index: 1,
    };
    let outputs = vec![
        TxOutput::NoChange { address: BYRON.parse().unwrap(), coins: 1_500_000, tokens },
        TxOutput::Change {
            address: BYRON.parse().unwrap(),
            coins: 8_330_000,
            tokens: vec![],
            spending_path: path("m/1852'/1815'/0'/1/0"),
            staking_path: path(STAKING_PATH),
        },
    ];
    let delegation = TxCertificate::Delegation {
        staking_address: staking_address(),
        pool_hash: vec![7; 28].into(),
    };
    TxAux::new(vec![input], outputs, 170_000, 500_000).certificates(vec![delegation])
}

fn token() -> Token {
    Token { policy_id: vec![1; 28].into(), asset_name: b"nut".to_vec().into(), quantity: 3 }
}

/// The five sibling accounts exported alongside the account of `purpose`
fn account_batch(purpose: u32) -> Vec<DerivationPath> {
    (0..=4).map(|account| path(&format!("m/{purpose}'/1815'/{account}'"))).collect()
}

fn ledger_keys(root: &ExtendedPrivateKey, paths: &[DerivationPath]) -> LedgerResponse {
    LedgerResponse::ExtendedPublicKeys(
        paths
            .iter()
            .map(|path| {
                let xpub = root.derive_path(path).to_public();
                LedgerExtendedPublicKey {
                    public_key_hex: hex::encode(xpub.public_key),
                    chain_code_hex: hex::encode(xpub.chain_code),
                }
            })
            .collect(),
    )
}

fn signature_hex(root: &ExtendedPrivateKey, tx_hash: &TxHash, text: &str) -> String {
    hex::encode(root.derive_path(&path(text)).sign(tx_hash.as_bytes()))
}

async fn ledger(transport: &MockLedgerTransport, major: u64, minor: u64) -> CryptoProvider {
    transport.push_version(major, minor, 0);
    let options = CryptoProviderOptions::new(Network::mainnet())
        .ledger(MockLedgerConnector::new(transport.clone()));
    let provider = create_crypto_provider("LEDGER", options).await.unwrap();
    transport.assert_request(&LedgerRequest::GetVersion).unwrap();
    provider
}

#[tokio::test]
async fn ledger_signs_and_assembles_witnesses() {
    init_tracing();
    let root = secret().root().clone();
    let transport = MockLedgerTransport::new();
    let provider = ledger(&transport, 2, 2).await;
    let tx = tx(vec![]);

    transport.push(LedgerResponse::SignedTransaction(LedgerSignTransactionResponse {
        tx_hash_hex: tx.id().unwrap().to_string(),
        witnesses: vec![
            LedgerWitness {
                path: path(BYRON_PATH),
                witness_signature_hex: signature_hex(&root, &tx.id().unwrap(), BYRON_PATH),
            },
            LedgerWitness {
                path: path(STAKING_PATH),
                witness_signature_hex: signature_hex(&root, &tx.id().unwrap(), STAKING_PATH),
            },
        ],
    }));
    transport.push(ledger_keys(&root, &account_batch(44)));
    transport.push(ledger_keys(&root, &account_batch(1852)));

    let signed = provider.sign_tx(&tx, &mapper).await.unwrap();
    assert_eq!(signed.tx_hash, tx.id().unwrap().to_string());
    assert!(signed.tx_body.starts_with(&format!("83{}", hex::encode(tx.body_bytes().unwrap()))));

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    match &requests[0] {
        LedgerRequest::SignTransaction(request) => {
            assert_eq!(request.fee_str, "170000");
            assert_eq!(request.ttl_str, "500000");
            assert_eq!(request.inputs[0].path, Some(path(BYRON_PATH)));
            assert_eq!(request.certificates[0].path, Some(path(STAKING_PATH)));
        }
        other => panic!("expected a sign request, got {other:?}"),
    }
    assert_eq!(requests[1], LedgerRequest::GetExtendedPublicKeys { paths: account_batch(44) });
    assert_eq!(requests[2], LedgerRequest::GetExtendedPublicKeys { paths: account_batch(1852) });
}

#[tokio::test]
async fn ledger_and_wallet_secret_produce_the_same_transaction() {
    let root = secret().root().clone();
    let transport = MockLedgerTransport::new();
    let ledger = ledger(&transport, 2, 2).await;
    let tx = tx(vec![]);

    transport.push(LedgerResponse::SignedTransaction(LedgerSignTransactionResponse {
        tx_hash_hex: tx.id().unwrap().to_string(),
        witnesses: [BYRON_PATH, STAKING_PATH]
            .into_iter()
            .map(|text| LedgerWitness {
                path: path(text),
                witness_signature_hex: signature_hex(&root, &tx.id().unwrap(), text),
            })
            .collect(),
    }));
    transport.push(ledger_keys(&root, &account_batch(44)));
    transport.push(ledger_keys(&root, &account_batch(1852)));
    let from_ledger = ledger.sign_tx(&tx, &mapper).await.unwrap();

    let options = CryptoProviderOptions::new(Network::mainnet()).wallet_secret(secret());
    let wallet = create_crypto_provider("WALLET_SECRET", options).await.unwrap();
    let from_wallet = wallet.sign_tx(&tx, &mapper).await.unwrap();

    assert_eq!(from_ledger, from_wallet);
}

#[tokio::test]
async fn mismatched_hash_returns_nothing() {
    let root = secret().root().clone();
    let transport = MockLedgerTransport::new();
    let provider = ledger(&transport, 2, 2).await;
    let tx = tx(vec![]);
    let mut reported = tx.id().unwrap();
    reported.0[0] ^= 0xff;

    transport.push(LedgerResponse::SignedTransaction(LedgerSignTransactionResponse {
        tx_hash_hex: reported.to_string(),
        witnesses: vec![LedgerWitness {
            path: path(BYRON_PATH),
            witness_signature_hex: signature_hex(&root, &reported, BYRON_PATH),
        }],
    }));

    let err = provider.sign_tx(&tx, &mapper).await.unwrap_err();
    assert!(err.is_fatal());
    match err {
        CryptoProviderError::TxSerializationMismatch { expected, reported: text } => {
            assert_eq!(expected, tx.id().unwrap());
            assert_eq!(text, reported.to_string());
        }
        other => panic!("expected a serialization mismatch, got {other:?}"),
    }
    // no key was exported for witnesses of a rejected signature
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn tokens_need_a_recent_ledger_app() {
    let transport = MockLedgerTransport::new();
    let provider = ledger(&transport, 2, 1).await;
    assert!(!provider.is_feature_supported(CryptoProviderFeature::MultiAsset));

    let err = provider.sign_tx(&tx(vec![token()]), &mapper).await.unwrap_err();
    match err {
        CryptoProviderError::FeatureUnsupported { feature, required, actual } => {
            assert_eq!(feature, CryptoProviderFeature::MultiAsset);
            assert_eq!(required.to_string(), "2.2.0");
            assert_eq!(actual.to_string(), "2.1.0");
        }
        other => panic!("expected an unsupported feature, got {other:?}"),
    }
    assert!(transport.requests().is_empty());
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn overflowing_token_amounts_are_never_signed() {
    let tokens = vec![Token { quantity: u64::MAX, ..token() }, token()];

    let transport = MockLedgerTransport::new();
    let provider = ledger(&transport, 2, 2).await;
    let err = provider.sign_tx(&tx(tokens.clone()), &mapper).await.unwrap_err();
    assert!(matches!(err, CryptoProviderError::Token(TokenError::QuantityOverflow { .. })));
    assert!(transport.requests().is_empty());
    assert_eq!(transport.call_count(), 1);

    let options = CryptoProviderOptions::new(Network::mainnet()).wallet_secret(secret());
    let provider = create_crypto_provider("WALLET_SECRET", options).await.unwrap();
    let err = provider.sign_tx(&tx(tokens), &mapper).await.unwrap_err();
    assert!(matches!(err, CryptoProviderError::Token(TokenError::QuantityOverflow { .. })));
}

#[tokio::test]
async fn unmapped_staking_address_fails_before_the_device() {
    let transport = MockLedgerTransport::new();
    let provider = ledger(&transport, 2, 2).await;
    let only_inputs = |address: &Address| -> Option<DerivationPath> {
        (address.as_str() == BYRON).then(|| path(BYRON_PATH))
    };

    let err = provider.sign_tx(&tx(vec![]), &only_inputs).await.unwrap_err();
    assert!(matches!(err, CryptoProviderError::MissingDerivationPath(_)));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn derived_keys_are_cached_for_the_session() {
    let root = secret().root().clone();
    let transport = MockLedgerTransport::new();
    let provider = ledger(&transport, 2, 2).await;
    transport.push(ledger_keys(&root, &account_batch(1852)));

    let first = provider.derive_xpub(&path("m/1852'/1815'/0'/0/3")).await.unwrap();
    let again = provider.derive_xpub(&path("m/1852'/1815'/0'/0/3")).await.unwrap();
    let sibling = provider.derive_xpub(&path("m/1852'/1815'/3'/2/0")).await.unwrap();

    assert_eq!(first, again);
    assert_eq!(first, root.derive_path(&path("m/1852'/1815'/0'/0/3")).to_public());
    assert_eq!(sibling, root.derive_path(&path("m/1852'/1815'/3'/2/0")).to_public());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn falls_back_to_u2f_when_web_usb_fails() {
    let transport = MockLedgerTransport::new();
    transport.push_version(2, 2, 0);
    let connector = MockLedgerConnector::new(transport.clone()).fail_channel(LedgerChannel::WebUsb);
    let options = CryptoProviderOptions::new(Network::mainnet()).ledger(connector.clone());
    create_crypto_provider("LEDGER", options).await.unwrap();
    assert_eq!(connector.attempts(), vec![LedgerChannel::WebUsb, LedgerChannel::U2f]);

    let connector = MockLedgerConnector::new(transport).fail_channel(LedgerChannel::WebUsb);
    let options = CryptoProviderOptions::new(Network::mainnet())
        .config(CryptoProviderConfig::default().force_web_usb(true))
        .ledger(connector.clone());
    let err = create_crypto_provider("LEDGER", options).await.unwrap_err();
    assert!(matches!(err, CryptoProviderError::TransportUnavailable(_)));
    assert_eq!(connector.attempts(), vec![LedgerChannel::WebUsb]);
}

#[tokio::test]
async fn trezor_signs_with_bundled_key_exports() {
    init_tracing();
    let root = secret().root().clone();
    let transport = MockTrezorTransport::new();
    transport.push_features(2, 3, 6);
    let config =
        CryptoProviderConfig::default().trezor_manifest("dev@adasign.io", "https://adasign.io");
    let options =
        CryptoProviderOptions::new(Network::mainnet()).config(config).trezor(transport.clone());
    let provider = create_crypto_provider("TREZOR", options).await.unwrap();
    transport.assert_request(&TrezorRequest::GetFeatures).unwrap();
    assert_eq!(transport.registered_manifest().unwrap().email, "dev@adasign.io");

    let tx = tx(vec![token()]);
    transport.push(TrezorResponse::ok(TrezorPayload::SignedTx(TrezorSignedTx {
        hash: tx.id().unwrap().to_string(),
        witnesses: [BYRON_PATH, STAKING_PATH]
            .into_iter()
            .map(|text| TrezorWitness {
                path: path(text),
                signature: signature_hex(&root, &tx.id().unwrap(), text),
            })
            .collect(),
    })));
    for purpose in [44, 1852] {
        let keys = account_batch(purpose)
            .into_iter()
            .map(|path| TrezorPublicKey {
                public_key: hex::encode(root.derive_path(&path).to_public().to_bytes()),
                path,
            })
            .collect();
        transport.push(TrezorResponse::ok(TrezorPayload::PublicKeys(keys)));
    }

    let signed = provider.sign_tx(&tx, &mapper).await.unwrap();
    assert_eq!(signed.tx_hash, tx.id().unwrap().to_string());

    let options = CryptoProviderOptions::new(Network::mainnet()).wallet_secret(secret());
    let wallet = create_crypto_provider("WALLET_SECRET", options).await.unwrap();
    assert_eq!(signed, wallet.sign_tx(&tx, &mapper).await.unwrap());

    match &transport.requests()[0] {
        TrezorRequest::CardanoSignTransaction(request) => {
            assert_eq!(request.fee, "170000");
            assert_eq!(request.protocol_magic, 764824073);
            assert_eq!(request.outputs.len(), 2);
        }
        other => panic!("expected a sign request, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 4);
}

#[tokio::test]
async fn trezor_rejection_is_terminal() {
    let transport = MockTrezorTransport::new();
    transport.push_features(2, 3, 6);
    let options = CryptoProviderOptions::new(Network::mainnet()).trezor(transport.clone());
    let provider = create_crypto_provider("TREZOR", options).await.unwrap();
    transport.push(TrezorResponse::failure("Failure_ActionCancelled"));

    let err = provider.sign_tx(&tx(vec![]), &mapper).await.unwrap_err();
    assert!(matches!(err, CryptoProviderError::BackendOperationFailed(message)
        if message.contains("ActionCancelled")));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test]
async fn unknown_provider_kind() {
    let options = CryptoProviderOptions::new(Network::mainnet()).wallet_secret(secret());
    let err = create_crypto_provider("BITBOX", options).await.unwrap_err();
    assert!(matches!(err, CryptoProviderError::UnsupportedProviderKind(kind) if kind == "BITBOX"));
}

#[tokio::test]
async fn change_output_travels_by_path() {
    let root = secret().root().clone();
    let transport = MockLedgerTransport::new();
    let provider = ledger(&transport, 2, 2).await;

    let legacy_staking = "m/44'/1815'/0'/2/0";
    let input = TxInput {
        tx_hash: TxHash([0x11; 32]),
        address: BYRON.parse().unwrap(),
        coins: 1_200_000,
        tokens: vec![],
        output_index: 0,
    };
    let change = TxOutput::Change {
        address: BYRON.parse().unwrap(),
        coins: 1_000_000,
        tokens: vec![],
        spending_path: path("m/44'/1815'/0'/0/0"),
        staking_path: path(legacy_staking),
    };
    let delegation = TxCertificate::Delegation {
        staking_address: staking_address(),
        pool_hash: hex::decode(format!("abc123{}", "00".repeat(25))).unwrap().into(),
    };
    let tx = TxAux::new(vec![input], vec![change], 170_000, 500_000).certificates(vec![delegation]);
    let mapper = |address: &Address| -> Option<DerivationPath> {
        (address == staking_address().address()).then(|| path(legacy_staking))
    };

    transport.push(LedgerResponse::SignedTransaction(LedgerSignTransactionResponse {
        tx_hash_hex: tx.id().unwrap().to_string(),
        witnesses: vec![LedgerWitness {
            path: path(legacy_staking),
            witness_signature_hex: signature_hex(&root, &tx.id().unwrap(), legacy_staking),
        }],
    }));
    transport.push(ledger_keys(&root, &account_batch(44)));

    let signed = provider.sign_tx(&tx, &mapper).await.unwrap();
    assert_eq!(signed.tx_hash, tx.id().unwrap().to_string());

    match &transport.requests()[0] {
        LedgerRequest::SignTransaction(request) => {
            assert_eq!(request.inputs[0].path, None);
            assert_eq!(request.outputs.len(), 1);
            assert_eq!(
                request.outputs[0],
                LedgerOutput::ToPath {
                    amount_str: "1000000".into(),
                    token_bundle: vec![],
                    address_type_nibble: AddressTypeNibble::Base,
                    spending_path: path("m/44'/1815'/0'/0/0"),
                    staking_path: path(legacy_staking),
                }
            );
        }
        other => panic!("expected a sign request, got {other:?}"),
    }
}

#[tokio::test]
async fn hardware_providers_never_expose_keys() {
    let ledger_transport = MockLedgerTransport::new();
    let ledger = ledger(&ledger_transport, 2, 2).await;

    let trezor_transport = MockTrezorTransport::new();
    trezor_transport.push_features(2, 3, 6);
    let options = CryptoProviderOptions::new(Network::mainnet()).trezor(trezor_transport.clone());
    let trezor = create_crypto_provider("TREZOR", options).await.unwrap();

    for provider in [&ledger, &trezor] {
        assert!(matches!(
            provider.wallet_secret().unwrap_err(),
            CryptoProviderError::UnsupportedOperation("wallet_secret")
        ));
        assert!(matches!(
            provider.sign(b"message", &path(BYRON_PATH)).await.unwrap_err(),
            CryptoProviderError::UnsupportedOperation("sign")
        ));
    }
    assert_eq!(ledger_transport.call_count(), 1);
    assert_eq!(trezor_transport.call_count(), 1);
}
