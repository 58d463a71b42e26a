mod common;

use pgp_stream::composed::{SymmetricCodec, SymmetricConfigBuilder};
use pgp_stream::crypto::sym::SymmetricKeyAlgorithm;
use pgp_stream::errors::Error;
use pgp_stream::types::{CompressionAlgorithm, Password};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use testresult::TestResult;

use common::rng;

fn codec(sym_alg: SymmetricKeyAlgorithm, compression: CompressionAlgorithm) -> SymmetricCodec {
    let config = SymmetricConfigBuilder::default()
        .sym_alg(sym_alg)
        .compression(compression)
        .s2k_count(0x10)
        .chunk_size(512)
        .build()
        .unwrap();
    SymmetricCodec::with_config(config)
}

fn round_trip(codec: &SymmetricCodec, data: &[u8], armored: bool) -> Vec<u8> {
    let password = Password::from("swordfish");
    let mut encrypted = Vec::new();
    codec
        .encrypt(rng(1), data, &mut encrypted, armored, &password)
        .unwrap();

    let mut out = Vec::new();
    let integrity = codec.decrypt(&encrypted[..], &mut out, &password).unwrap();
    assert!(integrity.verified());
    out
}

#[test]
fn all_ciphers_and_compressions() {
    let _ = pretty_env_logger::try_init();
    let data = b"attack at dawn ".repeat(100);

    for sym_alg in [
        SymmetricKeyAlgorithm::AES128,
        SymmetricKeyAlgorithm::AES192,
        SymmetricKeyAlgorithm::AES256,
        SymmetricKeyAlgorithm::Twofish,
        SymmetricKeyAlgorithm::CAST5,
        SymmetricKeyAlgorithm::Blowfish,
        SymmetricKeyAlgorithm::TripleDES,
        SymmetricKeyAlgorithm::Camellia128,
    ] {
        for compression in [
            CompressionAlgorithm::Uncompressed,
            CompressionAlgorithm::ZIP,
            CompressionAlgorithm::ZLIB,
        ] {
            let out = round_trip(&codec(sym_alg, compression), &data, false);
            assert_eq!(out, data, "{} {}", sym_alg, compression);
        }
    }
}

#[test]
fn wrong_passphrase() -> TestResult {
    let codec = codec(SymmetricKeyAlgorithm::AES256, CompressionAlgorithm::ZIP);
    let mut encrypted = Vec::new();
    codec.encrypt(rng(2), &b"secret"[..], &mut encrypted, true, &Password::from("right"))?;

    let mut out = Vec::new();
    let err = codec
        .decrypt(&encrypted[..], &mut out, &Password::from("wrong"))
        .unwrap_err();
    assert!(matches!(err, Error::BadPassword), "{:?}", err);
    assert!(out.is_empty());

    Ok(())
}

#[test]
fn empty_passphrase_is_rejected() {
    let codec = codec(SymmetricKeyAlgorithm::AES256, CompressionAlgorithm::Uncompressed);
    let err = codec
        .encrypt(rng(3), &b"x"[..], &mut Vec::new(), false, &Password::from(""))
        .unwrap_err();
    assert!(matches!(err, Error::ProtocolError { .. }), "{:?}", err);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn round_trip_any_data(data in proptest::collection::vec(any::<u8>(), 0..5000), armored: bool) {
        let codec = codec(SymmetricKeyAlgorithm::AES128, CompressionAlgorithm::Uncompressed);
        let out = round_trip(&codec, &data, armored);
        prop_assert_eq!(out, data);
    }
}
