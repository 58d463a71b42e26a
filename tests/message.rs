mod common;

use std::io::{self, Read, Write};

use chrono::Utc;
use pgp_stream::composed::{
    EncryptionConfigBuilder, InMemoryKeyStore, MessageDecryptor, MessageEncryptor,
    SessionKeyCodec,
};
use pgp_stream::crypto::hash::HashAlgorithm;
use pgp_stream::errors::Error;
use pgp_stream::packet::{
    write_packet, DataMode, LiteralDataHeader, OnePassSignature, PartialBodyWriter, SecretKey,
    SignatureConfig, SignatureType,
};
use pgp_stream::types::{Password, Tag};
use pgp_stream::Serialize;
use pretty_assertions::assert_eq;
use testresult::TestResult;

use common::{alice, bob, rng, seal, Identity};

const DATA: &[u8] = b"the quick brown fox jumps over the lazy dog\n";

fn encrypt_to(recipients: &[&Identity], armored: bool) -> Vec<u8> {
    let certs: Vec<_> = recipients.iter().map(|id| id.cert.clone()).collect();
    let mut out = Vec::new();
    MessageEncryptor::new()
        .encrypt(rng(7), DATA, &mut out, armored, &certs)
        .unwrap();
    out
}

#[test]
fn round_trip_binary_and_armored() -> TestResult {
    let _ = pretty_env_logger::try_init();
    let bob = bob();

    for armored in [false, true] {
        let msg = encrypt_to(&[&bob], armored);
        assert_eq!(msg.starts_with(b"-----BEGIN PGP MESSAGE-----"), armored);

        let mut out = Vec::new();
        let res = MessageDecryptor::new(bob.store()).decrypt(&msg[..], &mut out, None, None)?;
        assert_eq!(out, DATA);
        assert!(res.signature_results().is_empty());
        assert!(res.integrity_result().is_present());
        assert!(res.integrity_result().verified());
    }

    Ok(())
}

#[test]
fn large_payload_streams_through() -> TestResult {
    let bob = bob();
    let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();

    let mut msg = Vec::new();
    MessageEncryptor::new().encrypt(rng(8), &data[..], &mut msg, false, &[bob.cert.clone()])?;

    let mut out = Vec::new();
    MessageDecryptor::new(bob.store()).decrypt(&msg[..], &mut out, None, None)?;
    assert_eq!(out, data);

    Ok(())
}

#[test]
fn signed_round_trip() -> TestResult {
    let _ = pretty_env_logger::try_init();
    let (alice, bob) = (alice(), bob());

    let mut msg = Vec::new();
    MessageEncryptor::new().encrypt_signed(
        rng(9),
        DATA,
        &mut msg,
        true,
        Some(&alice.signing),
        None,
        &[bob.cert.clone()],
    )?;

    let mut store = bob.store();
    store.add_public_key(alice.cert.clone());
    let mut out = Vec::new();
    let res = MessageDecryptor::new(&store).decrypt(&msg[..], &mut out, None, None)?;

    assert_eq!(out, DATA);
    assert_eq!(res.signature_results().len(), 1);
    let sig = &res.signature_results()[0];
    assert!(sig.verified(), "{:?}", sig.error());
    assert!(!sig.is_missing());
    assert_eq!(sig.issuer_user_ids(), &["Alice <alice@example.com>".to_string()]);
    assert_eq!(sig.public_key(), Some(alice.signing.public_key()));
    assert!(sig.nested_integrity_result().is_some_and(|i| i.verified()));

    Ok(())
}

#[test]
fn unknown_signer_is_missing() -> TestResult {
    let (alice, bob) = (alice(), bob());

    let mut msg = Vec::new();
    MessageEncryptor::new().encrypt_signed(
        rng(10),
        DATA,
        &mut msg,
        false,
        Some(&alice.signing),
        None,
        &[bob.cert.clone()],
    )?;

    let mut out = Vec::new();
    let res = MessageDecryptor::new(bob.store()).decrypt(&msg[..], &mut out, None, None)?;
    assert_eq!(out, DATA);
    assert_eq!(res.signature_results().len(), 1);
    assert!(res.signature_results()[0].is_missing());
    assert!(!res.signature_results()[0].verified());

    Ok(())
}

#[test]
fn multiple_recipients_each_decrypt() -> TestResult {
    let (alice, bob) = (alice(), bob());
    let msg = encrypt_to(&[&alice, &bob], false);

    for id in [&alice, &bob] {
        let mut out = Vec::new();
        MessageDecryptor::new(id.store()).decrypt(&msg[..], &mut out, None, None)?;
        assert_eq!(out, DATA);
    }

    Ok(())
}

#[test]
fn unknown_recipient() {
    let (alice, bob) = (alice(), bob());
    let msg = encrypt_to(&[&alice], false);

    let err = MessageDecryptor::new(bob.store())
        .decrypt(&msg[..], &mut Vec::new(), None, None)
        .unwrap_err();
    match err {
        Error::PrivateKeyNotFound { ref key_ids } => {
            assert_eq!(key_ids, &vec![alice.encryption.key_id()]);
        }
        ref err => panic!("unexpected error {:?}", err),
    }

    let upper = u64::from(alice.encryption.key_id()) >> 32;
    assert!(err.to_string().ends_with(&format!("(0x{:08X})", upper)));
}

#[test]
fn repeated_recipient_listed_once() {
    let (alice, bob) = (alice(), bob());
    let msg = encrypt_to(&[&alice, &bob, &alice], false);

    let err = MessageDecryptor::new(InMemoryKeyStore::new())
        .decrypt(&msg[..], &mut Vec::new(), None, None)
        .unwrap_err();
    let Error::PrivateKeyNotFound { ref key_ids } = err else {
        panic!("unexpected error {:?}", err);
    };
    assert_eq!(
        key_ids,
        &vec![alice.encryption.key_id(), bob.encryption.key_id()]
    );

    let upper = |id: &SecretKey| u64::from(id.key_id()) >> 32;
    let expected = format!(
        "(0x{:08X}, 0x{:08X})",
        upper(&alice.encryption),
        upper(&bob.encryption)
    );
    assert!(err.to_string().ends_with(&expected), "{}", err);
}

/// Yields `limit` bytes of data, then fails.
struct FailingReader {
    limit: usize,
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.limit == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "source went away"));
        }
        let n = buf.len().min(self.limit);
        buf[..n].fill(b'x');
        self.limit -= n;
        Ok(n)
    }
}

#[test]
fn armor_terminated_on_read_failure() {
    let _ = pretty_env_logger::try_init();
    let bob = bob();

    let mut out = Vec::new();
    let err = MessageEncryptor::new()
        .encrypt(
            rng(11),
            FailingReader { limit: 4096 },
            &mut out,
            true,
            &[bob.cert.clone()],
        )
        .unwrap_err();
    assert!(matches!(err, Error::IO { .. }), "{:?}", err);

    let text = String::from_utf8_lossy(&out);
    assert!(text.starts_with("-----BEGIN PGP MESSAGE-----"));
    assert!(text.trim_end().ends_with("-----END PGP MESSAGE-----"), "{}", text);
}

#[test]
fn identity_must_match() {
    let bob = bob();
    let msg = encrypt_to(&[&bob], false);

    let err = MessageDecryptor::new(bob.store())
        .decrypt(&msg[..], &mut Vec::new(), Some("mallory@example.com"), None)
        .unwrap_err();
    assert!(matches!(err, Error::PrivateKeyNotFound { .. }), "{:?}", err);

    let mut out = Vec::new();
    MessageDecryptor::new(bob.store())
        .decrypt(&msg[..], &mut out, Some("bob@example.com"), None)
        .unwrap();
    assert_eq!(out, DATA);
}

#[test]
fn tampered_message_fails_integrity() -> TestResult {
    let bob = bob();
    let mut msg = encrypt_to(&[&bob], false);
    let pos = msg.len() - 5;
    msg[pos] ^= 0x20;

    let mut out = Vec::new();
    let res = MessageDecryptor::new(bob.store()).decrypt(&msg[..], &mut out, None, None)?;
    assert!(res.integrity_result().is_present());
    assert!(!res.integrity_result().verified());

    Ok(())
}

#[test]
fn missing_integrity_protection() -> TestResult {
    let (alice, bob) = (alice(), bob());
    let config = EncryptionConfigBuilder::default()
        .integrity_protected(false)
        .build()?;

    let mut msg = Vec::new();
    MessageEncryptor::with_config(config).encrypt_signed(
        rng(11),
        DATA,
        &mut msg,
        false,
        Some(&alice.primary),
        None,
        &[bob.cert.clone()],
    )?;

    let mut store = bob.store();
    store.add_public_key(alice.cert.clone());
    let mut out = Vec::new();
    let res = MessageDecryptor::new(store).decrypt(&msg[..], &mut out, None, None)?;

    assert_eq!(out, DATA);
    assert!(!res.integrity_result().is_present());
    assert!(!res.integrity_result().verified());
    let sig = &res.signature_results()[0];
    assert!(sig.verified());
    assert!(sig.nested_integrity_result().is_some_and(|i| !i.is_present()));

    Ok(())
}

#[test]
fn locked_signing_key() -> TestResult {
    let (alice, bob) = (alice(), bob());
    let locked = alice.signing.lock(rng(12), &Password::from("hunter2"))?;
    let encryptor = MessageEncryptor::new();

    for passphrase in [None, Some(Password::from("wrong"))] {
        let mut msg = Vec::new();
        let err = encryptor
            .encrypt_signed(
                rng(13),
                DATA,
                &mut msg,
                true,
                Some(&locked),
                passphrase.as_ref(),
                &[bob.cert.clone()],
            )
            .unwrap_err();
        assert!(matches!(err, Error::BadPassword), "{:?}", err);
        assert!(msg.is_empty());
    }

    let mut msg = Vec::new();
    encryptor.encrypt_signed(
        rng(14),
        DATA,
        &mut msg,
        true,
        Some(&locked),
        Some(&Password::from("hunter2")),
        &[bob.cert.clone()],
    )?;
    assert!(!msg.is_empty());

    Ok(())
}

#[test]
fn session_key_reuse() -> TestResult {
    let (alice, bob) = (alice(), bob());
    let msg = encrypt_to(&[&alice, &bob], true);

    let codec = SessionKeyCodec::new();
    let sessions = codec.read_sessions(&msg[..])?;
    assert_eq!(sessions.len(), 2);
    let session = sessions
        .iter()
        .find(|s| *s.key_id() == bob.encryption.key_id())
        .expect("session for bob");
    let session_key = codec.decrypt_session_key(session, &bob.encryption, None)?;

    let decryptor = MessageDecryptor::new(bob.store());
    for _ in 0..3 {
        let mut out = Vec::new();
        let res = decryptor.decrypt_with_session_key(&msg[..], &mut out, &session_key)?;
        assert_eq!(out, DATA);
        assert!(res.integrity_result().verified());
    }

    Ok(())
}

/// A literal data packet, as a signed message would carry it.
fn literal_packet(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut packet = PartialBodyWriter::new(Tag::LiteralData, 512, &mut buf).unwrap();
    LiteralDataHeader::new(DataMode::Binary, "", Utc::now())
        .to_writer(&mut packet)
        .unwrap();
    packet.write_all(data).unwrap();
    packet.finish().unwrap();
    buf
}

fn binary_config(key: &SecretKey) -> SignatureConfig {
    SignatureConfig::v4(
        SignatureType::Binary,
        HashAlgorithm::Sha256,
        key.public_key(),
        Utc::now(),
    )
}

#[test]
fn multiple_one_pass_signatures() -> TestResult {
    let _ = pretty_env_logger::try_init();
    let (alice, bob) = (alice(), bob());

    let config_a = binary_config(&alice.signing);
    let config_b = binary_config(&bob.primary);

    let mut plain = Vec::new();
    write_packet(
        &mut plain,
        &OnePassSignature::from_config(&config_a, alice.signing.key_id()),
    )?;
    write_packet(
        &mut plain,
        &OnePassSignature::from_config(&config_b, bob.primary.key_id()),
    )?;
    plain.extend_from_slice(&literal_packet(DATA));
    write_packet(&mut plain, &config_b.sign(&bob.primary, DATA)?)?;
    write_packet(&mut plain, &config_a.sign(&alice.signing, DATA)?)?;

    let msg = seal(15, bob.encryption.public_key(), &plain);
    let mut store = bob.store();
    store.add_public_key(alice.cert.clone());

    let mut out = Vec::new();
    let res = MessageDecryptor::new(store).decrypt(&msg[..], &mut out, None, None)?;
    assert_eq!(out, DATA);
    assert_eq!(res.signature_results().len(), 2);
    for sig in res.signature_results() {
        assert!(sig.verified(), "{:?}", sig.error());
    }
    assert_eq!(
        res.signature_results()[0].issuer_user_ids(),
        &["Bob <bob@example.com>".to_string()]
    );
    assert_eq!(
        res.signature_results()[1].issuer_user_ids(),
        &["Alice <alice@example.com>".to_string()]
    );

    Ok(())
}

#[test]
fn signature_in_front_of_the_data() -> TestResult {
    let (alice, bob) = (alice(), bob());
    let config = binary_config(&alice.signing);

    let mut plain = Vec::new();
    write_packet(&mut plain, &config.sign(&alice.signing, DATA)?)?;
    plain.extend_from_slice(&literal_packet(DATA));

    let msg = seal(16, bob.encryption.public_key(), &plain);
    let mut store = bob.store();
    store.add_public_key(alice.cert.clone());

    let mut out = Vec::new();
    let res = MessageDecryptor::new(store).decrypt(&msg[..], &mut out, None, None)?;
    assert_eq!(out, DATA);
    assert_eq!(res.signature_results().len(), 1);
    assert!(res.signature_results()[0].verified());

    Ok(())
}

#[test]
fn unknown_signature_algorithm_keeps_plaintext() -> TestResult {
    let (alice, bob) = (alice(), bob());
    let config = binary_config(&alice.signing);

    let mut plain = Vec::new();
    write_packet(
        &mut plain,
        &OnePassSignature::from_config(&config, alice.signing.key_id()),
    )?;
    plain.extend_from_slice(&literal_packet(DATA));
    // signature packet v4, public key algorithm 100
    plain.extend_from_slice(&[0xC2, 0x04, 0x04, 0x00, 0x64, 0x08]);

    let msg = seal(17, bob.encryption.public_key(), &plain);
    let mut out = Vec::new();
    let res = MessageDecryptor::new(bob.store()).decrypt(&msg[..], &mut out, None, None)?;
    assert_eq!(out, DATA);
    assert!(res.signature_results().is_empty());
    assert!(res.integrity_result().verified());

    Ok(())
}

#[test]
fn not_a_message() {
    let bob = bob();
    let err = MessageDecryptor::new(bob.store())
        .decrypt(&b"plain text, not pgp"[..], &mut Vec::new(), None, None)
        .unwrap_err();
    assert!(
        matches!(err, Error::NoPgpDataFound | Error::InvalidArmor { .. }),
        "{:?}",
        err
    );
}
