mod common;

use pgp_stream::composed::{from_reader_many, InMemoryKeyStore, KeySignatureVerifier};
use pretty_assertions::assert_eq;
use testresult::TestResult;

use common::{alice, bob};

#[test]
fn every_signature_of_a_parsed_certificate() -> TestResult {
    let _ = pretty_env_logger::try_init();
    let alice = alice();
    let armored = alice.cert.to_armored_bytes(None)?;
    let parsed = from_reader_many(&armored[..])?;
    assert_eq!(parsed.public_keys.len(), 1);
    let cert = &parsed.public_keys[0];
    assert_eq!(cert, &alice.cert);

    let verifier = KeySignatureVerifier::new(InMemoryKeyStore::new());

    let user_sig = &cert.details.users[0].signatures[0];
    let res = verifier.verify(user_sig, cert).expect("handled");
    assert!(res.verified(), "{:?}", res.error());
    assert_eq!(res.user_id(), Some("Alice <alice@example.com>"));

    for subkey in &cert.public_subkeys {
        let res = verifier.verify(&subkey.signatures[0], cert).expect("handled");
        assert!(res.verified(), "{:?}", res.error());
        assert!(res.user_id().is_none());
    }

    Ok(())
}

#[test]
fn signature_from_another_certificate() {
    let (alice, bob) = (alice(), bob());
    // alice's binding signature does not belong to bob's certificate
    let foreign = &alice.cert.public_subkeys[0].signatures[0];

    let res = KeySignatureVerifier::new(InMemoryKeyStore::new())
        .verify(foreign, &bob.cert)
        .expect("handled");
    assert!(res.is_missing());

    let mut store = InMemoryKeyStore::new();
    store.add_public_key(alice.cert.clone());
    let res = KeySignatureVerifier::new(store)
        .verify(foreign, &bob.cert)
        .expect("handled");
    assert!(!res.is_missing());
    assert!(!res.verified());
}
