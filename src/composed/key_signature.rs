use log::debug;

use crate::composed::verifier::ResolvedSigner;
use crate::composed::{
    KeyRetrievalStrategy, SignatureVerificationResult, SignatureVerificationResultBuilder,
    SignedPublicKey,
};
use crate::errors::{format_err, Result};
use crate::packet::{Signature, SignatureType};
use crate::types::Tag;

/// Verifies signatures found inside a certificate.
///
/// The signature is dispatched to the first handler that accepts it: key
/// revocations, user id certifications, user attribute certifications and
/// finally everything else (subkey bindings, subkey revocations and direct
/// key signatures).
#[derive(Debug)]
pub struct KeySignatureVerifier<S: KeyRetrievalStrategy> {
    strategy: S,
}

impl<S: KeyRetrievalStrategy> KeySignatureVerifier<S> {
    pub fn new(strategy: S) -> Self {
        KeySignatureVerifier { strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Verifies `signature`, which was found in `key`.
    ///
    /// The issuer is looked up in `key` itself before asking the strategy. An
    /// unknown issuer yields a missing result.
    pub fn verify(
        &self,
        signature: &Signature,
        key: &SignedPublicKey,
    ) -> Option<SignatureVerificationResult> {
        let issuers = signature.issuer();
        let signer = issuers
            .iter()
            .find_map(|id| {
                key.key_by_id(id).map(|component| ResolvedSigner {
                    cert: key.clone(),
                    key: component.clone(),
                })
            })
            .or_else(|| ResolvedSigner::resolve(&self.strategy, &issuers));
        let Some(signer) = signer else {
            debug!("no key for {:?} signature by {:?}", signature.typ(), issuers);
            return Some(SignatureVerificationResult::missing());
        };

        let ctx = Context {
            signature,
            key,
            signer: &signer,
        };
        HANDLERS.iter().find_map(|handler| handler.handle(&ctx))
    }
}

struct Context<'a> {
    signature: &'a Signature,
    key: &'a SignedPublicKey,
    signer: &'a ResolvedSigner,
}

impl Context<'_> {
    /// A result builder with the outcome and the signer filled in.
    fn outcome(&self, outcome: Result<()>) -> SignatureVerificationResultBuilder {
        let mut builder = SignatureVerificationResultBuilder::default();
        builder
            .verified(outcome.is_ok())
            .public_key(self.signer.key.clone())
            .issuer_key(self.signer.cert.clone())
            .issuer_user_ids(self.signer.master_user_ids());
        if let Err(err) = outcome {
            debug!("{:?} signature did not verify: {}", self.signature.typ(), err);
            builder.error(err.to_string());
        }
        builder
    }

    fn finish(&self, builder: &SignatureVerificationResultBuilder) -> SignatureVerificationResult {
        builder
            .build()
            .unwrap_or_else(|err| {
                SignatureVerificationResult::missing().with_error(err.to_string())
            })
    }
}

trait KeySignatureHandler: Sync {
    /// Verifies the signature if this handler is responsible for it.
    fn handle(&self, ctx: &Context<'_>) -> Option<SignatureVerificationResult>;
}

static HANDLERS: [&dyn KeySignatureHandler; 4] = [
    &RevocationHandler,
    &IdentityHandler,
    &AttributeHandler,
    &CatchAllHandler,
];

struct RevocationHandler;

impl KeySignatureHandler for RevocationHandler {
    fn handle(&self, ctx: &Context<'_>) -> Option<SignatureVerificationResult> {
        if ctx.signature.typ() != SignatureType::KeyRevocation {
            return None;
        }

        let outcome = ctx
            .signature
            .verify_key(&ctx.signer.key, &ctx.key.primary_key);
        Some(ctx.finish(&ctx.outcome(outcome)))
    }
}

/// Certifications are matched to the user whose signatures contain one with
/// the same creation time.
fn same_creation_time(sig: &Signature, other: &Signature) -> bool {
    sig.created().is_some() && sig.created() == other.created()
}

struct IdentityHandler;

impl KeySignatureHandler for IdentityHandler {
    fn handle(&self, ctx: &Context<'_>) -> Option<SignatureVerificationResult> {
        if !ctx.signature.is_certification() {
            return None;
        }

        // several users are usually certified in the same second
        let (user, outcome) = ctx
            .key
            .details
            .users
            .iter()
            .filter(|user| {
                user.signatures
                    .iter()
                    .any(|sig| same_creation_time(sig, ctx.signature))
            })
            .map(|user| {
                let outcome = ctx.signature.verify_certification(
                    &ctx.signer.key,
                    &ctx.key.primary_key,
                    Tag::UserId,
                    &user.id,
                );
                (user, outcome)
            })
            .find(|(_, outcome)| outcome.is_ok())?;

        let mut builder = ctx.outcome(outcome);
        builder.user_id(user.id.as_string());
        Some(ctx.finish(&builder))
    }
}

struct AttributeHandler;

impl KeySignatureHandler for AttributeHandler {
    fn handle(&self, ctx: &Context<'_>) -> Option<SignatureVerificationResult> {
        if !ctx.signature.is_certification() {
            return None;
        }

        let (attribute, outcome) = ctx
            .key
            .details
            .user_attributes
            .iter()
            .filter(|attr| {
                attr.signatures
                    .iter()
                    .any(|sig| same_creation_time(sig, ctx.signature))
            })
            .map(|attr| {
                let outcome = ctx.signature.verify_certification(
                    &ctx.signer.key,
                    &ctx.key.primary_key,
                    Tag::UserAttribute,
                    &attr.attr,
                );
                (attr, outcome)
            })
            .find(|(_, outcome)| outcome.is_ok())?;

        let mut builder = ctx.outcome(outcome);
        builder.user_attributes(attribute.attr.clone());
        Some(ctx.finish(&builder))
    }
}

struct CatchAllHandler;

impl KeySignatureHandler for CatchAllHandler {
    fn handle(&self, ctx: &Context<'_>) -> Option<SignatureVerificationResult> {
        let primary = &ctx.key.primary_key;

        let outcome = match ctx.signature.typ() {
            SignatureType::SubkeyBinding | SignatureType::SubkeyRevocation => {
                let mut outcome = Err(format_err!("certificate has no subkeys"));
                for subkey in &ctx.key.public_subkeys {
                    outcome = ctx
                        .signature
                        .verify_key_binding(&ctx.signer.key, primary, &subkey.key);
                    if outcome.is_ok() {
                        debug!("signature binds subkey {}", subkey.key.key_id());
                        break;
                    }
                }
                outcome
            }
            typ => {
                debug!("verifying {:?} as direct key signature", typ);
                ctx.signature.verify_key(&ctx.signer.key, primary)
            }
        };

        Some(ctx.finish(&ctx.outcome(outcome)))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::composed::{
        InMemoryKeyStore, SignedKeyDetails, SignedPublicSubKey, SignedUser, SignedUserAttribute,
    };
    use crate::crypto::hash::HashAlgorithm;
    use crate::packet::{SecretKey, SignatureConfig, UserAttribute, UserId};

    struct Fixture {
        cert: SignedPublicKey,
        primary: SecretKey,
        revocation: Signature,
    }

    fn fixture() -> Fixture {
        let mut rng = ChaCha8Rng::seed_from_u64(41);
        let created = Utc.with_ymd_and_hms(2023, 2, 1, 9, 0, 0).unwrap();
        let primary = SecretKey::generate_ed25519(&mut rng, created);
        let subkey = SecretKey::generate_ed25519(&mut rng, created);
        let config = |typ, at| {
            SignatureConfig::v4(typ, HashAlgorithm::Sha256, primary.public_key(), at)
        };

        let id = UserId::from_str("Bob <bob@example.net>");
        let user_sig = config(SignatureType::CertPositive, created)
            .sign_certification(&primary, primary.public_key(), Tag::UserId, &id)
            .unwrap();
        let work_id = UserId::from_str("Bob <bob@work.example.net>");
        let work_sig = config(SignatureType::CertPositive, created)
            .sign_certification(&primary, primary.public_key(), Tag::UserId, &work_id)
            .unwrap();
        let attr = UserAttribute::new_image(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        let attr_sig = config(SignatureType::CertGeneric, created)
            .sign_certification(&primary, primary.public_key(), Tag::UserAttribute, &attr)
            .unwrap();
        let binding = config(SignatureType::SubkeyBinding, created)
            .sign_key_binding(&primary, primary.public_key(), subkey.public_key())
            .unwrap();
        let revocation = config(SignatureType::KeyRevocation, created)
            .sign_key(&primary, primary.public_key())
            .unwrap();

        let cert = SignedPublicKey::new(
            primary.public_key().clone(),
            SignedKeyDetails::new(
                vec![revocation.clone()],
                vec![],
                vec![
                    SignedUser::new(id, vec![user_sig]),
                    SignedUser::new(work_id, vec![work_sig]),
                ],
                vec![SignedUserAttribute::new(attr, vec![attr_sig])],
            ),
            vec![SignedPublicSubKey::new(subkey.public_key().clone(), vec![binding])],
        );

        Fixture {
            cert,
            primary,
            revocation,
        }
    }

    #[test]
    fn test_dispatch() {
        let _ = pretty_env_logger::try_init();
        let Fixture {
            cert, revocation, ..
        } = fixture();
        let verifier = KeySignatureVerifier::new(InMemoryKeyStore::new());

        let res = verifier.verify(&revocation, &cert).unwrap();
        assert!(res.verified(), "{:?}", res.error());
        assert!(res.user_id().is_none());

        let user_sig = &cert.details.users[0].signatures[0];
        let res = verifier.verify(user_sig, &cert).unwrap();
        assert!(res.verified(), "{:?}", res.error());
        assert_eq!(res.user_id(), Some("Bob <bob@example.net>"));
        assert_eq!(
            res.issuer_user_ids(),
            &[
                "Bob <bob@example.net>".to_string(),
                "Bob <bob@work.example.net>".to_string()
            ]
        );

        let attr_sig = &cert.details.user_attributes[0].signatures[0];
        let res = verifier.verify(attr_sig, &cert).unwrap();
        assert!(res.verified(), "{:?}", res.error());
        assert!(res.user_attributes().is_some());
        assert!(res.user_id().is_none());

        let binding = &cert.public_subkeys[0].signatures[0];
        let res = verifier.verify(binding, &cert).unwrap();
        assert!(res.verified(), "{:?}", res.error());
    }

    #[test]
    fn test_certifications_sharing_a_timestamp() {
        let _ = pretty_env_logger::try_init();
        let Fixture { cert, .. } = fixture();
        let verifier = KeySignatureVerifier::new(InMemoryKeyStore::new());

        let work_sig = &cert.details.users[1].signatures[0];
        let res = verifier.verify(work_sig, &cert).unwrap();
        assert!(res.verified(), "{:?}", res.error());
        assert_eq!(res.user_id(), Some("Bob <bob@work.example.net>"));

        let attr_sig = &cert.details.user_attributes[0].signatures[0];
        assert_eq!(attr_sig.created(), work_sig.created());
        let res = verifier.verify(attr_sig, &cert).unwrap();
        assert!(res.verified(), "{:?}", res.error());
        assert!(res.user_attributes().is_some());
        assert!(res.user_id().is_none());
    }

    #[test]
    fn test_unknown_issuer() {
        let Fixture { cert, .. } = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let stranger = SecretKey::generate_ed25519(&mut rng, Utc::now());
        let sig = SignatureConfig::v4(
            SignatureType::Key,
            HashAlgorithm::Sha256,
            stranger.public_key(),
            Utc::now(),
        )
        .sign_key(&stranger, &cert.primary_key)
        .unwrap();

        let res = KeySignatureVerifier::new(InMemoryKeyStore::new())
            .verify(&sig, &cert)
            .unwrap();
        assert!(res.is_missing());
        assert!(!res.verified());
    }

    #[test]
    fn test_foreign_signer_from_strategy() {
        let Fixture { cert, .. } = fixture();
        let mut rng = ChaCha8Rng::seed_from_u64(43);
        let other = SecretKey::generate_ed25519(&mut rng, Utc::now());
        let other_cert = SignedPublicKey::new(
            other.public_key().clone(),
            SignedKeyDetails::default(),
            vec![],
        );
        let sig = SignatureConfig::v4(
            SignatureType::Key,
            HashAlgorithm::Sha256,
            other.public_key(),
            Utc::now(),
        )
        .sign_key(&other, &cert.primary_key)
        .unwrap();

        let mut store = InMemoryKeyStore::new();
        store.add_public_key(other_cert);
        let res = KeySignatureVerifier::new(store).verify(&sig, &cert).unwrap();
        assert!(res.verified(), "{:?}", res.error());
        assert!(!res.is_missing());
    }

    #[test]
    fn test_bad_revocation() {
        let Fixture { cert, primary, .. } = fixture();
        // a revocation of some other key does not verify against this one
        let mut rng = ChaCha8Rng::seed_from_u64(44);
        let other = SecretKey::generate_ed25519(&mut rng, Utc::now());
        let sig = SignatureConfig::v4(
            SignatureType::KeyRevocation,
            HashAlgorithm::Sha256,
            primary.public_key(),
            Utc::now(),
        )
        .sign_key(&primary, other.public_key())
        .unwrap();

        let res = KeySignatureVerifier::new(InMemoryKeyStore::new())
            .verify(&sig, &cert)
            .unwrap();
        assert!(!res.verified());
        assert!(res.error().is_some());
    }
}
