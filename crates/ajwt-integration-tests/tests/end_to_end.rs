//! A complete agent lifecycle: registration, a run, replay, and a code
//! change that invalidates the old checksum.

mod common;

use ajwt_authority::AuthorityError;
use ajwt_core::{Categorized, Clock, ErrorCategory};
use ajwt_pop::PossessionProof;
use ajwt_registry::{IdentityError, Rotation};
use ajwt_test::{checksum_of, test_context, test_instance, test_workflow_id};
use ajwt_token::TokenError;
use common::Harness;

#[tokio::test]
async fn test_register_mint_verify_rotate() {
    let h = Harness::new().await;

    let token = h.mint("run-1", "start", None).await;
    let accepted = h
        .authority
        .accept(token.as_bytes(), &h.presentation(&token))
        .await
        .unwrap();
    assert_eq!(accepted.intent.claims.subject_agent_id, h.worker.id);
    assert_eq!(accepted.intent.chain.root, h.owner.id);
    assert_eq!(accepted.entry.token_id, token.token_id());

    let replay = h.authority.accept(token.as_bytes(), &h.presentation(&token)).await;
    assert!(matches!(
        replay,
        Err(AuthorityError::Token(TokenError::TokenReplayed { .. }))
    ));

    // The worker's code changes; its old checksum no longer mints.
    let updated = checksum_of("worker-v2");
    h.authority
        .rotate(&h.worker.id, Rotation::checksum(updated))
        .await
        .unwrap();

    let err = h
        .authority
        .mint(h.request("run-2", "start", None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthorityError::Token(TokenError::Identity(IdentityError::ChecksumMismatch { .. }))
    ));
    assert_eq!(err.category(), ErrorCategory::Identity);

    // Presenting the new checksum works.
    let mut request = h.request("run-2", "start", None);
    request.agent_checksum = updated;
    let mut binding = h.worker.binding(&test_context(), None);
    binding.checksum = updated;
    request.proof = PossessionProof::create(&h.worker.key, &binding, h.clock.now()).unwrap();
    h.authority.mint(request).await.unwrap();
}

#[tokio::test]
async fn test_token_minted_before_rotation_rejected() {
    let h = Harness::new().await;
    let token = h.mint("run-1", "start", None).await;

    h.authority
        .rotate(&h.worker.id, Rotation::checksum(checksum_of("worker-v2")))
        .await
        .unwrap();

    let result = h.authority.accept(token.as_bytes(), &h.presentation(&token)).await;
    assert!(matches!(
        result,
        Err(AuthorityError::Token(TokenError::Identity(IdentityError::ChecksumMismatch { .. })))
    ));
}

#[tokio::test]
async fn test_full_run_is_verifiable() {
    let h = Harness::new().await;
    h.run("run-1", "start", None).await;
    h.run("run-1", "review", Some("start")).await;
    h.run("run-1", "publish", Some("review")).await;

    let instance = test_instance("run-1");
    h.authority.verify_log(&instance).await.unwrap();
    let bound = h.authority.instance_workflow(&instance).await.unwrap();
    assert_eq!(bound, Some(test_workflow_id("report")));
}

#[tokio::test]
async fn test_tokens_carry_issuer_key_id() {
    let h = Harness::new().await;
    let token = h.mint("run-1", "start", None).await;
    assert_eq!(token.header().kid, h.authority.issuer_key().key_id_hex());

    let decoded = ajwt_token::TokenEngine::inspect(token.as_bytes()).unwrap();
    assert_eq!(decoded.token_id(), token.token_id());
}
