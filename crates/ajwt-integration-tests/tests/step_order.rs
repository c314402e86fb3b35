//! Steps run only in an order the workflow allows, as recorded by the
//! execution log.

mod common;

use ajwt_authority::AuthorityError;
use ajwt_test::{report_workflow, test_instance, test_step};
use ajwt_token::TokenError;
use ajwt_workflow::StepError;
use common::Harness;

#[tokio::test]
async fn test_steps_run_in_order() {
    let h = Harness::new().await;
    h.run("run-1", "start", None).await;
    h.run("run-1", "review", Some("start")).await;
    let last = h.run("run-1", "publish", Some("review")).await;
    assert_eq!(last.entry.sequence_no, 3);

    let steps: Vec<_> = h
        .authority
        .log_entries(&test_instance("run-1"))
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.step_id)
        .collect();
    assert_eq!(steps, vec![test_step("start"), test_step("review"), test_step("publish")]);
}

#[tokio::test]
async fn test_jump_to_terminal_step_rejected() {
    let h = Harness::new().await;

    let result = h.authority.mint(h.request("run-1", "publish", None)).await;
    assert!(matches!(
        result,
        Err(AuthorityError::Token(TokenError::StepInvalid(StepError::StepNotReachable { .. })))
    ));

    h.run("run-1", "start", None).await;
    let result = h.authority.mint(h.request("run-1", "publish", Some("start"))).await;
    match result {
        Err(AuthorityError::Token(TokenError::StepInvalid(StepError::StepNotReachable {
            step_id,
            predecessor,
        }))) => {
            assert_eq!(step_id, test_step("publish"));
            assert_eq!(predecessor, Some(test_step("start")));
        },
        other => panic!("expected unreachable step, got {other:?}"),
    }
}

#[tokio::test]
async fn test_predecessor_must_match_log() {
    let h = Harness::new().await;

    // Claiming a predecessor that never ran.
    let result = h.authority.mint(h.request("run-1", "review", Some("start"))).await;
    assert!(matches!(
        result,
        Err(AuthorityError::PredecessorMismatch { logged: None, .. })
    ));

    // Restarting an instance that already ran its first step.
    h.run("run-1", "start", None).await;
    let result = h.authority.mint(h.request("run-1", "start", None)).await;
    assert!(matches!(
        result,
        Err(AuthorityError::PredecessorMismatch { claimed: None, .. })
    ));
}

#[tokio::test]
async fn test_branch_tokens_cannot_both_commit() {
    let h = Harness::new().await;
    h.run("run-1", "start", None).await;

    let first = h.mint("run-1", "review", Some("start")).await;
    let second = h.mint("run-1", "review", Some("start")).await;
    h.authority
        .accept(first.as_bytes(), &h.presentation(&first))
        .await
        .unwrap();

    let result = h.authority.accept(second.as_bytes(), &h.presentation(&second)).await;
    assert!(matches!(
        result,
        Err(AuthorityError::PredecessorMismatch { .. })
    ));
    let consumed = h.authority.tokens().consumed();
    assert!(!consumed.is_consumed(&second.token_id()).await.unwrap());
}

#[tokio::test]
async fn test_republished_workflow_rejects_old_tokens() {
    let h = Harness::new().await;
    let token = h.mint("run-1", "start", None).await;

    h.authority.publish(report_workflow(2)).await.unwrap();

    let result = h.authority.accept(token.as_bytes(), &h.presentation(&token)).await;
    assert!(matches!(
        result,
        Err(AuthorityError::Token(TokenError::WorkflowChanged { minted: 1, current: 2, .. }))
    ));
}

#[tokio::test]
async fn test_instances_are_independent() {
    let h = Harness::new().await;
    h.run("run-1", "start", None).await;
    h.run("run-1", "review", Some("start")).await;

    let first = h.run("run-2", "start", None).await;
    assert_eq!(first.entry.sequence_no, 1);
    assert_eq!(h.authority.log_entries(&test_instance("run-1")).await.unwrap().len(), 2);
}
