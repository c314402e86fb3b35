//! Token command: decode tokens for debugging.

use std::io::Read;

use ajwt_token::{IntentToken, TokenEngine};
use anyhow::Context;

use crate::theme::Theme;

/// Read a token argument: the literal token, `-` for stdin, or `@path`.
pub(crate) fn read_token(arg: &str) -> anyhow::Result<String> {
    let raw = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading token from stdin")?;
        buf
    } else if let Some(path) = arg.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?
    } else {
        arg.to_owned()
    };
    Ok(raw.trim().to_owned())
}

/// Decode `token` without checking its signature or any live state.
pub(crate) fn decode(token: &str) -> anyhow::Result<IntentToken> {
    TokenEngine::inspect(token.as_bytes()).context("token cannot be decoded")
}

/// Print a token's header and claims.
pub(crate) fn inspect(arg: &str, json: bool) -> anyhow::Result<()> {
    let token = decode(&read_token(arg)?)?;

    if json {
        let out = serde_json::json!({
            "header": token.header(),
            "claims": token.claims(),
            "token_hash": token.hash().to_hex(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let claims = token.claims();
    println!(
        "{}",
        Theme::warning("Decoded without verification. Nothing below is trusted.")
    );
    println!("\n{}", Theme::header("Header"));
    println!("{}", Theme::field("Algorithm", &token.header().alg));
    println!("{}", Theme::field("Type", &token.header().typ));
    println!("{}", Theme::field("Issuer key", &token.header().kid));

    println!("\n{}", Theme::header("Claims"));
    println!("{}", Theme::field("Token ID", &claims.token_id.to_string()));
    println!("{}", Theme::field("Issuer", &claims.issuer));
    if let Some(aud) = &claims.audience {
        println!("{}", Theme::field("Audience", aud));
    }
    println!("{}", Theme::field("Subject", claims.subject_agent_id.as_str()));
    println!("{}", Theme::field("Issued", &claims.issued_at.to_string()));
    println!("{}", Theme::field("Expires", &claims.expires_at.to_string()));
    println!(
        "{}",
        Theme::field(
            "Workflow",
            &format!("{} v{}", claims.workflow_id, claims.workflow_version)
        )
    );
    println!("{}", Theme::field("Instance", claims.instance_id.as_str()));
    let predecessor = claims
        .predecessor
        .as_ref()
        .map_or_else(|| "(entry)".to_owned(), ToString::to_string);
    println!(
        "{}",
        Theme::field("Step", &format!("{} after {predecessor}", claims.step_id))
    );
    println!("{}", Theme::field("Scope", &claims.scope.to_string()));
    println!(
        "{}",
        Theme::field("Chain depth", &claims.delegation_chain.depth().to_string())
    );
    println!("{}", Theme::field("Token hash", &token.hash().to_hex()));
    println!();
    Ok(())
}
