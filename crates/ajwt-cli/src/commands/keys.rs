//! Keys command: per-agent signing keys.

use std::path::PathBuf;

use ajwt_core::AgentId;
use ajwt_crypto::KeyPair;
use ajwt_pop::AgentKeyring;
use anyhow::{Context, bail};
use tracing::debug;

use crate::theme::Theme;

fn keyring(dir: Option<PathBuf>) -> anyhow::Result<AgentKeyring> {
    let dir = match dir {
        Some(dir) => dir,
        None => ajwt_config::loader::user_config_dir()?.join("keys"),
    };
    Ok(AgentKeyring::new(dir))
}

fn print_key(key: &KeyPair, path: &std::path::Path) {
    println!("{}", Theme::field("Key ID", &key.key_id_hex()));
    println!("{}", Theme::field("Public key", &key.public_key().to_hex()));
    println!("{}", Theme::field("Key file", &path.display().to_string()));
    println!();
}

/// Create a key for `agent_id`, replacing an existing one only with `force`.
pub(crate) fn generate_key(agent_id: &str, dir: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let agent_id = AgentId::new(agent_id)?;
    let ring = keyring(dir)?;

    let key = if ring.contains(&agent_id) {
        if !force {
            bail!(
                "a key for {agent_id} already exists at {}; pass --force to replace it",
                ring.path_for(&agent_id).display()
            );
        }
        println!(
            "{}",
            Theme::warning("Replacing existing key. Rotate the registry entry to match.")
        );
        ring.rotate(&agent_id)
    } else {
        ring.load_or_generate(&agent_id)
    }
    .with_context(|| format!("writing key for {agent_id}"))?;
    debug!(
        agent_id = %agent_id,
        key_id = %key.key_id_hex(),
        replaced = force,
        "agent key written"
    );

    println!("{}", Theme::success(&format!("Key ready for {agent_id}.")));
    print_key(&key, &ring.path_for(&agent_id));
    Ok(())
}

/// Print the public half of `agent_id`'s key.
pub(crate) fn show_key(agent_id: &str, dir: Option<PathBuf>) -> anyhow::Result<()> {
    let agent_id = AgentId::new(agent_id)?;
    let ring = keyring(dir)?;
    if !ring.contains(&agent_id) {
        bail!("no key for {agent_id} in {}", ring.dir().display());
    }
    let key = ring.load_or_generate(&agent_id)?;

    println!("\n{}", Theme::header(&format!("Agent key: {agent_id}")));
    print_key(&key, &ring.path_for(&agent_id));
    Ok(())
}
