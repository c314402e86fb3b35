//! Checksum command: agent and prompt checksums.

use std::path::Path;

use ajwt_prompt::PromptBinder;
use ajwt_registry::AgentManifest;
use anyhow::Context;

/// Checksum of an agent manifest in JSON.
pub(crate) fn agent_checksum(json: &str) -> anyhow::Result<String> {
    let manifest: AgentManifest =
        serde_json::from_str(json).context("manifest is not a valid agent manifest")?;
    Ok(manifest.checksum().to_hex())
}

/// Checksum of prompt content.
pub(crate) fn prompt_checksum(content: &str, normalize: bool) -> String {
    PromptBinder::new(normalize).bind(content).to_hex()
}

/// Print the checksum of the manifest at `path`.
pub(crate) fn run_agent(path: &Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    println!("{}", agent_checksum(&json)?);
    Ok(())
}

/// Print the checksum of the prompt at `path`.
pub(crate) fn run_prompt(path: &Path, normalize: bool) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    println!("{}", prompt_checksum(&content, normalize));
    Ok(())
}
