//! Client-side storage of agent private keys.
//!
//! One key file per agent, `{dir}/{agent_id}.key`, holding the raw 32-byte
//! secret.

use std::path::{Path, PathBuf};

use ajwt_core::AgentId;
use ajwt_crypto::{CryptoResult, KeyPair};
use tracing::info;

/// A directory of per-agent key files.
#[derive(Debug, Clone)]
pub struct AgentKeyring {
    dir: PathBuf,
}

impl AgentKeyring {
    /// Use `dir` for key files. Nothing is created until a key is needed.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The keyring directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `agent_id`'s key lives.
    #[must_use]
    pub fn path_for(&self, agent_id: &AgentId) -> PathBuf {
        self.dir.join(format!("{agent_id}.key"))
    }

    /// Whether a key file exists for `agent_id`.
    #[must_use]
    pub fn contains(&self, agent_id: &AgentId) -> bool {
        self.path_for(agent_id).exists()
    }

    /// Load `agent_id`'s key, generating it on first use.
    ///
    /// # Errors
    ///
    /// Returns the [`ajwt_crypto::CryptoError`] from reading or writing the
    /// key file.
    pub fn load_or_generate(&self, agent_id: &AgentId) -> CryptoResult<KeyPair> {
        let path = self.path_for(agent_id);
        let existed = path.exists();
        let keypair = KeyPair::load_or_generate(&path)?;
        if !existed {
            info!(agent_id = %agent_id, key_id = %keypair.key_id_hex(), "generated agent key");
        }
        Ok(keypair)
    }

    /// Replace `agent_id`'s key with a freshly generated one.
    ///
    /// # Errors
    ///
    /// Returns the [`ajwt_crypto::CryptoError`] from removing or writing the
    /// key file.
    pub fn rotate(&self, agent_id: &AgentId) -> CryptoResult<KeyPair> {
        let path = self.path_for(agent_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(ajwt_crypto::CryptoError::IoError(e.to_string())),
        }
        self.load_or_generate(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_per_agent_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        let ring = AgentKeyring::new(dir.path());
        let a = AgentId::new("alpha").unwrap();
        let b = AgentId::new("beta").unwrap();

        assert!(!ring.contains(&a));
        let ka = ring.load_or_generate(&a).unwrap();
        let kb = ring.load_or_generate(&b).unwrap();
        assert!(ring.contains(&a));
        assert_ne!(ka.public_key(), kb.public_key());
        assert_eq!(
            ring.load_or_generate(&a).unwrap().public_key(),
            ka.public_key()
        );
        assert!(ring.path_for(&a).ends_with("alpha.key"));
    }

    #[test]
    fn test_rotate_replaces_key() {
        let dir = tempfile::tempdir().unwrap();
        let ring = AgentKeyring::new(dir.path());
        let a = AgentId::new("alpha").unwrap();
        let old = ring.load_or_generate(&a).unwrap();
        let new = ring.rotate(&a).unwrap();
        assert_ne!(old.public_key(), new.public_key());
        assert_eq!(
            ring.load_or_generate(&a).unwrap().public_key(),
            new.public_key()
        );
    }
}
