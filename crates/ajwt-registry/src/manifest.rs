//! Agent manifests and deterministic checksum computation.
//!
//! An agent's code checksum covers everything that determines its
//! behavior: its id, its (normalized) prompt template, its tools, and its
//! configuration. The components are encoded as JSON with sorted keys,
//! `", "` / `": "` separators, and non-ASCII characters escaped as `\uXXXX`,
//! then hashed with SHA-256. Any change to a tool signature, a prompt line,
//! or a configuration value therefore yields a new checksum.

use std::io;

use ajwt_core::AgentId;
use ajwt_crypto::Sha256Digest;
use ajwt_pop::AgentChecksum;
use ajwt_prompt::normalize_prompt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// One tool an agent can call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within the agent.
    pub name: String,
    /// Call signature, e.g. `(path: str) -> str`.
    pub signature: String,
    /// Human-readable description.
    pub description: String,
    /// Source code, for tools whose implementation is part of the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
}

/// Everything an agent's code checksum covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentManifest {
    /// The agent id.
    pub agent_id: AgentId,
    /// The prompt template.
    pub prompt: String,
    /// Tools, in any order.
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
    /// Free-form configuration.
    #[serde(default = "empty_object")]
    pub configuration: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl AgentManifest {
    /// A manifest with no tools and empty configuration.
    #[must_use]
    pub fn new(agent_id: AgentId, prompt: impl Into<String>) -> Self {
        Self {
            agent_id,
            prompt: prompt.into(),
            tools: Vec::new(),
            configuration: empty_object(),
        }
    }

    /// Add a tool.
    #[must_use]
    pub fn with_tool(mut self, tool: ToolDescriptor) -> Self {
        self.tools.push(tool);
        self
    }

    /// Set the configuration.
    #[must_use]
    pub fn with_configuration(mut self, configuration: Value) -> Self {
        self.configuration = configuration;
        self
    }

    /// The canonical bytes the checksum is computed over.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut tools: Vec<Value> = self
            .tools
            .iter()
            .map(|tool| {
                let mut entry = json!({
                    "name": tool.name,
                    "signature": tool.signature,
                    "description": tool.description,
                });
                if let (Some(source), Some(map)) = (&tool.source_code, entry.as_object_mut())
                    && !source.is_empty()
                {
                    map.insert("source_code".into(), Value::String(source.clone()));
                }
                entry
            })
            .collect();
        tools.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        let components = json!({
            "id": self.agent_id.as_str(),
            "prompt": normalize_prompt(&self.prompt),
            "tools": tools,
            "config": self.configuration,
        });
        canonical_json(&components)
    }

    /// The agent's code checksum.
    #[must_use]
    pub fn checksum(&self) -> AgentChecksum {
        AgentChecksum::from_digest(Sha256Digest::digest(&self.canonical_bytes()))
    }
}

/// Encode `value` with sorted keys, spaced separators, and ASCII-only output.
#[must_use]
pub fn canonical_json(value: &Value) -> Vec<u8> {
    let sorted = sort_keys(value);
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedAsciiFormatter);
    // Writing a Value into a Vec cannot fail.
    if sorted.serialize(&mut ser).is_err() {
        return Vec::new();
    }
    out
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), sort_keys(v));
            }
            Value::Object(sorted)
        },
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// JSON formatter with `", "` and `": "` separators that escapes non-ASCII.
struct SpacedAsciiFormatter;

impl serde_json::ser::Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                let mut buf = [0u8; 1];
                writer.write_all(ch.encode_utf8(&mut buf).as_bytes())?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}
