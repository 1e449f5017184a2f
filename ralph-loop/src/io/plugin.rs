//! Plugin descriptor discovery and advisory validation.
//!
//! The plugin directory holds `plugin.json` (advisory metadata) and
//! `agents/{name}.md` definition files. The descriptor must exist; its
//! contents are informational only and a parse failure is downgraded to a
//! warning.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::AgentKind;

pub const PLUGIN_DESCRIPTOR: &str = "plugin.json";

/// Advisory metadata read from `plugin.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PluginManifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub agents: Vec<String>,
    pub commands: Vec<String>,
}

/// Resolve the plugin directory.
///
/// An explicit flag wins; otherwise probe well-known locations under `root`
/// for the descriptor file. Last resort is `root` itself, which then fails
/// descriptor verification with a clear message.
pub fn resolve_plugin_dir(root: &Path, explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    let candidates = [root.join("ralph-agent"), root.join(".claude-plugin")];
    for candidate in candidates {
        if candidate.join(PLUGIN_DESCRIPTOR).is_file() {
            println!("Auto-detected plugin at: {}", candidate.display());
            return candidate;
        }
    }
    root.to_path_buf()
}

/// Verify the descriptor exists and load its advisory manifest.
///
/// A missing descriptor is the fatal case; an unreadable or malformed one
/// returns `Ok(None)` after a warning.
pub fn verify_plugin(plugin_dir: &Path) -> Result<Option<PluginManifest>> {
    let descriptor = plugin_dir.join(PLUGIN_DESCRIPTOR);
    if !descriptor.is_file() {
        return Err(anyhow!(
            "{PLUGIN_DESCRIPTOR} not found at {}",
            plugin_dir.display()
        ));
    }
    match read_manifest(&descriptor) {
        Ok(manifest) => {
            debug!(path = %descriptor.display(), "loaded plugin manifest");
            Ok(Some(manifest))
        }
        Err(err) => {
            warn!(path = %descriptor.display(), err = %err, "could not read plugin manifest");
            println!("Warning: could not read {}: {err:#}", descriptor.display());
            Ok(None)
        }
    }
}

fn read_manifest(path: &Path) -> Result<PluginManifest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Path of the agent definition markdown inside the plugin.
///
/// Its absence is the single fatal precondition failure in the controller.
pub fn agent_definition_path(plugin_dir: &Path, agent: AgentKind) -> PathBuf {
    plugin_dir.join("agents").join(format!("{agent}.md"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::plugin_fixture;

    #[test]
    fn explicit_dir_wins_over_probing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let explicit = temp.path().join("elsewhere");
        let resolved = resolve_plugin_dir(temp.path(), Some(&explicit));
        assert_eq!(resolved, explicit);
    }

    #[test]
    fn probes_known_candidate_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let candidate = temp.path().join(".claude-plugin");
        fs::create_dir_all(&candidate).expect("mkdir");
        fs::write(candidate.join(PLUGIN_DESCRIPTOR), "{}").expect("write");

        let resolved = resolve_plugin_dir(temp.path(), None);
        assert_eq!(resolved, candidate);
    }

    #[test]
    fn falls_back_to_root_when_nothing_matches() {
        let temp = tempfile::tempdir().expect("tempdir");
        let resolved = resolve_plugin_dir(temp.path(), None);
        assert_eq!(resolved, temp.path());
    }

    #[test]
    fn missing_descriptor_is_fatal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = verify_plugin(temp.path()).unwrap_err();
        assert!(err.to_string().contains("plugin.json not found"));
    }

    #[test]
    fn malformed_descriptor_downgrades_to_warning() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join(PLUGIN_DESCRIPTOR), "not json").expect("write");

        let manifest = verify_plugin(temp.path()).expect("verify");
        assert!(manifest.is_none());
    }

    #[test]
    fn parses_manifest_fields() {
        let temp = plugin_fixture().expect("fixture");
        let manifest = verify_plugin(temp.path()).expect("verify").expect("manifest");
        assert_eq!(manifest.name.as_deref(), Some("ralph-agent"));
        assert_eq!(manifest.agents, vec!["ralph", "gbuild", "gplan"]);
        assert!(!manifest.commands.is_empty());
    }

    #[test]
    fn agent_definition_lives_under_agents_dir() {
        let path = agent_definition_path(Path::new("/plug"), AgentKind::Gbuild);
        assert_eq!(path, Path::new("/plug/agents/gbuild.md"));
    }
}
