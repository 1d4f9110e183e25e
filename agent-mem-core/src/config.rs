//! `config.yaml`: typed settings with fixed defaults.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{MemError, Result};
use crate::store::ContextStore;
use crate::vcs::Vcs;

pub const CONFIG_FILE: &str = "config.yaml";

const CONFIG_BANNER: &str = "# agent-mem configuration\n";

/// When reflection is suggested.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionTrigger {
    #[default]
    Manual,
    Auto,
}

impl ReflectionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReflectionConfig {
    pub trigger: ReflectionTrigger,
    /// Commits between suggested reflections when the trigger is `auto`.
    pub frequency: usize,
    pub model: Option<String>,
    /// Entry count above which a memory file is oversized.
    pub defrag_threshold: usize,
    /// Size in KiB above which a memory file is oversized.
    pub defrag_size_kb: u64,
    pub stale_days: i64,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            trigger: ReflectionTrigger::Manual,
            frequency: 5,
            model: None,
            defrag_threshold: 50,
            defrag_size_kb: 10,
            stale_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompactConfig {
    pub retain_days: i64,
}

impl Default for CompactConfig {
    fn default() -> Self {
        Self { retain_days: 7 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub auto_commit: bool,
    pub auto_commit_interval: u32,
    pub reflection: ReflectionConfig,
    pub compact: CompactConfig,
    pub system_files_max: usize,
    pub memory_files_max: usize,
    /// Active branch.
    pub branch: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_commit: false,
            auto_commit_interval: 10,
            reflection: ReflectionConfig::default(),
            compact: CompactConfig::default(),
            system_files_max: 10,
            memory_files_max: 25,
            branch: crate::branch::DEFAULT_BRANCH.to_string(),
        }
    }
}

fn is_blank_yaml(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .all(|l| l.is_empty() || l.starts_with('#'))
}

impl Config {
    /// Read `config.yaml`, falling back to defaults when it is absent.
    pub fn load(store: &ContextStore) -> Result<Self> {
        match store.read(CONFIG_FILE)? {
            Some(text) if !is_blank_yaml(&text) => Ok(serde_yaml::from_str(&text)?),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, store: &ContextStore) -> Result<()> {
        store.write(CONFIG_FILE, &format!("{CONFIG_BANNER}{}", self.to_yaml()?))
    }

    /// Set a dotted key such as `reflection.trigger` from its textual value.
    ///
    /// The value is read as a YAML scalar and the result must still
    /// deserialize into a valid config; nothing is written by this call.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut tree = serde_yaml::to_value(&*self)?;
        let parsed: Value = serde_yaml::from_str(value)
            .unwrap_or_else(|_| Value::String(value.to_string()));

        let parts: Vec<&str> = key.split('.').collect();
        let (last, parents) = parts
            .split_last()
            .ok_or_else(|| MemError::InvalidInput("Empty config key".to_string()))?;

        let mut node: &mut Mapping = tree
            .as_mapping_mut()
            .ok_or_else(|| MemError::InvalidInput("Config is not a mapping".to_string()))?;
        for part in parents {
            node = node
                .get_mut(*part)
                .and_then(Value::as_mapping_mut)
                .ok_or_else(|| MemError::InvalidInput(format!("Unknown config key: {key}")))?;
        }
        let slot = node
            .get_mut(*last)
            .ok_or_else(|| MemError::InvalidInput(format!("Unknown config key: {key}")))?;
        *slot = parsed;

        *self = serde_yaml::from_value(tree)
            .map_err(|e| MemError::InvalidInput(format!("Invalid value for {key}: {e}")))?;
        Ok(())
    }

    /// True when auto reflection is on and enough commits have accrued.
    pub fn reflection_due(&self, commits_since_last: usize) -> bool {
        self.reflection.trigger == ReflectionTrigger::Auto
            && self.reflection.frequency > 0
            && commits_since_last >= self.reflection.frequency
    }

    /// Commit after a mutation when `auto_commit` is enabled.
    pub fn maybe_auto_commit(&self, vcs: &dyn Vcs, description: &str) -> Result<Option<String>> {
        if !self.auto_commit {
            return Ok(None);
        }
        vcs.commit(&format!("auto: {description}"))
    }
}

/// Point the active branch at `name` with a single config write.
pub fn set_active_branch(store: &ContextStore, name: &str) -> Result<()> {
    let mut config = Config::load(store)?;
    config.branch = name.to_string();
    config.save(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_keys_take_defaults() {
        let config: Config = serde_yaml::from_str("auto_commit: true\nreflection:\n  frequency: 3\n").unwrap();
        assert!(config.auto_commit);
        assert_eq!(config.reflection.frequency, 3);
        assert_eq!(config.reflection.stale_days, 30);
        assert_eq!(config.compact.retain_days, 7);
        assert_eq!(config.branch, "main");
    }

    #[test]
    fn set_nested_key() {
        let mut config = Config::default();
        config.set("reflection.trigger", "auto").unwrap();
        config.set("compact.retain_days", "14").unwrap();
        assert_eq!(config.reflection.trigger, ReflectionTrigger::Auto);
        assert_eq!(config.compact.retain_days, 14);
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut config = Config::default();
        assert!(matches!(config.set("nope", "1"), Err(MemError::InvalidInput(_))));
        assert!(matches!(
            config.set("reflection.frequency", "often"),
            Err(MemError::InvalidInput(_))
        ));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reflection_due_only_for_auto_trigger() {
        let mut config = Config::default();
        assert!(!config.reflection_due(100));
        config.reflection.trigger = ReflectionTrigger::Auto;
        assert!(!config.reflection_due(4));
        assert!(config.reflection_due(5));
    }

    #[test]
    fn comment_only_file_is_blank() {
        assert!(is_blank_yaml("# agent-mem configuration\n\n"));
        assert!(!is_blank_yaml("branch: main\n"));
    }
}
