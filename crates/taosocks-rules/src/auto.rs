//! Learned (auto) rules and their YAML persistence.
//!
//! ```yaml
//! www.example.com:
//!   port: 443
//!   classification: AutoProxy
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classification::Classification;
use crate::error::RulesError;

/// One learned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRule {
    /// Port seen when the entry was recorded.
    pub port: u16,
    pub classification: Classification,
}

/// Learned entries keyed by lowercase hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutoRules {
    entries: BTreeMap<String, AutoRule>,
}

impl AutoRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML content. Entries with a non-learned class are dropped.
    pub fn parse(content: &str) -> Result<Self, RulesError> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }
        let raw: BTreeMap<String, AutoRule> = serde_yaml::from_str(content)?;
        let mut rules = Self::new();
        for (host, rule) in raw {
            if !rule.classification.is_auto() {
                warn!(host = %host, class = %rule.classification, "ignoring non-auto entry in auto rules");
                continue;
            }
            rules.entries.insert(host.to_ascii_lowercase(), rule);
        }
        Ok(rules)
    }

    /// Load from `path`. A missing file is an empty set.
    pub fn load(path: &Path) -> Result<Self, RulesError> {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to `path` through a sibling temp file and a rename, so readers
    /// never see a half-written file.
    pub fn save(&self, path: &Path) -> Result<(), RulesError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(&self.entries)?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, hostname: &str) -> Option<&AutoRule> {
        self.entries.get(hostname)
    }

    pub fn insert(&mut self, hostname: &str, rule: AutoRule) -> Option<AutoRule> {
        self.entries.insert(hostname.to_string(), rule)
    }

    pub fn remove(&mut self, hostname: &str) -> Option<AutoRule> {
        self.entries.remove(hostname)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
