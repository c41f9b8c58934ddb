//! `HostFilter`: static rules plus learned rules behind one lock-guarded store.

use std::net::IpAddr;
use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::auto::{AutoRule, AutoRules};
use crate::classification::{Classification, HostClassifier};
use crate::error::RulesError;
use crate::parser::parse_rules;
use crate::rule::Rule;

/// Rule store used by the client.
#[derive(Debug, Default)]
pub struct HostFilter {
    rules: RwLock<Vec<Rule>>,
    auto: RwLock<AutoRules>,
}

impl HostFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from already-parsed static rules.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: RwLock::new(rules),
            auto: RwLock::new(AutoRules::new()),
        }
    }

    /// Replace the static rules with the contents of `path`.
    ///
    /// A missing file leaves the filter without static rules.
    pub fn load_rules(&self, path: &Path) -> Result<usize, RulesError> {
        let rules = match std::fs::read_to_string(path) {
            Ok(content) => parse_rules(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "rule file not found, using defaults");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        let count = rules.len();
        *self.rules.write() = rules;
        Ok(count)
    }

    /// Replace the learned rules with the contents of `path`.
    pub fn load_auto(&self, path: &Path) -> Result<usize, RulesError> {
        let auto = AutoRules::load(path)?;
        let count = auto.len();
        *self.auto.write() = auto;
        Ok(count)
    }

    /// Persist the learned rules to `path`.
    pub fn save_auto(&self, path: &Path) -> Result<(), RulesError> {
        let snapshot = self.auto.read().clone();
        snapshot.save(path)
    }

    /// Number of learned entries.
    pub fn auto_len(&self) -> usize {
        self.auto.read().len()
    }

    fn static_match(&self, hostname: &str, ip: Option<IpAddr>) -> Option<Classification> {
        self.rules
            .read()
            .iter()
            .find(|r| r.matches(hostname, ip))
            .map(|r| r.action)
    }
}

impl HostClassifier for HostFilter {
    fn classify(&self, hostname: &str, port: u16) -> Classification {
        let hostname = normalize(hostname);
        let ip = hostname.parse::<IpAddr>().ok();

        if let Some(class) = self.static_match(&hostname, ip) {
            return class;
        }
        if let Some(rule) = self.auto.read().get(&hostname) {
            return rule.classification;
        }
        let class = if is_local(&hostname, ip) {
            Classification::Direct
        } else {
            Classification::AutoDirect
        };
        debug!(host = %hostname, port, class = %class, "no rule matched");
        class
    }

    fn record_auto(&self, hostname: &str, port: u16, class: Classification) {
        if !class.is_auto() {
            debug!(host = %hostname, class = %class, "refusing to learn non-auto class");
            return;
        }
        let hostname = normalize(hostname);
        let ip = hostname.parse::<IpAddr>().ok();
        if self.static_match(&hostname, ip).is_some() {
            return;
        }
        let rule = AutoRule {
            port,
            classification: class,
        };
        if self.auto.write().insert(&hostname, rule) != Some(rule) {
            info!(host = %hostname, port, class = %class, "learned route");
        }
    }

    fn delete_auto(&self, hostname: &str) {
        let hostname = normalize(hostname);
        if self.auto.write().remove(&hostname).is_some() {
            info!(host = %hostname, "forgot learned route");
        }
    }
}

fn normalize(hostname: &str) -> String {
    let host = hostname
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(hostname);
    host.trim_end_matches('.').to_ascii_lowercase()
}

fn is_local(hostname: &str, ip: Option<IpAddr>) -> bool {
    match ip {
        Some(IpAddr::V4(v4)) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        Some(IpAddr::V6(v6)) => {
            v6.is_loopback()
                || v6.is_unique_local()
                || v6.is_unicast_link_local()
                || v6.is_unspecified()
        }
        None => hostname == "localhost" || hostname.ends_with(".localhost"),
    }
}
