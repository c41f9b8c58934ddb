//! Routing classes and the classifier interface used by the relay engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How connections to a host are routed.
///
/// `Direct`, `Proxy` and `Reject` come from static rules and are never
/// overwritten by learning. `AutoDirect` and `AutoProxy` are learned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Direct,
    AutoDirect,
    Proxy,
    AutoProxy,
    Reject,
}

impl Classification {
    /// True for learned classes.
    pub fn is_auto(self) -> bool {
        matches!(self, Self::AutoDirect | Self::AutoProxy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::AutoDirect => "auto_direct",
            Self::Proxy => "proxy",
            Self::AutoProxy => "auto_proxy",
            Self::Reject => "reject",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification store consulted and updated by the relay engine.
///
/// Implementations synchronize internally; the engine calls these from many
/// connection tasks at once and holds no lock of its own. Mutations are
/// best-effort and never fail the caller.
pub trait HostClassifier: Send + Sync {
    /// Route for `hostname:port`.
    fn classify(&self, hostname: &str, port: u16) -> Classification;

    /// Remember a learned class. Non-`Auto*` classes are ignored.
    fn record_auto(&self, hostname: &str, port: u16, class: Classification);

    /// Forget any learned class for `hostname`.
    fn delete_auto(&self, hostname: &str);
}
