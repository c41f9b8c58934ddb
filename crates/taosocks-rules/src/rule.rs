//! Static rule definitions and matching.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::classification::Classification;

/// What a static rule matches on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleMatcher {
    /// Exact hostname.
    Domain(String),
    /// The domain itself and all its subdomains.
    DomainSuffix(String),
    /// Any hostname containing the keyword.
    DomainKeyword(String),
    /// IP literal targets inside the network.
    IpCidr(IpNet),
}

/// A static rule: matcher plus the class it assigns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub matcher: RuleMatcher,
    pub action: Classification,
}

impl RuleMatcher {
    /// `hostname` must already be lowercase. `ip` is the parsed hostname
    /// when it is an IP literal.
    pub fn matches(&self, hostname: &str, ip: Option<IpAddr>) -> bool {
        match self {
            Self::Domain(d) => hostname == d,
            Self::DomainSuffix(s) => {
                hostname == s
                    || (hostname.len() > s.len()
                        && hostname.ends_with(s.as_str())
                        && hostname.as_bytes()[hostname.len() - s.len() - 1] == b'.')
            }
            Self::DomainKeyword(k) => hostname.contains(k.as_str()),
            Self::IpCidr(net) => ip.is_some_and(|ip| net.contains(&ip)),
        }
    }
}

impl Rule {
    pub fn matches(&self, hostname: &str, ip: Option<IpAddr>) -> bool {
        self.matcher.matches(hostname, ip)
    }
}
