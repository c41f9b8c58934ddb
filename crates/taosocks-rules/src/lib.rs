//! Per-host routing decisions for taosocks.
//!
//! A host is classified from three sources, in order:
//!
//! 1. static rules (`TYPE,VALUE,ACTION` lines, first match wins);
//! 2. learned rules recorded after earlier connection outcomes;
//! 3. a fallback: loopback/private IP literals go direct, everything else is
//!    tried direct first ([`Classification::AutoDirect`]).
//!
//! The relay engine only sees the [`HostClassifier`] trait.

pub mod auto;
pub mod classification;
pub mod error;
pub mod filter;
pub mod parser;
pub mod rule;

pub use auto::{AutoRule, AutoRules};
pub use classification::{Classification, HostClassifier};
pub use error::RulesError;
pub use filter::HostFilter;
pub use parser::parse_rules;
pub use rule::{Rule, RuleMatcher};
