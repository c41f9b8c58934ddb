//! Static rule file parser.
//!
//! Each line has the format `TYPE,VALUE,ACTION`:
//!
//! ```text
//! # comment
//! DOMAIN-SUFFIX,example.com,PROXY
//! DOMAIN-KEYWORD,ads,REJECT
//! IP-CIDR,192.168.0.0/16,DIRECT
//! ```
//!
//! Lines starting with `#` are comments. Empty lines are skipped.

use crate::classification::Classification;
use crate::error::RulesError;
use crate::rule::{Rule, RuleMatcher};

/// Parse a whole rule file.
pub fn parse_rules(content: &str) -> Result<Vec<Rule>, RulesError> {
    let mut rules = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let rule = parse_rule_line(line).map_err(|e| RulesError::Parse {
            line: idx + 1,
            msg: e.to_string(),
        })?;
        rules.push(rule);
    }

    Ok(rules)
}

/// Parse a single rule line (e.g., "DOMAIN-SUFFIX,apple.com,PROXY").
fn parse_rule_line(line: &str) -> Result<Rule, RulesError> {
    let mut fields = line.split(',').map(str::trim);
    let (Some(rule_type), Some(value), Some(action)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(RulesError::Malformed(format!(
            "expected TYPE,VALUE,ACTION: {line}"
        )));
    };
    if value.is_empty() {
        return Err(RulesError::Malformed(format!("empty value: {line}")));
    }

    let matcher = match rule_type.to_ascii_uppercase().as_str() {
        "DOMAIN" => RuleMatcher::Domain(value.to_ascii_lowercase()),
        "DOMAIN-SUFFIX" => {
            let suffix = value.strip_prefix('.').unwrap_or(value);
            RuleMatcher::DomainSuffix(suffix.to_ascii_lowercase())
        }
        "DOMAIN-KEYWORD" => RuleMatcher::DomainKeyword(value.to_ascii_lowercase()),
        "IP-CIDR" | "IP-CIDR6" => {
            let net = value
                .parse()
                .map_err(|e| RulesError::InvalidCidr(format!("{value}: {e}")))?;
            RuleMatcher::IpCidr(net)
        }
        _ => return Err(RulesError::InvalidRuleType(rule_type.to_string())),
    };

    Ok(Rule {
        matcher,
        action: parse_action(action)?,
    })
}

fn parse_action(action: &str) -> Result<Classification, RulesError> {
    match action.to_ascii_uppercase().as_str() {
        "DIRECT" => Ok(Classification::Direct),
        "PROXY" => Ok(Classification::Proxy),
        "REJECT" => Ok(Classification::Reject),
        _ => Err(RulesError::InvalidAction(action.to_string())),
    }
}
