//! Per-provider header overrides.
//!
//! A rule either sets a literal value or copies one out of
//! `Config.extensions`, letting a caller override or add a header (an
//! organization ID, a proxy auth token) without forking a provider.

use serde::{Deserialize, Serialize};

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderRuleValue {
    Static(String),
    /// Read `Config.extensions[key]` as a string at send time; silently
    /// omitted if the key is absent or not a string, since a missing
    /// optional header is never itself a request failure.
    FromExtension(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRule {
    pub name: String,
    pub value: HeaderRuleValue,
}

impl HeaderRule {
    pub fn static_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        HeaderRule {
            name: name.into(),
            value: HeaderRuleValue::Static(value.into()),
        }
    }

    pub fn from_extension(name: impl Into<String>, extension_key: impl Into<String>) -> Self {
        HeaderRule {
            name: name.into(),
            value: HeaderRuleValue::FromExtension(extension_key.into()),
        }
    }
}

/// Applies `rules` on top of a provider's default headers, in order;
/// a later rule with the same header name overwrites an earlier one or
/// the provider's own default ("last rule wins").
pub fn apply(rules: &[HeaderRule], mut headers: Vec<(String, String)>, config: &Config) -> Vec<(String, String)> {
    for rule in rules {
        let resolved = match &rule.value {
            HeaderRuleValue::Static(v) => Some(v.clone()),
            HeaderRuleValue::FromExtension(key) => config.get_extension::<String>(key).ok().flatten(),
        };

        let Some(value) = resolved else { continue };

        if let Some(existing) = headers.iter_mut().find(|(name, _)| name.eq_ignore_ascii_case(&rule.name)) {
            existing.1 = value;
        } else {
            headers.push((rule.name.clone(), value));
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_rule_overrides_existing_header() {
        let config = Config::new("https://x", "m");
        let rules = vec![HeaderRule::static_value("content-type", "application/custom+json")];
        let headers = apply(&rules, vec![("content-type".to_string(), "application/json".to_string())], &config);
        assert_eq!(headers, vec![("content-type".to_string(), "application/custom+json".to_string())]);
    }

    #[test]
    fn missing_extension_is_silently_skipped() {
        let config = Config::new("https://x", "m");
        let rules = vec![HeaderRule::from_extension("x-org-id", "orgId")];
        let headers = apply(&rules, vec![], &config);
        assert!(headers.is_empty());
    }

    #[test]
    fn extension_rule_adds_header_when_present() {
        let config = Config::new("https://x", "m").with_extension("orgId", "org_123");
        let rules = vec![HeaderRule::from_extension("x-org-id", "orgId")];
        let headers = apply(&rules, vec![], &config);
        assert_eq!(headers, vec![("x-org-id".to_string(), "org_123".to_string())]);
    }
}
