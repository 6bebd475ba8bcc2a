use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::types::{Rule, RuleDefinition, RulePurpose};
use crate::error::Result;

/// Rule lookup consumed by the pipeline stages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Rules of `area` selected by `purpose`, in lookup order
    async fn rules(&self, area: &str, purpose: RulePurpose) -> Vec<Arc<Rule>>;
}

/// In-memory rule set grouped by area
pub struct RuleBook {
    areas: Arc<RwLock<HashMap<String, Vec<Arc<Rule>>>>>,
}

impl RuleBook {
    pub fn new() -> Self {
        RuleBook {
            areas: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Compile every definition; the first invalid pattern aborts the load
    pub fn from_definitions(defs: &[RuleDefinition]) -> Result<Self> {
        let mut areas: HashMap<String, Vec<Arc<Rule>>> = HashMap::new();
        for def in defs {
            let rule = Rule::from_definition(def)?;
            areas.entry(rule.area.clone()).or_default().push(Arc::new(rule));
        }

        Ok(RuleBook {
            areas: Arc::new(RwLock::new(areas)),
        })
    }

    pub async fn add_rule(&self, rule: Rule) {
        let mut areas = self.areas.write().await;
        areas.entry(rule.area.clone()).or_default().push(Arc::new(rule));
    }

    /// Remove every rule named `name` in `area`
    pub async fn remove_rule(&self, area: &str, name: &str) -> bool {
        let mut areas = self.areas.write().await;
        match areas.get_mut(area) {
            Some(rules) => {
                let before = rules.len();
                rules.retain(|rule| rule.name != name);
                rules.len() != before
            }
            None => false,
        }
    }

    pub async fn rule_count(&self) -> usize {
        let areas = self.areas.read().await;
        areas.values().map(Vec::len).sum()
    }
}

impl Default for RuleBook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RuleSource for RuleBook {
    async fn rules(&self, area: &str, purpose: RulePurpose) -> Vec<Arc<Rule>> {
        let areas = self.areas.read().await;
        areas
            .get(area)
            .map(|rules| {
                rules
                    .iter()
                    .filter(|rule| purpose.admits(rule.operation))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Operation;

    fn def(name: &str, area: &str, operation: Operation, pattern: &str) -> RuleDefinition {
        RuleDefinition {
            name: name.to_string(),
            area: area.to_string(),
            operation,
            pattern: pattern.to_string(),
        }
    }

    #[tokio::test]
    async fn test_rules_filtered_by_area_and_purpose() {
        let book = RuleBook::from_definitions(&[
            def("limit", "comment", Operation::Limit, "spam"),
            def("restrict", "comment", Operation::RestrictLimit, "scam"),
            def("ignore", "comment", Operation::Ignore, "^ok$"),
            def("white", "comment", Operation::Whitelist, "official"),
            def("other", "danmaku", Operation::Limit, "spam"),
        ])
        .unwrap();

        let limit = book.rules("comment", RulePurpose::LimitOrRestrict).await;
        let names: Vec<&str> = limit.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["limit", "restrict"]);

        assert_eq!(book.rules("comment", RulePurpose::Ignore).await.len(), 1);
        assert_eq!(book.rules("comment", RulePurpose::Whitelist).await.len(), 1);
        assert_eq!(book.rules("danmaku", RulePurpose::LimitOrRestrict).await.len(), 1);
        assert!(book.rules("unknown", RulePurpose::Ignore).await.is_empty());
        assert_eq!(book.rule_count().await, 5);
    }

    #[tokio::test]
    async fn test_from_definitions_rejects_invalid_pattern() {
        let result = RuleBook::from_definitions(&[def("bad", "comment", Operation::Limit, "[")]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_add_and_remove_rule() {
        let book = RuleBook::new();
        book.add_rule(Rule::new("w", "comment", Operation::Whitelist, "ok").unwrap())
            .await;
        assert_eq!(book.rules("comment", RulePurpose::Whitelist).await.len(), 1);

        assert!(book.remove_rule("comment", "w").await);
        assert!(!book.remove_rule("comment", "w").await);
        assert!(!book.remove_rule("danmaku", "w").await);
        assert_eq!(book.rule_count().await, 0);
    }
}
