//! Rule types and data structures

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AntispamError, Result};
use crate::types::KeywordTag;

/// What a rule does when it matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Extract the hit as a blocked keyword
    Limit,
    /// Extract the hit as a hard-blocked keyword
    RestrictLimit,
    /// Drop keywords matching this rule
    Ignore,
    /// Re-tag keywords matching this rule as white
    Whitelist,
}

impl Operation {
    /// Tag given to keywords extracted by a rule with this operation
    pub fn extraction_tag(&self) -> Option<KeywordTag> {
        match self {
            Operation::Limit => Some(KeywordTag::DefaultLimit),
            Operation::RestrictLimit => Some(KeywordTag::RestrictLimit),
            Operation::Ignore | Operation::Whitelist => None,
        }
    }
}

/// Rule subset a stage asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RulePurpose {
    LimitOrRestrict,
    Ignore,
    Whitelist,
}

impl RulePurpose {
    pub fn admits(&self, operation: Operation) -> bool {
        match self {
            RulePurpose::LimitOrRestrict => {
                matches!(operation, Operation::Limit | Operation::RestrictLimit)
            }
            RulePurpose::Ignore => operation == Operation::Ignore,
            RulePurpose::Whitelist => operation == Operation::Whitelist,
        }
    }
}

/// Uncompiled rule, as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub name: String,
    pub area: String,
    pub operation: Operation,
    pub pattern: String,
}

/// Named, compiled pattern scoped to an area
#[derive(Debug, Clone)]
pub struct Rule {
    pub name: String,
    pub area: String,
    pub operation: Operation,
    regex: Regex,
}

impl Rule {
    pub fn new(
        name: impl Into<String>,
        area: impl Into<String>,
        operation: Operation,
        pattern: &str,
    ) -> Result<Self> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|source| AntispamError::InvalidRule {
            name: name.clone(),
            source,
        })?;

        Ok(Self {
            name,
            area: area.into(),
            operation,
            regex,
        })
    }

    pub fn from_definition(def: &RuleDefinition) -> Result<Self> {
        Self::new(def.name.clone(), def.area.clone(), def.operation, &def.pattern)
    }

    /// Leftmost match in `text`, `None` when that match is empty
    pub fn find<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .find(text)
            .map(|m| m.as_str())
            .filter(|hit| !hit.is_empty())
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}] /{}/", self.name, self.area, self.regex.as_str())
    }
}
