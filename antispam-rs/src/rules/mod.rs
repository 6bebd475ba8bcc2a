//! Classification rules
//!
//! Named regular expressions scoped to an area, and the lookup the pipeline
//! stages use to fetch them.

pub mod book;
pub mod types;

pub use book::{RuleBook, RuleSource};
#[cfg(test)]
pub use book::MockRuleSource;
pub use types::{Operation, Rule, RuleDefinition, RulePurpose};
