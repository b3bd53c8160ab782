//! Placement constraints.
//!
//! A constraint expression restricts which offers a workload may be placed
//! on. The expression is a list of rules separated by `;` or `,`:
//!
//! ```text
//! field:OPERATOR[:value]
//! ```
//!
//! - `hostname` matches the offer hostname; any other field names an offer
//!   attribute.
//! - `LIKE:regex` holds when the field exists and its whole value matches.
//! - `UNLIKE:regex` holds when the field is missing or does not match.
//! - `CLUSTER:value` (alias `IS`) holds when the field equals the value.
//!
//! A `,` separates rules only when the text after it starts a new rule, so
//! a regex such as `r{1,3}` keeps its comma. `;` always separates.
//!
//! An offer is allowed only when every rule holds. An empty expression
//! allows everything.
//!
//! # Invariants
//!
//! - Evaluation is pure: the same offer always gets the same answer
//! - Parsing fails fast; a bad expression never reaches offer time

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use skiff_events::Offer;
use thiserror::Error;
use tracing::trace;

/// Decides whether an offer satisfies the workload's placement rules.
pub trait ConstraintEvaluator: Send + Sync {
    /// Returns true if the workload may be placed on this offer.
    fn allows(&self, offer: &Offer) -> bool;
}

/// Constraint parsing errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConstraintError {
    /// A rule has no field name.
    #[error("constraint '{0}' has an empty field")]
    EmptyField(String),

    /// A rule has no operator.
    #[error("constraint '{0}' is missing an operator")]
    MissingOperator(String),

    /// The operator is not recognized.
    #[error("constraint '{rule}' has unknown operator '{operator}'")]
    UnknownOperator { rule: String, operator: String },

    /// The operator needs a value but none was given.
    #[error("constraint '{0}' is missing a value")]
    MissingValue(String),

    /// The value is not a valid regular expression.
    #[error("constraint '{rule}' has an invalid pattern: {message}")]
    InvalidPattern { rule: String, message: String },
}

/// Constraint operator.
#[derive(Debug, Clone)]
pub enum Operator {
    /// Field must exist and fully match.
    Like(Regex),
    /// Field must be missing or not fully match.
    Unlike(Regex),
    /// Field must exist and equal the value.
    Cluster(String),
}

/// A single `field:OPERATOR:value` rule.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub field: String,
    pub operator: Operator,
}

impl Constraint {
    /// Parse one rule.
    pub fn parse(rule: &str) -> Result<Self, ConstraintError> {
        let rule = rule.trim();
        let mut parts = rule.splitn(3, ':');

        let field = parts.next().unwrap_or_default().trim();
        if field.is_empty() {
            return Err(ConstraintError::EmptyField(rule.to_string()));
        }

        let Some(operator) = parts.next().map(str::trim) else {
            return Err(ConstraintError::MissingOperator(rule.to_string()));
        };
        let value = parts.next().map(str::trim).unwrap_or_default();

        let operator = match operator.to_ascii_uppercase().as_str() {
            "LIKE" => Operator::Like(anchored(rule, value)?),
            "UNLIKE" => Operator::Unlike(anchored(rule, value)?),
            "CLUSTER" | "IS" => {
                if value.is_empty() {
                    return Err(ConstraintError::MissingValue(rule.to_string()));
                }
                Operator::Cluster(value.to_string())
            }
            "" => return Err(ConstraintError::MissingOperator(rule.to_string())),
            other => {
                return Err(ConstraintError::UnknownOperator {
                    rule: rule.to_string(),
                    operator: other.to_string(),
                })
            }
        };

        Ok(Self {
            field: field.to_string(),
            operator,
        })
    }

    /// Check this rule against an offer.
    pub fn holds(&self, offer: &Offer) -> bool {
        let value = offer.field(&self.field);
        match (&self.operator, value) {
            (Operator::Like(re), Some(v)) => re.is_match(&v),
            (Operator::Like(_), None) => false,
            (Operator::Unlike(re), Some(v)) => !re.is_match(&v),
            (Operator::Unlike(_), None) => true,
            (Operator::Cluster(expected), Some(v)) => v == *expected,
            (Operator::Cluster(_), None) => false,
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operator {
            Operator::Like(re) => write!(f, "{}:LIKE:{}", self.field, unanchored(re)),
            Operator::Unlike(re) => write!(f, "{}:UNLIKE:{}", self.field, unanchored(re)),
            Operator::Cluster(v) => write!(f, "{}:CLUSTER:{}", self.field, v),
        }
    }
}

/// Compile a pattern that must match the whole field value.
fn anchored(rule: &str, pattern: &str) -> Result<Regex, ConstraintError> {
    if pattern.is_empty() {
        return Err(ConstraintError::MissingValue(rule.to_string()));
    }
    Regex::new(&format!("^(?:{pattern})$")).map_err(|e| ConstraintError::InvalidPattern {
        rule: rule.to_string(),
        message: e.to_string(),
    })
}

fn unanchored(re: &Regex) -> &str {
    let s = re.as_str();
    s.strip_prefix("^(?:")
        .and_then(|s| s.strip_suffix(")$"))
        .unwrap_or(s)
}

/// A parsed constraint expression.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    /// A set that allows every offer.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse an expression. Blank input yields an empty set.
    pub fn parse(expression: &str) -> Result<Self, ConstraintError> {
        let constraints = expression
            .split(';')
            .flat_map(split_rules)
            .filter(|rule| !rule.trim().is_empty())
            .map(Constraint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { constraints })
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }
}

/// Split a `;`-free chunk at each comma that is followed by a rule.
fn split_rules(chunk: &str) -> Vec<&str> {
    let mut rules = Vec::new();
    let mut start = 0;
    for (at, _) in chunk.match_indices(',') {
        if starts_rule(&chunk[at + 1..]) {
            rules.push(&chunk[start..at]);
            start = at + 1;
        }
    }
    rules.push(&chunk[start..]);
    rules
}

fn starts_rule(rest: &str) -> bool {
    let mut parts = rest.trim_start().splitn(3, ':');
    let field = parts.next().unwrap_or_default();
    let Some(operator) = parts.next() else {
        return false;
    };
    !field.is_empty()
        && !field.contains(|c: char| c.is_whitespace() || c == ',')
        && OPERATORS
            .iter()
            .any(|op| op.eq_ignore_ascii_case(operator.trim()))
}

const OPERATORS: [&str; 4] = ["LIKE", "UNLIKE", "CLUSTER", "IS"];

impl FromStr for ConstraintSet {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: Vec<String> = self.constraints.iter().map(ToString::to_string).collect();
        f.write_str(&rules.join(";"))
    }
}

impl ConstraintEvaluator for ConstraintSet {
    fn allows(&self, offer: &Offer) -> bool {
        for constraint in &self.constraints {
            if !constraint.holds(offer) {
                trace!(
                    offer_id = %offer.id,
                    constraint = %constraint,
                    "Constraint rejected offer"
                );
                return false;
            }
        }
        true
    }
}
