use crate::error::{ConsoleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==")]
    Equals,
    #[serde(rename = "!=")]
    NotEquals,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
}

impl FilterOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "==",
            FilterOperator::NotEquals => "!=",
            FilterOperator::GreaterThan => ">",
            FilterOperator::GreaterThanOrEqual => ">=",
            FilterOperator::LessThan => "<",
            FilterOperator::LessThanOrEqual => "<=",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not in",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    fn joiner(&self) -> &'static str {
        match self {
            Combinator::And => " && ",
            Combinator::Or => " || ",
        }
    }
}

/// One `field <op> value` row of the filter builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl FilterCondition {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        FilterCondition {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Render in the service's filter syntax, or `None` for an incomplete row.
    pub fn render(&self) -> Option<String> {
        if self.field.is_empty() || self.value.is_empty() {
            return None;
        }
        let (field, value) = (&self.field, &self.value);
        Some(match self.operator {
            FilterOperator::Equals | FilterOperator::Contains => format!("{}:{}", field, value),
            FilterOperator::NotEquals => format!("{}:!{}", field, value),
            FilterOperator::GreaterThan => format!("{}:>{}", field, value),
            FilterOperator::GreaterThanOrEqual => format!("{}:>={}", field, value),
            FilterOperator::LessThan => format!("{}:<{}", field, value),
            FilterOperator::LessThanOrEqual => format!("{}:<={}", field, value),
            FilterOperator::In => format!("{}:[{}]", field, value),
            FilterOperator::NotIn => format!("{}:![{}]", field, value),
        })
    }
}

// Word operators need surrounding spaces; symbolic ones are tried longest first.
const WORD_OPERATORS: [(&str, FilterOperator); 3] = [
    (" not in ", FilterOperator::NotIn),
    (" contains ", FilterOperator::Contains),
    (" in ", FilterOperator::In),
];

const SYMBOL_OPERATORS: [(&str, FilterOperator); 6] = [
    (">=", FilterOperator::GreaterThanOrEqual),
    ("<=", FilterOperator::LessThanOrEqual),
    ("==", FilterOperator::Equals),
    ("!=", FilterOperator::NotEquals),
    (">", FilterOperator::GreaterThan),
    ("<", FilterOperator::LessThan),
];

impl FromStr for FilterCondition {
    type Err = ConsoleError;

    /// Parse `price>=10`, `brand==Acme` or `tags in a,b`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        // Earliest operator wins; on a tie the longer token (`>=` over `>`).
        let split = WORD_OPERATORS
            .iter()
            .chain(SYMBOL_OPERATORS.iter())
            .filter_map(|(token, op)| s.find(token).map(|pos| (pos, token.len(), *op)))
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let (pos, len, operator) = split.ok_or_else(|| {
            ConsoleError::Precondition(format!("No filter operator found in '{}'", s))
        })?;

        let field = s[..pos].trim();
        let value = s[pos + len..].trim();
        if field.is_empty() || value.is_empty() {
            return Err(ConsoleError::Precondition(format!(
                "Filter condition '{}' needs both a field and a value",
                s
            )));
        }

        Ok(FilterCondition::new(field, operator, value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub combinator: Combinator,
    pub conditions: Vec<FilterCondition>,
}

impl FilterGroup {
    pub fn new(combinator: Combinator) -> Self {
        FilterGroup {
            combinator,
            conditions: Vec::new(),
        }
    }

    pub fn with(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Parenthesised only when more than one condition survives rendering.
    pub fn render(&self) -> Option<String> {
        let parts: Vec<String> = self
            .conditions
            .iter()
            .filter_map(FilterCondition::render)
            .collect();
        match parts.len() {
            0 => None,
            1 => parts.into_iter().next(),
            _ => Some(format!("({})", parts.join(self.combinator.joiner()))),
        }
    }
}

/// Render every non-empty group and AND them together.
pub fn render_groups(groups: &[FilterGroup]) -> String {
    groups
        .iter()
        .filter_map(FilterGroup::render)
        .collect::<Vec<_>>()
        .join(" && ")
}
