//! Grid sort and filter models.
//!
//! Client payloads arrive in the grid's JSON shape:
//!
//! - sort: `[{"colId": "amount", "sort": "desc"}, ...]`
//! - filter: `{"amount": {"filterType": "number", "type": "greaterThan", "filter": "100"}, ...}`
//!   where a column entry may instead be `{"operator": "AND", "conditions": [...]}`.
//!
//! The `*Entry`/`FilterDescriptor` structs mirror that wire shape; [`SortSpec`] and
//! [`Predicate`] are the typed forms the evaluator works on.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One element of a sort payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SortModelEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub col_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sort: Option<String>,
}

/// One column entry of a filter payload, leaf or compound.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilterDescriptor {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub filter_to: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<FilterDescriptor>>,
}

impl FilterDescriptor {
    /// Compound when it names an operator and at least one condition.
    pub fn is_compound(&self) -> bool {
        self.operator.is_some() && self.conditions.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Accepts strings, numbers and booleans as text; `null` as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a scalar, got {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parses `"asc"`/`"desc"` in any case.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("asc") {
            Some(Self::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Some(Self::Desc)
        } else {
            None
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub col_id: String,
    pub direction: SortDirection,
}

/// Sort keys in tie-break precedence order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
}

impl SortSpec {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Number,
    Date,
    Other(String),
}

impl FilterKind {
    pub fn parse(value: Option<&str>) -> Self {
        let lowered = value.unwrap_or_default().to_ascii_lowercase();
        match lowered.as_str() {
            "text" => Self::Text,
            "number" => Self::Number,
            "date" => Self::Date,
            _ => Self::Other(lowered),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOperator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    InRange,
    Other(String),
}

impl FilterOperator {
    pub fn parse(value: Option<&str>) -> Self {
        let lowered = value.unwrap_or_default().to_ascii_lowercase();
        match lowered.as_str() {
            "contains" => Self::Contains,
            "notcontains" => Self::NotContains,
            "equals" => Self::Equals,
            "notequals" => Self::NotEquals,
            "startswith" => Self::StartsWith,
            "endswith" => Self::EndsWith,
            "greaterthan" => Self::GreaterThan,
            "greaterthanequal" => Self::GreaterThanEqual,
            "lessthan" => Self::LessThan,
            "lessthanequal" => Self::LessThanEqual,
            "inrange" => Self::InRange,
            _ => Self::Other(lowered),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPredicate {
    pub kind: FilterKind,
    pub operator: FilterOperator,
    pub filter: Option<String>,
    pub filter_to: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Leaf(LeafPredicate),
    Compound {
        junction: Junction,
        conditions: Vec<Predicate>,
    },
}

impl From<&FilterDescriptor> for Predicate {
    fn from(descriptor: &FilterDescriptor) -> Self {
        if descriptor.is_compound() {
            let junction = match descriptor.operator.as_deref() {
                Some(op) if op.eq_ignore_ascii_case("and") => Junction::And,
                _ => Junction::Or,
            };
            let conditions = descriptor
                .conditions
                .iter()
                .flatten()
                .map(Predicate::from)
                .collect();
            return Self::Compound {
                junction,
                conditions,
            };
        }

        Self::Leaf(LeafPredicate {
            kind: FilterKind::parse(descriptor.filter_type.as_deref()),
            operator: FilterOperator::parse(descriptor.operation.as_deref()),
            filter: descriptor.filter.clone(),
            filter_to: descriptor.filter_to.clone(),
            date_from: descriptor.date_from.clone(),
            date_to: descriptor.date_to.clone(),
        })
    }
}

/// Column id to predicate; every column's predicate must hold.
pub type FilterSpec = BTreeMap<String, Predicate>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compound_descriptor() {
        let descriptor: FilterDescriptor = serde_json::from_value(json!({
            "filterType": "text",
            "operator": "and",
            "conditions": [
                {"filterType": "text", "type": "contains", "filter": "acme"},
                {"filterType": "text", "type": "notContains", "filter": "ltd"}
            ]
        }))
        .unwrap();

        match Predicate::from(&descriptor) {
            Predicate::Compound {
                junction,
                conditions,
            } => {
                assert_eq!(junction, Junction::And);
                assert_eq!(conditions.len(), 2);
            }
            other => panic!("expected compound, got {other:?}"),
        }
    }

    #[test]
    fn test_operator_without_conditions_is_leaf() {
        let descriptor: FilterDescriptor =
            serde_json::from_value(json!({"operator": "OR", "conditions": []})).unwrap();
        assert!(matches!(Predicate::from(&descriptor), Predicate::Leaf(_)));
    }

    #[test]
    fn test_numeric_operand_is_accepted_as_text() {
        let descriptor: FilterDescriptor =
            serde_json::from_value(json!({"filterType": "number", "type": "inRange", "filter": 100, "filterTo": 200}))
                .unwrap();
        assert_eq!(descriptor.filter.as_deref(), Some("100"));
        assert_eq!(descriptor.filter_to.as_deref(), Some("200"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result = serde_json::from_value::<FilterDescriptor>(json!({"filterType": "text", "colour": "red"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_kind_and_operator_parsing() {
        assert_eq!(FilterKind::parse(Some("NUMBER")), FilterKind::Number);
        assert_eq!(FilterKind::parse(None), FilterKind::Other(String::new()));
        assert_eq!(FilterOperator::parse(Some("greaterThanEqual")), FilterOperator::GreaterThanEqual);
        assert_eq!(FilterOperator::parse(Some("blank")), FilterOperator::Other("blank".into()));
        assert_eq!(SortDirection::parse("DESC"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::parse("up"), None);
    }
}
