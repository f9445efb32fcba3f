//! Orphan-handling policy and placeholder synthesis.

use crate::core::dpa::Record;
use crate::core::ids::{RecordId, Table};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// How the resolver handles a record whose declared reference does
/// not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    Warn,
    Remove,
    Create,
}

impl std::str::FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warn" => Ok(OrphanPolicy::Warn),
            "remove" => Ok(OrphanPolicy::Remove),
            "create" => Ok(OrphanPolicy::Create),
            other => Err(format!("unknown orphan policy: {other}")),
        }
    }
}

impl std::fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrphanPolicy::Warn => write!(f, "warn"),
            OrphanPolicy::Remove => write!(f, "remove"),
            OrphanPolicy::Create => write!(f, "create"),
        }
    }
}

/// Builds the schema-defined default fields for a synthesized
/// placeholder row. Defined only for `users`, `exercises`, `programs`
/// Callers must check `core::ids::supports_placeholder`
/// before calling this.
///
/// Placeholder programs reference the nil user rather than a freshly
/// synthesized one, since a placeholder's own required references
/// would otherwise cascade into further placeholder synthesis; the
/// resolver's fixpoint loop handles that cascade explicitly instead
/// when it actually occurs for a real orphaned chain.
pub fn placeholder_defaults(table: Table, id: RecordId) -> Record {
    let mut record = Record::new();
    record.insert("id".to_string(), json!(id));
    record.insert("placeholder".to_string(), json!(true));
    match table {
        Table::Users => {
            record.insert("name".to_string(), json!("[migrated placeholder user]"));
        }
        Table::Exercises => {
            record.insert("name".to_string(), json!("[migrated placeholder exercise]"));
            record.insert("created_by".to_string(), serde_json::Value::Null);
        }
        Table::Programs => {
            record.insert("name".to_string(), json!("[migrated placeholder program]"));
            record.insert("user_id".to_string(), json!(RecordId::NIL));
        }
        _ => unreachable!("placeholder synthesis is only defined for users, exercises, programs"),
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_defaults_mark_the_record_as_synthetic() {
        let id = RecordId::new();
        let record = placeholder_defaults(Table::Users, id);
        assert_eq!(record.get("placeholder"), Some(&json!(true)));
        assert_eq!(record.get("id"), Some(&json!(id)));
    }
}
