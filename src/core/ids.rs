//! Opaque primary keys and the fixed table schema shared by every
//! component of the migration control plane.
//!
//! The relational schema being migrated is closed and known at compile
//! time (eight entities, fixed foreign keys), so it is represented as
//! code rather than as data loaded from a schema file, the same way a
//! fixed migration sequence hard-codes its own table definitions
//! instead of reading them from a config format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque 16-byte primary key, stable across migration.
///
/// Backed by a UUID purely for its 16-byte layout and string
/// round-tripping; the migration engine never interprets the bytes as
/// a UUID version/variant, only as an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub uuid::Uuid);

impl RecordId {
    /// The sentinel all-zero identifier. `DataPlane::delete_all` never
    /// targets rows keyed by this id, which preserves placeholder slots
    /// reserved for future synthesis.
    pub const NIL: RecordId = RecordId(uuid::Uuid::nil());

    /// Generates a new random identifier.
    pub fn new() -> Self {
        RecordId(uuid::Uuid::new_v4())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The eight entities that make up the fitness-tracker's relational
/// schema, named and ordered exactly as the dependency graph requires:
/// every table appears after every table it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Users,
    Exercises,
    Programs,
    ProgramWorkouts,
    ProgramExercises,
    WorkoutLogs,
    WorkoutLogExercises,
    UserAnalytics,
}

impl Table {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Table::Users => "users",
            Table::Exercises => "exercises",
            Table::Programs => "programs",
            Table::ProgramWorkouts => "program_workouts",
            Table::ProgramExercises => "program_exercises",
            Table::WorkoutLogs => "workout_logs",
            Table::WorkoutLogExercises => "workout_log_exercises",
            Table::UserAnalytics => "user_analytics",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned by [`Table`]'s `FromStr` impl, used by the CLI's
/// `--table` flag for partial rollbacks.
#[derive(Debug, Clone)]
pub struct ParseTableError(String);

impl fmt::Display for ParseTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown table: {}", self.0)
    }
}

impl std::error::Error for ParseTableError {}

impl std::str::FromStr for Table {
    type Err = ParseTableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TABLE_ORDER.into_iter().find(|t| t.as_str() == s).ok_or_else(|| ParseTableError(s.to_string()))
    }
}

/// Dependency order: load/write proceeds left to right, rollback
/// proceeds in reverse.
pub const TABLE_ORDER: [Table; 8] = [
    Table::Users,
    Table::Exercises,
    Table::Programs,
    Table::ProgramWorkouts,
    Table::ProgramExercises,
    Table::WorkoutLogs,
    Table::WorkoutLogExercises,
    Table::UserAnalytics,
];

/// A single outbound foreign-key reference declared by a table.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    /// Field name on the owning record that carries the reference.
    pub field: &'static str,
    /// Table the reference must resolve against.
    pub target: Table,
    /// Whether the reference may be null.
    pub nullable: bool,
}

/// Returns the declared outbound references for a table, in schema
/// dependency order.
pub const fn foreign_keys(table: Table) -> &'static [ForeignKey] {
    match table {
        Table::Users => &[],
        Table::Exercises => &[ForeignKey {
            field: "created_by",
            target: Table::Users,
            nullable: true,
        }],
        Table::Programs => &[ForeignKey {
            field: "user_id",
            target: Table::Users,
            nullable: false,
        }],
        Table::ProgramWorkouts => &[ForeignKey {
            field: "program_id",
            target: Table::Programs,
            nullable: false,
        }],
        Table::ProgramExercises => &[
            ForeignKey {
                field: "workout_id",
                target: Table::ProgramWorkouts,
                nullable: false,
            },
            ForeignKey {
                field: "exercise_id",
                target: Table::Exercises,
                nullable: false,
            },
        ],
        Table::WorkoutLogs => &[
            ForeignKey {
                field: "user_id",
                target: Table::Users,
                nullable: false,
            },
            ForeignKey {
                field: "program_id",
                target: Table::Programs,
                nullable: true,
            },
        ],
        Table::WorkoutLogExercises => &[
            ForeignKey {
                field: "workout_log_id",
                target: Table::WorkoutLogs,
                nullable: false,
            },
            ForeignKey {
                field: "exercise_id",
                target: Table::Exercises,
                nullable: false,
            },
        ],
        Table::UserAnalytics => &[
            ForeignKey {
                field: "user_id",
                target: Table::Users,
                nullable: false,
            },
            ForeignKey {
                field: "exercise_id",
                target: Table::Exercises,
                nullable: false,
            },
        ],
    }
}

/// Tables that can synthesize a placeholder parent row under the
/// `create` orphan policy: users, exercises, programs only.
pub fn supports_placeholder(table: Table) -> bool {
    matches!(table, Table::Users | Table::Exercises | Table::Programs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_order_respects_declared_dependencies() {
        for (i, table) in TABLE_ORDER.iter().enumerate() {
            for fk in foreign_keys(*table) {
                let target_pos = TABLE_ORDER.iter().position(|t| *t == fk.target).unwrap();
                assert!(target_pos < i, "{table} must come after {}", fk.target);
            }
        }
    }

    #[test]
    fn nil_id_is_distinguishable() {
        assert!(RecordId::NIL.is_nil());
        assert!(!RecordId::new().is_nil());
    }
}
