//! Migration system for tracking and applying database schema changes.
//!
//! Each unit has a sortable id, a name and a pair of apply/revert functions.
//! Units are applied in ascending id order and tracked in the `migrations`
//! table. The engine trusts that table: it never inspects the live schema to
//! decide whether a unit is present.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use inkpost_common::{Error, Result};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::store::{Store, Value, as_text};

pub const TRACKING_TABLE: &str = "migrations";

const CREATE_TRACKING_TABLE: &str = "CREATE TABLE IF NOT EXISTS migrations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

pub type UnitFn = fn(&dyn Store) -> Result<()>;

/// One ordered schema change.
///
/// Ids compare as strings, so numeric ids must be zero-padded (`"009"` sorts
/// before `"010"`, `"9"` does not).
#[derive(Clone, Copy)]
pub struct MigrationUnit {
    pub id: &'static str,
    pub name: &'static str,
    pub apply: UnitFn,
    pub revert: UnitFn,
}

impl MigrationUnit {
    pub fn label(&self) -> String {
        format!("{}_{}", self.id, self.name)
    }
}

impl fmt::Debug for MigrationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationUnit")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Outcome of [`Migrator::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Ids applied during this run, in order.
    pub applied: Vec<String>,
    /// Ids that already had a record.
    pub skipped: Vec<String>,
}

impl ApplyReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Outcome of [`Migrator::revert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RevertOutcome {
    Reverted { id: String, name: String },
    NothingToRevert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitState {
    Applied { applied_at: Option<DateTime<Utc>> },
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub state: UnitState,
}

impl UnitStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self.state, UnitState::Applied { .. })
    }
}

/// Applies, reverts and reports on a fixed set of [`MigrationUnit`]s.
///
/// The store is borrowed for the migrator's lifetime; opening and closing it
/// is the caller's job. No lock is taken around check-then-apply, so two
/// processes migrating the same database at once can race.
pub struct Migrator<'a> {
    store: &'a dyn Store,
    units: Vec<MigrationUnit>,
}

impl<'a> Migrator<'a> {
    /// Register `units`, sorted by id. Empty or duplicate ids are rejected.
    pub fn new(store: &'a dyn Store, units: &[MigrationUnit]) -> Result<Self> {
        let mut units = units.to_vec();
        units.sort_by(|a, b| a.id.cmp(b.id));

        if let Some(unit) = units.iter().find(|u| u.id.trim().is_empty()) {
            return Err(Error::Config(format!(
                "migration {:?} has an empty id",
                unit.name
            )));
        }
        if let Some(pair) = units.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(Error::Config(format!(
                "duplicate migration id {}: {} and {}",
                pair[0].id, pair[0].name, pair[1].name
            )));
        }

        Ok(Self { store, units })
    }

    /// Registered units in application order.
    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    /// Create the tracking table if it does not exist yet.
    pub fn ensure_tracking_store(&self) -> Result<()> {
        self.store
            .execute_batch(CREATE_TRACKING_TABLE)
            .map_err(|e| unavailable("failed to create migrations table", e))
    }

    /// Apply every pending unit in ascending id order.
    ///
    /// Stops at the first unit whose `apply` fails. Units applied earlier in
    /// the same run keep their records, so a later run resumes after them.
    pub fn apply(&self) -> Result<ApplyReport> {
        self.ensure_tracking_store()?;
        info!("running database migrations");

        let mut report = ApplyReport::default();
        for unit in &self.units {
            if self.is_applied(unit.id)? {
                info!("skipping migration {} (already applied)", unit.label());
                report.skipped.push(unit.id.to_string());
                continue;
            }

            info!("applying migration {}", unit.label());
            if let Err(e) = (unit.apply)(self.store) {
                warn!("migration {} failed: {e}", unit.label());
                return Err(Error::UnitApplyFailed {
                    id: unit.id.to_string(),
                    name: unit.name.to_string(),
                    reason: e.to_string(),
                });
            }

            self.record(unit)?;
            report.applied.push(unit.id.to_string());
        }

        info!(
            "migrations complete: {} applied, {} already present",
            report.applied.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Revert the applied unit with the highest id, and only that one.
    pub fn revert(&self) -> Result<RevertOutcome> {
        self.ensure_tracking_store()?;

        for unit in self.units.iter().rev() {
            if !self.is_applied(unit.id)? {
                continue;
            }

            info!("reverting migration {}", unit.label());
            if let Err(e) = (unit.revert)(self.store) {
                warn!("revert of {} failed, record kept: {e}", unit.label());
                return Err(Error::UnitRevertFailed {
                    id: unit.id.to_string(),
                    name: unit.name.to_string(),
                    reason: e.to_string(),
                });
            }

            self.forget(unit.id)?;
            info!("migration {} reverted", unit.label());
            return Ok(RevertOutcome::Reverted {
                id: unit.id.to_string(),
                name: unit.name.to_string(),
            });
        }

        info!("no migrations to revert");
        Ok(RevertOutcome::NothingToRevert)
    }

    /// Applied/pending state of every registered unit, read from the
    /// tracking table at call time.
    pub fn status(&self) -> Result<Vec<UnitStatus>> {
        self.ensure_tracking_store()?;

        let rows = self
            .store
            .query_rows("SELECT id, applied_at FROM migrations", &[])
            .map_err(|e| unavailable("failed to read migrations table", e))?;

        let mut records: HashMap<String, Option<DateTime<Utc>>> = HashMap::new();
        for row in &rows {
            let Some(id) = row.first().and_then(as_text) else {
                continue;
            };
            let applied_at = row.get(1).and_then(as_text).and_then(parse_datetime);
            records.insert(id.to_string(), applied_at);
        }

        for id in records.keys() {
            if !self.units.iter().any(|u| u.id == id.as_str()) {
                warn!("migrations table has a record for unknown unit {id}");
            }
        }

        Ok(self
            .units
            .iter()
            .map(|unit| UnitStatus {
                id: unit.id.to_string(),
                name: unit.name.to_string(),
                state: match records.get(unit.id) {
                    Some(applied_at) => UnitState::Applied {
                        applied_at: *applied_at,
                    },
                    None => UnitState::Pending,
                },
            })
            .collect())
    }

    fn is_applied(&self, id: &str) -> Result<bool> {
        let count = self
            .store
            .query_scalar(
                "SELECT COUNT(*) FROM migrations WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| unavailable("failed to check migration status", e))?;
        debug!("migration {id} record count: {count:?}");
        Ok(matches!(count, Some(Value::Integer(n)) if n > 0))
    }

    fn record(&self, unit: &MigrationUnit) -> Result<()> {
        self.store
            .execute(
                "INSERT INTO migrations (id, name) VALUES (?1, ?2)",
                &[
                    Value::Text(unit.id.to_string()),
                    Value::Text(unit.name.to_string()),
                ],
            )
            .map_err(|e| {
                warn!("{} applied but could not be recorded", unit.label());
                unavailable("failed to mark migration as applied", e)
            })?;
        Ok(())
    }

    fn forget(&self, id: &str) -> Result<()> {
        self.store
            .execute(
                "DELETE FROM migrations WHERE id = ?1",
                &[Value::Text(id.to_string())],
            )
            .map_err(|e| unavailable("failed to mark migration as reverted", e))?;
        Ok(())
    }
}

fn unavailable(context: &str, e: Error) -> Error {
    Error::StoreUnavailable(format!("{context}: {e}"))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            // SQLite datetime('now') produces "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|naive| naive.and_utc())
                .ok()
        })
}
