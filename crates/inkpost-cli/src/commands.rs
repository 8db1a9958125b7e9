use std::path::Path;

use anyhow::{Context, Result};
use inkpost_config::AppConfig;
use inkpost_db::schema::UNITS;
use inkpost_db::{ApplyReport, Migrator, RevertOutcome, SeederRunner, SqliteStore, UnitState, UnitStatus};
use tracing::warn;

use crate::{MigrateAction, SeedAction};

pub fn open_store(path: &Path) -> Result<SqliteStore> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    }
    SqliteStore::open(path).with_context(|| format!("failed to open {}", path.display()))
}

pub fn migrate(store: &SqliteStore, action: MigrateAction, json: bool) -> Result<()> {
    let migrator = Migrator::new(store, UNITS).context("invalid migration registry")?;

    match action {
        MigrateAction::Up => {
            let report = migrator.apply().context("migration failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_apply(&report));
            }
        }
        MigrateAction::Down => {
            let outcome = migrator.revert().context("migration rollback failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", render_revert(&outcome));
            }
        }
        MigrateAction::Status => {
            let status = migrator
                .status()
                .context("failed to get migration status")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print!("{}", render_status(&status));
            }
        }
    }
    Ok(())
}

pub fn seed(store: &SqliteStore, action: SeedAction, config: &AppConfig) -> Result<()> {
    if config.is_production() {
        warn!("seeding a production database ({})", config.database.path.display());
    }

    let runner = SeederRunner::with_defaults(store);
    match action {
        SeedAction::Seed => {
            let inserted = runner.seed_all().context("seeding failed")?;
            println!("Seeding complete: {inserted} rows inserted");
        }
        SeedAction::Clear => {
            runner.clear_all().context("clear failed")?;
            println!("Seeded data cleared (admin accounts kept)");
        }
    }
    Ok(())
}

fn render_apply(report: &ApplyReport) -> String {
    let mut out = String::new();
    for id in &report.skipped {
        out.push_str(&format!("skipped  {id} (already applied)\n"));
    }
    for id in &report.applied {
        out.push_str(&format!("applied  {id}\n"));
    }
    if report.is_noop() {
        out.push_str("Nothing to migrate\n");
    } else {
        out.push_str(&format!("{} migration(s) applied\n", report.applied.len()));
    }
    out
}

fn render_revert(outcome: &RevertOutcome) -> String {
    match outcome {
        RevertOutcome::Reverted { id, name } => format!("reverted {id}_{name}"),
        RevertOutcome::NothingToRevert => "No migrations to revert".to_string(),
    }
}

fn render_status(status: &[UnitStatus]) -> String {
    let mut out = String::from("Migration status\n----------------\n");
    for unit in status {
        let state = match &unit.state {
            UnitState::Applied {
                applied_at: Some(at),
            } => format!("applied  {}", at.format("%Y-%m-%d %H:%M:%S")),
            UnitState::Applied { applied_at: None } => "applied".to_string(),
            UnitState::Pending => "pending".to_string(),
        };
        out.push_str(&format!("{}_{:<32} {state}\n", unit.id, unit.name));
    }
    out
}
