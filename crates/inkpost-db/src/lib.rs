pub mod migrations;
pub mod schema;
pub mod seed;
pub mod store;

pub use migrations::{ApplyReport, MigrationUnit, Migrator, RevertOutcome, UnitState, UnitStatus};
pub use seed::{BlogSeeder, Seeder, SeederRunner, UserSeeder};
pub use store::{SqliteStore, Store};
