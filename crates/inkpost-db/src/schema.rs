//! The blog's schema, as an ordered list of migration units.

use inkpost_common::Result;
use tracing::info;

use crate::migrations::MigrationUnit;
use crate::store::Store;

pub const UNITS: &[MigrationUnit] = &[
    MigrationUnit {
        id: "001",
        name: "create_users_table",
        apply: create_users_table,
        revert: drop_users_table,
    },
    MigrationUnit {
        id: "002",
        name: "create_blogs_table",
        apply: create_blogs_table,
        revert: drop_blogs_table,
    },
    MigrationUnit {
        id: "003",
        name: "add_excerpt_status_to_blogs",
        apply: add_excerpt_and_status,
        revert: remove_excerpt_and_status,
    },
];

fn create_users_table(store: &dyn Store) -> Result<()> {
    store.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('admin', 'author', 'user')),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    info!("users table created");
    Ok(())
}

fn drop_users_table(store: &dyn Store) -> Result<()> {
    store.execute_batch("DROP TABLE IF EXISTS users;")?;
    info!("users table dropped");
    Ok(())
}

fn create_blogs_table(store: &dyn Store) -> Result<()> {
    store.execute_batch(
        "CREATE TABLE IF NOT EXISTS blogs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_blogs_user
            ON blogs(user_id, created_at);",
    )?;
    info!("blogs table created");
    Ok(())
}

fn drop_blogs_table(store: &dyn Store) -> Result<()> {
    store.execute_batch("DROP TABLE IF EXISTS blogs;")?;
    info!("blogs table dropped");
    Ok(())
}

fn add_excerpt_and_status(store: &dyn Store) -> Result<()> {
    // Databases that got these columns by hand before this unit existed.
    let has_excerpt = store.column_exists("blogs", "excerpt")?;
    let has_status = store.column_exists("blogs", "status")?;
    if has_excerpt && has_status {
        info!("excerpt and status columns already exist, skipping");
        return Ok(());
    }

    if !has_excerpt {
        store.execute_batch("ALTER TABLE blogs ADD COLUMN excerpt TEXT;")?;
    }
    if !has_status {
        store.execute_batch("ALTER TABLE blogs ADD COLUMN status TEXT NOT NULL DEFAULT 'draft';")?;
    }
    info!("excerpt and status columns added to blogs table");
    Ok(())
}

fn remove_excerpt_and_status(store: &dyn Store) -> Result<()> {
    for column in ["excerpt", "status"] {
        if store.column_exists("blogs", column)? {
            store.execute_batch(&format!("ALTER TABLE blogs DROP COLUMN {column};"))?;
        }
    }
    info!("excerpt and status columns removed from blogs table");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::Migrator;
    use crate::store::{SqliteStore, Value};

    #[test]
    fn ids_are_zero_padded_and_ascending() {
        let ids: Vec<_> = UNITS.iter().map(|u| u.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert!(ids.iter().all(|id| id.len() == 3));
    }

    #[test]
    fn full_schema_applies_on_empty_database() {
        let store = SqliteStore::in_memory().unwrap();
        Migrator::new(&store, UNITS).unwrap().apply().unwrap();

        assert!(store.table_exists("users").unwrap());
        assert!(store.table_exists("blogs").unwrap());
        assert!(store.column_exists("blogs", "excerpt").unwrap());
        assert!(store.column_exists("blogs", "status").unwrap());
    }

    #[test]
    fn role_is_constrained_and_defaults_to_user() {
        let store = SqliteStore::in_memory().unwrap();
        Migrator::new(&store, UNITS).unwrap().apply().unwrap();

        store
            .execute(
                "INSERT INTO users (name, email, password) VALUES ('A', 'a@example.com', 'x')",
                &[],
            )
            .unwrap();
        let role = store
            .query_scalar("SELECT role FROM users WHERE email = 'a@example.com'", &[])
            .unwrap();
        assert_eq!(role, Some(Value::Text("user".into())));

        let err = store.execute(
            "INSERT INTO users (name, email, password, role) VALUES ('B', 'b@example.com', 'x', 'owner')",
            &[],
        );
        assert!(err.is_err());

        for (i, role) in ["admin", "author"].into_iter().enumerate() {
            store
                .execute(
                    "INSERT INTO users (name, email, password, role) VALUES ('C', ?1, 'x', ?2)",
                    &[
                        Value::Text(format!("c{i}@example.com")),
                        Value::Text(role.to_string()),
                    ],
                )
                .unwrap();
        }
    }

    #[test]
    fn deleting_a_user_cascades_to_posts() {
        let store = SqliteStore::in_memory().unwrap();
        Migrator::new(&store, UNITS).unwrap().apply().unwrap();

        store
            .execute_batch(
                "INSERT INTO users (name, email, password) VALUES ('A', 'a@example.com', 'x');
                 INSERT INTO blogs (title, content, user_id) VALUES ('t', 'c', 1);
                 DELETE FROM users WHERE id = 1;",
            )
            .unwrap();
        let count = store.query_scalar("SELECT COUNT(*) FROM blogs", &[]).unwrap();
        assert_eq!(count, Some(Value::Integer(0)));
    }

    #[test]
    fn excerpt_unit_tolerates_existing_columns() {
        let store = SqliteStore::in_memory().unwrap();
        create_users_table(&store).unwrap();
        create_blogs_table(&store).unwrap();
        store
            .execute_batch("ALTER TABLE blogs ADD COLUMN excerpt TEXT;")
            .unwrap();

        add_excerpt_and_status(&store).unwrap();
        add_excerpt_and_status(&store).unwrap();
        assert!(store.column_exists("blogs", "status").unwrap());

        remove_excerpt_and_status(&store).unwrap();
        assert!(!store.column_exists("blogs", "excerpt").unwrap());
        assert!(!store.column_exists("blogs", "status").unwrap());
        assert!(store.column_exists("blogs", "title").unwrap());
    }
}
