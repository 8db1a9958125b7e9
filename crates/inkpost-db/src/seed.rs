//! Sample data for development databases.

use inkpost_common::{Error, Result};
use tracing::{info, warn};

use crate::store::{Store, Value, as_i64};

pub trait Seeder {
    fn name(&self) -> &'static str;

    /// Insert sample rows, skipping ones that already exist. Returns the
    /// number of rows inserted.
    fn seed(&self, store: &dyn Store) -> Result<usize>;

    fn clear(&self, store: &dyn Store) -> Result<()>;
}

/// Runs seeders in registration order, and clears them in reverse so that
/// dependent rows go first.
pub struct SeederRunner<'a> {
    store: &'a dyn Store,
    seeders: Vec<Box<dyn Seeder>>,
}

impl<'a> SeederRunner<'a> {
    pub fn new(store: &'a dyn Store, seeders: Vec<Box<dyn Seeder>>) -> Self {
        Self { store, seeders }
    }

    /// Users first, then their posts.
    pub fn with_defaults(store: &'a dyn Store) -> Self {
        Self::new(
            store,
            vec![Box::new(UserSeeder::default()), Box::new(BlogSeeder)],
        )
    }

    pub fn seed_all(&self) -> Result<usize> {
        info!("running database seeders");
        let mut total = 0;
        for seeder in &self.seeders {
            let inserted = seeder
                .seed(self.store)
                .map_err(|e| Error::Seed(format!("{} seeder failed: {e}", seeder.name())))?;
            info!("{} seeder inserted {inserted} rows", seeder.name());
            total += inserted;
        }
        Ok(total)
    }

    pub fn clear_all(&self) -> Result<()> {
        info!("clearing seeded data");
        for seeder in self.seeders.iter().rev() {
            seeder
                .clear(self.store)
                .map_err(|e| Error::Seed(format!("{} clear failed: {e}", seeder.name())))?;
        }
        Ok(())
    }
}

struct SeedUser {
    name: &'static str,
    email: &'static str,
    password: &'static str,
    role: &'static str,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        name: "Admin User",
        email: "admin@example.com",
        password: "admin123",
        role: "admin",
    },
    SeedUser {
        name: "John Author",
        email: "john@example.com",
        password: "password123",
        role: "author",
    },
    SeedUser {
        name: "Jane User",
        email: "jane@example.com",
        password: "password123",
        role: "user",
    },
    SeedUser {
        name: "Mike Writer",
        email: "mike@example.com",
        password: "password123",
        role: "author",
    },
];

/// Default accounts, one per role. Passwords are stored as bcrypt hashes.
pub struct UserSeeder {
    cost: u32,
}

impl UserSeeder {
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for UserSeeder {
    fn default() -> Self {
        Self::with_cost(bcrypt::DEFAULT_COST)
    }
}

impl Seeder for UserSeeder {
    fn name(&self) -> &'static str {
        "users"
    }

    fn seed(&self, store: &dyn Store) -> Result<usize> {
        require_table(store, "users")?;

        let mut inserted = 0;
        for user in USERS {
            let exists = store
                .query_scalar(
                    "SELECT COUNT(*) FROM users WHERE email = ?1",
                    &[Value::Text(user.email.to_string())],
                )?
                .as_ref()
                .and_then(as_i64)
                .unwrap_or(0)
                > 0;
            if exists {
                info!("user {} already exists, skipping", user.email);
                continue;
            }

            let hash = bcrypt::hash(user.password, self.cost)
                .map_err(|e| Error::Seed(format!("failed to hash password: {e}")))?;
            store.execute(
                "INSERT INTO users (name, email, password, role) VALUES (?1, ?2, ?3, ?4)",
                &[
                    Value::Text(user.name.to_string()),
                    Value::Text(user.email.to_string()),
                    Value::Text(hash),
                    Value::Text(user.role.to_string()),
                ],
            )?;
            info!("created user {} ({})", user.email, user.role);
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Removes every account except admins.
    fn clear(&self, store: &dyn Store) -> Result<()> {
        require_table(store, "users")?;
        let removed = store.execute("DELETE FROM users WHERE role != 'admin'", &[])?;
        info!("removed {removed} users (admins kept)");
        Ok(())
    }
}

struct SeedPost {
    title: &'static str,
    excerpt: &'static str,
    content: &'static str,
    by_first_user: bool,
}

const POSTS: &[SeedPost] = &[
    SeedPost {
        title: "Welcome to the blog",
        excerpt: "What this place is for.",
        content: "This blog collects notes on building small, dependable web services. \
                  Expect posts on schema design, deployment and the occasional war story.",
        by_first_user: true,
    },
    SeedPost {
        title: "Designing a users table",
        excerpt: "Roles, unique emails and timestamps.",
        content: "A users table needs little: a unique email, a password hash, a role and \
                  timestamps. Everything else can wait until a feature asks for it.",
        by_first_user: true,
    },
    SeedPost {
        title: "Migrations you can run twice",
        excerpt: "Tracking applied changes in a table.",
        content: "Recording every applied schema change in a tracking table means a failed \
                  run can simply be repeated once the broken step is fixed.",
        by_first_user: false,
    },
    SeedPost {
        title: "Drafts and published posts",
        excerpt: "Adding a status column after the fact.",
        content: "Posts start as drafts. Adding a status column later is an ALTER TABLE away, \
                  as long as existing rows get a sensible default.",
        by_first_user: false,
    },
    SeedPost {
        title: "Sessions and cookies",
        excerpt: "Keeping users signed in.",
        content: "A signed session cookie holding the user id is enough for a small admin \
                  area. Keep the secret out of the repository.",
        by_first_user: true,
    },
    SeedPost {
        title: "Paginating the dashboard",
        excerpt: "LIMIT, OFFSET and a total count.",
        content: "The admin dashboard lists posts ten at a time and shows aggregate counts \
                  per role and per status next to the table.",
        by_first_user: false,
    },
];

/// Sample posts split between the first and last user by id.
pub struct BlogSeeder;

impl Seeder for BlogSeeder {
    fn name(&self) -> &'static str {
        "blogs"
    }

    fn seed(&self, store: &dyn Store) -> Result<usize> {
        require_table(store, "blogs")?;

        let user_ids: Vec<i64> = store
            .query_rows("SELECT id FROM users ORDER BY id", &[])?
            .iter()
            .filter_map(|row| row.first().and_then(as_i64))
            .collect();
        let (Some(&first), Some(&last)) = (user_ids.first(), user_ids.last()) else {
            return Err(Error::Seed(
                "no users found, seed users before blogs".to_string(),
            ));
        };

        let with_status = store.column_exists("blogs", "status")?;
        if !with_status {
            warn!("blogs table has no status column, posts will be inserted without excerpts");
        }

        let mut inserted = 0;
        for post in POSTS {
            let exists = store
                .query_scalar(
                    "SELECT COUNT(*) FROM blogs WHERE title = ?1",
                    &[Value::Text(post.title.to_string())],
                )?
                .as_ref()
                .and_then(as_i64)
                .unwrap_or(0)
                > 0;
            if exists {
                info!("post {:?} already exists, skipping", post.title);
                continue;
            }

            let author = if post.by_first_user { first } else { last };
            if with_status {
                store.execute(
                    "INSERT INTO blogs (title, content, user_id, excerpt, status)
                     VALUES (?1, ?2, ?3, ?4, 'published')",
                    &[
                        Value::Text(post.title.to_string()),
                        Value::Text(post.content.to_string()),
                        Value::Integer(author),
                        Value::Text(post.excerpt.to_string()),
                    ],
                )?;
            } else {
                store.execute(
                    "INSERT INTO blogs (title, content, user_id) VALUES (?1, ?2, ?3)",
                    &[
                        Value::Text(post.title.to_string()),
                        Value::Text(post.content.to_string()),
                        Value::Integer(author),
                    ],
                )?;
            }
            inserted += 1;
        }
        Ok(inserted)
    }

    fn clear(&self, store: &dyn Store) -> Result<()> {
        require_table(store, "blogs")?;
        let removed = store.execute("DELETE FROM blogs", &[])?;
        info!("removed {removed} posts");
        Ok(())
    }
}

fn require_table(store: &dyn Store, table: &str) -> Result<()> {
    if store.table_exists(table)? {
        Ok(())
    } else {
        Err(Error::Seed(format!(
            "{table} table does not exist, run migrations first"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::Migrator;
    use crate::schema::UNITS;
    use crate::store::SqliteStore;

    fn migrated() -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        Migrator::new(&store, UNITS).unwrap().apply().unwrap();
        store
    }

    fn fast_runner(store: &dyn Store) -> SeederRunner<'_> {
        SeederRunner::new(
            store,
            vec![Box::new(UserSeeder::with_cost(4)), Box::new(BlogSeeder)],
        )
    }

    fn count(store: &dyn Store, sql: &str) -> i64 {
        store
            .query_scalar(sql, &[])
            .unwrap()
            .as_ref()
            .and_then(as_i64)
            .unwrap()
    }

    #[test]
    fn seeds_users_and_posts_once() {
        let store = migrated();
        let runner = fast_runner(&store);

        let first = runner.seed_all().unwrap();
        assert_eq!(first, USERS.len() + POSTS.len());

        let second = runner.seed_all().unwrap();
        assert_eq!(second, 0);

        assert_eq!(count(&store, "SELECT COUNT(*) FROM users"), 4);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM blogs"), 6);
        assert_eq!(
            count(&store, "SELECT COUNT(*) FROM blogs WHERE status = 'published'"),
            6
        );
    }

    #[test]
    fn passwords_are_hashed() {
        let store = migrated();
        UserSeeder::with_cost(4).seed(&store).unwrap();

        let hash = store
            .query_scalar(
                "SELECT password FROM users WHERE email = 'admin@example.com'",
                &[],
            )
            .unwrap();
        let Some(Value::Text(hash)) = hash else {
            panic!("expected a password hash");
        };
        assert_ne!(hash, "admin123");
        assert!(bcrypt::verify("admin123", &hash).unwrap());
    }

    #[test]
    fn clear_keeps_admins_and_drops_posts() {
        let store = migrated();
        let runner = fast_runner(&store);
        runner.seed_all().unwrap();

        runner.clear_all().unwrap();

        assert_eq!(count(&store, "SELECT COUNT(*) FROM blogs"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM users"), 1);
        assert_eq!(
            count(&store, "SELECT COUNT(*) FROM users WHERE role = 'admin'"),
            1
        );
    }

    #[test]
    fn blogs_need_users() {
        let store = migrated();
        let err = BlogSeeder.seed(&store).unwrap_err();
        assert!(err.to_string().contains("no users found"));
    }

    #[test]
    fn seeding_unmigrated_database_fails_with_context() {
        let store = SqliteStore::in_memory().unwrap();
        let err = fast_runner(&store).seed_all().unwrap_err();
        assert!(matches!(err, Error::Seed(_)));
        assert!(err.to_string().contains("users table does not exist"));
    }

    #[test]
    fn posts_without_status_column_still_seed() {
        let store = SqliteStore::in_memory().unwrap();
        Migrator::new(&store, &UNITS[..2]).unwrap().apply().unwrap();

        UserSeeder::with_cost(4).seed(&store).unwrap();
        let inserted = BlogSeeder.seed(&store).unwrap();
        assert_eq!(inserted, POSTS.len());
    }
}
