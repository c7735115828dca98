/// # Test Utilities Module
///
/// Shared fixtures for the unit tests: an isolated in-memory [`Database`]
/// with a small users/posts schema, plus assertion macros for
/// [`crate::FluentError`] variants.
use crate::core::Result;
use crate::database::Database;
use crate::values;

/// Isolated database test fixture
pub struct DatabaseFixture {
    pub name: String,
    pub db: Database,
}

impl DatabaseFixture {
    /// Create a new in-memory database with no tables
    pub fn new(name: &str) -> Result<Self> {
        Ok(DatabaseFixture {
            name: name.to_string(),
            db: Database::open_in_memory()?,
        })
    }

    /// Create fixture with sample data schema
    pub fn with_sample_data(name: &str) -> Result<Self> {
        let mut fixture = Self::new(name)?;
        fixture.setup_standard_schema()?;
        fixture.populate_sample_data()?;
        Ok(fixture)
    }

    /// Set up standard test schema
    pub fn setup_standard_schema(&mut self) -> Result<()> {
        self.db.connection()?.execute_batch(
            "
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1,
                login_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                published INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );

            CREATE INDEX idx_posts_user_id ON posts (user_id);
        ",
        )?;
        Ok(())
    }

    /// Three users (carol inactive) and three posts (two of alice's published)
    pub fn populate_sample_data(&mut self) -> Result<()> {
        let users = [("alice", true), ("bob", true), ("carol", false)];
        for (username, active) in users {
            self.db.insert(
                "users",
                &values! {
                    "username" => username,
                    "email" => format!("{username}@example.com"),
                    "active" => active,
                },
            )?;
        }

        let posts = [
            (1, "Welcome to Rust", true),
            (2, "My Trip to Paris", false),
            (1, "Fluent Builders", true),
        ];
        for (user_id, title, published) in posts {
            self.db.insert(
                "posts",
                &values! { "user_id" => user_id, "title" => title, "published" => published },
            )?;
        }
        Ok(())
    }
}

/// Asserts that a result failed with the given `FluentError` variant.
#[macro_export]
macro_rules! assert_fluent_error {
    ($result:expr, $variant:ident) => {
        match $result {
            Err($crate::FluentError::$variant { .. }) => {}
            Ok(_) => panic!("Expected {} error but got Ok", stringify!($variant)),
            Err(other) => panic!("Expected {} but got {:?}", stringify!($variant), other),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FluentError, Value};

    #[test]
    fn test_database_fixture_creation() {
        let fixture = DatabaseFixture::new("test_create").unwrap();
        assert_eq!(fixture.name, "test_create");
        assert!(fixture.db.ping().unwrap());
    }

    #[test]
    fn test_sample_data_fixture() {
        let mut fixture = DatabaseFixture::with_sample_data("test_sample").unwrap();

        let tables = fixture
            .db
            .raw_query_value(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = ?",
                &[Value::from("table")],
            )
            .unwrap();
        // users, posts and sqlite_sequence
        assert_eq!(tables.and_then(|v| v.as_i64()), Some(3));

        let posts = fixture.db.raw_query_value("SELECT COUNT(*) FROM posts", &[]).unwrap();
        assert_eq!(posts.and_then(|v| v.as_i64()), Some(3));
    }

    #[test]
    fn test_assert_fluent_error_macro() {
        let result: Result<()> = Err(FluentError::ConnectionNotFound("x".to_string()));
        assert_fluent_error!(result, ConnectionNotFound);

        let result: Result<()> = Err(FluentError::BindMismatch {
            placeholders: 1,
            params: 0,
        });
        assert_fluent_error!(result, BindMismatch);
    }
}
