use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};

use crate::filters::RecipeQuery;
use crate::media::media_url;
use crate::models::*;

/// Async-safe handle to the pantry database.
///
/// Wraps `PantryDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<PantryDb>>,
}

impl DbHandle {
    pub fn new(db: PantryDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PantryDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Used by the seeding
    /// commands and tests; must NOT be called from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, PantryDb>> {
        self.inner
            .lock()
            .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))
    }
}

pub struct PantryDb {
    conn: Connection,
}

impl PantryDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    email TEXT NOT NULL UNIQUE,
                    username TEXT NOT NULL UNIQUE,
                    first_name TEXT NOT NULL,
                    last_name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'user',
                    date_joined TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS auth_tokens (
                    token TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS ingredients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    measurement_unit TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tags (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    color TEXT NOT NULL DEFAULT '#010101',
                    slug TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    image TEXT,
                    text TEXT NOT NULL,
                    cooking_time INTEGER NOT NULL,
                    pub_date TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS recipe_tags (
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
                    UNIQUE(recipe_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS ingredient_amounts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ingredient_id INTEGER NOT NULL REFERENCES ingredients(id) ON DELETE CASCADE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    amount INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS favorites (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    UNIQUE(user_id, recipe_id)
                );

                CREATE TABLE IF NOT EXISTS shopping_cart (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    recipe_id INTEGER NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
                    UNIQUE(user_id, recipe_id)
                );

                CREATE TABLE IF NOT EXISTS subscriptions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    UNIQUE(user_id, author_id)
                );

                CREATE INDEX IF NOT EXISTS idx_recipes_pub_date ON recipes(pub_date);
                CREATE INDEX IF NOT EXISTS idx_recipes_author ON recipes(author_id);
                CREATE INDEX IF NOT EXISTS idx_ingredient_amounts_recipe ON ingredient_amounts(recipe_id);
                CREATE INDEX IF NOT EXISTS idx_ingredients_name ON ingredients(name);
                CREATE INDEX IF NOT EXISTS idx_favorites_user ON favorites(user_id);
                CREATE INDEX IF NOT EXISTS idx_shopping_cart_user ON shopping_cart(user_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// RFC 3339 UTC timestamp used for inserted rows. Sub-second
    /// precision keeps same-second recipes ordered.
    fn now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub fn create_user(
        &self,
        email: &str,
        username: &str,
        first_name: &str,
        last_name: &str,
        password_hash: &str,
        role: &UserRole,
    ) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (email, username, first_name, last_name, password_hash, role, date_joined)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![email, username, first_name, last_name, password_hash, role.as_str(), Self::now()],
            )
            .context("Failed to insert user")?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, email, username, first_name, last_name, password_hash, role, date_joined
                 FROM users WHERE id = ?1",
            )
            .context("Failed to prepare get_user")?;
        let mut rows = stmt
            .query_map(params![id], user_row)
            .context("Failed to query user")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read user row")?.into_user()?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, email, username, first_name, last_name, password_hash, role, date_joined
                 FROM users WHERE email = ?1",
            )
            .context("Failed to prepare get_user_by_email")?;
        let mut rows = stmt
            .query_map(params![email], user_row)
            .context("Failed to query user by email")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read user row")?.into_user()?)),
            None => Ok(None),
        }
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .context("Failed to check email")
    }

    pub fn username_taken(&self, username: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .context("Failed to check username")
    }

    pub fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, email, username, first_name, last_name, password_hash, role, date_joined
                 FROM users ORDER BY username, email LIMIT ?1 OFFSET ?2",
            )
            .context("Failed to prepare list_users")?;
        let rows = stmt
            .query_map(params![limit, offset], user_row)
            .context("Failed to query users")?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row.context("Failed to read user row")?.into_user()?);
        }
        Ok(users)
    }

    pub fn count_users(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")
    }

    pub fn set_password_hash(&self, user_id: i64, password_hash: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, user_id],
            )
            .context("Failed to update password")?;
        Ok(())
    }

    /// Public representation of a user with `is_subscribed` resolved
    /// against the viewer (false when anonymous).
    pub fn profile_for(&self, user: &User, viewer: Option<i64>) -> Result<Profile> {
        let is_subscribed = match viewer {
            Some(viewer_id) => self.is_subscribed(viewer_id, user.id)?,
            None => false,
        };
        Ok(Profile {
            email: user.email.clone(),
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed,
        })
    }

    // ── Auth tokens ───────────────────────────────────────────────────

    pub fn insert_token(&self, token: &str, user_id: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO auth_tokens (token, user_id) VALUES (?1, ?2)",
                params![token, user_id],
            )
            .context("Failed to insert auth token")?;
        Ok(())
    }

    pub fn user_by_token(&self, token: &str) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash, u.role, u.date_joined
                 FROM users u JOIN auth_tokens t ON t.user_id = u.id WHERE t.token = ?1",
            )
            .context("Failed to prepare user_by_token")?;
        let mut rows = stmt
            .query_map(params![token], user_row)
            .context("Failed to query token")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read user row")?.into_user()?)),
            None => Ok(None),
        }
    }

    pub fn delete_token(&self, token: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])
            .context("Failed to delete auth token")?;
        Ok(count > 0)
    }

    // ── Subscriptions ─────────────────────────────────────────────────

    pub fn is_subscribed(&self, user_id: i64, author_id: i64) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM subscriptions WHERE user_id = ?1 AND author_id = ?2",
                params![user_id, author_id],
                |row| row.get(0),
            )
            .context("Failed to check subscription")
    }

    pub fn add_subscription(&self, user_id: i64, author_id: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO subscriptions (user_id, author_id) VALUES (?1, ?2)",
                params![user_id, author_id],
            )
            .context("Failed to insert subscription")?;
        Ok(())
    }

    pub fn remove_subscription(&self, user_id: i64, author_id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM subscriptions WHERE user_id = ?1 AND author_id = ?2",
                params![user_id, author_id],
            )
            .context("Failed to delete subscription")?;
        Ok(count > 0)
    }

    pub fn list_subscribed_authors(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.password_hash, u.role, u.date_joined
                 FROM users u JOIN subscriptions s ON s.author_id = u.id
                 WHERE s.user_id = ?1 ORDER BY u.username, u.email LIMIT ?2 OFFSET ?3",
            )
            .context("Failed to prepare list_subscribed_authors")?;
        let rows = stmt
            .query_map(params![user_id, limit, offset], user_row)
            .context("Failed to query subscribed authors")?;
        let mut authors = Vec::new();
        for row in rows {
            authors.push(row.context("Failed to read user row")?.into_user()?);
        }
        Ok(authors)
    }

    pub fn count_subscribed_authors(&self, user_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .context("Failed to count subscriptions")
    }

    pub fn recipes_by_author(&self, author_id: i64, limit: Option<i64>) -> Result<Vec<ShortRecipe>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, image, cooking_time FROM recipes
                 WHERE author_id = ?1 ORDER BY pub_date DESC, id DESC LIMIT ?2",
            )
            .context("Failed to prepare recipes_by_author")?;
        let rows = stmt
            .query_map(params![author_id, limit.unwrap_or(-1)], |row| {
                Ok(ShortRecipe {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    image: row.get::<_, Option<String>>(2)?,
                    cooking_time: row.get(3)?,
                })
            })
            .context("Failed to query author recipes")?;
        let mut recipes = Vec::new();
        for row in rows {
            let mut r = row.context("Failed to read recipe row")?;
            r.image = r.image.map(|p| media_url(&p));
            recipes.push(r);
        }
        Ok(recipes)
    }

    pub fn count_recipes_by_author(&self, author_id: i64) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM recipes WHERE author_id = ?1",
                params![author_id],
                |row| row.get(0),
            )
            .context("Failed to count author recipes")
    }

    // ── Tags ──────────────────────────────────────────────────────────

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color, slug FROM tags ORDER BY name")
            .context("Failed to prepare list_tags")?;
        let rows = stmt
            .query_map([], tag_row)
            .context("Failed to query tags")?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row.context("Failed to read tag row")?);
        }
        Ok(tags)
    }

    pub fn get_tag(&self, id: i64) -> Result<Option<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color, slug FROM tags WHERE id = ?1")
            .context("Failed to prepare get_tag")?;
        let mut rows = stmt
            .query_map(params![id], tag_row)
            .context("Failed to query tag")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read tag row")?)),
            None => Ok(None),
        }
    }

    pub fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color, slug FROM tags WHERE slug = ?1")
            .context("Failed to prepare tag_by_slug")?;
        let mut rows = stmt
            .query_map(params![slug], tag_row)
            .context("Failed to query tag by slug")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read tag row")?)),
            None => Ok(None),
        }
    }

    pub fn create_tag(&self, name: &str, color: &str, slug: &str) -> Result<Tag> {
        self.conn
            .execute(
                "INSERT INTO tags (name, color, slug) VALUES (?1, ?2, ?3)",
                params![name, color, slug],
            )
            .context("Failed to insert tag")?;
        let id = self.conn.last_insert_rowid();
        self.get_tag(id)?.context("Tag not found after insert")
    }

    /// Ids from `ids` that do not exist in the tags table.
    pub fn missing_tag_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut missing = Vec::new();
        for id in ids {
            let exists: bool = self
                .conn
                .query_row("SELECT COUNT(*) > 0 FROM tags WHERE id = ?1", params![id], |row| {
                    row.get(0)
                })
                .context("Failed to check tag id")?;
            if !exists {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    // ── Ingredients ───────────────────────────────────────────────────

    /// List ingredients ordered by name, optionally narrowed by a
    /// case-insensitive prefix-or-substring match on the name.
    pub fn list_ingredients(&self, name_query: Option<&str>) -> Result<Vec<Ingredient>> {
        let mut stmt;
        let rows = match name_query {
            Some(term) if !term.is_empty() => {
                stmt = self
                    .conn
                    .prepare(
                        "SELECT id, name, measurement_unit FROM ingredients
                         WHERE name LIKE ?1 OR name LIKE ?2 ORDER BY name",
                    )
                    .context("Failed to prepare ingredient search")?;
                stmt.query_map(
                    params![format!("{}%", term), format!("%{}%", term)],
                    ingredient_row,
                )
            }
            _ => {
                stmt = self
                    .conn
                    .prepare("SELECT id, name, measurement_unit FROM ingredients ORDER BY name")
                    .context("Failed to prepare list_ingredients")?;
                stmt.query_map([], ingredient_row)
            }
        }
        .context("Failed to query ingredients")?;
        let mut ingredients = Vec::new();
        for row in rows {
            ingredients.push(row.context("Failed to read ingredient row")?);
        }
        Ok(ingredients)
    }

    pub fn get_ingredient(&self, id: i64) -> Result<Option<Ingredient>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, measurement_unit FROM ingredients WHERE id = ?1")
            .context("Failed to prepare get_ingredient")?;
        let mut rows = stmt
            .query_map(params![id], ingredient_row)
            .context("Failed to query ingredient")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read ingredient row")?)),
            None => Ok(None),
        }
    }

    pub fn find_ingredient(&self, name: &str, measurement_unit: &str) -> Result<Option<Ingredient>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, measurement_unit FROM ingredients
                 WHERE name = ?1 AND measurement_unit = ?2",
            )
            .context("Failed to prepare find_ingredient")?;
        let mut rows = stmt
            .query_map(params![name, measurement_unit], ingredient_row)
            .context("Failed to query ingredient")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read ingredient row")?)),
            None => Ok(None),
        }
    }

    pub fn create_ingredient(&self, name: &str, measurement_unit: &str) -> Result<Ingredient> {
        self.conn
            .execute(
                "INSERT INTO ingredients (name, measurement_unit) VALUES (?1, ?2)",
                params![name, measurement_unit],
            )
            .context("Failed to insert ingredient")?;
        let id = self.conn.last_insert_rowid();
        self.get_ingredient(id)?
            .context("Ingredient not found after insert")
    }

    /// Ids from `ids` that do not exist in the ingredients table.
    pub fn missing_ingredient_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut missing = Vec::new();
        for id in ids {
            let exists: bool = self
                .conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM ingredients WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .context("Failed to check ingredient id")?;
            if !exists {
                missing.push(*id);
            }
        }
        Ok(missing)
    }

    // ── Recipes ───────────────────────────────────────────────────────

    pub fn create_recipe(
        &self,
        author_id: i64,
        name: &str,
        image: Option<&str>,
        text: &str,
        cooking_time: i64,
        tag_ids: &[i64],
        ingredients: &[IngredientAmountInput],
    ) -> Result<Recipe> {
        // unchecked_transaction is safe here: DbHandle's Mutex already
        // guarantees single-threaded access to the connection.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO recipes (author_id, name, image, text, cooking_time, pub_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![author_id, name, image, text, cooking_time, Self::now()],
        )
        .context("Failed to insert recipe")?;
        let id = tx.last_insert_rowid();
        for tag_id in tag_ids {
            tx.execute(
                "INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)",
                params![id, tag_id],
            )
            .context("Failed to attach tag")?;
        }
        for item in ingredients {
            tx.execute(
                "INSERT INTO ingredient_amounts (ingredient_id, recipe_id, amount) VALUES (?1, ?2, ?3)",
                params![item.id, id, item.amount],
            )
            .context("Failed to attach ingredient")?;
        }
        tx.commit().context("Failed to commit recipe insert")?;
        self.get_recipe(id)?.context("Recipe not found after insert")
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_recipe(
        &self,
        id: i64,
        name: Option<&str>,
        image: Option<&str>,
        text: Option<&str>,
        cooking_time: Option<i64>,
        tag_ids: Option<&[i64]>,
        ingredients: Option<&[IngredientAmountInput]>,
    ) -> Result<Recipe> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(n) = name {
            tx.execute("UPDATE recipes SET name = ?1 WHERE id = ?2", params![n, id])
                .context("Failed to update recipe name")?;
        }
        if let Some(img) = image {
            tx.execute("UPDATE recipes SET image = ?1 WHERE id = ?2", params![img, id])
                .context("Failed to update recipe image")?;
        }
        if let Some(t) = text {
            tx.execute("UPDATE recipes SET text = ?1 WHERE id = ?2", params![t, id])
                .context("Failed to update recipe text")?;
        }
        if let Some(ct) = cooking_time {
            tx.execute(
                "UPDATE recipes SET cooking_time = ?1 WHERE id = ?2",
                params![ct, id],
            )
            .context("Failed to update cooking time")?;
        }
        // The tag and ingredient sets are replaced wholesale when given.
        if let Some(tags) = tag_ids {
            tx.execute("DELETE FROM recipe_tags WHERE recipe_id = ?1", params![id])
                .context("Failed to clear tags")?;
            for tag_id in tags {
                tx.execute(
                    "INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) VALUES (?1, ?2)",
                    params![id, tag_id],
                )
                .context("Failed to attach tag")?;
            }
        }
        if let Some(items) = ingredients {
            tx.execute(
                "DELETE FROM ingredient_amounts WHERE recipe_id = ?1",
                params![id],
            )
            .context("Failed to clear ingredients")?;
            for item in items {
                tx.execute(
                    "INSERT INTO ingredient_amounts (ingredient_id, recipe_id, amount) VALUES (?1, ?2, ?3)",
                    params![item.id, id, item.amount],
                )
                .context("Failed to attach ingredient")?;
            }
        }
        tx.commit().context("Failed to commit recipe update")?;
        self.get_recipe(id)?.context("Recipe not found after update")
    }

    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])
            .context("Failed to delete recipe")?;
        Ok(count > 0)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, author_id, name, image, text, cooking_time, pub_date
                 FROM recipes WHERE id = ?1",
            )
            .context("Failed to prepare get_recipe")?;
        let mut rows = stmt
            .query_map(params![id], recipe_row)
            .context("Failed to query recipe")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read recipe row")?)),
            None => Ok(None),
        }
    }

    /// Full representation with nested tags, author, ingredients, and
    /// viewer-scoped flags.
    pub fn recipe_detail(&self, id: i64, viewer: Option<i64>) -> Result<Option<RecipeDetail>> {
        match self.get_recipe(id)? {
            Some(recipe) => Ok(Some(self.assemble_detail(recipe, viewer)?)),
            None => Ok(None),
        }
    }

    pub fn list_recipes(
        &self,
        query: &RecipeQuery,
        viewer: Option<i64>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<RecipeDetail>> {
        let (where_sql, mut values) = query.to_sql(viewer);
        let sql = format!(
            "SELECT id, author_id, name, image, text, cooking_time, pub_date
             FROM recipes{} ORDER BY pub_date DESC, id DESC LIMIT ? OFFSET ?",
            where_sql
        );
        values.push(Value::from(limit));
        values.push(Value::from(offset));
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare list_recipes")?;
        let rows = stmt
            .query_map(params_from_iter(values), recipe_row)
            .context("Failed to query recipes")?;
        let mut recipes = Vec::new();
        for row in rows {
            let recipe = row.context("Failed to read recipe row")?;
            recipes.push(self.assemble_detail(recipe, viewer)?);
        }
        Ok(recipes)
    }

    pub fn count_recipes(&self, query: &RecipeQuery, viewer: Option<i64>) -> Result<i64> {
        let (where_sql, values) = query.to_sql(viewer);
        let sql = format!("SELECT COUNT(*) FROM recipes{}", where_sql);
        self.conn
            .query_row(&sql, params_from_iter(values), |row| row.get(0))
            .context("Failed to count recipes")
    }

    fn assemble_detail(&self, recipe: Recipe, viewer: Option<i64>) -> Result<RecipeDetail> {
        let tags = self.tags_for_recipe(recipe.id)?;
        let ingredients = self.ingredients_for_recipe(recipe.id)?;
        let author = self
            .get_user(recipe.author_id)?
            .context("Recipe author missing")?;
        let author = self.profile_for(&author, viewer)?;
        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(user_id) => (
                self.has_favorite(user_id, recipe.id)?,
                self.has_cart_item(user_id, recipe.id)?,
            ),
            None => (false, false),
        };
        Ok(RecipeDetail {
            id: recipe.id,
            tags,
            author,
            ingredients,
            is_favorited,
            is_in_shopping_cart,
            name: recipe.name,
            image: recipe.image.map(|p| media_url(&p)),
            text: recipe.text,
            cooking_time: recipe.cooking_time,
        })
    }

    fn tags_for_recipe(&self, recipe_id: i64) -> Result<Vec<Tag>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT t.id, t.name, t.color, t.slug FROM tags t
                 JOIN recipe_tags rt ON rt.tag_id = t.id
                 WHERE rt.recipe_id = ?1 ORDER BY t.name",
            )
            .context("Failed to prepare tags_for_recipe")?;
        let rows = stmt
            .query_map(params![recipe_id], tag_row)
            .context("Failed to query recipe tags")?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(row.context("Failed to read tag row")?);
        }
        Ok(tags)
    }

    fn ingredients_for_recipe(&self, recipe_id: i64) -> Result<Vec<RecipeIngredient>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT i.id, i.name, i.measurement_unit, ia.amount
                 FROM ingredient_amounts ia JOIN ingredients i ON i.id = ia.ingredient_id
                 WHERE ia.recipe_id = ?1 ORDER BY ia.amount DESC, i.name",
            )
            .context("Failed to prepare ingredients_for_recipe")?;
        let rows = stmt
            .query_map(params![recipe_id], |row| {
                Ok(RecipeIngredient {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    measurement_unit: row.get(2)?,
                    amount: row.get(3)?,
                })
            })
            .context("Failed to query recipe ingredients")?;
        let mut ingredients = Vec::new();
        for row in rows {
            ingredients.push(row.context("Failed to read ingredient row")?);
        }
        Ok(ingredients)
    }

    /// Write-shaped view for create/update responses: related objects by id.
    pub fn recipe_write_view(&self, id: i64) -> Result<RecipeWriteView> {
        let recipe = self.get_recipe(id)?.context("Recipe not found")?;
        let mut stmt = self
            .conn
            .prepare("SELECT tag_id FROM recipe_tags WHERE recipe_id = ?1 ORDER BY tag_id")
            .context("Failed to prepare tag ids")?;
        let tag_rows = stmt
            .query_map(params![id], |row| row.get::<_, i64>(0))
            .context("Failed to query tag ids")?;
        let mut tags = Vec::new();
        for row in tag_rows {
            tags.push(row.context("Failed to read tag id")?);
        }
        let mut stmt = self
            .conn
            .prepare(
                "SELECT ingredient_id, amount FROM ingredient_amounts
                 WHERE recipe_id = ?1 ORDER BY amount DESC, ingredient_id",
            )
            .context("Failed to prepare ingredient inputs")?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(IngredientAmountInput {
                    id: row.get(0)?,
                    amount: row.get(1)?,
                })
            })
            .context("Failed to query ingredient inputs")?;
        let mut ingredients = Vec::new();
        for row in rows {
            ingredients.push(row.context("Failed to read ingredient input")?);
        }
        Ok(RecipeWriteView {
            id: recipe.id,
            author: recipe.author_id,
            name: recipe.name,
            image: recipe.image.map(|p| media_url(&p)),
            text: recipe.text,
            ingredients,
            tags,
            cooking_time: recipe.cooking_time,
            pub_date: recipe.pub_date,
        })
    }

    // ── Favorites ─────────────────────────────────────────────────────

    pub fn has_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM favorites WHERE user_id = ?1 AND recipe_id = ?2",
                params![user_id, recipe_id],
                |row| row.get(0),
            )
            .context("Failed to check favorite")
    }

    pub fn add_favorite(&self, user_id: i64, recipe_id: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO favorites (user_id, recipe_id) VALUES (?1, ?2)",
                params![user_id, recipe_id],
            )
            .context("Failed to insert favorite")?;
        Ok(())
    }

    pub fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM favorites WHERE user_id = ?1 AND recipe_id = ?2",
                params![user_id, recipe_id],
            )
            .context("Failed to delete favorite")?;
        Ok(count > 0)
    }

    // ── Shopping cart ─────────────────────────────────────────────────

    pub fn has_cart_item(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM shopping_cart WHERE user_id = ?1 AND recipe_id = ?2",
                params![user_id, recipe_id],
                |row| row.get(0),
            )
            .context("Failed to check cart item")
    }

    pub fn add_cart_item(&self, user_id: i64, recipe_id: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO shopping_cart (user_id, recipe_id) VALUES (?1, ?2)",
                params![user_id, recipe_id],
            )
            .context("Failed to insert cart item")?;
        Ok(())
    }

    pub fn remove_cart_item(&self, user_id: i64, recipe_id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "DELETE FROM shopping_cart WHERE user_id = ?1 AND recipe_id = ?2",
                params![user_id, recipe_id],
            )
            .context("Failed to delete cart item")?;
        Ok(count > 0)
    }

    /// Every (name, unit, amount) ingredient row reachable through the
    /// user's shopping cart, unaggregated. Summing happens in
    /// `shopping::aggregate`.
    pub fn cart_ingredient_rows(&self, user_id: i64) -> Result<Vec<(String, String, i64)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT i.name, i.measurement_unit, ia.amount
                 FROM ingredient_amounts ia
                 JOIN ingredients i ON i.id = ia.ingredient_id
                 WHERE ia.recipe_id IN (SELECT recipe_id FROM shopping_cart WHERE user_id = ?1)",
            )
            .context("Failed to prepare cart_ingredient_rows")?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .context("Failed to query cart ingredients")?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row.context("Failed to read cart ingredient row")?);
        }
        Ok(items)
    }
}

// ── Internal row helpers ──────────────────────────────────────────────

/// Intermediate row struct for reading users before parsing the role.
struct UserRow {
    id: i64,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    password_hash: String,
    role: String,
    date_joined: String,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        let role = UserRole::from_str(&self.role)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse user role")?;
        Ok(User {
            id: self.id,
            email: self.email,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            password_hash: self.password_hash,
            role,
            date_joined: self.date_joined,
        })
    }
}

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        password_hash: row.get(5)?,
        role: row.get(6)?,
        date_joined: row.get(7)?,
    })
}

fn tag_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        slug: row.get(3)?,
    })
}

fn ingredient_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Ingredient> {
    Ok(Ingredient {
        id: row.get(0)?,
        name: row.get(1)?,
        measurement_unit: row.get(2)?,
    })
}

fn recipe_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        author_id: row.get(1)?,
        name: row.get(2)?,
        image: row.get(3)?,
        text: row.get(4)?,
        cooking_time: row.get(5)?,
        pub_date: row.get(6)?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────
