use crate::error::{ApiError, ApiResult};
use crate::models::{
    Product, ProductChanges, ProductId, ProductSummary, Rating, Review, ReviewChanges, ReviewId,
    Role, User, UserId,
};
use chrono::Utc;
use log::{debug, error};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductPayload;

    // Helper function to create test database
    async fn create_test_db() -> Database {
        let db = Database::new(":memory:").unwrap();
        db.create_schema().await.unwrap();
        db
    }

    async fn staff_and_shopper(db: &Database) -> (User, User) {
        let staff = db
            .create_user("admin", "admin@shop.test", "s3cretpass", Role::Staff)
            .await
            .unwrap();
        let shopper = db
            .create_user("alice", "alice@shop.test", "s3cretpass", Role::Regular)
            .await
            .unwrap();
        (staff, shopper)
    }

    fn mug() -> ProductChanges {
        ProductPayload {
            name: Some("Mug".into()),
            description: Some("Ceramic".into()),
            price: Some(Decimal::from_str("9.99").unwrap()),
        }
        .validate(false)
        .unwrap()
    }

    #[tokio::test]
    async fn test_schema_creation() {
        let db = create_test_db().await;

        let conn = db.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        for table in ["users", "auth_tokens", "products", "reviews"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = create_test_db().await;
        db.create_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_full_product_lifecycle() {
        let db = create_test_db().await;
        let (staff, _) = staff_and_shopper(&db).await;

        let created = db.insert_product(&staff, &mug()).await.unwrap();
        assert_eq!(created.summary.name, "Mug");
        assert_eq!(created.summary.created_by.id, staff.id);
        assert_eq!(created.summary.total_reviews, 0);
        assert_eq!(created.summary.average_rating, 0.0);
        assert!(created.reviews.is_empty());

        let listed = db.list_products().await.unwrap();
        assert_eq!(listed.len(), 1);

        let changes = ProductChanges {
            price: Some(Decimal::from_str("4.50").unwrap()),
            ..Default::default()
        };
        let updated = db.update_product(created.summary.id, &changes).await.unwrap();
        assert_eq!(updated.summary.price, Decimal::from_str("4.5").unwrap());
        assert_eq!(updated.summary.name, "Mug");
        assert_eq!(updated.summary.created_by.id, staff.id);

        db.delete_product(created.summary.id).await.unwrap();
        assert!(matches!(
            db.get_product(created.summary.id).await,
            Err(ApiError::NotFound)
        ));
        assert!(matches!(
            db.delete_product(created.summary.id).await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_average_rating_is_computed_on_read() {
        let db = create_test_db().await;
        let (staff, _) = staff_and_shopper(&db).await;
        let product = db.insert_product(&staff, &mug()).await.unwrap();
        let id = product.summary.id;

        for (i, rating) in [4, 5, 3].into_iter().enumerate() {
            let user = db
                .create_user(&format!("reviewer{}", i), "", "s3cretpass", Role::Regular)
                .await
                .unwrap();
            db.submit_review(&user, id, Rating::new(rating).unwrap(), "")
                .await
                .unwrap();
        }

        let product = db.get_product(id).await.unwrap();
        assert_eq!(product.summary.total_reviews, 3);
        assert_eq!(product.summary.average_rating, 4.0);
        assert_eq!(product.reviews.len(), 3);

        let summary = &db.list_products().await.unwrap()[0];
        assert_eq!(summary.average_rating, 4.0);
    }

    #[tokio::test]
    async fn test_review_listing_and_filtering() {
        let db = create_test_db().await;
        let (staff, shopper) = staff_and_shopper(&db).await;
        let first = db.insert_product(&staff, &mug()).await.unwrap().summary.id;
        let second = db.insert_product(&staff, &mug()).await.unwrap().summary.id;

        db.submit_review(&shopper, first, Rating::new(5).unwrap(), "great")
            .await
            .unwrap();
        db.submit_review(&shopper, second, Rating::new(2).unwrap(), "chipped")
            .await
            .unwrap();

        assert_eq!(db.list_reviews(None).await.unwrap().len(), 2);
        let filtered = db.list_reviews(Some(first)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].comment, "great");
        assert_eq!(db.reviews_for_product(second).await.unwrap()[0].comment, "chipped");
        assert!(matches!(
            db.reviews_for_product(999).await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_review_update_and_delete() {
        let db = create_test_db().await;
        let (staff, shopper) = staff_and_shopper(&db).await;
        let product = db.insert_product(&staff, &mug()).await.unwrap().summary.id;
        let review = db
            .submit_review(&shopper, product, Rating::new(2).unwrap(), "meh")
            .await
            .unwrap();

        let changes = ReviewChanges {
            rating: Some(Rating::new(4).unwrap()),
            comment: None,
        };
        let updated = db.update_review(review.id, &changes).await.unwrap();
        assert_eq!(updated.rating.value(), 4);
        assert_eq!(updated.comment, "meh");
        assert_eq!(db.get_product(product).await.unwrap().summary.average_rating, 4.0);

        db.delete_review(review.id).await.unwrap();
        assert!(matches!(db.get_review(review.id).await, Err(ApiError::NotFound)));
        assert_eq!(db.get_product(product).await.unwrap().summary.total_reviews, 0);
    }

    #[tokio::test]
    async fn test_deleting_product_removes_its_reviews() {
        let db = create_test_db().await;
        let (staff, shopper) = staff_and_shopper(&db).await;
        let product = db.insert_product(&staff, &mug()).await.unwrap().summary.id;
        db.submit_review(&shopper, product, Rating::new(3).unwrap(), "")
            .await
            .unwrap();

        db.delete_product(product).await.unwrap();
        assert!(db.list_reviews(None).await.unwrap().is_empty());
    }
}

// Define a struct to represent a database connection
#[derive(Debug, Clone)]
pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

const USER_COLUMNS: &str = "u.id, u.username, u.email, u.is_staff, u.date_joined";

const PRODUCT_SELECT: &str = "SELECT
        p.id, p.name, p.description, p.price, p.created_at, p.updated_at,
        u.id, u.username, u.email, u.is_staff, u.date_joined,
        COALESCE(AVG(r.rating), 0.0) AS average_rating,
        COUNT(r.id) AS total_reviews
    FROM products p
    JOIN users u ON u.id = p.created_by
    LEFT JOIN reviews r ON r.product_id = p.id";

impl Database {
    // Create a new database connection
    pub fn new(db_path: &str) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!("Database connection established at: {}", db_path);
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    // Create the database schema
    pub async fn create_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self.conn.lock().await;

        // 1. Users table
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL DEFAULT '',
                password_hash TEXT NOT NULL,
                is_staff INTEGER NOT NULL DEFAULT 0,
                date_joined TEXT NOT NULL
            );",
        )
        .map_err(|e| {
            error!("Failed creating users table: {}", e);
            e
        })?;

        // 2. One active token per user
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS auth_tokens (
                key TEXT PRIMARY KEY,
                user_id INTEGER NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );",
        )
        .map_err(|e| {
            error!("Failed creating auth_tokens table: {}", e);
            e
        })?;

        // 3. Products table
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                price TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (created_by) REFERENCES users(id)
            );",
        )
        .map_err(|e| {
            error!("Failed creating products table: {}", e);
            e
        })?;

        // 4. Reviews, at most one per (product, user)
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS reviews (
                id INTEGER PRIMARY KEY,
                product_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                comment TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (product_id, user_id),
                FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );",
        )
        .map_err(|e| {
            error!("Failed creating reviews table: {}", e);
            e
        })?;
        Ok(())
    }

    pub async fn insert_product(&self, creator: &User, fields: &ProductChanges) -> ApiResult<Product> {
        let conn = self.conn.lock().await;
        let now = Utc::now();
        let price = fields.price.unwrap_or_default();
        conn.execute(
            "INSERT INTO products (name, description, price, created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                fields.name.as_deref().unwrap_or_default(),
                fields.description.as_deref().unwrap_or_default(),
                price.to_string(),
                creator.id,
                now
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("[DB] Product {} created by user {}", id, creator.id);
        load_product(&conn, id)
    }

    pub async fn get_product(&self, id: ProductId) -> ApiResult<Product> {
        let conn = self.conn.lock().await;
        load_product(&conn, id)
    }

    // Summaries only; nested reviews are left to the detail view
    pub async fn list_products(&self) -> ApiResult<Vec<ProductSummary>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("{} GROUP BY p.id ORDER BY p.id", PRODUCT_SELECT))?;
        let rows = stmt.query_map([], summary_from_row)?;
        let products = rows.collect::<Result<Vec<_>, _>>()?;
        debug!("[DB] Fetched {} products", products.len());
        Ok(products)
    }

    /// Returns the product owner, used for object-level permission checks.
    pub async fn product_owner(&self, id: ProductId) -> ApiResult<UserId> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT created_by FROM products WHERE id = ?", [id], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or(ApiError::NotFound)
    }

    pub async fn update_product(&self, id: ProductId, changes: &ProductChanges) -> ApiResult<Product> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE products SET
                name = COALESCE(?1, name),
                description = COALESCE(?2, description),
                price = COALESCE(?3, price),
                updated_at = ?4
             WHERE id = ?5",
            params![
                changes.name,
                changes.description,
                changes.price.map(|p| p.to_string()),
                Utc::now(),
                id
            ],
        )?;
        if updated == 0 {
            return Err(ApiError::NotFound);
        }
        let product = load_product(&tx, id)?;
        tx.commit()?;
        debug!("[DB] Product {} updated", id);
        Ok(product)
    }

    pub async fn delete_product(&self, id: ProductId) -> ApiResult<()> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM products WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(ApiError::NotFound);
        }
        debug!("[DB] Product {} deleted", id);
        Ok(())
    }

    /// All reviews, or only those of `product` when given.
    pub async fn list_reviews(&self, product: Option<ProductId>) -> ApiResult<Vec<Review>> {
        let conn = self.conn.lock().await;
        load_reviews(&conn, product)
    }

    /// Reviews of one product; unknown products are a 404, not an empty list.
    pub async fn reviews_for_product(&self, product: ProductId) -> ApiResult<Vec<Review>> {
        let conn = self.conn.lock().await;
        if !product_exists(&conn, product)? {
            return Err(ApiError::NotFound);
        }
        load_reviews(&conn, Some(product))
    }

    pub async fn get_review(&self, id: ReviewId) -> ApiResult<Review> {
        let conn = self.conn.lock().await;
        load_review(&conn, id)
    }

    pub async fn update_review(&self, id: ReviewId, changes: &ReviewChanges) -> ApiResult<Review> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE reviews SET
                rating = COALESCE(?1, rating),
                comment = COALESCE(?2, comment),
                updated_at = ?3
             WHERE id = ?4",
            params![
                changes.rating.map(Rating::value),
                changes.comment,
                Utc::now(),
                id
            ],
        )?;
        if updated == 0 {
            return Err(ApiError::NotFound);
        }
        let review = load_review(&tx, id)?;
        tx.commit()?;
        debug!("[DB] Review {} updated", id);
        Ok(review)
    }

    pub async fn delete_review(&self, id: ReviewId) -> ApiResult<()> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM reviews WHERE id = ?", [id])?;
        if deleted == 0 {
            return Err(ApiError::NotFound);
        }
        debug!("[DB] Review {} deleted", id);
        Ok(())
    }
}

pub(crate) fn product_exists(conn: &Connection, id: ProductId) -> rusqlite::Result<bool> {
    conn.query_row("SELECT EXISTS(SELECT 1 FROM products WHERE id = ?)", [id], |row| {
        row.get(0)
    })
}

fn load_product(conn: &Connection, id: ProductId) -> ApiResult<Product> {
    let summary = conn
        .query_row(
            &format!("{} WHERE p.id = ?1 GROUP BY p.id", PRODUCT_SELECT),
            [id],
            summary_from_row,
        )
        .optional()?
        .ok_or(ApiError::NotFound)?;
    let reviews = load_reviews(conn, Some(id))?;
    Ok(Product { summary, reviews })
}

fn load_reviews(conn: &Connection, product: Option<ProductId>) -> ApiResult<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT r.id, r.product_id, r.rating, r.comment, r.created_at, r.updated_at, {}
         FROM reviews r
         JOIN users u ON u.id = r.user_id
         WHERE (?1 IS NULL OR r.product_id = ?1)
         ORDER BY r.id",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([product], review_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub(crate) fn load_review(conn: &Connection, id: ReviewId) -> ApiResult<Review> {
    conn.query_row(
        &format!(
            "SELECT r.id, r.product_id, r.rating, r.comment, r.created_at, r.updated_at, {}
             FROM reviews r
             JOIN users u ON u.id = r.user_id
             WHERE r.id = ?",
            USER_COLUMNS
        ),
        [id],
        review_from_row,
    )
    .optional()?
    .ok_or(ApiError::NotFound)
}

/// Reads the five user columns starting at `offset`.
pub(crate) fn user_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        email: row.get(offset + 2)?,
        role: Role::from_flag(row.get(offset + 3)?),
        date_joined: row.get(offset + 4)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<ProductSummary> {
    let price: String = row.get(3)?;
    let price = Decimal::from_str(&price)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    Ok(ProductSummary {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        created_by: user_from_row(row, 6)?,
        average_rating: row.get(11)?,
        total_reviews: row.get(12)?,
    })
}

fn review_from_row(row: &Row<'_>) -> rusqlite::Result<Review> {
    let rating: i64 = row.get(2)?;
    let rating =
        Rating::new(rating).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(2, rating))?;
    Ok(Review {
        id: row.get(0)?,
        product: row.get(1)?,
        rating,
        comment: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        user: user_from_row(row, 6)?,
    })
}
