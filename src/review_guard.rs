use crate::db::{load_review, product_exists, Database};
use crate::error::{ApiError, ApiResult};
use crate::models::{ProductId, Rating, Review, User};
use chrono::Utc;
use log::{debug, info};
use rusqlite::{params, Connection, ErrorCode, TransactionBehavior};

pub const ALREADY_REVIEWED: &str = "You have already reviewed this product";

/// Unknown product first, then an existing review by the same author.
fn check_reviewable(conn: &Connection, author: &User, product: ProductId) -> ApiResult<()> {
    if !product_exists(conn, product)? {
        return Err(ApiError::NotFound);
    }
    let already: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM reviews WHERE product_id = ?1 AND user_id = ?2)",
        params![product, author.id],
        |row| row.get(0),
    )?;
    if already {
        debug!("[GUARD] User {} already reviewed product {}", author.id, product);
        return Err(ApiError::Conflict(ALREADY_REVIEWED.into()));
    }
    Ok(())
}

impl Database {
    /// Fails the way `submit_review` would for a missing product or a repeat review, without
    /// writing anything. Lets callers report those before validating the review body.
    pub async fn ensure_can_review(&self, author: &User, product: ProductId) -> ApiResult<()> {
        let conn = self.conn.lock().await;
        check_reviewable(&conn, author, product)
    }

    /// Creates the single review `author` may hold for `product`.
    ///
    /// The existence check and the insert share one immediate transaction, and the
    /// `UNIQUE (product_id, user_id)` index rejects anything that slips past it.
    pub async fn submit_review(
        &self,
        author: &User,
        product: ProductId,
        rating: Rating,
        comment: &str,
    ) -> ApiResult<Review> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        check_reviewable(&tx, author, product)?;

        let now = Utc::now();
        let inserted = tx.execute(
            "INSERT INTO reviews (product_id, user_id, rating, comment, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![product, author.id, rating.value(), comment, now],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(ApiError::Conflict(ALREADY_REVIEWED.into()));
            }
            Err(e) => return Err(e.into()),
        }

        let review = load_review(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        info!(
            "[GUARD] Review {} stored for product {} by user {}",
            review.id, product, author.id
        );
        Ok(review)
    }
}
