// src/models/review.rs
use crate::error::ApiError;
use crate::models::product::ProductId;
use crate::models::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ReviewId = i64;

/// Star rating, always within 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: i64 = 1;
    pub const MAX: i64 = 5;

    pub fn new(value: i64) -> Result<Self, ApiError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(ApiError::field("rating", "Rating must be between 1 and 5"))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Review {
    pub id: ReviewId,
    pub product: ProductId, // product the review belongs to
    pub user: User,         // author
    pub rating: Rating,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /products/{id}/add_review` and of review updates.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ReviewPayload {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

/// Body of `POST /reviews/`, which names the product explicitly.
#[derive(Deserialize, Debug, Clone)]
pub struct NewReviewPayload {
    pub product: Option<ProductId>,
    pub rating: Option<i64>,
    pub comment: Option<String>,
}

/// Validated replacement values for an existing review.
#[derive(Debug, Clone)]
pub struct ReviewChanges {
    pub rating: Option<Rating>,
    pub comment: Option<String>,
}

impl ReviewPayload {
    /// Rating for a new review; required.
    pub fn required_rating(&self) -> Result<Rating, ApiError> {
        match self.rating {
            Some(value) => Rating::new(value),
            None => Err(ApiError::field("rating", "This field is required.")),
        }
    }

    /// `partial` is false for PUT, where rating must be present.
    pub fn into_changes(self, partial: bool) -> Result<ReviewChanges, ApiError> {
        let rating = match (self.rating, partial) {
            (Some(value), _) => Some(Rating::new(value)?),
            (None, true) => None,
            (None, false) => return Err(ApiError::field("rating", "This field is required.")),
        };
        Ok(ReviewChanges {
            rating,
            comment: self.comment,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ReviewFilter {
    pub product: Option<ProductId>,
}
