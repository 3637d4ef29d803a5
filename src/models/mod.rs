pub mod product;
pub mod review;
pub mod user;

pub use product::{Product, ProductChanges, ProductId, ProductPayload, ProductSummary};
pub use review::{NewReviewPayload, Rating, Review, ReviewChanges, ReviewFilter, ReviewId, ReviewPayload};
pub use user::{Role, TokenResponse, User, UserId};
