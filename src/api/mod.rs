//! HTTP surface, mounted under `/api`.

pub mod accounts;
pub mod products;
pub mod reviews;

use crate::error::{ApiError, ApiResult};
use actix_web::web;
use serde::de::DeserializeOwned;

/// Decodes a JSON request body. Handlers that check permissions take the raw bytes and call this
/// after `authorize`, so a caller without access never sees a body parsing error.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| ApiError::non_field(format!("JSON parse error - {}", e)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| ApiError::non_field(err.to_string()).into()),
    )
    .app_data(web::PathConfig::default().error_handler(|_, _| ApiError::NotFound.into()))
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _| ApiError::non_field(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .service(
                web::scope("/products")
                    .route("", web::get().to(products::list_products))
                    .route("", web::post().to(products::create_product))
                    .route("/{id}", web::get().to(products::get_product))
                    .route("/{id}", web::put().to(products::replace_product))
                    .route("/{id}", web::patch().to(products::patch_product))
                    .route("/{id}", web::delete().to(products::delete_product))
                    .route("/{id}/reviews", web::get().to(products::product_reviews))
                    .route("/{id}/add_review", web::post().to(products::add_review)),
            )
            .service(
                web::scope("/reviews")
                    .route("", web::get().to(reviews::list_reviews))
                    .route("", web::post().to(reviews::create_review))
                    .route("/{id}", web::get().to(reviews::get_review))
                    .route("/{id}", web::put().to(reviews::replace_review))
                    .route("/{id}", web::patch().to(reviews::patch_review))
                    .route("/{id}", web::delete().to(reviews::delete_review)),
            )
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(accounts::login))
                    .route("/register", web::post().to(accounts::register))
                    .route("/logout", web::post().to(accounts::logout))
                    .route("/profile", web::get().to(accounts::profile)),
            ),
    );
}
