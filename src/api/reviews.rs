use super::parse_body;
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::models::{NewReviewPayload, Rating, ReviewFilter, ReviewId, ReviewPayload};
use crate::policy::{authorize, Action, Actor, Resource};
use actix_web::{web, HttpResponse};
use log::info;

const ANY_REVIEW: Resource = Resource::Review { author: None };

pub async fn list_reviews(
    db: web::Data<Database>,
    actor: Actor,
    filter: web::Query<ReviewFilter>,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::List, ANY_REVIEW)?;
    let reviews = db.list_reviews(filter.product).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

pub async fn get_review(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ReviewId>,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::Retrieve, ANY_REVIEW)?;
    let review = db.get_review(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(review))
}

pub async fn create_review(
    db: web::Data<Database>,
    actor: Actor,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::Create, ANY_REVIEW)?;
    let author = actor.require_user()?;
    let NewReviewPayload {
        product,
        rating,
        comment,
    } = parse_body(&body)?;

    let product = product.ok_or_else(|| ApiError::field("product", "This field is required."))?;
    let rating = match rating {
        Some(value) => Rating::new(value)?,
        None => return Err(ApiError::field("rating", "This field is required.")),
    };

    match db
        .submit_review(author, product, rating, comment.as_deref().unwrap_or_default())
        .await
    {
        Ok(review) => Ok(HttpResponse::Created().json(review)),
        Err(ApiError::NotFound) => Err(ApiError::field(
            "product",
            format!("Invalid pk \"{}\" - object does not exist.", product),
        )),
        Err(e) => Err(e),
    }
}

async fn update_review(
    db: web::Data<Database>,
    actor: Actor,
    id: ReviewId,
    body: web::Bytes,
    partial: bool,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::Update, ANY_REVIEW)?;
    let existing = db.get_review(id).await?;
    authorize(
        &actor,
        Action::Update,
        Resource::Review {
            author: Some(existing.user.id),
        },
    )?;
    let changes = parse_body::<ReviewPayload>(&body)?.into_changes(partial)?;
    let review = db.update_review(id, &changes).await?;
    info!("[API] Review {} updated", id);
    Ok(HttpResponse::Ok().json(review))
}

pub async fn replace_review(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ReviewId>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    update_review(db, actor, id.into_inner(), body, false).await
}

pub async fn patch_review(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ReviewId>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    update_review(db, actor, id.into_inner(), body, true).await
}

pub async fn delete_review(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ReviewId>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    authorize(&actor, Action::Delete, ANY_REVIEW)?;
    let existing = db.get_review(id).await?;
    authorize(
        &actor,
        Action::Delete,
        Resource::Review {
            author: Some(existing.user.id),
        },
    )?;
    db.delete_review(id).await?;
    info!("[API] Review {} deleted", id);
    Ok(HttpResponse::NoContent().finish())
}
