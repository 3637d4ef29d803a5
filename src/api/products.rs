use super::parse_body;
use crate::db::Database;
use crate::error::ApiResult;
use crate::models::{ProductId, ProductPayload, ReviewPayload};
use crate::policy::{authorize, Action, Actor, Resource};
use actix_web::{web, HttpResponse};
use log::info;

const ANY_PRODUCT: Resource = Resource::Product { created_by: None };
const ANY_REVIEW: Resource = Resource::Review { author: None };

pub async fn list_products(db: web::Data<Database>, actor: Actor) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::List, ANY_PRODUCT)?;
    let products = db.list_products().await?;
    Ok(HttpResponse::Ok().json(products))
}

pub async fn get_product(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ProductId>,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::Retrieve, ANY_PRODUCT)?;
    let product = db.get_product(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(product))
}

pub async fn create_product(
    db: web::Data<Database>,
    actor: Actor,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::Create, ANY_PRODUCT)?;
    let creator = actor.require_user()?;
    let fields = parse_body::<ProductPayload>(&body)?.validate(false)?;
    let product = db.insert_product(creator, &fields).await?;
    info!(
        "[API] Product {} created by {}",
        product.summary.id, creator.username
    );
    Ok(HttpResponse::Created().json(product))
}

async fn update_product(
    db: web::Data<Database>,
    actor: Actor,
    id: ProductId,
    body: web::Bytes,
    partial: bool,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::Update, ANY_PRODUCT)?;
    let created_by = db.product_owner(id).await?;
    authorize(
        &actor,
        Action::Update,
        Resource::Product {
            created_by: Some(created_by),
        },
    )?;
    let changes = parse_body::<ProductPayload>(&body)?.validate(partial)?;
    let product = db.update_product(id, &changes).await?;
    info!("[API] Product {} updated", id);
    Ok(HttpResponse::Ok().json(product))
}

pub async fn replace_product(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ProductId>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    update_product(db, actor, id.into_inner(), body, false).await
}

pub async fn patch_product(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ProductId>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    update_product(db, actor, id.into_inner(), body, true).await
}

pub async fn delete_product(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ProductId>,
) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    authorize(&actor, Action::Delete, ANY_PRODUCT)?;
    let created_by = db.product_owner(id).await?;
    authorize(
        &actor,
        Action::Delete,
        Resource::Product {
            created_by: Some(created_by),
        },
    )?;
    db.delete_product(id).await?;
    info!("[API] Product {} deleted", id);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn product_reviews(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ProductId>,
) -> ApiResult<HttpResponse> {
    authorize(&actor, Action::List, ANY_REVIEW)?;
    let reviews = db.reviews_for_product(id.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reviews))
}

pub async fn add_review(
    db: web::Data<Database>,
    actor: Actor,
    id: web::Path<ProductId>,
    body: web::Bytes,
) -> ApiResult<HttpResponse> {
    let product = id.into_inner();
    authorize(&actor, Action::Create, ANY_REVIEW)?;
    let author = actor.require_user()?;
    // Unknown product and repeat review are reported before the body is looked at
    db.ensure_can_review(author, product).await?;
    let body = parse_body::<ReviewPayload>(&body)?;
    let rating = body.required_rating()?;
    let review = db
        .submit_review(
            author,
            product,
            rating,
            body.comment.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(HttpResponse::Created().json(review))
}
