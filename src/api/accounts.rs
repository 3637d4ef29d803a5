use crate::credentials::PASSWORD_MIN_LEN;
use crate::db::Database;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::models::{Role, TokenResponse};
use crate::policy::Actor;
use actix_web::{web, HttpResponse};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;

const USERNAME_MAX_LEN: usize = 150;
const REQUIRED: &str = "This field is required.";

#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct RegisterRequest {
    pub username: Option<String>,
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
}

/// Present and non-blank, otherwise recorded under `field`.
fn required<'a>(errors: &mut FieldErrors, field: &str, value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Some(v),
        Some(_) => {
            errors.insert(field.into(), vec!["This field may not be blank.".into()]);
            None
        }
        None => {
            errors.insert(field.into(), vec![REQUIRED.into()]);
            None
        }
    }
}

pub async fn login(
    db: web::Data<Database>,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let mut errors = FieldErrors::new();
    let username = required(&mut errors, "username", &body.username);
    let password = required(&mut errors, "password", &body.password);
    let (Some(username), Some(password)) = (username, password) else {
        return Err(ApiError::Validation(errors));
    };

    let user = db.verify_credentials(username, password).await?;
    let token = db.get_or_create_token(user.id).await?;
    info!("[AUTH] {} logged in", user.username);
    Ok(HttpResponse::Ok().json(TokenResponse::new(token, &user)))
}

/// Validates the whole request before anything is written.
fn validate_registration(body: &RegisterRequest) -> ApiResult<(&str, &str)> {
    let mut errors = FieldErrors::new();
    let username = required(&mut errors, "username", &body.username);
    let password = required(&mut errors, "password", &body.password);
    let confirm = required(&mut errors, "password_confirm", &body.password_confirm);

    if let Some(name) = username {
        if name.chars().count() > USERNAME_MAX_LEN {
            errors.insert(
                "username".into(),
                vec![format!(
                    "Ensure this field has no more than {} characters.",
                    USERNAME_MAX_LEN
                )],
            );
        }
    }
    if let Some(pw) = password {
        if pw.chars().count() < PASSWORD_MIN_LEN {
            errors.insert(
                "password".into(),
                vec![format!(
                    "Ensure this field has at least {} characters.",
                    PASSWORD_MIN_LEN
                )],
            );
        }
    }
    if !body.email.is_empty() && !body.email.contains('@') {
        errors.insert("email".into(), vec!["Enter a valid email address.".into()]);
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    match (username, password, confirm) {
        (Some(username), Some(password), Some(confirm)) if password == confirm => {
            Ok((username, password))
        }
        (Some(_), Some(_), Some(_)) => Err(ApiError::non_field("Passwords don't match")),
        _ => Err(ApiError::Validation(errors)),
    }
}

pub async fn register(
    db: web::Data<Database>,
    body: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let (username, password) = validate_registration(&body)?;
    if db.username_taken(username).await? {
        return Err(ApiError::field(
            "username",
            "A user with that username already exists.",
        ));
    }

    let user = db
        .create_user(username, &body.email, password, Role::Regular)
        .await?;
    let token = db.get_or_create_token(user.id).await?;
    Ok(HttpResponse::Created().json(TokenResponse::new(token, &user)))
}

pub async fn logout(db: web::Data<Database>, actor: Actor) -> ApiResult<HttpResponse> {
    let user = actor.require_user()?;
    match db.revoke_token(user.id).await {
        Ok(()) => {
            info!("[AUTH] {} logged out", user.username);
            Ok(HttpResponse::Ok().json(json!({ "message": "Successfully logged out" })))
        }
        Err(e) => {
            warn!("[AUTH] Logout failed for {}: {}", user.username, e);
            Ok(HttpResponse::BadRequest().json(json!({ "error": "Error logging out" })))
        }
    }
}

/// Reads the account back from storage rather than echoing the token's snapshot.
pub async fn profile(db: web::Data<Database>, actor: Actor) -> ApiResult<HttpResponse> {
    let user = db.get_user(actor.require_user()?.id).await?;
    Ok(HttpResponse::Ok().json(user))
}
