use crate::db::Database;
use crate::error::ApiError;
use crate::policy::Actor;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

const INVALID_TOKEN: &str = "Invalid token.";

/// Pulls the key out of `Token <key>` or `Bearer <key>`.
pub fn parse_authorization(header: &str) -> Result<&str, ApiError> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(key), None)
            if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") =>
        {
            Ok(key)
        }
        _ => Err(ApiError::Authentication(INVALID_TOKEN.into())),
    }
}

impl FromRequest for Actor {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let db = req.app_data::<web::Data<Database>>().cloned();
        let header = req
            .headers()
            .get(AUTHORIZATION)
            .map(|value| value.to_str().map(str::to_owned));

        Box::pin(async move {
            let header = match header {
                None => return Ok(Actor::Anonymous),
                Some(Ok(header)) => header,
                Some(Err(_)) => return Err(ApiError::Authentication(INVALID_TOKEN.into())),
            };
            let key = parse_authorization(&header)?;
            let db = db.ok_or_else(|| ApiError::Internal("database not configured".into()))?;
            match db.user_for_token(key).await? {
                Some(user) => Ok(Actor::Authenticated(user)),
                None => Err(ApiError::Authentication(INVALID_TOKEN.into())),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_token_and_bearer_schemes() {
        assert_eq!(parse_authorization("Token abc123").unwrap(), "abc123");
        assert_eq!(parse_authorization("Bearer abc123").unwrap(), "abc123");
        assert_eq!(parse_authorization("bearer   abc123").unwrap(), "abc123");
    }

    #[test]
    fn rejects_malformed_headers() {
        assert!(parse_authorization("Basic abc123").is_err());
        assert!(parse_authorization("Token").is_err());
        assert!(parse_authorization("Token a b").is_err());
        assert!(parse_authorization("").is_err());
    }
}
