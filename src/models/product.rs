// src/models/product.rs
use crate::error::{ApiError, FieldErrors};
use crate::models::review::Review;
use crate::models::user::User;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type ProductId = i64;

pub const NAME_MAX_LEN: usize = 200;
const PRICE_MAX_DIGITS: u32 = 10;
const PRICE_DECIMAL_PLACES: u32 = 2;

/// List view of a product. Rating fields are derived from the review rows at read time.
#[derive(Serialize, Debug, Clone)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub created_by: User, // immutable after creation
    pub average_rating: f64,
    pub total_reviews: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Detail view, with the full review collection nested.
#[derive(Serialize, Debug, Clone)]
pub struct Product {
    #[serde(flatten)]
    pub summary: ProductSummary,
    pub reviews: Vec<Review>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProductPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

/// Fully validated product fields; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

impl ProductPayload {
    /// `partial` is true for PATCH. Create and PUT need name and price.
    pub fn validate(self, partial: bool) -> Result<ProductChanges, ApiError> {
        let mut errors = FieldErrors::new();
        let required = "This field is required.".to_string();

        match &self.name {
            None if !partial => {
                errors.insert("name".into(), vec![required.clone()]);
            }
            Some(name) if name.trim().is_empty() => {
                errors.insert("name".into(), vec!["This field may not be blank.".into()]);
            }
            Some(name) if name.chars().count() > NAME_MAX_LEN => {
                errors.insert(
                    "name".into(),
                    vec![format!(
                        "Ensure this field has no more than {} characters.",
                        NAME_MAX_LEN
                    )],
                );
            }
            _ => {}
        }

        match self.price {
            None if !partial => {
                errors.insert("price".into(), vec![required]);
            }
            Some(price) => {
                if let Err(message) = check_price(price) {
                    errors.insert("price".into(), vec![message]);
                }
            }
            None => {}
        }

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }
        Ok(ProductChanges {
            name: self.name.map(|n| n.trim().to_string()),
            description: self.description,
            price: self.price.map(|p| p.normalize()),
        })
    }
}

fn check_price(price: Decimal) -> Result<(), String> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err("Ensure this value is greater than or equal to 0.".into());
    }
    let normalized = price.normalize();
    if normalized.scale() > PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            PRICE_DECIMAL_PLACES
        ));
    }
    let whole_digits = normalized.trunc().to_string().trim_start_matches('-').len() as u32;
    if whole_digits > PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES {
        return Err(format!(
            "Ensure that there are no more than {} digits in total.",
            PRICE_MAX_DIGITS
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn payload(name: Option<&str>, price: Option<&str>) -> ProductPayload {
        ProductPayload {
            name: name.map(String::from),
            description: None,
            price: price.map(|p| Decimal::from_str(p).unwrap()),
        }
    }

    #[test]
    fn create_requires_name_and_price() {
        match payload(None, None).validate(false) {
            Err(ApiError::Validation(errors)) => {
                assert!(errors.contains_key("name"));
                assert!(errors.contains_key("price"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(payload(None, None).validate(true).is_ok());
    }

    #[test]
    fn price_rules() {
        assert!(payload(Some("Mug"), Some("0")).validate(false).is_ok());
        assert!(payload(Some("Mug"), Some("12.50")).validate(false).is_ok());
        assert!(payload(Some("Mug"), Some("-1")).validate(false).is_err());
        assert!(payload(Some("Mug"), Some("1.999")).validate(false).is_err());
        assert!(payload(Some("Mug"), Some("123456789")).validate(false).is_err());
        assert!(payload(Some("Mug"), Some("12345678.99")).validate(false).is_ok());
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(payload(Some("   "), Some("1")).validate(true).is_err());
    }
}
