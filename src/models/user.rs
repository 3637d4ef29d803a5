// src/models/user.rs
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

pub type UserId = i64;

/// Role of an account. Staff manage the catalog, regular users write reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Staff,
    Regular,
}

impl Role {
    pub fn from_flag(is_staff: bool) -> Self {
        if is_staff {
            Role::Staff
        } else {
            Role::Regular
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Role::Staff)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub date_joined: DateTime<Utc>,
}

// Public shape: {id, username, email, is_staff}
impl Serialize for User {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("User", 4)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("username", &self.username)?;
        s.serialize_field("email", &self.email)?;
        s.serialize_field("is_staff", &self.role.is_staff())?;
        s.end()
    }
}

/// Response body of login and register.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
}

impl TokenResponse {
    pub fn new(token: String, user: &User) -> Self {
        TokenResponse {
            token,
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_staff: user.role.is_staff(),
        }
    }
}
