use serde::Serialize;

use crate::auth::repo_types::User;
use crate::extract::{Fields, FromFields};

/// Request body for user registration.
#[derive(Debug)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

/// Request body for `/user/token`.
#[derive(Debug)]
pub struct TokenRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl FromFields for RegisterRequest {
    fn from_fields(f: &mut Fields) -> Self {
        Self {
            email: f.string("email"),
            name: f.string("name"),
            password: f.string("password"),
        }
    }
}

impl FromFields for TokenRequest {
    fn from_fields(f: &mut Fields) -> Self {
        Self {
            email: f.string("email"),
            password: f.string("password"),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Partial profile update, absent fields stay as they are.
#[derive(Debug, Default)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub password: Option<String>,
}

impl FromFields for UpdateMeRequest {
    fn from_fields(f: &mut Fields) -> Self {
        Self {
            email: f.string("email"),
            name: f.string("name"),
            password: f.string("password"),
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub email: String,
    pub name: String,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            email: user.email,
            name: user.name,
        }
    }
}
