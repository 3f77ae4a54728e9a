//! Identity types: roles, JWT claims and the acting user

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::AppError;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "staff" => Ok(Role::Staff),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

text_enum_sqlx!(Role);

/// Staff directory entry; `user_id` is the linked account that receives custody
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Staff {
    pub id: i32,
    pub full_name: String,
    pub department: Option<String>,
    pub user_id: Option<i32>,
}

/// The user on whose behalf an operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub role: Role,
}

impl Actor {
    pub fn admin(user_id: i32) -> Self {
        Self { user_id, role: Role::Admin }
    }

    pub fn staff(user_id: i32) -> Self {
        Self { user_id, role: Role::Staff }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require administrator privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Require the actor to be the designated receiver of an assignment
    pub fn require_receiver(&self, assignment_id: i32, receiver: Option<i32>) -> Result<(), AppError> {
        match receiver {
            Some(id) if id == self.user_id => Ok(()),
            Some(_) => Err(AppError::Authorization(format!(
                "User {} is not the receiver of assignment {}",
                self.user_id, assignment_id
            ))),
            None => Err(AppError::Authorization(format!(
                "Assignment {} has no individual receiver",
                assignment_id
            ))),
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            role: self.role,
        }
    }
}
