//! Data models for the custody server

/// Stores a slug-like enum as TEXT, going through its `as_str`/`FromStr` pair.
macro_rules! text_enum_sqlx {
    ($ty:ty) => {
        impl sqlx::Type<sqlx::Postgres> for $ty {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $ty {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s: String = sqlx::Decode::<sqlx::Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl sqlx::Encode<'_, sqlx::Postgres> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub mod asset;
pub mod assignment;
pub mod notification;
pub mod user;

// Re-export commonly used types
pub use asset::{Asset, AssetStatus, AssetType};
pub use assignment::{Assignment, AssignmentStatus, AssignmentTarget, Document, TargetType};
pub use user::{Actor, Role, UserClaims};
