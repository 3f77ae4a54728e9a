//! Asset model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Asset category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Laptop,
    Desktop,
    SystemUnit,
    Monitor,
    Keyboard,
    Mouse,
    Phone,
    Tablet,
    Printer,
    Other,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Laptop => "LAPTOP",
            AssetType::Desktop => "DESKTOP",
            AssetType::SystemUnit => "SYSTEM_UNIT",
            AssetType::Monitor => "MONITOR",
            AssetType::Keyboard => "KEYBOARD",
            AssetType::Mouse => "MOUSE",
            AssetType::Phone => "PHONE",
            AssetType::Tablet => "TABLET",
            AssetType::Printer => "PRINTER",
            AssetType::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LAPTOP" => Ok(AssetType::Laptop),
            "DESKTOP" => Ok(AssetType::Desktop),
            "SYSTEM_UNIT" => Ok(AssetType::SystemUnit),
            "MONITOR" => Ok(AssetType::Monitor),
            "KEYBOARD" => Ok(AssetType::Keyboard),
            "MOUSE" => Ok(AssetType::Mouse),
            "PHONE" => Ok(AssetType::Phone),
            "TABLET" => Ok(AssetType::Tablet),
            "PRINTER" => Ok(AssetType::Printer),
            "OTHER" => Ok(AssetType::Other),
            _ => Err(format!("Invalid asset type: {}", s)),
        }
    }
}

text_enum_sqlx!(AssetType);

/// Asset availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    InStock,
    Assigned,
    InRepair,
    Retired,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::InStock => "IN_STOCK",
            AssetStatus::Assigned => "ASSIGNED",
            AssetStatus::InRepair => "IN_REPAIR",
            AssetStatus::Retired => "RETIRED",
        }
    }

    /// Statuses an administrator sets by hand; ASSIGNED belongs to the lifecycle engine.
    pub fn is_manual(&self) -> bool {
        !matches!(self, AssetStatus::Assigned)
    }

    /// Statuses a freed assignment must not overwrite with IN_STOCK
    pub fn is_sticky(&self) -> bool {
        matches!(self, AssetStatus::InRepair | AssetStatus::Retired)
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "IN_STOCK" => Ok(AssetStatus::InStock),
            "ASSIGNED" => Ok(AssetStatus::Assigned),
            "IN_REPAIR" => Ok(AssetStatus::InRepair),
            "RETIRED" => Ok(AssetStatus::Retired),
            _ => Err(format!("Invalid asset status: {}", s)),
        }
    }
}

text_enum_sqlx!(AssetStatus);

/// Asset record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Asset {
    pub id: i32,
    pub asset_tag: String,
    pub name: String,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub location: Option<String>,
    pub department: Option<String>,
    pub crea_date: DateTime<Utc>,
    pub modif_date: DateTime<Utc>,
}

/// Create asset request (catalog seeding and tests)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAsset {
    #[validate(length(min = 1, message = "Asset tag is required"))]
    pub asset_tag: String,
    #[validate(length(min = 1, message = "Asset name is required"))]
    pub name: String,
    pub asset_type: AssetType,
    pub location: Option<String>,
    pub department: Option<String>,
}

/// Administrative status change request
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAssetStatus {
    pub status: AssetStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_type_parses_wire_names() {
        assert_eq!("system_unit".parse::<AssetType>(), Ok(AssetType::SystemUnit));
        assert_eq!(AssetType::SystemUnit.to_string(), "SYSTEM_UNIT");
        assert!("toaster".parse::<AssetType>().is_err());
    }

    #[test]
    fn repair_and_retired_are_sticky() {
        assert!(AssetStatus::InRepair.is_sticky());
        assert!(AssetStatus::Retired.is_sticky());
        assert!(!AssetStatus::InStock.is_sticky());
        assert!(!AssetStatus::Assigned.is_manual());
    }

    #[test]
    fn status_serializes_screaming_snake() {
        let json = serde_json::to_string(&AssetStatus::InRepair).unwrap();
        assert_eq!(json, "\"IN_REPAIR\"");
    }
}
