//! Status enums for various entities.
//!
//! The backend encodes these as small integers. Unknown codes are kept
//! verbatim so a newer backend never breaks an older client.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Product availability as reported alongside a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum ProductStatus {
    /// Withdrawn from sale (`0`).
    OffShelf,
    /// Listed and purchasable (`1`).
    OnSale,
    /// Any other backend code.
    Other(i64),
}

impl ProductStatus {
    /// Whether the product can currently be checked out.
    #[must_use]
    pub const fn is_purchasable(self) -> bool {
        matches!(self, Self::OnSale)
    }
}

impl From<i64> for ProductStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::OffShelf,
            1 => Self::OnSale,
            other => Self::Other(other),
        }
    }
}

impl From<ProductStatus> for i64 {
    fn from(status: ProductStatus) -> Self {
        match status {
            ProductStatus::OffShelf => 0,
            ProductStatus::OnSale => 1,
            ProductStatus::Other(code) => code,
        }
    }
}

/// Role of the signed-in account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "i64", into = "i64")]
pub enum UserRole {
    /// Regular shopper (`0`).
    #[default]
    Customer,
    /// Store administrator (`1`).
    Admin,
    /// Any other backend code.
    Other(i64),
}

impl From<i64> for UserRole {
    fn from(code: i64) -> Self {
        match code {
            0 => Self::Customer,
            1 => Self::Admin,
            other => Self::Other(other),
        }
    }
}

impl From<UserRole> for i64 {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Customer => 0,
            UserRole::Admin => 1,
            UserRole::Other(code) => code,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
            Self::Other(code) => write!(f, "role {code}"),
        }
    }
}
