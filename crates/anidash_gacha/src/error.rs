//! # Gacha Error Types
//!
//! All errors that can occur in the gacha economy.

use std::fmt;

use thiserror::Error;

/// The two currencies held by an account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Currency {
    /// Spent one per roll.
    Tokens,
    /// Earned from duplicates, spent on packs, fusion, boosts and enhancements.
    Shards,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tokens => f.write_str("tokens"),
            Self::Shards => f.write_str("shards"),
        }
    }
}

/// Kinds of entity a lookup can miss.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    /// A card in the player's collection.
    Card,
    /// A cosmetic the player would need to own.
    Cosmetic,
    /// A pack definition in the catalog.
    Pack,
    /// A fusion definition in the catalog.
    Fusion,
    /// A catalog card that could be produced by fusion or a guarantee.
    FusionTarget,
    /// Any catalog card a random pull could draw.
    CatalogCard,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Card => "card",
            Self::Cosmetic => "cosmetic",
            Self::Pack => "pack",
            Self::Fusion => "fusion type",
            Self::FusionTarget => "result card",
            Self::CatalogCard => "catalog card",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in the gacha economy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GachaError {
    /// Malformed input; the operation was not attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Not enough tokens or shards for the operation.
    #[error("insufficient {currency}: need {required}, have {available}")]
    InsufficientCurrency {
        /// The currency that ran short.
        currency: Currency,
        /// The amount required.
        required: u64,
        /// The amount available.
        available: u64,
    },

    /// A referenced account, card, pack or fusion target does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of thing was missing.
        entity: Entity,
        /// The identifier that was looked up.
        id: String,
    },

    /// A post-condition failed despite valid input. Always rolled back.
    #[error("bounds violation: {0}")]
    BoundsViolation(String),

    /// The state store failed; nothing was committed.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Invalid configuration file or manifest.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GachaError {
    /// Shorthand for a [`GachaError::NotFound`].
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`GachaError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// True for errors that reject a request and leave the prior state untouched.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InsufficientCurrency { .. } | Self::NotFound { .. }
        )
    }

    /// True for errors the caller may retry as a whole operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type for gacha operations.
pub type GachaResult<T> = Result<T, GachaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(GachaError::validation("bad").is_rejection());
        assert!(GachaError::not_found(Entity::Card, "x").is_rejection());
        assert!(GachaError::InsufficientCurrency {
            currency: Currency::Shards,
            required: 10,
            available: 1,
        }
        .is_rejection());

        let storage = GachaError::Storage("disk gone".to_string());
        assert!(!storage.is_rejection());
        assert!(storage.is_retryable());

        let defect = GachaError::BoundsViolation("tokens".to_string());
        assert!(!defect.is_rejection());
        assert!(!defect.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = GachaError::InsufficientCurrency {
            currency: Currency::Tokens,
            required: 1,
            available: 0,
        };
        assert_eq!(err.to_string(), "insufficient tokens: need 1, have 0");
        assert_eq!(
            GachaError::not_found(Entity::Pack, "neon_pack").to_string(),
            "pack not found: neon_pack"
        );
    }
}
