//! Common types for Sendloop

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for bulk send jobs
pub type JobId = Uuid;

/// Unique identifier for newsletter campaigns
pub type CampaignId = Uuid;

/// Unique identifier for recipient lists
pub type RecipientListId = Uuid;

/// Unique identifier for recipients
pub type RecipientId = Uuid;

/// Unique identifier for templates
pub type TemplateId = Uuid;

/// Email address
///
/// Parsing enforces the shape `local@domain.tld`: a single `@`, no
/// whitespace, and a dot inside the domain. Callers normalize (trim,
/// lowercase) before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress {
    pub local: String,
    pub domain: String,
}

impl EmailAddress {
    /// Create a new email address
    pub fn new(local: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            domain: domain.into(),
        }
    }

    /// Parse an email address from a string
    pub fn parse(s: &str) -> Option<Self> {
        let (local, domain) = s.split_once('@')?;
        if local.is_empty() || domain.is_empty() {
            return None;
        }
        if s.chars().any(char::is_whitespace) || domain.contains('@') {
            return None;
        }
        // The domain needs an interior dot: "b.co" passes, "b", ".co" and "co." do not.
        let dot = domain.rfind('.')?;
        if dot == 0 || dot == domain.len() - 1 {
            return None;
        }
        Some(Self::new(local, domain))
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

impl std::str::FromStr for EmailAddress {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| crate::Error::Validation(format!("Invalid email address: {}", s)))
    }
}

/// Content variant assigned to a recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    A,
    B,
    C,
}

impl Variant {
    /// All variants in assignment order
    pub const ALL: [Variant; 3] = [Variant::A, Variant::B, Variant::C];

    /// Round-robin assignment by position
    pub fn from_index(index: usize) -> Self {
        match index % 3 {
            0 => Variant::A,
            1 => Variant::B,
            _ => Variant::C,
        }
    }

    /// Column value for this variant
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::A => "a",
            Variant::B => "b",
            Variant::C => "c",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Variant::A),
            "b" => Ok(Variant::B),
            "c" => Ok(Variant::C),
            _ => Err(format!("Invalid variant: {}", s)),
        }
    }
}

/// Timestamp wrapper
pub type Timestamp = DateTime<Utc>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_email_address_parse() {
        let email = EmailAddress::parse("user@example.com").unwrap();
        assert_eq!(email.local, "user");
        assert_eq!(email.domain, "example.com");
        assert_eq!(email.to_string(), "user@example.com");

        assert!(EmailAddress::parse("a@b.co").is_some());
        assert!(EmailAddress::parse("first.last@sub.example.co.uk").is_some());
    }

    #[test]
    fn test_email_address_invalid() {
        assert!(EmailAddress::parse("plainstring").is_none());
        assert!(EmailAddress::parse("a@b").is_none());
        assert!(EmailAddress::parse("@example.com").is_none());
        assert!(EmailAddress::parse("user@").is_none());
        assert!(EmailAddress::parse("a@.co").is_none());
        assert!(EmailAddress::parse("a@co.").is_none());
        assert!(EmailAddress::parse("a b@example.com").is_none());
        assert!(EmailAddress::parse("a@b@c.com").is_none());
        assert!(EmailAddress::parse(" a@b.co").is_none());
    }

    #[test]
    fn test_variant_from_index() {
        assert_eq!(Variant::from_index(0), Variant::A);
        assert_eq!(Variant::from_index(1), Variant::B);
        assert_eq!(Variant::from_index(2), Variant::C);
        assert_eq!(Variant::from_index(3), Variant::A);
        assert_eq!(Variant::from_index(10), Variant::B);
    }

    #[test]
    fn test_variant_roundtrip() {
        for v in Variant::ALL {
            assert_eq!(v.as_str().parse::<Variant>().unwrap(), v);
        }
        assert!("d".parse::<Variant>().is_err());
        assert!("A".parse::<Variant>().is_err());
    }
}
