//! Delivery address.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an order ships to.
///
/// Recipient, street and city are required for checkout; ward and
/// district are optional administrative subdivisions. Phone format is
/// enforced by the checkout layer, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    /// Recipient's full name.
    pub recipient: String,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Street and house number.
    pub street: String,
    /// Ward, if applicable.
    pub ward: Option<String>,
    /// District, if applicable.
    pub district: Option<String>,
    /// City or province.
    pub city: String,
}

impl Address {
    pub fn new(
        recipient: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            phone: None,
            street: street.into(),
            ward: None,
            district: None,
            city: city.into(),
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// All required fields are non-blank.
    pub fn is_complete(&self) -> bool {
        !self.recipient.trim().is_empty()
            && !self.street.trim().is_empty()
            && !self.city.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.street)?;
        for part in [&self.ward, &self.district] {
            if let Some(part) = part {
                write!(f, ", {part}")?;
            }
        }
        write!(f, ", {}", self.city)
    }
}
