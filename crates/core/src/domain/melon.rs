use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MelonId(pub u32);

impl fmt::Display for MelonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidMelonId(pub String);

impl fmt::Display for InvalidMelonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a melon id", self.0)
    }
}

impl std::error::Error for InvalidMelonId {}

impl FromStr for MelonId {
    type Err = InvalidMelonId;

    /// Accepts the same shape as an integer route segment: ASCII digits only.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(InvalidMelonId(value.to_string()));
        }
        value.parse::<u32>().map(Self).map_err(|_| InvalidMelonId(value.to_string()))
    }
}

/// A purchasable catalog record. Fixed for the lifetime of the process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Melon {
    pub id: MelonId,
    pub melon_type: String,
    pub common_name: String,
    pub scientific_name: String,
    pub price: Decimal,
    pub image_url: String,
    pub color: String,
    #[serde(default)]
    pub seedless: bool,
    #[serde(default)]
    pub inventory_count: u32,
}

impl Melon {
    pub fn price_str(&self) -> String {
        format!("${:.2}", self.price)
    }
}
