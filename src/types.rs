//! Core data model: issuers, payment methods, outcomes, and the immutable
//! transaction record flowing from the generator into observation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Card-issuing banks in the simulated fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Issuer {
    Hdfc,
    Icici,
    Axis,
    Sbi,
}

impl Issuer {
    /// All issuers, in stable order.
    pub const ALL: [Issuer; 4] = [Issuer::Hdfc, Issuer::Icici, Issuer::Axis, Issuer::Sbi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Issuer::Hdfc => "HDFC",
            Issuer::Icici => "ICICI",
            Issuer::Axis => "AXIS",
            Issuer::Sbi => "SBI",
        }
    }

    /// Parse an issuer name as written in config files.
    pub fn from_name(name: &str) -> Option<Issuer> {
        match name.to_ascii_uppercase().as_str() {
            "HDFC" => Some(Issuer::Hdfc),
            "ICICI" => Some(Issuer::Icici),
            "AXIS" => Some(Issuer::Axis),
            "SBI" => Some(Issuer::Sbi),
            _ => None,
        }
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment rails the fleet authorizes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Upi,
    Wallet,
    Netbanking,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Card,
        PaymentMethod::Upi,
        PaymentMethod::Wallet,
        PaymentMethod::Netbanking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Netbanking => "netbanking",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse geography of the acquiring merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Geography {
    Us,
    Eu,
    Asia,
}

impl Geography {
    pub const ALL: [Geography; 3] = [Geography::Us, Geography::Eu, Geography::Asia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Geography::Us => "US",
            Geography::Eu => "EU",
            Geography::Asia => "ASIA",
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a payment authorization attempt.
///
/// Soft failures are retryable (timeouts, throttling); hard failures are not
/// (declines, invalid instruments).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    SoftFail,
    HardFail,
}

impl Outcome {
    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Immutable payment-authorization record.
///
/// Created by the generator, consumed by the observation window, never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Monotonically increasing sequence id.
    pub id: u64,
    /// Epoch milliseconds; non-decreasing across consecutive records.
    pub timestamp_ms: u64,
    pub issuer: Issuer,
    pub method: PaymentMethod,
    pub geography: Geography,
    pub outcome: Outcome,
    pub latency_ms: u32,
    pub retry_count: u8,
    /// Present on failures only.
    pub error_code: Option<String>,
    pub amount: f64,
}

/// Aggregation key for window statistics and baselines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Global,
    Issuer(Issuer),
    Method(PaymentMethod),
    Geo(Geography),
}

impl Dimension {
    /// True when this key identifies a single issuer.
    pub fn issuer(&self) -> Option<Issuer> {
        match self {
            Dimension::Issuer(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Global => f.write_str("global"),
            Dimension::Issuer(i) => write!(f, "issuer:{i}"),
            Dimension::Method(m) => write!(f, "method:{m}"),
            Dimension::Geo(g) => write!(f, "geo:{g}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issuer_round_trip() {
        for issuer in Issuer::ALL {
            assert_eq!(Issuer::from_name(issuer.as_str()), Some(issuer));
        }
        assert_eq!(Issuer::from_name("hdfc"), Some(Issuer::Hdfc));
        assert_eq!(Issuer::from_name("KOTAK"), None);
    }

    #[test]
    fn test_dimension_display() {
        assert_eq!(Dimension::Global.to_string(), "global");
        assert_eq!(Dimension::Issuer(Issuer::Icici).to_string(), "issuer:ICICI");
        assert_eq!(
            Dimension::Method(PaymentMethod::Upi).to_string(),
            "method:upi"
        );
    }

    #[test]
    fn test_outcome_serde_snake_case() {
        let json = serde_json::to_string(&Outcome::SoftFail).unwrap();
        assert_eq!(json, "\"soft_fail\"");
        let parsed: Outcome = serde_json::from_str("\"hard_fail\"").unwrap();
        assert_eq!(parsed, Outcome::HardFail);
    }
}
