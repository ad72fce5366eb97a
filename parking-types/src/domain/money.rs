//! Type-safe monetary value with embedded currency.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::error::DomainError;

/// Currencies plans can be charged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    CAD,
    USD,
}

impl Currency {
    /// Returns the currency symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::CAD => "CA$",
            Currency::USD => "$",
        }
    }

    /// Lowercase ISO code, as the payment provider expects it.
    pub fn provider_code(&self) -> &'static str {
        match self {
            Currency::CAD => "cad",
            Currency::USD => "usd",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::str::FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CAD" => Ok(Currency::CAD),
            "USD" => Ok(Currency::USD),
            other => Err(DomainError::ValidationError(format!(
                "Unknown currency: {}",
                other
            ))),
        }
    }
}

/// Money in the smallest unit of its currency (cents).
///
/// Charges are never negative; a zero charge marks a free plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: i64,
    currency: Currency,
}

impl Money {
    /// Creates a new Money value.
    pub fn new(amount: i64, currency: Currency) -> Result<Self, DomainError> {
        if amount < 0 {
            return Err(DomainError::NegativeAmount);
        }
        Ok(Self { amount, currency })
    }

    /// Creates a zero-value Money for the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Returns the amount in smallest currency unit.
    pub fn amount(&self) -> i64 {
        self.amount
    }

    /// Returns the currency.
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Splits a charge into `(service, net)` for a fee expressed in basis points.
    ///
    /// The service part is rounded down so `service + net == self` always holds.
    pub fn split_fee(&self, fee_bps: u32) -> (Money, Money) {
        let service = self.amount.saturating_mul(i64::from(fee_bps)) / 10_000;
        (
            Money {
                amount: service,
                currency: self.currency,
            },
            Money {
                amount: self.amount - service,
                currency: self.currency,
            },
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let major = self.amount / 100;
        let minor = (self.amount % 100).abs();
        write!(f, "{}{}.{:02}", self.currency.symbol(), major, minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_creation() {
        let money = Money::new(1000, Currency::CAD).unwrap();
        assert_eq!(money.amount(), 1000);
        assert_eq!(money.currency(), Currency::CAD);
        assert!(!money.is_zero());
    }

    #[test]
    fn test_negative_money_fails() {
        let result = Money::new(-100, Currency::CAD);
        assert!(matches!(result, Err(DomainError::NegativeAmount)));
    }

    #[test]
    fn test_split_fee_sums_to_charge() {
        let charge = Money::new(1999, Currency::CAD).unwrap();
        let (service, net) = charge.split_fee(1000);
        assert_eq!(service.amount(), 199);
        assert_eq!(net.amount(), 1800);
        assert_eq!(service.amount() + net.amount(), charge.amount());
    }

    #[test]
    fn test_split_fee_of_zero_charge() {
        let (service, net) = Money::zero(Currency::USD).split_fee(1500);
        assert!(service.is_zero());
        assert!(net.is_zero());
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("cad".parse::<Currency>().unwrap(), Currency::CAD);
        assert!("EUR".parse::<Currency>().is_err());
    }

    #[test]
    fn test_money_display() {
        let money = Money::new(1050, Currency::USD).unwrap();
        assert_eq!(format!("{}", money), "$10.50");
    }
}
