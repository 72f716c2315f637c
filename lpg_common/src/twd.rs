use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The currency the payment gateway settles in. Every amount sent to the gateway is a whole number of these.
pub const SETTLEMENT_CURRENCY: &str = "TWD";

//--------------------------------------         Twd          ---------------------------------------------------------
/// A whole-dollar amount in New Taiwan Dollars. The gateway does not accept fractional amounts, so neither does this
/// type. Values are never negative when produced by [`Twd::from_price`].
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Twd(i64);

op!(binary Twd, Add, add);
op!(binary Twd, Sub, sub);
op!(inplace Twd, AddAssign, add_assign);

impl Sum for Twd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a settlement amount: {0}")]
pub struct TwdConversionError(String);

impl From<i64> for Twd {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for Twd {
    type Error = TwdConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value).map(Self).map_err(|_| TwdConversionError(format!("{value} is too large")))
    }
}

impl Display for Twd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NT${}", self.0)
    }
}

impl Twd {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Rounds a (possibly fractional) price to the nearest whole dollar, half away from zero.
    ///
    /// Negative, NaN and infinite inputs all collapse to zero. Values beyond `i64::MAX` saturate.
    pub fn from_price(price: f64) -> Self {
        if !price.is_finite() || price <= 0.0 {
            return Self(0);
        }
        #[allow(clippy::cast_possible_truncation)]
        Self(price.round() as i64)
    }
}
