use core::fmt;
use rand::Rng;
use serde::Serialize;

/// Event name attached to every generated price.
pub const PRICE_UPDATE_EVENT: &str = "price-update";

/// A synthetic price in `0..Price::UPPER_BOUND`.
///
/// Prices are ephemeral: each one is drawn on a tick, handed to the writer
/// exactly once and then dropped. On the wire it is a bare JSON integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(u8);

impl Price {
    /// Exclusive upper bound of every price.
    pub const UPPER_BOUND: u8 = 100;

    /// Returns `None` if `value` is not below [`Self::UPPER_BOUND`].
    pub const fn new(value: u8) -> Option<Self> {
        if value < Self::UPPER_BOUND {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Draws a uniformly distributed price from `rng`.
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        Self(rng.random_range(0..Self::UPPER_BOUND))
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Price> for u8 {
    fn from(price: Price) -> Self {
        price.0
    }
}
