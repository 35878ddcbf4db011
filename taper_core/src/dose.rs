//! Fixed-point dose and tablet quantities.
//!
//! Doses are held as integer hundredths of a milligram, so monotonic steps and
//! pill reconstruction are checked with integer equality instead of float
//! tolerances. Tablet counts are held as half tablets.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Hundredths of a milligram per milligram
const SCALE: i64 = 100;

/// A milligram quantity on the 0.01 mg grid
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "f64", into = "f64")]
pub struct Dose(i64);

impl Dose {
    pub const ZERO: Dose = Dose(0);

    /// Largest daily dose accepted anywhere in a plan (10 g)
    pub const MAX: Dose = Dose(1_000_000);

    pub const fn from_hundredths(hundredths: i64) -> Self {
        Dose(hundredths)
    }

    /// Round a milligram value to the nearest 0.01 mg
    pub fn from_mg(mg: f64) -> Self {
        Dose((mg * SCALE as f64).round() as i64)
    }

    pub const fn hundredths(self) -> i64 {
        self.0
    }

    pub fn mg(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Reduce by `percent` and round to the nearest multiple of `grid`.
    ///
    /// The reduced value is first taken to the 0.01 mg grid; a value exactly
    /// halfway between two multiples of `grid` goes to the even multiple.
    pub fn reduce_by_percent(self, percent: f64, grid: Dose) -> Dose {
        let current = self.0 as f64;
        let reduced = (current - current * percent / 100.0).round() as i64;
        let quotient = reduced.div_euclid(grid.0);
        let units = match (reduced.rem_euclid(grid.0) * 2).cmp(&grid.0) {
            Ordering::Less => quotient,
            Ordering::Greater => quotient + 1,
            Ordering::Equal if quotient % 2 == 0 => quotient,
            Ordering::Equal => quotient + 1,
        };
        Dose(units * grid.0)
    }

    /// Largest multiple of `grid` strictly below this dose
    pub fn grid_below(self, grid: Dose) -> Dose {
        Dose((self.0 - 1).div_euclid(grid.0) * grid.0)
    }

    /// Divide into `parts` and round to the 0.01 mg grid, halves away from zero
    pub fn div_rounded(self, parts: u32) -> Dose {
        let parts = i64::from(parts);
        let quotient = self.0.div_euclid(parts);
        let remainder = self.0.rem_euclid(parts);
        if remainder * 2 >= parts {
            Dose(quotient + 1)
        } else {
            Dose(quotient)
        }
    }
}

impl From<f64> for Dose {
    fn from(mg: f64) -> Self {
        Dose::from_mg(mg)
    }
}

impl From<Dose> for f64 {
    fn from(dose: Dose) -> Self {
        dose.mg()
    }
}

impl Add for Dose {
    type Output = Dose;

    fn add(self, rhs: Dose) -> Dose {
        Dose(self.0 + rhs.0)
    }
}

impl AddAssign for Dose {
    fn add_assign(&mut self, rhs: Dose) {
        self.0 += rhs.0;
    }
}

impl Sub for Dose {
    type Output = Dose;

    fn sub(self, rhs: Dose) -> Dose {
        Dose(self.0 - rhs.0)
    }
}

impl Sum for Dose {
    fn sum<I: Iterator<Item = Dose>>(iter: I) -> Dose {
        iter.fold(Dose::ZERO, |acc, d| acc + d)
    }
}

impl fmt::Display for Dose {
    /// Milligrams without trailing zeros: `20`, `7.5`, `0.25`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-")?;
        }
        let abs = self.0.abs();
        let whole = abs / SCALE;
        let frac = abs % SCALE;
        if frac == 0 {
            write!(f, "{}", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}", whole, frac)
        }
    }
}

/// A tablet count in half-tablet units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "f64")]
pub struct Tablets(u32);

impl Tablets {
    pub const HALF: Tablets = Tablets(1);

    pub const fn whole(count: u32) -> Self {
        Tablets(count * 2)
    }

    /// Whole tablets, or `None` when the count does not fit
    pub fn checked_whole(count: i64) -> Option<Self> {
        u32::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(2))
            .map(Tablets)
    }

    pub const fn from_halves(halves: u32) -> Self {
        Tablets(halves)
    }

    pub const fn halves(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 2.0
    }

    /// Whole tablets that must be dispensed to cover this count
    pub const fn dispensed(self) -> u32 {
        self.0.div_ceil(2)
    }

    pub const fn is_single(self) -> bool {
        self.0 == 2
    }
}

impl From<Tablets> for f64 {
    fn from(tablets: Tablets) -> Self {
        tablets.as_f64()
    }
}

impl Add for Tablets {
    type Output = Tablets;

    fn add(self, rhs: Tablets) -> Tablets {
        Tablets(self.0 + rhs.0)
    }
}

impl fmt::Display for Tablets {
    /// Half tablets render with the `½` glyph: `½`, `2`, `1½`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 2;
        match (whole, self.0 % 2) {
            (0, 1) => write!(f, "½"),
            (w, 1) => write!(f, "{}½", w),
            (w, _) => write!(f, "{}", w),
        }
    }
}
