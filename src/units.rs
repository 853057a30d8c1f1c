//! CGS unit strings and the dimensions they describe.
//!
//! Unit strings are products and quotients of base symbols, each optionally
//! raised to an integer power, e.g. `g/cm**3` or `cm**2*s**-1`. Only the
//! dimension is tracked; all supported symbols are coherent CGS units so no
//! scale factors are needed. Specific entropy is counted in Boltzmann
//! constants per baryon, `kB/by`, and both symbols are dimensionless.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Exponents of the CGS base dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub temperature: i8,
}

impl Dimensions {
    pub const DIMENSIONLESS: Self = Self::new(0, 0, 0, 0);
    pub const LENGTH: Self = Self::new(1, 0, 0, 0);
    pub const MASS: Self = Self::new(0, 1, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0);
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 1);
    pub const VOLUME: Self = Self::new(3, 0, 0, 0);
    pub const VELOCITY: Self = Self::new(1, 0, -1, 0);
    pub const DENSITY: Self = Self::new(-3, 1, 0, 0);
    pub const ENERGY: Self = Self::new(2, 1, -2, 0);

    pub const fn new(length: i8, mass: i8, time: i8, temperature: i8) -> Self {
        Self {
            length,
            mass,
            time,
            temperature,
        }
    }

    /// The product of two dimensions, or `None` if an exponent overflows.
    pub fn mul(self, other: Self) -> Option<Self> {
        Some(Self::new(
            self.length.checked_add(other.length)?,
            self.mass.checked_add(other.mass)?,
            self.time.checked_add(other.time)?,
            self.temperature.checked_add(other.temperature)?,
        ))
    }

    pub fn div(self, other: Self) -> Option<Self> {
        self.mul(other.powi(-1)?)
    }

    pub fn powi(self, n: i8) -> Option<Self> {
        Some(Self::new(
            self.length.checked_mul(n)?,
            self.mass.checked_mul(n)?,
            self.time.checked_mul(n)?,
            self.temperature.checked_mul(n)?,
        ))
    }

    fn of_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "1" | "kB" | "by" => Some(Self::DIMENSIONLESS),
            "cm" => Some(Self::LENGTH),
            "g" => Some(Self::MASS),
            "s" => Some(Self::TIME),
            "K" => Some(Self::TEMPERATURE),
            "erg" => Some(Self::ENERGY),
            "dyne" => Some(Self::new(1, 1, -2, 0)),
            _ => None,
        }
    }
}

/// A unit string together with its parsed dimensions. Two `Units` compare
/// equal when their dimensions agree, regardless of spelling.
#[derive(Debug, Clone)]
pub struct Units {
    symbol: String,
    dims: Dimensions,
}

impl Units {
    pub fn dimensionless() -> Self {
        Self {
            symbol: String::new(),
            dims: Dimensions::DIMENSIONLESS,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }
}

impl PartialEq for Units {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.symbol.is_empty() {
            write!(f, "dimensionless")
        } else {
            write!(f, "{}", self.symbol)
        }
    }
}

impl FromStr for Units {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Self::dimensionless());
        }
        let normalized = trimmed.replace("**", "^");
        let mut dims = Dimensions::DIMENSIONLESS;
        let mut divide = false;
        let mut term = String::new();

        let mut apply = |term: &str, divide: bool| -> Result<(), Error> {
            let d = parse_term(term).ok_or_else(|| Error::InvalidUnits(s.to_owned()))?;
            let product = if divide { dims.div(d) } else { dims.mul(d) };
            dims = product.ok_or_else(|| Error::InvalidUnits(format!("{}: exponent overflow", s)))?;
            Ok(())
        };

        for c in normalized.chars() {
            match c {
                '*' | '/' => {
                    apply(&term, divide)?;
                    term.clear();
                    divide = c == '/';
                }
                c if c.is_whitespace() => {}
                c => term.push(c),
            }
        }
        apply(&term, divide)?;

        Ok(Self {
            symbol: trimmed.to_owned(),
            dims,
        })
    }
}

fn parse_term(term: &str) -> Option<Dimensions> {
    let (symbol, power) = match term.split_once('^') {
        Some((symbol, power)) => (symbol, power.parse::<i8>().ok()?),
        None => (term, 1),
    };
    Dimensions::of_symbol(symbol)?.powi(power)
}
