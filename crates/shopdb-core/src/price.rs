//! Rule-based extraction of price bounds from free-text queries.
//!
//! Four pattern families are recognised: upper bounds (`under 50k`), lower
//! bounds (`above 2000`), two-sided ranges (`between 10000 and 20000`,
//! `10000 - 20000`) and tolerance bands (`around 40000`). Numbers accept
//! thousands separators, a trailing `k` and a leading currency marker. A
//! number followed by a unit (`up to 16 gb`, `within 2 days`) is a spec
//! sheet quantity, not a price, and is skipped.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Currency marker allowed in front of a number.
const CURRENCY: &str = r"(?:₹|rs\.?|inr|\$)?\s*";
/// A possibly negative number with separators and an optional `k` suffix.
const NUMBER: &str = r"(-?\d[\d,]*(?:\.\d+)?)(k)?\b";

static UPPER: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b(?:under|below|less\s+than|cheaper\s+than|up\s*to|within|maximum)\s*{CURRENCY}{NUMBER}"
    ))
});

static LOWER: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(
        r"\b(?:above|over|more\s+than|greater\s+than|at\s+least|minimum)\s*{CURRENCY}{NUMBER}"
    ))
});

static BETWEEN: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(r"\bbetween\s+{CURRENCY}{NUMBER}\s*(?:and|to|-)\s*{CURRENCY}{NUMBER}"))
});

static DASH_RANGE: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(r"(?:^|\s){CURRENCY}(\d[\d,]*(?:\.\d+)?)(k)?\s*-\s*{CURRENCY}{NUMBER}"))
});

static AROUND: Lazy<Regex> = Lazy::new(|| {
    compile(&format!(r"\b(?:around|near|about|approximately)\s*{CURRENCY}{NUMBER}"))
});

/// Units that mark the preceding number as a quantity.
static UNIT_AFTER: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"^\s*(?:gb|tb|mb|mah|hz|khz|ghz|mp|inch|inches|cm|mm|kg|g|w|watts?|cores?|days?|hours?|hrs?|weeks?|months?|years?|yrs?)\b",
    )
});

// Patterns are constants; a failure here is a programming error caught by the tests.
pub(crate) fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).unwrap_or_else(|e| panic!("invalid price pattern {pattern}: {e}"))
}

pub const DEFAULT_AROUND_TOLERANCE: f64 = 0.2;

/// Inclusive price bounds for one query. `0..=inf` means "no constraint".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceConstraint {
    pub min_price: f64,
    pub max_price: f64,
}

impl Default for PriceConstraint {
    fn default() -> Self { Self::unbounded() }
}

impl PriceConstraint {
    pub fn unbounded() -> Self { Self { min_price: 0.0, max_price: f64::INFINITY } }

    /// Builds a constraint from optional bounds, swapping them if reversed.
    pub fn new(min_price: Option<f64>, max_price: Option<f64>) -> Self {
        let min = min_price.filter(|v| v.is_finite() && *v >= 0.0).unwrap_or(0.0);
        let max = max_price.filter(|v| !v.is_nan() && *v >= 0.0).unwrap_or(f64::INFINITY);
        if min > max { Self { min_price: max, max_price: min } } else { Self { min_price: min, max_price: max } }
    }

    pub fn is_unbounded(&self) -> bool { self.min_price <= 0.0 && self.max_price == f64::INFINITY }

    pub fn contains(&self, price: f64) -> bool { price >= self.min_price && price <= self.max_price }
}

/// Price parser with a configurable tolerance for `around X`.
#[derive(Debug, Clone, Copy)]
pub struct PriceParser {
    around_tolerance: f64,
}

impl Default for PriceParser {
    fn default() -> Self { Self { around_tolerance: DEFAULT_AROUND_TOLERANCE } }
}

impl PriceParser {
    pub fn new(around_tolerance: f64) -> Self { Self { around_tolerance: around_tolerance.clamp(0.0, 1.0) } }

    pub fn parse(&self, query: &str) -> PriceConstraint {
        let upper = first_amount(&UPPER, query, 1);
        let lower = first_amount(&LOWER, query, 1);
        match (lower, upper) {
            (Some(min), Some(max)) if min <= max => return PriceConstraint { min_price: min, max_price: max },
            (_, Some(max)) => return PriceConstraint { min_price: 0.0, max_price: max },
            (Some(min), None) => return PriceConstraint { min_price: min, max_price: f64::INFINITY },
            (None, None) => {}
        }
        if let Some(range) = two_sided(&BETWEEN, query).or_else(|| two_sided(&DASH_RANGE, query)) {
            return range;
        }
        if let Some(center) = first_amount(&AROUND, query, 1) {
            return PriceConstraint {
                min_price: center * (1.0 - self.around_tolerance),
                max_price: center * (1.0 + self.around_tolerance),
            };
        }
        PriceConstraint::unbounded()
    }
}

/// Parses price constraints with the default `around` tolerance.
pub fn parse_price_constraints(query: &str) -> PriceConstraint { PriceParser::default().parse(query) }

/// Matches of `re` whose last number is not followed by a unit.
fn price_matches<'q>(re: &'q Regex, query: &'q str) -> impl Iterator<Item = Captures<'q>> {
    re.captures_iter(query).filter(move |caps| {
        caps.get(0).is_some_and(|m| !UNIT_AFTER.is_match(&query[m.end()..]))
    })
}

/// Amount captured by the first price match of `re`; `None` if the number
/// is negative or unreadable.
fn first_amount(re: &Regex, query: &str, group: usize) -> Option<f64> {
    price_matches(re, query).next().and_then(|caps| amount(&caps, group))
}

fn two_sided(re: &Regex, query: &str) -> Option<PriceConstraint> {
    let caps = price_matches(re, query).next()?;
    let low = amount(&caps, 1)?;
    let high = amount(&caps, 3)?;
    Some(PriceConstraint { min_price: low.min(high), max_price: low.max(high) })
}

/// Reads the number in `group` and the `k` suffix in `group + 1`.
fn amount(caps: &Captures<'_>, group: usize) -> Option<f64> {
    let raw = caps.get(group)?.as_str().replace(',', "");
    let value: f64 = raw.parse().ok()?;
    let value = if caps.get(group + 1).is_some() { value * 1000.0 } else { value };
    (value.is_finite() && value >= 0.0).then_some(value)
}
