//! Version policy - ordering, snapshot/timestamp classification and ranges.
//!
//! Repository versions are not semver. They are dot-separated segments where
//! each segment is a leading numeric run followed by an arbitrary suffix
//! (`1.10`, `2.0-beta-3`, `1.0-SNAPSHOT`). Two extra rules apply:
//!
//! - `None` sorts before any version.
//! - Timestamp builds (`2` followed by 7 to 14 digits) sort before every
//!   non-timestamp version, so a symbolic `-SNAPSHOT` always beats a baked
//!   timestamp of the same artifact.
//!
//! Ties between distinct strings (`1.01` vs `1.1`) are broken by plain string
//! order so that the comparator is a strict total order.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::SNAPSHOT_SUFFIX;

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^2\d{7,14}$").expect("timestamp pattern is valid"));

/// Returns true if `version` ends in `-SNAPSHOT`.
pub fn is_snapshot(version: &str) -> bool {
    version.ends_with(SNAPSHOT_SUFFIX)
}

/// Returns true if `version` looks like a baked build timestamp (`2\d{7,14}`).
pub fn is_timestamp(version: &str) -> bool {
    TIMESTAMP.is_match(version)
}

/// Compare two optional versions.
///
/// # Example
///
/// ```
/// use std::cmp::Ordering;
/// use minibuild_schema::compare_versions;
///
/// assert_eq!(compare_versions(Some("1.9"), Some("1.10")), Ordering::Less);
/// assert_eq!(compare_versions(None, Some("0.1")), Ordering::Less);
/// assert_eq!(compare_versions(Some("20230101120000"), Some("1.0-SNAPSHOT")), Ordering::Less);
/// ```
pub fn compare_versions(v1: Option<&str>, v2: Option<&str>) -> Ordering {
    match (v1, v2) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare(a, b),
    }
}

fn compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    match (is_timestamp(a), is_timestamp(b)) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ordering = compare_segment(x, y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }

    a.cmp(b)
}

/// Compares the numeric prefix as an integer of arbitrary size, then the rest.
fn compare_segment(x: &str, y: &str) -> Ordering {
    let (x_num, x_rest) = split_numeric(x);
    let (y_num, y_rest) = split_numeric(y);

    let numeric = match (x_num, y_num) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(p), Some(q)) => p.len().cmp(&q.len()).then_with(|| p.cmp(q)),
    };

    numeric.then_with(|| x_rest.cmp(y_rest))
}

/// Splits a segment into its leading digits (without leading zeros) and the rest.
fn split_numeric(segment: &str) -> (Option<&str>, &str) {
    let end = segment
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    if end == 0 {
        return (None, segment);
    }
    let digits = segment[..end].trim_start_matches('0');
    (Some(digits), &segment[end..])
}

/// Returns the newest of the given versions, if any.
pub fn newest<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    versions
        .into_iter()
        .max_by(|a, b| compare_versions(Some(a), Some(b)))
}

/// Errors produced while parsing a version range expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// The expression contains no interval at all.
    #[error("Empty version range")]
    Empty,

    /// An interval was opened but never closed.
    #[error("Unbalanced version range: {0}")]
    Unbalanced(String),

    /// An interval does not have the `[lower,upper)` shape.
    #[error("Malformed version range: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: String,
    inclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Interval {
    lower: Option<Bound>,
    upper: Option<Bound>,
}

impl Interval {
    fn contains(&self, version: &str) -> bool {
        let above = self.lower.as_ref().is_none_or(|b| {
            match compare_versions(Some(version), Some(&b.version)) {
                Ordering::Greater => true,
                Ordering::Equal => b.inclusive,
                Ordering::Less => false,
            }
        });
        let below = self.upper.as_ref().is_none_or(|b| {
            match compare_versions(Some(version), Some(&b.version)) {
                Ordering::Less => true,
                Ordering::Equal => b.inclusive,
                Ordering::Greater => false,
            }
        });
        above && below
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = match &self.lower {
            Some(b) if b.inclusive => '[',
            _ => '(',
        };
        let close = match &self.upper {
            Some(b) if b.inclusive => ']',
            _ => ')',
        };
        let lower = self.lower.as_ref().map_or("", |b| b.version.as_str());
        let upper = self.upper.as_ref().map_or("", |b| b.version.as_str());
        if self.lower.is_some() && self.lower == self.upper {
            return write!(f, "[{lower}]");
        }
        write!(f, "{open}{lower},{upper}{close}")
    }
}

/// A version constraint such as `[1.0,2.0)` or `[1.0,1.5],[2.0,)`.
///
/// Unions of intervals are matched if any interval matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    intervals: Vec<Interval>,
}

impl VersionRange {
    /// Parse a bracketed range expression.
    ///
    /// # Errors
    ///
    /// Returns a [`RangeError`] if the expression is empty, has unbalanced
    /// brackets, or an interval has more than two bounds.
    pub fn parse(expression: &str) -> Result<Self, RangeError> {
        let mut intervals = Vec::new();
        let mut rest = expression.trim();

        while !rest.is_empty() {
            let open = rest.chars().next().unwrap_or_default();
            if open != '[' && open != '(' {
                return Err(RangeError::Malformed(expression.to_string()));
            }
            let close_at = rest
                .find([']', ')'])
                .ok_or_else(|| RangeError::Unbalanced(expression.to_string()))?;
            let close = &rest[close_at..=close_at];
            let inner = &rest[1..close_at];
            intervals.push(parse_interval(inner, open == '[', close == "]", expression)?);

            rest = rest[close_at + 1..].trim_start();
            if let Some(stripped) = rest.strip_prefix(',') {
                rest = stripped.trim_start();
            }
        }

        if intervals.is_empty() {
            return Err(RangeError::Empty);
        }
        Ok(Self { intervals })
    }

    /// Returns true if `version` lies inside any interval of this range.
    pub fn contains(&self, version: &str) -> bool {
        self.intervals.iter().any(|i| i.contains(version))
    }

    /// Returns the highest candidate inside the range.
    pub fn highest<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        newest(candidates.into_iter().filter(|v| self.contains(v)))
    }
}

fn parse_interval(
    inner: &str,
    lower_inclusive: bool,
    upper_inclusive: bool,
    expression: &str,
) -> Result<Interval, RangeError> {
    let bound = |version: &str, inclusive: bool| {
        let version = version.trim();
        (!version.is_empty()).then(|| Bound {
            version: version.to_string(),
            inclusive,
        })
    };

    let parts: Vec<&str> = inner.split(',').collect();
    match parts.as_slice() {
        [exact] => {
            if !(lower_inclusive && upper_inclusive) {
                return Err(RangeError::Malformed(expression.to_string()));
            }
            let exact = bound(exact, true).ok_or_else(|| RangeError::Malformed(expression.to_string()))?;
            Ok(Interval {
                lower: Some(exact.clone()),
                upper: Some(exact),
            })
        }
        [lower, upper] => Ok(Interval {
            lower: bound(lower, lower_inclusive),
            upper: bound(upper, upper_inclusive),
        }),
        _ => Err(RangeError::Malformed(expression.to_string())),
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.intervals.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}
