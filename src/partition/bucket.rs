//! Partition dimensions and their buckets
//!
//! Range dimensions are always built from strictly ascending cut points, so
//! their buckets are contiguous and never overlap.

use crate::{PartitionError, PartitionResult};
use chrono::{Days, NaiveDate};
use std::fmt;

/// One discrete slice of a partition dimension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// A single qualifier value such as `rust`
    Term(String),

    /// Inclusive integer range; `high == None` means open-ended
    IntRange { low: u64, high: Option<u64> },

    /// Inclusive date range; `None` on either side means open-ended
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl Bucket {
    /// Renders the bucket as a search qualifier
    pub fn render(&self, qualifier: &str) -> String {
        match self {
            Self::Term(value) => format!("{}:{}", qualifier, value),
            Self::IntRange {
                low,
                high: Some(high),
            } => format!("{}:{}..{}", qualifier, low, high),
            Self::IntRange { low, high: None } => format!("{}:>={}", qualifier, low),
            Self::DateRange {
                from: Some(from),
                to: Some(to),
            } => format!("{}:{}..{}", qualifier, from, to),
            Self::DateRange {
                from: None,
                to: Some(to),
            } => format!("{}:<={}", qualifier, to),
            Self::DateRange {
                from: Some(from),
                to: None,
            } => format!("{}:>={}", qualifier, from),
            Self::DateRange {
                from: None,
                to: None,
            } => format!("{}:*", qualifier),
        }
    }

    /// Returns true if an integer value falls inside this bucket
    pub fn contains_int(&self, value: u64) -> bool {
        match self {
            Self::IntRange { low, high } => value >= *low && high.map_or(true, |h| value <= h),
            _ => false,
        }
    }

    /// Returns true if a date falls inside this bucket
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        match self {
            Self::DateRange { from, to } => {
                from.map_or(true, |f| date >= f) && to.map_or(true, |t| date <= t)
            }
            _ => false,
        }
    }
}

/// An ordered list of buckets bound to one search qualifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    name: String,
    qualifier: String,
    buckets: Vec<Bucket>,
}

impl Dimension {
    /// Builds a dimension of discrete values
    pub fn terms<S: AsRef<str>>(
        name: &str,
        qualifier: &str,
        values: &[S],
    ) -> PartitionResult<Self> {
        let buckets: Vec<Bucket> = values
            .iter()
            .map(|v| Bucket::Term(v.as_ref().to_string()))
            .collect();
        Self::build(name, qualifier, buckets)
    }

    /// Builds integer ranges covering `[0, ∞)`
    ///
    /// The first bucket always starts at 0; every positive cut point opens a
    /// new bucket and the last bucket is open-ended.
    pub fn int_ranges(name: &str, qualifier: &str, cut_points: &[u64]) -> PartitionResult<Self> {
        if cut_points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PartitionError::UnorderedBoundaries(name.to_string()));
        }

        let mut lows: Vec<u64> = vec![0];
        lows.extend(cut_points.iter().copied().filter(|&c| c > 0));

        let buckets = lows
            .iter()
            .enumerate()
            .map(|(i, &low)| Bucket::IntRange {
                low,
                high: lows.get(i + 1).map(|next| next - 1),
            })
            .collect();
        Self::build(name, qualifier, buckets)
    }

    /// Builds date ranges covering every date
    ///
    /// `n` cut points produce `n + 1` buckets; the first is open towards the
    /// past and the last towards the future.
    pub fn date_ranges(
        name: &str,
        qualifier: &str,
        cut_points: &[NaiveDate],
    ) -> PartitionResult<Self> {
        if cut_points.is_empty() {
            return Err(PartitionError::EmptyDimension(name.to_string()));
        }
        if cut_points.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PartitionError::UnorderedBoundaries(name.to_string()));
        }

        let day_before = |d: NaiveDate| {
            d.checked_sub_days(Days::new(1))
                .ok_or_else(|| PartitionError::InvalidBoundary {
                    name: name.to_string(),
                    value: d.to_string(),
                })
        };

        let mut buckets = Vec::with_capacity(cut_points.len() + 1);
        buckets.push(Bucket::DateRange {
            from: None,
            to: Some(day_before(cut_points[0])?),
        });
        for (i, &from) in cut_points.iter().enumerate() {
            let to = match cut_points.get(i + 1) {
                Some(&next) => Some(day_before(next)?),
                None => None,
            };
            buckets.push(Bucket::DateRange {
                from: Some(from),
                to,
            });
        }
        Self::build(name, qualifier, buckets)
    }

    /// Parses `YYYY-MM-DD` cut points, then builds date ranges
    pub fn date_ranges_from_strings<S: AsRef<str>>(
        name: &str,
        qualifier: &str,
        cut_points: &[S],
    ) -> PartitionResult<Self> {
        let dates = cut_points
            .iter()
            .map(|s| {
                NaiveDate::parse_from_str(s.as_ref(), "%Y-%m-%d").map_err(|_| {
                    PartitionError::InvalidBoundary {
                        name: name.to_string(),
                        value: s.as_ref().to_string(),
                    }
                })
            })
            .collect::<PartitionResult<Vec<_>>>()?;
        Self::date_ranges(name, qualifier, &dates)
    }

    fn build(name: &str, qualifier: &str, buckets: Vec<Bucket>) -> PartitionResult<Self> {
        if buckets.is_empty() {
            return Err(PartitionError::EmptyDimension(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            qualifier: qualifier.to_string(),
            buckets,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Number of buckets
    pub fn cardinality(&self) -> usize {
        self.buckets.len()
    }

    /// Renders the qualifier for bucket `index`
    pub fn term(&self, index: usize) -> Option<String> {
        self.buckets.get(index).map(|b| b.render(&self.qualifier))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} buckets)", self.name, self.buckets.len())
    }
}
