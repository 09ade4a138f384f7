use std::collections::BTreeSet;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::model::{days_since_epoch, SightingRecord};
use crate::schema::sighting;

/// A categorical filter dimension, in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Dimension {
    Group,
    Individual,
    Location,
    Sex,
    Strands,
}

impl Dimension {
    /// Widget options for a dimension are narrowed only by the dimensions
    /// before it in this list.
    pub const CASCADE: [Dimension; 5] = [
        Dimension::Group,
        Dimension::Individual,
        Dimension::Location,
        Dimension::Sex,
        Dimension::Strands,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Self::Group => sighting::GROUP,
            Self::Individual => sighting::INDIVIDUAL,
            Self::Location => sighting::LOCATION,
            Self::Sex => sighting::SEX,
            Self::Strands => sighting::STRANDS,
        }
    }

    pub fn value(self, record: &SightingRecord) -> Option<&str> {
        match self {
            Self::Group => record.group.as_deref(),
            Self::Individual => record.individual.as_deref(),
            Self::Location => record.location.as_deref(),
            Self::Sex => record.sex.as_deref(),
            Self::Strands => record.strands.as_deref(),
        }
    }
}

/// Closed date interval, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Bounds given in the wrong order are swapped.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A null date is never inside a range.
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        date.is_some_and(|d| self.start <= d && d <= self.end)
    }
}

/// The active selections. An empty selection leaves its dimension
/// unconstrained; `date_range: None` leaves dates unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub groups: BTreeSet<String>,
    pub individuals: BTreeSet<String>,
    pub locations: BTreeSet<String>,
    pub sexes: BTreeSet<String>,
    pub strands: BTreeSet<String>,
    pub date_range: Option<DateRange>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, dimension: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selection_mut(dimension)
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn selection(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Group => &self.groups,
            Dimension::Individual => &self.individuals,
            Dimension::Location => &self.locations,
            Dimension::Sex => &self.sexes,
            Dimension::Strands => &self.strands,
        }
    }

    fn selection_mut(&mut self, dimension: Dimension) -> &mut BTreeSet<String> {
        match dimension {
            Dimension::Group => &mut self.groups,
            Dimension::Individual => &mut self.individuals,
            Dimension::Location => &mut self.locations,
            Dimension::Sex => &mut self.sexes,
            Dimension::Strands => &mut self.strands,
        }
    }

    /// Copy keeping only the listed categorical dimensions (and the date
    /// range).
    pub fn restricted_to(&self, dimensions: &[Dimension]) -> Self {
        let mut out = Self {
            date_range: self.date_range,
            ..Self::default()
        };
        for &dim in dimensions {
            *out.selection_mut(dim) = self.selection(dim).clone();
        }
        out
    }

    /// Drop selected values that are no longer offered.
    pub fn reconcile(&self, options: &FilterOptions) -> Self {
        let mut out = self.clone();
        for dim in Dimension::CASCADE {
            let offered = options.get(dim);
            out.selection_mut(dim)
                .retain(|v| offered.binary_search(v).is_ok());
        }
        out
    }

    pub fn is_unconstrained(&self) -> bool {
        self.date_range.is_none()
            && Dimension::CASCADE
                .iter()
                .all(|&d| self.selection(d).is_empty())
    }
}

/// Rows of `df` satisfying every non-empty dimension and the date range.
pub fn apply(df: &DataFrame, state: &FilterState) -> Result<DataFrame> {
    let mut lazy = df.clone().lazy();
    for dim in Dimension::CASCADE {
        if let Some(predicate) = selection_predicate(dim, state.selection(dim)) {
            lazy = lazy.filter(predicate);
        }
    }
    if let Some(range) = state.date_range {
        lazy = lazy.filter(date_predicate(range));
    }
    let out = lazy.collect()?;
    debug!("Filter kept {} of {} rows", out.height(), df.height());
    Ok(out)
}

fn selection_predicate(dimension: Dimension, selected: &BTreeSet<String>) -> Option<Expr> {
    if selected.is_empty() {
        return None;
    }
    let values: Vec<&str> = selected.iter().map(String::as_str).collect();
    let values = Series::new("selected".into(), values);
    Some(col(dimension.column()).is_in(lit(values).implode(), false))
}

/// Compares on the physical day number; null dates compare as null and
/// are dropped by the filter.
fn date_predicate(range: DateRange) -> Expr {
    let day = col(sighting::DATE).cast(DataType::Int32);
    day.clone()
        .gt_eq(lit(days_since_epoch(range.start)))
        .and(day.lt_eq(lit(days_since_epoch(range.end))))
}

/// Candidate values per dimension, narrowed along the cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub groups: Vec<String>,
    pub individuals: Vec<String>,
    pub locations: Vec<String>,
    pub sexes: Vec<String>,
    pub strands: Vec<String>,
}

impl FilterOptions {
    /// Options for each dimension come from the table narrowed by the
    /// selections of the dimensions before it, so picking an individual
    /// never shrinks the group list. The date range is not applied.
    pub fn compute(df: &DataFrame, state: &FilterState) -> Result<Self> {
        let mut options = Self::default();
        let mut narrowed = df.clone();
        for dim in Dimension::CASCADE {
            *options.get_mut(dim) = distinct_values(&narrowed, dim)?;
            if !state.selection(dim).is_empty() {
                let step = FilterState::new().with(dim, state.selection(dim).iter().cloned());
                narrowed = apply(&narrowed, &step)?;
            }
        }
        Ok(options)
    }

    pub fn get(&self, dimension: Dimension) -> &[String] {
        match dimension {
            Dimension::Group => &self.groups,
            Dimension::Individual => &self.individuals,
            Dimension::Location => &self.locations,
            Dimension::Sex => &self.sexes,
            Dimension::Strands => &self.strands,
        }
    }

    fn get_mut(&mut self, dimension: Dimension) -> &mut Vec<String> {
        match dimension {
            Dimension::Group => &mut self.groups,
            Dimension::Individual => &mut self.individuals,
            Dimension::Location => &mut self.locations,
            Dimension::Sex => &mut self.sexes,
            Dimension::Strands => &mut self.strands,
        }
    }
}

/// Sorted distinct non-null values of a dimension's column.
fn distinct_values(df: &DataFrame, dimension: Dimension) -> Result<Vec<String>> {
    let values: BTreeSet<String> = df
        .column(dimension.column())?
        .str()?
        .into_iter()
        .flatten()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok(values.into_iter().collect())
}

/// Earliest and latest non-null date.
pub fn date_bounds(records: &[SightingRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = records.iter().filter_map(|r| r.date);
    let first = dates.next()?;
    Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
}
