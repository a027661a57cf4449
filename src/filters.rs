//! Explicit view filters
//!
//! Every analytical function takes a `FilterConfig` by reference instead of
//! reading widget state. An empty selection means "no restriction".

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::OrderRecord;

pub const DEFAULT_AGE_THRESHOLD_DAYS: i64 = 90;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    pub age_threshold_days: i64,
    pub selected_categories: BTreeSet<String>,
    pub selected_facilities: BTreeSet<String>,
    /// Inclusive range on the calendar date of `created_at`
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            age_threshold_days: DEFAULT_AGE_THRESHOLD_DAYS,
            selected_categories: BTreeSet::new(),
            selected_facilities: BTreeSet::new(),
            date_range: None,
        }
    }
}

impl FilterConfig {
    pub fn with_age_threshold(mut self, days: i64) -> Self {
        self.age_threshold_days = days;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_facilities<I, S>(mut self, facilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_facilities = facilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    pub fn matches_category(&self, record: &OrderRecord) -> bool {
        self.selected_categories.is_empty()
            || record
                .category
                .as_ref()
                .is_some_and(|c| self.selected_categories.contains(c))
    }

    pub fn matches_facility(&self, record: &OrderRecord) -> bool {
        self.selected_facilities.is_empty()
            || record
                .dc_name
                .as_ref()
                .is_some_and(|f| self.selected_facilities.contains(f))
    }

    /// Rows without `created_at` never match a date range.
    pub fn matches_date(&self, record: &OrderRecord) -> bool {
        match self.date_range {
            None => true,
            Some((start, end)) => record
                .created_at
                .map(|c| c.date())
                .is_some_and(|d| d >= start && d <= end),
        }
    }

    pub fn matches(&self, record: &OrderRecord) -> bool {
        self.matches_category(record) && self.matches_facility(record) && self.matches_date(record)
    }
}

/// Split a comma-separated selection ("Chicago IL,Houston TX") into a set.
pub fn parse_selection(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
