//! Filters and aggregates over the trace table.
//!
//! All functions are pure: they take the output of a full table load and
//! return new collections. Timestamps use the fixed
//! `YYYY-MM-DD HH:MM:SS` format, so comparing them as strings is the same as
//! comparing them chronologically.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use time::Date;

use crate::clock::parse_timestamp;
use crate::record::{Stage, TraceRecord};

/// Batch-code value meaning "every batch".
pub const ALL_BATCHES: &str = "ALL";

/// Inclusive date range on the date part of a record's timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Conjunction of optional predicates.
///
/// `stages: None` selects every stage; `Some` of an empty set selects no
/// rows at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub batch_code: Option<String>,
    pub stages: Option<BTreeSet<Stage>>,
    pub date_range: Option<DateRange>,
}

impl RecordFilter {
    pub fn for_batch(code: impl Into<String>) -> Self {
        RecordFilter {
            batch_code: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn with_stages(mut self, stages: impl IntoIterator<Item = Stage>) -> Self {
        self.stages = Some(stages.into_iter().collect());
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn matches(&self, record: &TraceRecord) -> bool {
        if let Some(code) = self.batch_code.as_deref() {
            if code != ALL_BATCHES && record.batch_code != code {
                return false;
            }
        }
        if let Some(stages) = &self.stages {
            if !stages.contains(&record.stage) {
                return false;
            }
        }
        if let Some(range) = &self.date_range {
            match parse_timestamp(&record.timestamp) {
                Some(at) if range.contains(at.date()) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Records matching `filter`, in storage order.
pub fn filter(records: &[TraceRecord], filter: &RecordFilter) -> Vec<TraceRecord> {
    records
        .iter()
        .filter(|r| filter.matches(r))
        .cloned()
        .collect()
}

/// Newest first. Records with equal timestamps keep reverse storage order,
/// so a later insert within the same second still shows first.
pub fn sort_for_display(records: Vec<TraceRecord>) -> Vec<TraceRecord> {
    let mut indexed: Vec<(usize, TraceRecord)> = records.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
    indexed.into_iter().map(|(_, r)| r).collect()
}

/// Timeline of one batch, oldest first.
pub fn batch_history(records: &[TraceRecord], code: &str) -> Vec<TraceRecord> {
    let mut history: Vec<TraceRecord> = records
        .iter()
        .filter(|r| r.batch_code == code)
        .cloned()
        .collect();
    history.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    history
}

pub fn stage_histogram(records: &[TraceRecord]) -> BTreeMap<Stage, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.stage).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Completeness {
    pub record_count: usize,
    pub stages_seen: BTreeSet<Stage>,
}

impl Completeness {
    /// Lifecycle stages this batch has not reached yet.
    pub fn missing(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|s| !self.stages_seen.contains(s))
            .collect()
    }
}

pub fn batch_completeness(records: &[TraceRecord]) -> BTreeMap<String, Completeness> {
    let mut out: BTreeMap<String, Completeness> = BTreeMap::new();
    for r in records {
        let entry = out.entry(r.batch_code.clone()).or_default();
        entry.record_count += 1;
        entry.stages_seen.insert(r.stage);
    }
    out
}

/// A batch as listed in the label manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub batch_code: String,
    pub batch_name: String,
    pub created_at: String,
}

/// One entry per batch with a `Created` record, in storage order.
pub fn created_batches(records: &[TraceRecord]) -> Vec<BatchSummary> {
    let mut seen = BTreeSet::new();
    records
        .iter()
        .filter(|r| r.stage == Stage::Created)
        .filter(|r| seen.insert(r.batch_code.clone()))
        .map(|r| BatchSummary {
            batch_code: r.batch_code.clone(),
            batch_name: r.batch_name.clone(),
            created_at: r.timestamp.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total_records: usize,
    pub distinct_batches: usize,
    pub distinct_stages: usize,
    pub stage_counts: BTreeMap<Stage, usize>,
}

pub fn summary(records: &[TraceRecord]) -> Summary {
    let stage_counts = stage_histogram(records);
    let batches: BTreeSet<&str> = records.iter().map(|r| r.batch_code.as_str()).collect();
    Summary {
        total_records: records.len(),
        distinct_batches: batches.len(),
        distinct_stages: stage_counts.len(),
        stage_counts,
    }
}

/// Restrict to the given batch codes. An empty selection keeps everything.
pub fn select_codes(records: &[TraceRecord], codes: &[String]) -> Vec<TraceRecord> {
    if codes.is_empty() {
        return records.to_vec();
    }
    records
        .iter()
        .filter(|r| codes.iter().any(|c| *c == r.batch_code))
        .cloned()
        .collect()
}
