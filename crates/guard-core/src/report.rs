//! Survey reports - every substitution's classification, without failing
//!
//! `verify_*` stops at the first unguarded parameter. A survey runs all of
//! them and records what happened, which is what you want when auditing a
//! type for the first time.

use crate::metadata::DataType;
use crate::pipeline::Classification;

/// One classified substitution
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SurveyEntry {
    pub member: String,
    pub declaring_type: String,
    pub parameter_index: usize,
    pub parameter: String,
    pub parameter_type: DataType,
    /// Boundary behavior description, e.g. `empty string`
    pub behavior: String,
    /// Rendered invalid value
    pub value: String,
    pub classification: Classification,
}

/// Counts per classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct SurveySummary {
    pub correct: usize,
    pub deferred_correct: usize,
    pub missing: usize,
    pub wrong: usize,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct SurveyReport {
    pub entries: Vec<SurveyEntry>,
}

impl SurveyReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: SurveyEntry) {
        self.entries.push(entry);
    }

    pub fn merge(&mut self, other: SurveyReport) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when every substitution was guarded
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.classification.is_success())
    }

    pub fn failures(&self) -> Vec<&SurveyEntry> {
        self.entries
            .iter()
            .filter(|e| !e.classification.is_success())
            .collect()
    }

    pub fn summary(&self) -> SurveySummary {
        let mut summary = SurveySummary::default();
        for entry in &self.entries {
            match entry.classification {
                Classification::CorrectGuard => summary.correct += 1,
                Classification::DeferredCorrectGuard => summary.deferred_correct += 1,
                Classification::MissingGuard { .. } => summary.missing += 1,
                Classification::WrongErrorKind { .. } => summary.wrong += 1,
            }
        }
        summary
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
