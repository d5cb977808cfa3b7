//! Append-only history of completed tolerances.
//!
//! Every tolerance the estimator finishes, converged or not, appends one
//! immutable [`HistoryRecord`]. Records are snapshots: later sampling never
//! changes a record already pushed.

mod store;

pub use store::{HistoryStore, JsonFileStore};

use mimc_core::types::Index;
use serde::{Deserialize, Serialize};

/// Fitted rates at the time of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    /// Mean decay rate per direction.
    pub alpha: Vec<f64>,
    /// Variance decay rate per direction.
    pub beta: Vec<f64>,
    /// Cost growth rate per direction.
    pub gamma: Vec<f64>,
}

/// Statistics of one index at the time of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Index.
    pub index: Index,
    /// Samples per shift.
    pub nb_of_samples: usize,
    /// Mean difference of the controlling quantity of interest.
    pub mean: f64,
    /// Per-sample variance of the differences.
    pub variance: f64,
    /// Variance of the estimator of the mean.
    pub varest: f64,
    /// Average cost of one sample.
    pub cost: f64,
}

/// Snapshot of an estimator after one tolerance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Requested tolerance.
    pub tol: f64,
    /// Whether the estimator met the tolerance.
    pub converged: bool,
    /// Wall-clock seconds spent on this tolerance.
    pub elapsed: f64,
    /// RFC 3339 time at which the record was taken.
    pub timestamp: String,
    /// Index-set strategy label.
    pub index_set: String,
    /// Sample method label.
    pub sample_method: String,
    /// Size parameter reached.
    pub size_param: usize,
    /// Indices of the current set, in lexicographic order.
    pub current_index_set: Vec<Index>,
    /// Estimate per quantity of interest.
    pub mean: Vec<f64>,
    /// Estimator variance of the controlling quantity of interest.
    pub varest: f64,
    /// Bias estimate.
    pub bias: f64,
    /// `bias² + varest`.
    pub mse: f64,
    /// Square root of `mse`.
    pub rmse: f64,
    /// Splitting parameter used.
    pub splitting: f64,
    /// Fitted rates.
    pub rates: RateSummary,
    /// Accumulated cost over all indices.
    pub total_work: f64,
    /// Accumulated sampling time over all indices.
    pub total_time: f64,
    /// Seed of the random number generator.
    pub seed: u64,
    /// Per-index statistics.
    pub indices: Vec<IndexRecord>,
}

/// Ordered sequence of [`HistoryRecord`]s.
///
/// # Examples
///
/// ```
/// use mimc_estimator::History;
///
/// let history = History::new();
/// assert!(history.is_empty());
/// assert!(history.latest_field("rmse").is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: Vec<HistoryRecord>,
}

impl History {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push(record);
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` if no record has been taken.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at position `k`.
    #[inline]
    pub fn get(&self, k: usize) -> Option<&HistoryRecord> {
        self.records.get(k)
    }

    /// Most recent record.
    #[inline]
    pub fn last(&self) -> Option<&HistoryRecord> {
        self.records.last()
    }

    /// Records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, HistoryRecord> {
        self.records.iter()
    }

    /// Named field of the most recent record, as JSON.
    ///
    /// Returns `None` for an empty history or an unknown field name.
    pub fn latest_field(&self, name: &str) -> Option<serde_json::Value> {
        let record = self.last()?;
        match serde_json::to_value(record) {
            Ok(serde_json::Value::Object(mut fields)) => fields.remove(name),
            _ => None,
        }
    }
}

impl std::ops::Index<usize> for History {
    type Output = HistoryRecord;

    fn index(&self, k: usize) -> &HistoryRecord {
        &self.records[k]
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a HistoryRecord;
    type IntoIter = std::slice::Iter<'a, HistoryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(tol: f64, converged: bool) -> HistoryRecord {
        HistoryRecord {
            tol,
            converged,
            elapsed: 0.5,
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            index_set: "ML".to_string(),
            sample_method: "MC".to_string(),
            size_param: 3,
            current_index_set: (0..=3).map(|l| Index::from([l])).collect(),
            mean: vec![1.5],
            varest: 5.625e-5,
            bias: 1e-2,
            mse: 1.5625e-4,
            rmse: 0.0125,
            splitting: 0.5,
            rates: RateSummary {
                alpha: vec![2.0],
                beta: vec![2.0],
                gamma: vec![1.0],
            },
            total_work: 100.0,
            total_time: 0.1,
            seed: 7,
            indices: vec![IndexRecord {
                index: Index::from([0]),
                nb_of_samples: 40,
                mean: 1.0,
                variance: 1.0,
                varest: 0.025,
                cost: 1.0,
            }],
        }
    }

    #[test]
    fn test_positional_access_and_latest_field() {
        let mut history = History::new();
        history.push(record(0.1, true));
        history.push(record(0.05, false));
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].tol, 0.1);
        assert_eq!(history.get(1).map(|r| r.converged), Some(false));
        assert_eq!(history.latest_field("tol"), Some(serde_json::json!(0.05)));
        assert_eq!(history.latest_field("index_set"), Some(serde_json::json!("ML")));
        assert!(history.latest_field("no_such_field").is_none());
        assert_eq!(history.iter().count(), 2);
    }

    #[test]
    fn test_records_round_trip_through_json() {
        let mut history = History::new();
        history.push(record(0.1, true));
        let json = serde_json::to_string(&history).unwrap();
        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
