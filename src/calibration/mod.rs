//! Calibration monitoring: does stated confidence track observed accuracy?
//!
//! A read-only diagnostic over the active and needs_validation population.
//! Items are partitioned into confidence bands; each band's aggregated
//! success rate is compared to the band's nominal midpoint, and bands that
//! deviate materially are flagged for recalibration. Nothing here mutates
//! any item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ProcessKnowledgeItem;

/// Maximum tolerated gap between nominal and observed accuracy.
pub const MAX_DEVIATION: f64 = 0.15;

/// A half-open confidence band `[lower, upper)`; the top band is closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBand {
    /// Inclusive lower bound.
    pub lower: f64,
    /// Exclusive upper bound (inclusive for the top band).
    pub upper: f64,
}

impl ConfidenceBand {
    /// Nominal accuracy for the band, taken as its midpoint.
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }

    /// Whether a confidence value falls in this band.
    pub fn contains(&self, confidence: f64) -> bool {
        if (self.upper - 1.0).abs() < f64::EPSILON {
            confidence >= self.lower && confidence <= self.upper
        } else {
            confidence >= self.lower && confidence < self.upper
        }
    }

    /// Human-readable label, e.g. `0.80-0.90`.
    pub fn label(&self) -> String {
        format!("{:.2}-{:.2}", self.lower, self.upper)
    }
}

/// The fixed band partition used by the monitor.
///
/// The lowest band is wide: refined items can sit anywhere down to the 0.10
/// floor before a deprecation rule removes them, and they must not vanish
/// from the report in the meantime.
pub fn bands() -> Vec<ConfidenceBand> {
    vec![
        ConfidenceBand { lower: 0.90, upper: 1.00 },
        ConfidenceBand { lower: 0.80, upper: 0.90 },
        ConfidenceBand { lower: 0.70, upper: 0.80 },
        ConfidenceBand { lower: 0.60, upper: 0.70 },
        ConfidenceBand { lower: 0.10, upper: 0.60 },
    ]
}

/// Calibration findings for one band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandReport {
    /// The band this row covers.
    pub band: ConfidenceBand,
    /// Items currently in the band.
    pub item_count: usize,
    /// Successes aggregated across the band.
    pub successes: u32,
    /// Failures aggregated across the band.
    pub failures: u32,
    /// `successes / (successes + failures)`, when any outcomes exist.
    pub observed_accuracy: Option<f64>,
    /// Band midpoint, the accuracy the confidence claims.
    pub nominal_accuracy: f64,
    /// Absolute deviation, when observable.
    pub deviation: Option<f64>,
    /// True when no graded outcomes exist to judge the band by.
    pub insufficient_data: bool,
    /// True when deviation exceeds [`MAX_DEVIATION`].
    pub needs_recalibration: bool,
}

/// Full calibration report over the rankable population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Per-band rows, highest band first; every band is present.
    pub bands: Vec<BandReport>,
    /// Rankable items considered.
    pub total_items: usize,
    /// Graded outcomes considered across all bands.
    pub total_outcomes: u32,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

impl CalibrationReport {
    /// Bands flagged as needing recalibration.
    pub fn flagged(&self) -> Vec<&BandReport> {
        self.bands.iter().filter(|b| b.needs_recalibration).collect()
    }
}

/// Build a calibration report over the given population.
///
/// Only active and needs_validation items participate; deprecated and
/// archived items are audit records, not live claims about accuracy.
pub fn calibration_report(items: &[ProcessKnowledgeItem]) -> CalibrationReport {
    let rankable: Vec<&ProcessKnowledgeItem> =
        items.iter().filter(|i| i.status.is_rankable()).collect();

    let mut rows = Vec::new();
    let mut total_outcomes = 0u32;

    for band in bands() {
        let members: Vec<&&ProcessKnowledgeItem> = rankable
            .iter()
            .filter(|i| band.contains(i.confidence))
            .collect();

        let successes: u32 = members.iter().map(|i| i.success_count).sum();
        let failures: u32 = members.iter().map(|i| i.failure_count).sum();
        let graded = successes + failures;
        total_outcomes += graded;

        let observed_accuracy = if graded > 0 {
            Some(f64::from(successes) / f64::from(graded))
        } else {
            None
        };
        let deviation = observed_accuracy.map(|acc| (acc - band.midpoint()).abs());

        rows.push(BandReport {
            band,
            item_count: members.len(),
            successes,
            failures,
            observed_accuracy,
            nominal_accuracy: band.midpoint(),
            deviation,
            insufficient_data: graded == 0,
            needs_recalibration: deviation.map(|d| d > MAX_DEVIATION).unwrap_or(false),
        });
    }

    CalibrationReport {
        bands: rows,
        total_items: rankable.len(),
        total_outcomes,
        generated_at: Utc::now(),
    }
}
