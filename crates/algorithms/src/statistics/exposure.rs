//! Exposure classification and min-max normalization

use super::zonal::ZonalRecord;
use burnline_core::{AttributeValue, Algorithm, Error, FeatureCollection, Result};

pub const BURN_MEAN: &str = "burn_mean";
pub const BURN_EXPOSED: &str = "burn_exposed";
pub const BURN_NORM: &str = "burn_norm";

/// A buffer is exposed when it has a record whose minimum is not the
/// sentinel and whose valid cells outnumber its no-data cells.
pub fn is_exposed(record: Option<&ZonalRecord>, sentinel: f64) -> bool {
    match record {
        Some(r) => r.min != Some(sentinel) && r.count > r.nodata,
        None => false,
    }
}

/// Min-max scale to [0, 1].
///
/// Nulls stay null. When every value is null the output is all null; when
/// all non-null values are equal each of them maps to 1.0.
pub fn normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let (lo, hi) = values
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if lo > hi {
        return vec![None; values.len()];
    }
    let range = hi - lo;

    values
        .iter()
        .map(|v| {
            v.map(|v| {
                if range > 0.0 {
                    (v - lo) / range
                } else {
                    1.0
                }
            })
        })
        .collect()
}

/// Counts reported after enrichment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureSummary {
    pub total: usize,
    pub exposed: usize,
    pub with_mean: usize,
    pub min_mean: Option<f64>,
    pub max_mean: Option<f64>,
}

/// Append `burn_mean`, `burn_exposed` and `burn_norm` to every feature.
///
/// `records[i]` belongs to feature `i`; no other attribute is touched.
pub fn enrich(fc: &mut FeatureCollection, records: &[Option<ZonalRecord>], sentinel: f64) -> Result<ExposureSummary> {
    if records.len() != fc.len() {
        return Err(Error::Algorithm(format!(
            "{} zonal records for {} features",
            records.len(),
            fc.len()
        )));
    }

    let means: Vec<Option<f64>> = records.iter().map(|r| r.and_then(|r| r.mean)).collect();
    let norms = normalize(&means);

    let mut summary = ExposureSummary {
        total: fc.len(),
        ..Default::default()
    };

    for (i, feature) in fc.features.iter_mut().enumerate() {
        let exposed = is_exposed(records[i].as_ref(), sentinel);
        feature.set_property(BURN_MEAN, AttributeValue::from(means[i]));
        feature.set_property(BURN_EXPOSED, AttributeValue::Int(exposed as i64));
        feature.set_property(BURN_NORM, AttributeValue::from(norms[i]));

        summary.exposed += exposed as usize;
        if let Some(m) = means[i] {
            summary.with_mean += 1;
            summary.min_mean = Some(summary.min_mean.map_or(m, |x| x.min(m)));
            summary.max_mean = Some(summary.max_mean.map_or(m, |x| x.max(m)));
        }
    }

    tracing::info!(
        "{} of {} features exposed, {} with a burn mean",
        summary.exposed,
        summary.total,
        summary.with_mean
    );
    Ok(summary)
}

/// Min-max normalization of nullable values
#[derive(Debug, Clone, Default)]
pub struct Normalize;

impl Algorithm for Normalize {
    type Input = Vec<Option<f64>>;
    type Output = Vec<Option<f64>>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Normalize"
    }

    fn description(&self) -> &'static str {
        "Min-max scale nullable values to [0, 1], keeping nulls"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        Ok(normalize(&input))
    }
}
