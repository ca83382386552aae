//! Chunked zonal aggregation
//!
//! Buffers are processed in consecutive batches of at most `chunk_size`
//! items; each batch completes before the next starts, and its records are
//! appended to a single accumulator in input order.

use super::zonal::{zonal_statistics, ZonalRecord};
use burnline_core::io::RasterSource;
use burnline_core::{Error, Result};
use geo_types::MultiPolygon;

/// Default number of buffers per batch
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Default no-data sentinel of the burn raster
pub const DEFAULT_NODATA: f64 = 65535.0;

/// Parameters for chunked aggregation
#[derive(Debug, Clone)]
pub struct AggregateParams {
    /// Buffers per batch, at least 1
    pub chunk_size: usize,
    /// Cell value marking no-data
    pub nodata: f64,
}

impl Default for AggregateParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            nodata: DEFAULT_NODATA,
        }
    }
}

/// One finished batch: rows `start..end` out of `total`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub start: usize,
    pub end: usize,
    pub total: usize,
}

/// Consecutive `[start, end)` ranges covering `0..total`, each at most
/// `chunk_size` long.
pub fn batch_ranges(total: usize, chunk_size: usize) -> impl Iterator<Item = (usize, usize)> {
    let step = chunk_size.max(1);
    (0..total)
        .step_by(step)
        .map(move |start| (start, (start + step).min(total)))
}

/// Chunked zonal statistics without progress reporting
pub fn aggregate<S>(
    buffers: &[Option<MultiPolygon<f64>>],
    source: &mut S,
    params: &AggregateParams,
) -> Result<Vec<Option<ZonalRecord>>>
where
    S: RasterSource + ?Sized,
{
    aggregate_with_progress(buffers, source, params, |_| {})
}

/// Chunked zonal statistics.
///
/// Output has one record per buffer, in input order, and does not depend
/// on `chunk_size`. Any batch error aborts the whole aggregation.
pub fn aggregate_with_progress<S, F>(
    buffers: &[Option<MultiPolygon<f64>>],
    source: &mut S,
    params: &AggregateParams,
    mut on_batch: F,
) -> Result<Vec<Option<ZonalRecord>>>
where
    S: RasterSource + ?Sized,
    F: FnMut(BatchProgress),
{
    if params.chunk_size == 0 {
        return Err(Error::InvalidParameter {
            name: "chunk_size",
            value: "0".into(),
            reason: "batches need at least one item".into(),
        });
    }

    let total = buffers.len();
    let mut records: Vec<Option<ZonalRecord>> = Vec::with_capacity(total);

    for (start, end) in batch_ranges(total, params.chunk_size) {
        tracing::info!("Processing rows {}-{} of {}", start, end - 1, total);

        let batch = zonal_statistics(&buffers[start..end], source, params.nodata)?;
        if batch.len() != end - start {
            return Err(Error::Algorithm(format!(
                "batch {}..{} returned {} records, expected {}",
                start,
                end,
                batch.len(),
                end - start
            )));
        }
        records.extend(batch);
        on_batch(BatchProgress { start, end, total });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burnline_core::io::InMemorySource;
    use burnline_core::{GeoTransform, Raster};
    use geo_types::polygon;

    fn source() -> InMemorySource {
        let data: Vec<f64> = (0..400)
            .map(|i| if i % 13 == 0 { 65535.0 } else { (i % 50) as f64 })
            .collect();
        let mut raster = Raster::from_vec(data, 20, 20).unwrap();
        raster.set_transform(GeoTransform::new(0.0, 200.0, 10.0, -10.0));
        InMemorySource::new(&raster)
    }

    fn buffers() -> Vec<Option<MultiPolygon<f64>>> {
        (0..17)
            .map(|i| {
                if i % 5 == 3 {
                    return None;
                }
                let x = (i * 11) as f64;
                let y = (i * 7) as f64;
                let p = polygon![
                    (x: x, y: y),
                    (x: x + 35.0, y: y),
                    (x: x + 35.0, y: y + 25.0),
                    (x: x, y: y + 25.0),
                ];
                Some(MultiPolygon::new(vec![p]))
            })
            .collect()
    }

    #[test]
    fn test_batch_ranges() {
        let ranges: Vec<_> = batch_ranges(7, 3).collect();
        assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 7)]);
        assert_eq!(batch_ranges(0, 3).count(), 0);
        assert_eq!(batch_ranges(3, 10).collect::<Vec<_>>(), vec![(0, 3)]);
    }

    #[test]
    fn test_chunk_size_does_not_change_results() {
        let buffers = buffers();
        let mut src = source();

        let whole = aggregate(
            &buffers,
            &mut src,
            &AggregateParams {
                chunk_size: buffers.len(),
                nodata: 65535.0,
            },
        )
        .unwrap();

        for chunk_size in [1, 2, 4, 16, 100] {
            let chunked = aggregate(
                &buffers,
                &mut src,
                &AggregateParams {
                    chunk_size,
                    nodata: 65535.0,
                },
            )
            .unwrap();
            assert_eq!(chunked, whole, "chunk size {}", chunk_size);
        }
        assert_eq!(whole.len(), buffers.len());
        assert!(whole[3].is_none());
        assert!(whole[0].is_some());
    }

    #[test]
    fn test_progress_reports_each_batch() {
        let buffers = buffers();
        let mut src = source();
        let mut seen = Vec::new();
        aggregate_with_progress(
            &buffers,
            &mut src,
            &AggregateParams {
                chunk_size: 5,
                nodata: 65535.0,
            },
            |p| seen.push((p.start, p.end)),
        )
        .unwrap();
        assert_eq!(seen, vec![(0, 5), (5, 10), (10, 15), (15, 17)]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut src = source();
        let r = aggregate(
            &buffers(),
            &mut src,
            &AggregateParams {
                chunk_size: 0,
                nodata: 65535.0,
            },
        );
        assert!(matches!(r, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_empty_input() {
        let mut src = source();
        let out = aggregate(&[], &mut src, &AggregateParams::default()).unwrap();
        assert!(out.is_empty());
    }
}
