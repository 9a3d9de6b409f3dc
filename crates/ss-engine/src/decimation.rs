//! Sparse strided evaluation plans and min/max reduction.
//!
//! Rendering a wide window at full resolution is too expensive, so the
//! backend only evaluates about `OVERSAMPLE` samples per output column,
//! spaced `stride` apart, and each column keeps the min and max it saw.

use ss_ir::{ColumnMinMax, SampleIndex, StereoBuffer};

use crate::backend::EvalRange;

/// Evaluated samples per output column.
pub const OVERSAMPLE: u64 = 8;

/// How one view will be evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecimationPlan {
    pub start: SampleIndex,
    pub total_samples: u64,
    pub output_width: usize,
    pub stride: u64,
    /// Number of samples the backend evaluates.
    pub render_width: usize,
}

impl DecimationPlan {
    pub fn new(start: SampleIndex, end: SampleIndex, output_width: usize, max_block_samples: usize) -> Self {
        let total_samples = end.get().saturating_sub(start.get());
        let max_block = max_block_samples.max(1) as u64;

        if total_samples == 0 || output_width == 0 {
            return Self {
                start,
                total_samples,
                output_width,
                stride: 1,
                render_width: 0,
            };
        }

        let target = (output_width as u64 * OVERSAMPLE).min(total_samples).min(max_block);
        let stride = (total_samples / target).max(1);
        let render_width = total_samples.div_ceil(stride).min(max_block);

        Self {
            start,
            total_samples,
            output_width,
            stride,
            render_width: render_width as usize,
        }
    }

    /// The backend call for this plan.
    pub fn eval_range(&self, sample_rate: f64) -> EvalRange {
        EvalRange {
            start: self.start,
            count: self.render_width,
            sample_rate,
            stride: self.stride,
        }
    }
}

/// Reduce evaluated samples into `output_width` columns.
///
/// Column `c` covers evaluated samples `[c*n/w, (c+1)*n/w)`. When there are
/// fewer samples than columns some buckets are empty; those take the nearest
/// evaluated sample as both min and max. With no samples at all every column
/// is silent.
pub fn reduce(samples: &StereoBuffer, output_width: usize) -> Vec<ColumnMinMax> {
    let n = samples.frames();
    if n == 0 {
        return vec![ColumnMinMax::default(); output_width];
    }

    let left = samples.left();
    let right = samples.right();
    let mut columns = Vec::with_capacity(output_width);

    for c in 0..output_width {
        let lo = c * n / output_width;
        let hi = (c + 1) * n / output_width;

        let column = if lo < hi {
            let mut col = ColumnMinMax::point(left[lo], right[lo]);
            for i in lo + 1..hi {
                col.include(left[i], right[i]);
            }
            col
        } else {
            let nearest = ((2 * c + 1) * n / (2 * output_width)).min(n - 1);
            ColumnMinMax::point(left[nearest], right[nearest])
        };
        columns.push(column);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(start: u64, end: u64, width: usize, max: usize) -> DecimationPlan {
        DecimationPlan::new(SampleIndex::new(start), SampleIndex::new(end), width, max)
    }

    #[test]
    fn one_second_at_200_columns() {
        let p = plan(0, 48000, 200, 1 << 20);
        assert_eq!(p.stride, 30);
        assert_eq!(p.render_width, 1600);
    }

    #[test]
    fn backend_limit_caps_render_width() {
        let p = plan(0, 48000 * 60, 4000, 8192);
        assert!(p.render_width <= 8192);
        assert_eq!(p.stride, 48000 * 60 / 8192);
    }

    #[test]
    fn short_window_is_evaluated_densely() {
        let p = plan(500, 510, 100, 1 << 20);
        assert_eq!(p.stride, 1);
        assert_eq!(p.render_width, 10);
        let range = p.eval_range(48000.0);
        assert_eq!(range.start.get(), 500);
        assert_eq!(range.count, 10);
    }

    #[test]
    fn empty_window_renders_nothing() {
        assert_eq!(plan(100, 100, 50, 1024).render_width, 0);
        assert_eq!(plan(100, 90, 50, 1024).render_width, 0);
    }

    #[test]
    fn reduce_takes_min_max_per_column() {
        let left = [0.1, -0.4, 0.9, 0.2];
        let right = [0.0, 0.3, -0.6, -0.1];
        let cols = reduce(&StereoBuffer::from_planes(&left, &right), 2);
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0], ColumnMinMax { min_left: -0.4, max_left: 0.1, min_right: 0.0, max_right: 0.3 });
        assert_eq!(cols[1], ColumnMinMax { min_left: 0.2, max_left: 0.9, min_right: -0.6, max_right: -0.1 });
    }

    #[test]
    fn more_columns_than_samples_fills_every_column() {
        let left: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        let right: Vec<f32> = left.iter().map(|v| -v).collect();
        let cols = reduce(&StereoBuffer::from_planes(&left, &right), 100);

        assert_eq!(cols.len(), 100);
        for col in &cols {
            for v in [col.min_left, col.max_left, col.min_right, col.max_right] {
                assert!(!v.is_nan());
            }
        }
        assert_eq!(cols[0].min_left, 0.0);
        assert_eq!(cols[99].max_left, 0.9);
    }

    #[test]
    fn no_samples_gives_silent_columns() {
        let cols = reduce(&StereoBuffer::new(0), 3);
        assert_eq!(cols, vec![ColumnMinMax::default(); 3]);
    }
}
