//! Descriptive statistics over per-streamline measurements.
use nalgebra::Point3;
use num_traits::ToPrimitive;

/// Mean, population standard deviation, median and extremes of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Arithmetic mean
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    /// Median, averaging the two middle values for even sample sizes
    pub median: f64,
    /// Largest value
    pub max: f64,
    /// Smallest value
    pub min: f64,
}

impl Summary {
    /// Summarize a sample. Returns `None` if the sample is empty or holds
    /// values without a floating point representation.
    ///
    /// # Example
    ///
    /// ```
    /// use tractometry::metrics::stats::Summary;
    ///
    /// let summary = Summary::of(&[1u32, 2, 3, 10]).unwrap();
    /// assert_eq!(summary.mean, 4.);
    /// assert_eq!(summary.median, 2.5);
    /// assert_eq!((summary.min, summary.max), (1., 10.));
    /// ```
    pub fn of<T: ToPrimitive>(values: &[T]) -> Option<Summary> {
        let mut values: Vec<f64> = values.iter().map(|v| v.to_f64()).collect::<Option<_>>()?;
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let mid = values.len() / 2;
        let median = if values.len() % 2 == 0 {
            (values[mid - 1] + values[mid]) / 2.
        } else {
            values[mid]
        };

        Some(Summary {
            mean,
            std: var.sqrt(),
            median,
            max: values[values.len() - 1],
            min: values[0],
        })
    }
}

/// The component-wise mean of a set of points.
pub fn mean_point<'a, I>(points: I) -> Option<Point3<f64>>
where
    I: IntoIterator<Item = &'a Point3<f64>>,
{
    let mut n = 0usize;
    let sum = points.into_iter().fold(Point3::origin(), |acc, p| {
        n += 1;
        acc + p.coords
    });
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}
