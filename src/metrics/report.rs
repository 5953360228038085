//! The accumulated output of the metrics engine.
use nalgebra::Point3;
use std::fmt;

/// The value of one reported metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// An integer quantity, such as a number of fibers
    Count(u64),
    /// A real-valued measurement
    Scalar(f64),
    /// A position, in physical or voxel coordinates
    Point([f64; 3]),
}

impl MetricValue {
    /// The components of the value, one per column of a table.
    pub fn components(&self) -> Vec<f64> {
        match *self {
            MetricValue::Count(c) => vec![c as f64],
            MetricValue::Scalar(v) => vec![v],
            MetricValue::Point(p) => p.to_vec(),
        }
    }

    /// The value as a single real number, if it is not a point.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            MetricValue::Count(c) => Some(c as f64),
            MetricValue::Scalar(v) => Some(v),
            MetricValue::Point(_) => None,
        }
    }
}

impl From<Point3<f64>> for MetricValue {
    fn from(p: Point3<f64>) -> Self {
        MetricValue::Point([p.x, p.y, p.z])
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MetricValue::Count(c) => write!(f, "{}", c),
            MetricValue::Scalar(v) => write!(f, "{}", v),
            MetricValue::Point(p) => write!(f, "[{}, {}, {}]", p[0], p[1], p[2]),
        }
    }
}

/// Human readable report text plus the same metrics keyed by name, in the
/// order they were computed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    text: String,
    entries: Vec<(String, MetricValue)>,
}

impl Report {
    /// The report body, as written to the text output.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// All metrics in the order they were added.
    pub fn entries(&self) -> &[(String, MetricValue)] {
        &self.entries
    }

    /// Look up a metric by name.
    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Number of metrics in the report.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no metric was computed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn insert<K: Into<String>>(&mut self, key: K, value: MetricValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Start a new paragraph of the text.
    pub(crate) fn paragraph(&mut self) {
        self.text.push_str("\n\n");
    }

    pub(crate) fn line(&mut self) {
        self.text.push('\n');
    }

    pub(crate) fn write(&mut self, text: &str) {
        self.text.push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entries_keep_order() {
        let mut report = Report::default();
        report.insert("b", MetricValue::Count(2));
        report.insert("a", MetricValue::Scalar(0.5));
        report.insert("b", MetricValue::Count(3));
        let keys: Vec<&str> = report.entries().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(report.get("b"), Some(&MetricValue::Count(3)));
        assert_eq!(report.get("c"), None);
    }

    #[test]
    fn display_values() {
        assert_eq!(MetricValue::Point([1., 2.5, -3.]).to_string(), "[1, 2.5, -3]");
        assert_eq!(MetricValue::Scalar(0.25).to_string(), "0.25");
        assert_eq!(MetricValue::Count(7).components(), vec![7.]);
    }
}
