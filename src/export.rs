//! Writers for the report and the behavior profiles.
use crate::error::Result;
use crate::metrics::{BehaviorProfile, Report, PROFILE_BINS};
use csv::WriterBuilder;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write the text report: the header line followed by the report body.
pub fn write_text<P: AsRef<Path>>(path: P, header: &str, body: &str) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "{}", header)?;
    file.write_all(body.as_bytes())?;
    file.flush()?;
    Ok(())
}

/// Write the report as a two-row, semicolon separated CSV file: the metric
/// names, then their values. Positions are written as `[x, y, z]`.
pub fn write_csv<P: AsRef<Path>>(path: P, report: &Report) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b';').from_path(path)?;
    writer.write_record(report.entries().iter().map(|(key, _)| key.as_str()))?;
    writer.write_record(report.entries().iter().map(|(_, value)| value.to_string()))?;
    writer.flush()?;
    Ok(())
}

/// Write the report as a table with one metric per row: the header on the
/// first row, an empty row, then the metric name followed by the value
/// components in consecutive columns.
pub fn write_table<P: AsRef<Path>>(path: P, header: &str, report: &Report) -> Result<()> {
    let mut writer = WriterBuilder::new().flexible(true).from_path(path)?;
    writer.write_record(&[header])?;
    writer.write_record(&[""])?;
    for (key, value) in report.entries() {
        let mut row = vec![key.clone()];
        row.extend(value.components().iter().map(f64::to_string));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the behavior profiles, one row per scalar map and one column per
/// tenth of the bundle length.
pub fn write_profiles<P: AsRef<Path>>(
    path: P,
    profiles: &[(String, BehaviorProfile)],
) -> Result<()> {
    let mut writer = WriterBuilder::new().delimiter(b';').from_path(path)?;
    let mut columns = vec!["Map".to_string()];
    columns.extend((1..=PROFILE_BINS).map(|bin| format!("{}%", bin * 100 / PROFILE_BINS)));
    writer.write_record(&columns)?;
    for (name, profile) in profiles {
        let mut row = vec![name.clone()];
        row.extend(profile.values().iter().map(f64::to_string));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{MetricValue, Metrics};
    use crate::streamline::Streamline;
    use crate::tracts::Tracts;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn report() -> Report {
        let streamline =
            Streamline::from_coords(&[[0., 0., 0.], [3., 0., 0.], [3., 4., 0.]]).unwrap();
        let mut metrics = Metrics::new(Tracts::new(vec![streamline], None).unwrap());
        metrics.geometric(None).unwrap();
        metrics.report().clone()
    }

    #[test]
    fn csv_has_one_value_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle.csv");
        let report = report();
        write_csv(&path, &report).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Number of fibers;Mean number of points per fiber;"));
        assert!(lines[1].starts_with("1;3;0;3;3;3;7;"));
        assert_eq!(
            lines[0].split(';').count(),
            lines[1].split(';').count()
        );
        assert_eq!(report.get("Mean Length"), Some(&MetricValue::Scalar(7.)));
    }

    #[test]
    fn table_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bundle_table.csv");
        write_table(&path, "subject 01", &report()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "subject 01");
        assert_eq!(lines[1], "\"\"");
        assert_eq!(lines[2], "Number of fibers,1");
        assert!(lines.contains(&"Mean Midpoint Position (mm),3,0.5,0"));
    }

    #[test]
    fn text_and_profiles() {
        let dir = tempdir().unwrap();
        let text_path = dir.path().join("bundle.txt");
        write_text(&text_path, "header", "\n\nNumber of fibers: 1").unwrap();
        assert_eq!(
            fs::read_to_string(&text_path).unwrap(),
            "header\n\n\nNumber of fibers: 1"
        );

        let profile_path = dir.path().join("bundle_profiles.csv");
        let profile = BehaviorProfile([0.5; PROFILE_BINS]);
        write_profiles(&profile_path, &[("FA".to_string(), profile)]).unwrap();
        let text = fs::read_to_string(&profile_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Map;10%;20%;30%;40%;50%;60%;70%;80%;90%;100%");
        assert_eq!(lines[1], "FA;0.5;0.5;0.5;0.5;0.5;0.5;0.5;0.5;0.5;0.5");
    }
}
