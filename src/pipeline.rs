//! The full processing of one tractogram: reading, optional resampling and
//! compression, metrics over the requested scalar maps, and export.
//!
//! # Example
//!
//! ```no_run
//! use tractometry::pipeline::{run, PipelineOptions};
//! # use tractometry::Result;
//!
//! # fn main() -> Result<()> {
//! let options = PipelineOptions::new("cst_left.tck", "cst_left.txt")
//!     .fa("fa.nii.gz")
//!     .resample(50.)
//!     .csv(true);
//! let output = run(&options)?;
//! println!("{}", output.report.text());
//! # Ok(())
//! # }
//! ```
use crate::affine::Affine4;
use crate::error::{Result, TractError};
use crate::export::{write_csv, write_profiles, write_table, write_text};
use crate::format::{load_tractogram, TractogramFormat};
use crate::metrics::{BehaviorProfile, Metrics, Report};
use crate::tracts::Tracts;
use crate::util::{inner_extension, is_gz_file};
use crate::volume::ScalarVolume;
use log::info;
use std::path::{Path, PathBuf};

/// Settings of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOptions {
    tractogram: PathBuf,
    output: PathBuf,
    fa: Option<PathBuf>,
    bzero: Option<PathBuf>,
    md: Option<PathBuf>,
    header: Option<String>,
    csv: bool,
    table: bool,
    profiles: bool,
    resample: Option<f64>,
    compress: bool,
}

impl PipelineOptions {
    /// Process the given tractogram file, writing the text report to
    /// `output` (a ".txt" file).
    pub fn new<P, Q>(tractogram: P, output: Q) -> Self
    where
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        PipelineOptions {
            tractogram: tractogram.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Sample the fractional anisotropy map in this NIfTI file.
    pub fn fa<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.fa = Some(path.into());
        self
    }

    /// Sample the b-zero map in this NIfTI file.
    pub fn bzero<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.bzero = Some(path.into());
        self
    }

    /// Sample the mean diffusivity map in this NIfTI file.
    pub fn md<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.md = Some(path.into());
        self
    }

    /// First line of the text report. Defaults to the output path.
    pub fn header<S: Into<String>>(mut self, header: S) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Also write the report as a one-row CSV file.
    pub fn csv(mut self, enabled: bool) -> Self {
        self.csv = enabled;
        self
    }

    /// Also write the report as a table, one metric per row.
    pub fn table(mut self, enabled: bool) -> Self {
        self.table = enabled;
        self
    }

    /// Also write the behavior profiles of the scalar maps.
    pub fn profiles(mut self, enabled: bool) -> Self {
        self.profiles = enabled;
        self
    }

    /// Resample every streamline to this percentage of its points.
    pub fn resample(mut self, percent: f64) -> Self {
        self.resample = Some(percent);
        self
    }

    /// Remove near-collinear points from the streamlines.
    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// The scalar maps to sample, in processing order.
    fn maps(&self) -> Vec<(&'static str, &Path)> {
        let maps = [
            ("FA", self.fa.as_ref()),
            ("b-zero", self.bzero.as_ref()),
            ("MD", self.md.as_ref()),
        ];
        maps.iter()
            .filter_map(|&(name, path)| path.map(|p| (name, p.as_path())))
            .collect()
    }

    /// Check the file extensions and the resampling percentage.
    ///
    /// # Errors
    ///
    /// - `TractError::UnsupportedFormat` for an unknown tractogram format,
    ///   an output file other than ".txt" or volumes other than NIfTI.
    /// - `TractError::InvalidArgument` for a resampling percentage outside
    ///   of `(0, 100]`.
    pub fn validate(&self) -> Result<()> {
        let _ = TractogramFormat::from_path(&self.tractogram)?;
        if is_gz_file(&self.output) || inner_extension(&self.output).as_deref() != Some("txt") {
            return Err(TractError::UnsupportedFormat(format!(
                "{} (output must be a .txt file)",
                self.output.display()
            )));
        }
        for (name, path) in self.maps() {
            if inner_extension(path).as_deref() != Some("nii") {
                return Err(TractError::UnsupportedFormat(format!(
                    "{} map {} (supported: nii, nii.gz)",
                    name,
                    path.display()
                )));
            }
        }
        if let Some(percent) = self.resample {
            if !(percent > 0. && percent <= 100.) {
                return Err(TractError::InvalidArgument(format!(
                    "resampling percentage {} must lie in (0, 100]",
                    percent
                )));
            }
        }
        Ok(())
    }

    /// Path of an additional export, next to the text report.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let stem = self
            .output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.output.with_file_name(format!("{}{}", stem, suffix))
    }
}

/// Results of a pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    /// The computed metrics
    pub report: Report,
    /// The behavior profile of each sampled map, in processing order
    pub profiles: Vec<(String, BehaviorProfile)>,
    /// All files written, the text report first
    pub written: Vec<PathBuf>,
}

/// Run the pipeline.
///
/// Scalar maps are sampled in the order FA, b-zero, MD. The bundle is
/// oriented once, with the affine of the first map, and the geometric
/// metrics use the affine of the last map.
pub fn run(options: &PipelineOptions) -> Result<PipelineOutput> {
    options.validate()?;

    info!("Reading {}", options.tractogram.display());
    let mut tracts = Tracts::from_tractogram(load_tractogram(&options.tractogram)?)?;
    info!("{} streamlines loaded", tracts.len());

    if let Some(percent) = options.resample {
        info!("Resampling streamlines to {}% of their points", percent);
        tracts.resample(percent)?;
    }
    if options.compress {
        info!("Compressing streamlines");
        tracts.compress();
    }

    let mut metrics = Metrics::new(tracts);
    let mut profiles = Vec::new();
    let mut affine: Option<Affine4> = None;
    for (name, path) in options.maps() {
        info!("Sampling {} from {}", name, path.display());
        let (data, map_affine) = ScalarVolume::from_file(path)?.into_parts();
        let profile = metrics.diffusion(&data, name, &map_affine)?;
        profiles.push((name.to_string(), profile));
        affine = Some(map_affine);
    }

    info!("Computing geometric metrics");
    metrics.geometric(affine.as_ref())?;

    let report = metrics.report().clone();
    let header = options
        .header
        .clone()
        .unwrap_or_else(|| options.output.display().to_string());

    let mut written = Vec::new();
    write_text(&options.output, &header, report.text())?;
    written.push(options.output.clone());
    if options.table {
        let path = options.sibling("_table.csv");
        write_table(&path, &header, &report)?;
        written.push(path);
    }
    if options.csv {
        let path = options.sibling(".csv");
        write_csv(&path, &report)?;
        written.push(path);
    }
    if options.profiles {
        let path = options.sibling("_profiles.csv");
        write_profiles(&path, &profiles)?;
        written.push(path);
    }
    for path in &written {
        info!("Wrote {}", path.display());
    }

    Ok(PipelineOutput {
        report,
        profiles,
        written,
    })
}
