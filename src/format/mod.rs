//! This module contains the tractogram file readers.
//!
//! Each supported format decodes into a [`Tractogram`]: the streamlines in
//! file order, an optional header map and the per-point data attached to
//! the streamlines. The reader is picked once from the file extension,
//! see [`TractogramFormat`].
//!
//! [`Tractogram`]: struct.Tractogram.html
//! [`TractogramFormat`]: enum.TractogramFormat.html

pub mod tck;
pub mod trk;
pub mod vtk;

use crate::error::{Result, TractError};
use crate::streamline::Streamline;
use crate::util::inner_extension;
use log::debug;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::path::Path;

/// Format-specific header fields, as text.
pub type Header = BTreeMap<String, String>;

/// Named per-point attributes. Each entry holds one
/// `n_points × n_components` array per streamline, aligned index for index
/// with the streamline's points.
pub type PointData = BTreeMap<String, Vec<Array2<f64>>>;

/// The decoded contents of a tractogram file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tractogram {
    /// Streamlines, in file order
    pub streamlines: Vec<Streamline>,
    /// Header fields, for formats which have a header
    pub header: Option<Header>,
    /// Per-point attributes
    pub point_data: PointData,
}

/// The tractogram file formats understood by this crate.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TractogramFormat {
    /// MRtrix tracks (".tck")
    Tck,
    /// TrackVis (".trk")
    Trk,
    /// VTK legacy polydata (".vtk")
    Vtk,
    /// VTK XML polydata (".vtp", ".xml")
    VtkXml,
}

impl TractogramFormat {
    /// Identify the format of a file by its extension. A trailing ".gz"
    /// extension is looked past.
    ///
    /// # Errors
    ///
    /// - `TractError::UnsupportedFormat` for any other extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        match inner_extension(&path).as_deref() {
            Some("tck") => Ok(TractogramFormat::Tck),
            Some("trk") => Ok(TractogramFormat::Trk),
            Some("vtk") => Ok(TractogramFormat::Vtk),
            Some("vtp") | Some("xml") => Ok(TractogramFormat::VtkXml),
            _ => Err(TractError::UnsupportedFormat(format!(
                "{} (supported: tck, trk, vtk, vtp, xml)",
                path.as_ref().display()
            ))),
        }
    }
}

impl Tractogram {
    /// Read a tractogram file, picking the reader from the file extension.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tractometry::format::Tractogram;
    /// # use tractometry::Result;
    ///
    /// # fn run() -> Result<()> {
    /// let tractogram = Tractogram::from_file("cst_left.tck")?;
    /// println!("{} streamlines", tractogram.streamlines.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Tractogram> {
        let format = TractogramFormat::from_path(&path)?;
        let tractogram = match format {
            TractogramFormat::Tck => tck::from_file(&path)?,
            TractogramFormat::Trk => trk::from_file(&path)?,
            TractogramFormat::Vtk => vtk::legacy::from_file(&path)?,
            TractogramFormat::VtkXml => vtk::xml::from_file(&path)?,
        };
        debug!(
            "Read {} streamlines from {} ({:?})",
            tractogram.streamlines.len(),
            path.as_ref().display(),
            format
        );
        Ok(tractogram)
    }
}

/// Read a tractogram file, picking the reader from the file extension.
/// Equivalent to [`Tractogram::from_file`].
///
/// [`Tractogram::from_file`]: struct.Tractogram.html#method.from_file
pub fn load_tractogram<P: AsRef<Path>>(path: P) -> Result<Tractogram> {
    Tractogram::from_file(path)
}
