//! Shape and diffusion metrics over tractography streamline bundles.
//!
//! A tractogram file (MRtrix ".tck", TrackVis ".trk", VTK ".vtk" or VTK
//! XML ".vtp") is read into a [`Tracts`] collection, which can be
//! resampled, compressed and oriented. The [`Metrics`] engine then reports
//! geometric statistics of the bundle, along with the statistics and the
//! along-fiber behavior profile of scalar maps such as FA or MD, read as
//! [`ScalarVolume`]s from NIfTI files.
//!
//! # Example
//!
//! ```no_run
//! use tractometry::{Metrics, ScalarVolume, Tractogram, Tracts};
//! # use tractometry::Result;
//!
//! # fn run() -> Result<()> {
//! let tracts = Tracts::from_tractogram(Tractogram::from_file("af_left.tck")?)?;
//! let fa = ScalarVolume::from_file("fa.nii.gz")?;
//!
//! let mut metrics = Metrics::new(tracts);
//! let profile = metrics.diffusion(fa.data(), "FA", fa.affine())?;
//! metrics.geometric(Some(fa.affine()))?;
//! println!("{}", metrics.report().text());
//! println!("{:?}", profile.values());
//! # Ok(())
//! # }
//! ```
//!
//! [`Tracts`]: tracts/struct.Tracts.html
//! [`Metrics`]: metrics/struct.Metrics.html
//! [`ScalarVolume`]: volume/struct.ScalarVolume.html
#![deny(missing_debug_implementations)]
#![warn(missing_docs, unused_extern_crates, trivial_casts, unused_results)]

pub mod affine;
pub mod error;
pub mod export;
pub mod format;
pub mod metrics;
pub mod pipeline;
pub mod streamline;
pub mod tracts;
pub mod volume;
mod util;

pub use crate::error::{Result, TractError};
pub use crate::format::{load_tractogram, Tractogram};
pub use crate::metrics::{BehaviorProfile, Metrics, Report};
pub use crate::streamline::Streamline;
pub use crate::tracts::Tracts;
pub use crate::volume::ScalarVolume;
