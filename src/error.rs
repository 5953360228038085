//! Types for error handling go here.
use nifti::NiftiError;
use quick_error::quick_error;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all errors that may occur while reading tractograms,
    /// loading volumes and computing metrics.
    #[derive(Debug)]
    pub enum TractError {
        /// The tractogram holds no streamlines.
        EmptyInput {
            display("Tractogram contains no streamlines")
        }
        /// The file extension or an encoding inside the file is not supported.
        UnsupportedFormat(what: String) {
            display("Unsupported format: {}", what)
        }
        /// The file could not be decoded as the format it claims to be.
        MalformedInput(what: String) {
            display("Malformed input: {}", what)
        }
        /// An argument is outside of its accepted domain.
        InvalidArgument(what: String) {
            display("Invalid argument: {}", what)
        }
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }
        /// Failure to read a volume
        Nifti(err: NiftiError) {
            from()
            source(err)
            display("NIfTI error: {}", err)
        }
        /// Failure to write a tabular export
        Csv(err: csv::Error) {
            from()
            source(err)
            display("CSV error: {}", err)
        }
    }
}

/// Alias type for results originating from this crate.
pub type Result<T> = ::std::result::Result<T, TractError>;
