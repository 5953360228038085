//! Private utility module
use flate2::bufread::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read, Result as IoResult};
use std::path::Path;

/// Validate a raw file path for a "*.gz" extension.
pub fn is_gz_file<P>(path: P) -> bool
where
    P: AsRef<Path>,
{
    path.as_ref()
        .file_name()
        .map(|a| a.to_string_lossy().ends_with(".gz"))
        .unwrap_or(false)
}

/// Obtain the lowercase extension of a file path, looking past a trailing
/// ".gz" extension if one is present.
///
/// `"bundle.tck.gz"` and `"bundle.TCK"` both yield `Some("tck")`.
pub fn inner_extension<P>(path: P) -> Option<String>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let path = if is_gz_file(path) {
        Path::new(path.file_stem()?)
    } else {
        path
    };
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Read the full contents of a file into memory. If the file name ends
/// with ".gz", the contents are decoded as a Gzip stream.
pub fn read_file_bytes<P>(path: P) -> IoResult<Vec<u8>>
where
    P: AsRef<Path>,
{
    let gz = is_gz_file(&path);
    let mut file = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    if gz {
        let _ = GzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        let _ = file.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

/// Remove one level of surrounding quote characters (`"` or `'`).
pub fn strip_quotes(value: &str) -> &str {
    let value = value.trim();
    for q in &['"', '\''] {
        if value.len() >= 2 && value.starts_with(*q) && value.ends_with(*q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
