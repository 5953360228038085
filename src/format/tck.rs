//! Reader for the MRtrix tracks format (".tck").
//!
//! A tracks file starts with a text header of `key: value` lines, closed by
//! a line holding only `END`. The header declares the number of streamlines
//! (`count`), the byte offset of the binary data (`file: . <offset>`) and the
//! data type of the coordinates (`datatype`, one of `Float32LE`,
//! `Float32BE`, `Float64LE` or `Float64BE`).
//!
//! The binary data is a flat sequence of `x y z` triplets. Streamlines are
//! not length-prefixed: the end of each streamline is marked by a triplet
//! of NaN values, and a triplet of infinite values marks the end of the data.

use super::{Header, Tractogram};
use crate::error::{Result, TractError};
use crate::streamline::Streamline;
use crate::util::{read_file_bytes, strip_quotes};
use byteordered::{ByteOrdered, Endianness};
use log::{debug, warn};
use nalgebra::Point3;
use std::io::Read;
use std::path::Path;

/// Magic line which opens a tracks file.
pub const MAGIC_LINE: &str = "mrtrix tracks";

/// Read a tracks file. If the file name ends with ".gz", the file is
/// decoded as a Gzip stream first.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Tractogram> {
    from_bytes(&read_file_bytes(path)?)
}

/// Read a tracks file from the given byte stream, consuming it to the end.
pub fn from_reader<R: Read>(mut source: R) -> Result<Tractogram> {
    let mut bytes = Vec::new();
    let _ = source.read_to_end(&mut bytes)?;
    from_bytes(&bytes)
}

/// Decode the full contents of a tracks file.
///
/// # Errors
///
/// - `TractError::MalformedInput` if the header is not terminated or misses
///   one of the `count`, `file` or `datatype` keys.
/// - `TractError::UnsupportedFormat` for coordinate data types other than
///   32 or 64 bit floats.
pub fn from_bytes(bytes: &[u8]) -> Result<Tractogram> {
    let (header, header_end) = parse_header(bytes)?;

    let count: usize = required(&header, "count")?
        .parse()
        .map_err(|_| TractError::MalformedInput(format!("invalid count {:?}", header["count"])))?;
    let offset = data_offset(required(&header, "file")?)?;
    let (width, endianness) = data_type(required(&header, "datatype")?)?;

    // an offset pointing inside of the header text means "right after END"
    let start = offset.max(header_end);
    if start > bytes.len() {
        return Err(TractError::MalformedInput(format!(
            "data offset {} past the end of the file ({} bytes)",
            start,
            bytes.len()
        )));
    }

    let triplets = read_triplets(&bytes[start..], width, endianness)?;
    let streamlines = split_streamlines(&triplets)?;

    if streamlines.len() != count {
        warn!(
            "Header declares {} streamlines, but {} were read",
            count,
            streamlines.len()
        );
    }
    debug!("Decoded {} triplets into {} streamlines", triplets.len(), streamlines.len());

    Ok(Tractogram {
        streamlines,
        header: Some(header),
        point_data: Default::default(),
    })
}

fn required<'a>(header: &'a Header, key: &str) -> Result<&'a str> {
    header
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| TractError::MalformedInput(format!("missing header key `{}`", key)))
}

/// Parse the text header, returning the key/value pairs and the position
/// of the first byte after the `END` line.
fn parse_header(bytes: &[u8]) -> Result<(Header, usize)> {
    let mut header = Header::new();
    let mut pos = 0;
    let mut first = true;
    while pos < bytes.len() {
        let end = bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .unwrap_or_else(|| bytes.len());
        let line = String::from_utf8_lossy(&bytes[pos..end]);
        let line = line.trim_end_matches('\r');
        pos = (end + 1).min(bytes.len());

        if line.trim() == "END" {
            return Ok((header, pos));
        }
        if first && line.trim() == MAGIC_LINE {
            first = false;
            continue;
        }
        first = false;

        if let Some(sep) = line.find(':') {
            let key = line[..sep].trim().to_string();
            let value = strip_quotes(&line[sep + 1..]).to_string();
            let _ = header
                .entry(key)
                .and_modify(|v| {
                    v.push('\n');
                    v.push_str(&value);
                })
                .or_insert_with(|| value.clone());
        }
    }
    Err(TractError::MalformedInput(
        "header is not terminated by END".to_string(),
    ))
}

/// Parse the `file` header value, of the form `. <offset>`.
fn data_offset(value: &str) -> Result<usize> {
    let mut parts = value.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("."), Some(offset)) => offset
            .parse()
            .map_err(|_| TractError::MalformedInput(format!("invalid data offset {:?}", value))),
        _ => Err(TractError::MalformedInput(format!(
            "unsupported `file` value {:?}",
            value
        ))),
    }
}

/// Parse the `datatype` header value into element width and byte order.
fn data_type(value: &str) -> Result<(usize, Endianness)> {
    match value {
        "Float32LE" => Ok((4, Endianness::Little)),
        "Float32BE" => Ok((4, Endianness::Big)),
        "Float64LE" => Ok((8, Endianness::Little)),
        "Float64BE" => Ok((8, Endianness::Big)),
        other => Err(TractError::UnsupportedFormat(format!(
            "tck datatype {:?}",
            other
        ))),
    }
}

fn read_triplets(data: &[u8], width: usize, endianness: Endianness) -> Result<Vec<[f64; 3]>> {
    let n = data.len() / (width * 3);
    let mut source = ByteOrdered::runtime(data, endianness);
    let mut triplets = Vec::with_capacity(n);
    for _ in 0..n {
        let mut t = [0f64; 3];
        for v in t.iter_mut() {
            *v = if width == 4 {
                f64::from(source.read_f32()?)
            } else {
                source.read_f64()?
            };
        }
        if t.iter().all(|v| v.is_infinite()) {
            break;
        }
        triplets.push(t);
    }
    Ok(triplets)
}

fn is_delimiter(t: &[f64; 3]) -> bool {
    t.iter().all(|v| v.is_nan())
}

/// Split the flat triplet sequence at the NaN delimiters.
fn split_streamlines(triplets: &[[f64; 3]]) -> Result<Vec<Streamline>> {
    let mut delimiters: Vec<usize> = triplets
        .iter()
        .enumerate()
        .filter(|(_, t)| is_delimiter(t))
        .map(|(i, _)| i)
        .collect();
    match triplets.last() {
        Some(t) if !is_delimiter(t) => delimiters.push(triplets.len()),
        _ => {}
    }

    let mut streamlines = Vec::with_capacity(delimiters.len());
    let mut start = 0;
    for end in delimiters {
        if end > start {
            let points = triplets[start..end].iter().map(|t| Point3::from(*t)).collect();
            streamlines.push(Streamline::new(points)?);
        }
        start = end + 1;
    }
    Ok(streamlines)
}
