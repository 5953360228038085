//! Reader for VTK XML polydata files (".vtp", ".xml").
//!
//! Data arrays may be stored as ASCII text or as inline base64 binary,
//! optionally compressed with zlib. Arrays stored in the appended data
//! section are not supported.

use super::{cells_from_offsets, to_array, to_triplets, PolyData};
use crate::error::{Result, TractError};
use crate::format::Tractogram;
use crate::util::read_file_bytes;
use base64::{engine::general_purpose, Engine as _};
use byteordered::{ByteOrdered, Endianness};
use flate2::read::ZlibDecoder;
use log::{debug, warn};
use roxmltree::{Document, Node};
use std::io::Read;
use std::path::Path;

/// Read a VTK XML polydata file as a tractogram.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Tractogram> {
    from_bytes(&read_file_bytes(path)?)
}

/// Read a VTK XML polydata file from the given byte stream, consuming it
/// to the end.
pub fn from_reader<R: Read>(mut source: R) -> Result<Tractogram> {
    let mut bytes = Vec::new();
    let _ = source.read_to_end(&mut bytes)?;
    from_bytes(&bytes)
}

/// Decode the full contents of a VTK XML polydata file.
///
/// # Errors
///
/// - `TractError::UnsupportedFormat` if the file is not UTF-8 text, or
///   uses appended data or an unknown compressor.
/// - `TractError::MalformedInput` if the XML is invalid or the polydata is
///   incomplete.
pub fn from_bytes(bytes: &[u8]) -> Result<Tractogram> {
    read_polydata(bytes)?.into_tractogram()
}

/// Encoding settings declared on the root `VTKFile` element.
#[derive(Debug, Clone, Copy)]
struct Encoding {
    endianness: Endianness,
    header_width: usize,
    compressed: bool,
}

impl Encoding {
    fn from_root(root: Node) -> Result<Self> {
        let endianness = match root.attribute("byte_order") {
            Some("BigEndian") => Endianness::Big,
            _ => Endianness::Little,
        };
        let header_width = match root.attribute("header_type") {
            Some("UInt64") => 8,
            _ => 4,
        };
        let compressed = match root.attribute("compressor") {
            None | Some("") => false,
            Some("vtkZLibDataCompressor") => true,
            Some(other) => {
                return Err(TractError::UnsupportedFormat(format!(
                    "VTK compressor {:?}",
                    other
                )))
            }
        };
        Ok(Encoding {
            endianness,
            header_width,
            compressed,
        })
    }

    fn read_uint(&self, bytes: &[u8]) -> Result<usize> {
        let mut input = ByteOrdered::runtime(bytes, self.endianness);
        Ok(if self.header_width == 8 {
            input.read_u64()? as usize
        } else {
            input.read_u32()? as usize
        })
    }

    fn read_uints(&self, bytes: &[u8]) -> Result<Vec<usize>> {
        bytes
            .chunks_exact(self.header_width)
            .map(|c| self.read_uint(c))
            .collect()
    }
}

fn decode_base64(text: &str) -> Result<Vec<u8>> {
    general_purpose::STANDARD
        .decode(text)
        .map_err(|e| TractError::MalformedInput(format!("invalid base64 data: {}", e)))
}

/// Number of base64 characters encoding `n` bytes.
fn encoded_len(n: usize) -> usize {
    n.saturating_add(2) / 3 * 4
}

/// Decode an inline binary data array into its raw bytes.
///
/// The block header may be base64-encoded together with the data or on
/// its own, so both layouts are accepted.
fn decode_binary(text: &str, encoding: &Encoding) -> Result<Vec<u8>> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let hw = encoding.header_width;
    let truncated = || TractError::MalformedInput("truncated binary data array".to_string());

    if !encoding.compressed {
        if let Ok(bytes) = decode_base64(&text) {
            if bytes.len() >= hw {
                let n = encoding.read_uint(&bytes[..hw])?;
                if bytes.len() - hw >= n {
                    return Ok(bytes[hw..hw + n].to_vec());
                }
            }
        }
        let split = encoded_len(hw);
        let header = decode_base64(text.get(..split).ok_or_else(truncated)?)?;
        let n = encoding.read_uint(&header)?;
        let data = decode_base64(&text[split..])?;
        return data.get(..n).map(<[u8]>::to_vec).ok_or_else(truncated);
    }

    // [number of blocks, block size, last block size, compressed sizes...]
    let prefix = decode_base64(text.get(..encoded_len(3 * hw)).ok_or_else(truncated)?)?;
    let n_blocks = encoding.read_uint(&prefix[..hw])?;
    let header_len = n_blocks
        .checked_add(3)
        .and_then(|n| n.checked_mul(hw))
        .filter(|&len| encoded_len(len) <= text.len())
        .ok_or_else(truncated)?;

    let (header, data) = match decode_base64(&text) {
        Ok(bytes) if bytes.len() >= header_len => {
            let data = bytes[header_len..].to_vec();
            (bytes[..header_len].to_vec(), data)
        }
        _ => {
            let split = encoded_len(header_len);
            let header = decode_base64(text.get(..split).ok_or_else(truncated)?)?;
            (header, decode_base64(&text[split..])?)
        }
    };
    let header = encoding.read_uints(&header)?;
    if header.len() < 3 + n_blocks {
        return Err(truncated());
    }

    let mut out = Vec::new();
    let mut start: usize = 0;
    for &size in &header[3..3 + n_blocks] {
        let block = data.get(start..start.saturating_add(size)).ok_or_else(truncated)?;
        let _ = ZlibDecoder::new(block).read_to_end(&mut out)?;
        start += size;
    }
    Ok(out)
}

fn parse_values(bytes: &[u8], data_type: &str, endianness: Endianness) -> Result<Vec<f64>> {
    let width = match data_type {
        "Int8" | "UInt8" => 1,
        "Int16" | "UInt16" => 2,
        "Int32" | "UInt32" | "Float32" => 4,
        "Int64" | "UInt64" | "Float64" => 8,
        other => {
            return Err(TractError::UnsupportedFormat(format!(
                "VTK data type {:?}",
                other
            )))
        }
    };
    let n = bytes.len() / width;
    let mut input = ByteOrdered::runtime(bytes, endianness);
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        values.push(match data_type {
            "Int8" => f64::from(input.read_i8()?),
            "UInt8" => f64::from(input.read_u8()?),
            "Int16" => f64::from(input.read_i16()?),
            "UInt16" => f64::from(input.read_u16()?),
            "Int32" => f64::from(input.read_i32()?),
            "UInt32" => f64::from(input.read_u32()?),
            "Int64" => input.read_i64()? as f64,
            "UInt64" => input.read_u64()? as f64,
            "Float32" => f64::from(input.read_f32()?),
            _ => input.read_f64()?,
        });
    }
    Ok(values)
}

/// Read the values of a `DataArray` element.
fn read_array(node: Node, encoding: &Encoding) -> Result<Vec<f64>> {
    let text = node.text().unwrap_or("");
    match node.attribute("format").unwrap_or("ascii") {
        "ascii" => text
            .split_whitespace()
            .map(|t| {
                t.parse()
                    .map_err(|_| TractError::MalformedInput(format!("invalid number {:?}", t)))
            })
            .collect(),
        "binary" => {
            let data_type = node.attribute("type").unwrap_or("Float32");
            let bytes = decode_binary(text, encoding)?;
            parse_values(&bytes, data_type, encoding.endianness)
        }
        "appended" => Err(TractError::UnsupportedFormat(
            "VTK appended data".to_string(),
        )),
        other => Err(TractError::MalformedInput(format!(
            "unknown DataArray format {:?}",
            other
        ))),
    }
}

fn data_arrays<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.has_tag_name("DataArray"))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(name))
}

fn ints(values: Vec<f64>) -> Vec<i64> {
    values.into_iter().map(|v| v as i64).collect()
}

/// Decode the raw polydata of a VTK XML file. Only the first piece is read.
pub fn read_polydata(bytes: &[u8]) -> Result<PolyData> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| TractError::UnsupportedFormat("VTK XML file is not UTF-8 text".to_string()))?;
    let doc = Document::parse(text)
        .map_err(|e| TractError::MalformedInput(format!("invalid XML: {}", e)))?;
    let root = doc.root_element();
    if !root.has_tag_name("VTKFile") {
        return Err(TractError::MalformedInput(format!(
            "unexpected root element {:?}",
            root.tag_name().name()
        )));
    }
    match root.attribute("type") {
        Some("PolyData") | None => {}
        Some(other) => {
            return Err(TractError::UnsupportedFormat(format!(
                "VTK dataset {:?}",
                other
            )))
        }
    }
    let encoding = Encoding::from_root(root)?;

    let piece = child(root, "PolyData")
        .and_then(|p| child(p, "Piece"))
        .ok_or_else(|| TractError::MalformedInput("no PolyData piece".to_string()))?;
    let pieces = child(root, "PolyData").map_or(0, |p| {
        p.children().filter(|n| n.has_tag_name("Piece")).count()
    });
    if pieces > 1 {
        warn!("Only the first polydata piece is read");
    }
    let count_attr = |name: &str| -> Result<Option<usize>> {
        piece
            .attribute(name)
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|_| TractError::MalformedInput(format!("invalid {} {:?}", name, v)))
            })
            .transpose()
    };
    let n_points = count_attr("NumberOfPoints")?;
    let n_lines = count_attr("NumberOfLines")?;

    let mut polydata = PolyData {
        n_lines,
        ..PolyData::default()
    };

    if let Some(points) = child(piece, "Points").and_then(|p| data_arrays(p).next()) {
        let values = read_array(points, &encoding)?;
        let n = n_points.unwrap_or(values.len() / 3);
        polydata.points = Some(to_triplets(&values, n)?);
    }

    if let Some(lines) = child(piece, "Lines") {
        let mut connectivity = None;
        let mut offsets = None;
        for array in data_arrays(lines) {
            match array.attribute("Name") {
                Some("connectivity") => connectivity = Some(ints(read_array(array, &encoding)?)),
                Some("offsets") => offsets = Some(ints(read_array(array, &encoding)?)),
                other => debug!("Ignoring lines array {:?}", other),
            }
        }
        if let (Some(connectivity), Some(offsets)) = (connectivity, offsets) {
            polydata.lines = Some(cells_from_offsets(&offsets, &connectivity, false)?);
            if polydata.n_lines.is_none() {
                polydata.n_lines = Some(offsets.len());
            }
        }
    }

    if let Some(point_data) = child(piece, "PointData") {
        for array in data_arrays(point_data) {
            let name = array.attribute("Name").unwrap_or("unnamed").to_string();
            let components = array
                .attribute("NumberOfComponents")
                .and_then(|c| c.trim().parse().ok())
                .unwrap_or(1);
            let values = read_array(array, &encoding)?;
            polydata.point_arrays.push((name, to_array(values, components)?));
        }
    }

    Ok(polydata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    const ASCII: &str = r#"<?xml version="1.0"?>
<VTKFile type="PolyData" version="1.0" byte_order="LittleEndian">
  <PolyData>
    <Piece NumberOfPoints="5" NumberOfLines="2">
      <Points>
        <DataArray type="Float32" NumberOfComponents="3" format="ascii">
          0 0 0 1 0 0 2 0 0 3 0 0 4 0 0
        </DataArray>
      </Points>
      <Lines>
        <DataArray type="Int64" Name="connectivity" format="ascii">0 1 2 3 4</DataArray>
        <DataArray type="Int64" Name="offsets" format="ascii">2 5</DataArray>
      </Lines>
      <PointData>
        <DataArray type="Float32" Name="FA" format="ascii">0.1 0.2 0.3 0.4 0.5</DataArray>
      </PointData>
    </Piece>
  </PolyData>
</VTKFile>
"#;

    fn le_f32(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes().to_vec()).collect()
    }

    #[test]
    fn ascii_arrays() {
        let polydata = read_polydata(ASCII.as_bytes()).unwrap();
        assert_eq!(polydata.lines, Some(vec![2, 0, 1, 3, 2, 3, 4]));
        assert_eq!(polydata.n_lines, Some(2));
        assert_eq!(polydata.points.as_ref().unwrap()[4], [4., 0., 0.]);
        assert_eq!(polydata.point_arrays[0].0, "FA");
    }

    #[test]
    fn binary_header_layouts() {
        let encoding = Encoding {
            endianness: Endianness::Little,
            header_width: 4,
            compressed: false,
        };
        let data = le_f32(&[1., 2., 3.]);
        let mut joined = (data.len() as u32).to_le_bytes().to_vec();
        joined.extend_from_slice(&data);

        let together = general_purpose::STANDARD.encode(&joined);
        assert_eq!(decode_binary(&together, &encoding).unwrap(), data);

        let apart = format!(
            "{}\n  {}",
            general_purpose::STANDARD.encode((data.len() as u32).to_le_bytes()),
            general_purpose::STANDARD.encode(&data)
        );
        assert_eq!(decode_binary(&apart, &encoding).unwrap(), data);
    }

    #[test]
    fn zlib_blocks() {
        let encoding = Encoding {
            endianness: Endianness::Little,
            header_width: 4,
            compressed: true,
        };
        let data = le_f32(&[0., 0., 0., 1., 0., 0.]);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&data).unwrap();
        let block = encoder.finish().unwrap();
        let header: Vec<u8> = [1u32, data.len() as u32, data.len() as u32, block.len() as u32]
            .iter()
            .flat_map(|v| v.to_le_bytes().to_vec())
            .collect();
        let text = format!(
            "{}{}",
            general_purpose::STANDARD.encode(&header),
            general_purpose::STANDARD.encode(&block)
        );
        let bytes = decode_binary(&text, &encoding).unwrap();
        assert_eq!(
            parse_values(&bytes, "Float32", Endianness::Little).unwrap(),
            vec![0., 0., 0., 1., 0., 0.]
        );
    }

    #[test]
    fn appended_data_unsupported() {
        let text = ASCII.replace(
            "format=\"ascii\">\n          0 0 0",
            "format=\"appended\" offset=\"0\">\n          0 0 0",
        );
        match read_polydata(text.as_bytes()) {
            Err(TractError::UnsupportedFormat(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn non_utf8_unsupported() {
        match read_polydata(&[0xff, 0xfe, 0x00]) {
            Err(TractError::UnsupportedFormat(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
