//! Reader for VTK legacy polydata files (".vtk"), in ASCII or BINARY
//! (big-endian) encoding.

use super::{cells_from_offsets, to_array, to_triplets, PolyData};
use crate::error::{Result, TractError};
use crate::format::Tractogram;
use crate::util::read_file_bytes;
use byteordered::ByteOrdered;
use log::debug;
use std::io::Read;
use std::path::Path;

/// Read a legacy VTK polydata file as a tractogram.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Tractogram> {
    from_bytes(&read_file_bytes(path)?)
}

/// Read a legacy VTK polydata file from the given byte stream, consuming it
/// to the end.
pub fn from_reader<R: Read>(mut source: R) -> Result<Tractogram> {
    let mut bytes = Vec::new();
    let _ = source.read_to_end(&mut bytes)?;
    from_bytes(&bytes)
}

/// Decode the full contents of a legacy VTK polydata file.
pub fn from_bytes(bytes: &[u8]) -> Result<Tractogram> {
    read_polydata(bytes)?.into_tractogram()
}

/// Scalar types of legacy VTK arrays.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum DataType {
    Bit,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DataType {
    fn parse(name: &str) -> Result<DataType> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "bit" => DataType::Bit,
            "unsigned_char" | "vtktypeuint8" => DataType::U8,
            "char" | "vtktypeint8" => DataType::I8,
            "unsigned_short" | "vtktypeuint16" => DataType::U16,
            "short" | "vtktypeint16" => DataType::I16,
            "unsigned_int" | "vtktypeuint32" => DataType::U32,
            "int" | "vtktypeint32" => DataType::I32,
            "unsigned_long" | "vtktypeuint64" => DataType::U64,
            "long" | "vtkidtype" | "vtktypeint64" => DataType::I64,
            "float" | "vtktypefloat32" => DataType::F32,
            "double" | "vtktypefloat64" => DataType::F64,
            other => {
                return Err(TractError::UnsupportedFormat(format!(
                    "VTK data type {:?}",
                    other
                )))
            }
        })
    }
}

/// Cursor over the file contents, mixing text lines and data blocks.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    binary: bool,
}

impl<'a> Cursor<'a> {
    /// Next line of text, with surrounding whitespace removed. With
    /// `skip_blank`, empty lines are passed over.
    fn line(&mut self, skip_blank: bool) -> Option<String> {
        while self.pos < self.bytes.len() {
            let rest = &self.bytes[self.pos..];
            let len = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            self.pos = (self.pos + len + 1).min(self.bytes.len());
            let line = String::from_utf8_lossy(&rest[..len]).trim().to_string();
            if !line.is_empty() || !skip_blank {
                return Some(line);
            }
        }
        None
    }

    fn ascii_values(&mut self, n: usize) -> Result<Vec<f64>> {
        let mut values = Vec::with_capacity(n.min(self.bytes.len() - self.pos));
        while values.len() < n {
            let line = self.line(true).ok_or_else(|| {
                TractError::MalformedInput(format!("expected {} values, found {}", n, values.len()))
            })?;
            for token in line.split_whitespace() {
                let v: f64 = token.parse().map_err(|_| {
                    TractError::MalformedInput(format!("invalid number {:?}", token))
                })?;
                values.push(v);
            }
        }
        Ok(values)
    }

    fn binary_values(&mut self, n: usize, data_type: DataType) -> Result<Vec<f64>> {
        if data_type == DataType::Bit {
            return Err(TractError::UnsupportedFormat(
                "binary VTK bit arrays".to_string(),
            ));
        }
        let width = match data_type {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            _ => 8,
        };
        let end = n
            .checked_mul(width)
            .map(|len| self.pos + len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                TractError::MalformedInput("binary VTK array past the end of the file".to_string())
            })?;
        let mut input = ByteOrdered::be(&self.bytes[self.pos..end]);
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            values.push(match data_type {
                DataType::U8 => f64::from(input.read_u8()?),
                DataType::I8 => f64::from(input.read_i8()?),
                DataType::U16 => f64::from(input.read_u16()?),
                DataType::I16 => f64::from(input.read_i16()?),
                DataType::U32 => f64::from(input.read_u32()?),
                DataType::I32 => f64::from(input.read_i32()?),
                DataType::U64 => input.read_u64()? as f64,
                DataType::I64 => input.read_i64()? as f64,
                DataType::F32 => f64::from(input.read_f32()?),
                DataType::F64 => input.read_f64()?,
                DataType::Bit => unreachable!(),
            });
        }
        self.pos = end;
        Ok(values)
    }

    /// Read `tuples × components` values.
    fn values(
        &mut self,
        tuples: usize,
        components: usize,
        data_type: DataType,
    ) -> Result<Vec<f64>> {
        let n = tuples.checked_mul(components).ok_or_else(|| {
            TractError::MalformedInput(format!("{} tuples of {} values", tuples, components))
        })?;
        if self.binary {
            self.binary_values(n, data_type)
        } else {
            self.ascii_values(n)
        }
    }

    fn ints(&mut self, n: usize, data_type: DataType) -> Result<Vec<i64>> {
        Ok(self.values(n, 1, data_type)?.into_iter().map(|v| v as i64).collect())
    }
}

fn field<'a>(tokens: &[&'a str], i: usize, line: &str) -> Result<&'a str> {
    tokens
        .get(i)
        .cloned()
        .ok_or_else(|| TractError::MalformedInput(format!("incomplete VTK line {:?}", line)))
}

fn count(tokens: &[&str], i: usize, line: &str) -> Result<usize> {
    field(tokens, i, line)?
        .parse()
        .map_err(|_| TractError::MalformedInput(format!("invalid count in {:?}", line)))
}

/// Read either the classic cell array (`size` values) or the 5.x
/// `OFFSETS`/`CONNECTIVITY` pair following a cell section keyword.
fn read_cells(cur: &mut Cursor, n: usize, size: usize, legacy_v5: bool) -> Result<Vec<i64>> {
    if !legacy_v5 {
        return cur.ints(size, DataType::I32);
    }
    let line = cur.line(true).unwrap_or_default();
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if field(&tokens, 0, &line)? != "OFFSETS" {
        return Err(TractError::MalformedInput(format!(
            "expected OFFSETS, found {:?}",
            line
        )));
    }
    let offsets = cur.ints(n, DataType::parse(field(&tokens, 1, &line)?)?)?;
    let line = cur.line(true).unwrap_or_default();
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if field(&tokens, 0, &line)? != "CONNECTIVITY" {
        return Err(TractError::MalformedInput(format!(
            "expected CONNECTIVITY, found {:?}",
            line
        )));
    }
    let connectivity = cur.ints(size, DataType::parse(field(&tokens, 1, &line)?)?)?;
    cells_from_offsets(&offsets, &connectivity, true)
}

/// Decode the raw polydata of a legacy VTK file.
pub fn read_polydata(bytes: &[u8]) -> Result<PolyData> {
    let mut cur = Cursor {
        bytes,
        pos: 0,
        binary: false,
    };

    let version_line = cur.line(false).unwrap_or_default();
    if !version_line.starts_with("# vtk DataFile") {
        return Err(TractError::MalformedInput(
            "not a VTK legacy file".to_string(),
        ));
    }
    let legacy_v5 = version_line
        .rsplit(' ')
        .next()
        .and_then(|v| v.split('.').next())
        .and_then(|major| major.parse::<u32>().ok())
        .map(|major| major >= 5)
        .unwrap_or(false);
    let _title = cur.line(false);
    match cur.line(true).as_deref() {
        Some("ASCII") => {}
        Some("BINARY") => cur.binary = true,
        other => {
            return Err(TractError::MalformedInput(format!(
                "unknown VTK encoding {:?}",
                other
            )))
        }
    }
    let dataset = cur.line(true).unwrap_or_default();
    if dataset.split_whitespace().nth(1) != Some("POLYDATA") {
        return Err(TractError::UnsupportedFormat(format!(
            "VTK dataset {:?}",
            dataset
        )));
    }

    let mut polydata = PolyData::default();
    // number of tuples of the attribute section being read, and whether it
    // belongs to points (rather than cells)
    let mut attributes: Option<(usize, bool)> = None;

    while let Some(line) = cur.line(true) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let keyword = tokens[0].to_ascii_uppercase();
        match keyword.as_str() {
            "POINTS" => {
                let n = count(&tokens, 1, &line)?;
                let data_type = DataType::parse(field(&tokens, 2, &line)?)?;
                let values = cur.values(n, 3, data_type)?;
                polydata.points = Some(to_triplets(&values, n)?);
            }
            "LINES" => {
                let n = count(&tokens, 1, &line)?;
                let size = count(&tokens, 2, &line)?;
                let cells = read_cells(&mut cur, n, size, legacy_v5)?;
                polydata.n_lines = Some(if legacy_v5 { n.saturating_sub(1) } else { n });
                polydata.lines = Some(cells);
            }
            "VERTICES" | "POLYGONS" | "TRIANGLE_STRIPS" => {
                let n = count(&tokens, 1, &line)?;
                let size = count(&tokens, 2, &line)?;
                let _ = read_cells(&mut cur, n, size, legacy_v5)?;
                debug!("Ignoring VTK {} section", keyword);
            }
            "POINT_DATA" => attributes = Some((count(&tokens, 1, &line)?, true)),
            "CELL_DATA" => attributes = Some((count(&tokens, 1, &line)?, false)),
            "SCALARS" | "VECTORS" | "NORMALS" | "TENSORS" | "COLOR_SCALARS"
            | "TEXTURE_COORDINATES" => {
                let (n, on_points) = attributes.ok_or_else(|| {
                    TractError::MalformedInput(format!("{} outside of a data section", keyword))
                })?;
                let name = field(&tokens, 1, &line)?.to_string();
                let (components, values) = match keyword.as_str() {
                    "SCALARS" => {
                        let data_type = DataType::parse(field(&tokens, 2, &line)?)?;
                        let components = tokens.get(3).and_then(|c| c.parse().ok()).unwrap_or(1);
                        // LOOKUP_TABLE line
                        let _ = cur.line(true);
                        (components, cur.values(n, components, data_type)?)
                    }
                    "COLOR_SCALARS" => {
                        let components = count(&tokens, 2, &line)?;
                        let data_type = if cur.binary { DataType::U8 } else { DataType::F32 };
                        (components, cur.values(n, components, data_type)?)
                    }
                    "TEXTURE_COORDINATES" => {
                        let components = count(&tokens, 2, &line)?;
                        let data_type = DataType::parse(field(&tokens, 3, &line)?)?;
                        (components, cur.values(n, components, data_type)?)
                    }
                    _ => {
                        let components = if keyword == "TENSORS" { 9 } else { 3 };
                        let data_type = DataType::parse(field(&tokens, 2, &line)?)?;
                        (components, cur.values(n, components, data_type)?)
                    }
                };
                if on_points {
                    polydata.point_arrays.push((name, to_array(values, components)?));
                }
            }
            "FIELD" => {
                let (n_tuples_section, on_points) = attributes.unwrap_or((0, false));
                let n_arrays = count(&tokens, 2, &line)?;
                for _ in 0..n_arrays {
                    let line = cur.line(true).unwrap_or_default();
                    let tokens: Vec<&str> = line.split_whitespace().collect();
                    let name = field(&tokens, 0, &line)?.to_string();
                    if name == "NULL_ARRAY" {
                        continue;
                    }
                    let components = count(&tokens, 1, &line)?;
                    let tuples = count(&tokens, 2, &line)?;
                    let data_type = DataType::parse(field(&tokens, 3, &line)?)?;
                    let values = cur.values(tuples, components, data_type)?;
                    if on_points && tuples == n_tuples_section {
                        polydata.point_arrays.push((name, to_array(values, components)?));
                    }
                }
            }
            "LOOKUP_TABLE" => {
                let size = count(&tokens, 2, &line)?;
                let data_type = if cur.binary { DataType::U8 } else { DataType::F32 };
                let _ = cur.values(size, 4, data_type)?;
            }
            "METADATA" => {
                // metadata blocks end with an empty line
                while let Some(l) = cur.line(false) {
                    if l.is_empty() {
                        break;
                    }
                }
            }
            other => debug!("Ignoring VTK line starting with {:?}", other),
        }
    }

    Ok(polydata)
}
