use std::fs;
use std::path::{Path, PathBuf};

/// Encode a tracks file with the given header lines, each streamline being
/// closed by a NaN triplet and the data by an infinite triplet.
#[allow(dead_code)]
pub fn tck_bytes(header: &str, streamlines: &[Vec<[f32; 3]>]) -> Vec<u8> {
    let mut bytes = header.as_bytes().to_vec();
    for s in streamlines {
        for p in s {
            for v in p {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        for _ in 0..3 {
            bytes.extend_from_slice(&std::f32::NAN.to_le_bytes());
        }
    }
    for _ in 0..3 {
        bytes.extend_from_slice(&std::f32::INFINITY.to_le_bytes());
    }
    bytes
}

/// A complete tracks file, with the data offset pointing right after the
/// header.
#[allow(dead_code)]
pub fn tck_file(streamlines: &[Vec<[f32; 3]>]) -> Vec<u8> {
    let mut header = format!(
        "mrtrix tracks\ncount: {}\ndatatype: Float32LE\nfile: . ",
        streamlines.len()
    );
    // the offset counts its own digits
    let base = header.len() + "\nEND\n".len();
    let mut offset = base + 2;
    while base + offset.to_string().len() != offset {
        offset = base + offset.to_string().len();
    }
    header.push_str(&format!("{}\nEND\n", offset));
    tck_bytes(&header, streamlines)
}

/// A little endian TrackVis file with the given voxel size, voxel order
/// and one scalar per point.
#[allow(dead_code)]
pub fn trk_file(
    voxel_size: [f32; 3],
    voxel_order: &str,
    streamlines: &[Vec<([f32; 3], f32)>],
) -> Vec<u8> {
    let mut header = vec![0u8; 1000];
    header[..6].copy_from_slice(b"TRACK\0");
    for (i, d) in [10i16, 10, 10].iter().enumerate() {
        header[6 + 2 * i..8 + 2 * i].copy_from_slice(&d.to_le_bytes());
    }
    for (i, v) in voxel_size.iter().enumerate() {
        header[12 + 4 * i..16 + 4 * i].copy_from_slice(&v.to_le_bytes());
    }
    header[36..38].copy_from_slice(&1i16.to_le_bytes());
    header[38..40].copy_from_slice(b"FA");
    for (row, values) in [
        [voxel_size[0], 0., 0., 0.],
        [0., voxel_size[1], 0., 0.],
        [0., 0., voxel_size[2], 0.],
        [0., 0., 0., 1.],
    ]
    .iter()
    .enumerate()
    {
        for (col, v) in values.iter().enumerate() {
            let at = 440 + 16 * row + 4 * col;
            header[at..at + 4].copy_from_slice(&v.to_le_bytes());
        }
    }
    header[948..948 + voxel_order.len()].copy_from_slice(voxel_order.as_bytes());
    header[988..992].copy_from_slice(&(streamlines.len() as i32).to_le_bytes());
    header[992..996].copy_from_slice(&2i32.to_le_bytes());
    header[996..1000].copy_from_slice(&1000i32.to_le_bytes());

    let mut bytes = header;
    for s in streamlines {
        bytes.extend_from_slice(&(s.len() as i32).to_le_bytes());
        for (p, scalar) in s {
            for v in p.iter().chain(std::iter::once(scalar)) {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    bytes
}

/// Two straight, parallel streamlines of five points, 1 mm apart.
#[allow(dead_code)]
pub fn parallel_lines() -> Vec<Vec<[f32; 3]>> {
    (0..2)
        .map(|k| (0..5).map(|i| [5. + i as f32, 5. + k as f32, 5.]).collect())
        .collect()
}

/// Write a fixture into `dir`.
#[allow(dead_code)]
pub fn write_fixture(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}
