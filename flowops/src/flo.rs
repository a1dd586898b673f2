//! # Middlebury `.flo` files
//!
//! Layout, all little-endian: magic float `202021.25` (`PIEH`), `i32` width, `i32` height, then
//! `width * height` interleaved `(x, y)` `f32` pairs in row-major order.

use crate::field::VectorField;
use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic value at the start of every `.flo` file.
pub const FLO_MAGIC: f32 = 202021.25;

fn read_bytes<const N: usize>(reader: &mut impl Read) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Read a single flow field.
pub fn read_flo(mut reader: impl Read) -> Result<VectorField> {
    let magic = f32::from_le_bytes(read_bytes(&mut reader)?);

    if magic != FLO_MAGIC {
        return Err(anyhow!("invalid .flo magic {}", magic));
    }

    let width = i32::from_le_bytes(read_bytes(&mut reader)?);
    let height = i32::from_le_bytes(read_bytes(&mut reader)?);

    let (width, height) = match (usize::try_from(width), usize::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(anyhow!("invalid .flo dimensions {}x{}", width, height)),
    };

    let len = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(2 * std::mem::size_of::<f32>()))
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| anyhow!("invalid .flo dimensions {}x{}", width, height))?;

    // The header is untrusted, only buffer what the payload actually holds.
    let mut data = vec![];
    reader.take(len).read_to_end(&mut data)?;

    if data.len() as u64 != len {
        return Err(anyhow!(
            "truncated .flo payload: {} of {} bytes",
            data.len(),
            len
        ));
    }

    let values = data
        .chunks_exact(std::mem::size_of::<f32>())
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    VectorField::from_interleaved(width, height, values)
}

/// Write a single flow field.
pub fn write_flo(mut writer: impl Write, field: &VectorField) -> Result<()> {
    let (width, height) = field.dim();

    writer.write_all(&FLO_MAGIC.to_le_bytes())?;
    writer.write_all(&i32::try_from(width)?.to_le_bytes())?;
    writer.write_all(&i32::try_from(height)?.to_le_bytes())?;

    for v in field.as_slice() {
        writer.write_all(&v.to_le_bytes())?;
    }

    writer.flush()?;

    Ok(())
}

/// Read a `.flo` file from disk.
pub fn open_flo(path: impl AsRef<Path>) -> Result<VectorField> {
    read_flo(BufReader::new(File::open(path)?))
}

/// Write a `.flo` file to disk.
pub fn save_flo(path: impl AsRef<Path>, field: &VectorField) -> Result<()> {
    write_flo(BufWriter::new(File::create(path)?), field)
}
