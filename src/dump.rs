//! Binary persisted-result dump/restore, per spec section 6.3.
//!
//! Requires `std` (file/stream I/O). Layout is little-endian, fixed 32-bit
//! integers and IEEE-754 64-bit doubles:
//!
//! ```text
//! record  := target_kza : i32
//!          , n_entries  : i32
//!          , repeat n_entries of:
//!                component_id : i32
//!              , n_values     : i32
//!              , value        : f64 * n_values
//! ```
//!
//! Unsafe: no

use std::io::{self, Read, Write};

use crate::error::Error;
use crate::kza::Kza;

/// One target's accumulated results, across every mixture component that
/// contains it.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpRecord {
    /// The target nuclide this record holds results for.
    pub target: Kza,
    /// `(component_id, values)` pairs, one per mixture component.
    pub components: alloc::vec::Vec<(i32, alloc::vec::Vec<f64>)>,
}

/// Writes one [`DumpRecord`] in the layout above.
///
/// # Errors
/// Propagates any [`io::Error`] from the underlying writer.
pub fn write_record<W: Write>(out: &mut W, record: &DumpRecord) -> Result<(), Error> {
    out.write_all(&record.target.raw().to_le_bytes())?;
    out.write_all(&(record.components.len() as i32).to_le_bytes())?;
    for (component_id, values) in &record.components {
        out.write_all(&component_id.to_le_bytes())?;
        out.write_all(&(values.len() as i32).to_le_bytes())?;
        for value in values {
            out.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

/// Reads back one [`DumpRecord`], or `None` at a clean end-of-stream
/// (nothing read before the `target_kza` field).
///
/// # Errors
/// Returns [`Error::CorruptDump`] if a negative count is read, or
/// [`Error::Io`] for any other I/O failure (including a truncated record).
pub fn read_record<R: Read>(input: &mut R, index: usize) -> Result<Option<DumpRecord>, Error> {
    let mut target_buf = [0u8; 4];
    if !read_exact_or_eof(input, &mut target_buf)? {
        return Ok(None);
    }
    let target = Kza::from(i32::from_le_bytes(target_buf));

    let n_entries = read_i32(input)?;
    if n_entries < 0 {
        return Err(Error::CorruptDump {
            index,
            reason: "negative component count",
        });
    }

    let mut components = alloc::vec::Vec::with_capacity(n_entries as usize);
    for _ in 0..n_entries {
        let component_id = read_i32(input)?;
        let n_values = read_i32(input)?;
        if n_values < 0 {
            return Err(Error::CorruptDump {
                index,
                reason: "negative value count",
            });
        }
        let mut values = alloc::vec::Vec::with_capacity(n_values as usize);
        for _ in 0..n_values {
            values.push(read_f64(input)?);
        }
        components.push((component_id, values));
    }

    Ok(Some(DumpRecord { target, components }))
}

/// Writes every record in order, matching `Root::solve`'s one-dump-per-root
/// sequencing (`mixList->writeDump()` after each root is fully solved).
///
/// # Errors
/// Propagates any [`io::Error`] from the underlying writer.
pub fn write_all<W: Write>(out: &mut W, records: &[DumpRecord]) -> Result<(), Error> {
    for record in records {
        write_record(out, record)?;
    }
    Ok(())
}

/// Reads every record until a clean end-of-stream.
///
/// # Errors
/// Returns [`Error::CorruptDump`] on a malformed record, or [`Error::Io`]
/// for any other I/O failure.
pub fn read_all<R: Read>(input: &mut R) -> Result<alloc::vec::Vec<DumpRecord>, Error> {
    let mut records = alloc::vec::Vec::new();
    let mut index = 0;
    while let Some(record) = read_record(input, index)? {
        records.push(record);
        index += 1;
    }
    Ok(records)
}

fn read_i32<R: Read>(input: &mut R) -> Result<i32, Error> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f64<R: Read>(input: &mut R) -> Result<f64, Error> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Like `read_exact`, but returns `Ok(false)` instead of erroring when the
/// very first byte is already at end-of-stream (a clean stopping point
/// between records).
fn read_exact_or_eof<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<bool, Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated dump record",
                )))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bit_for_bit() {
        let records = alloc::vec![
            DumpRecord {
                target: Kza::new(26, 56, 0),
                components: alloc::vec![
                    (1, alloc::vec![0.968_95, 0.5]),
                    (2, alloc::vec![0.5, 0.25]),
                ],
            },
            DumpRecord {
                target: Kza::new(27, 60, 0),
                components: alloc::vec![(1, alloc::vec![1.0])],
            },
        ];

        let mut buf = std::vec::Vec::new();
        write_all(&mut buf, &records).unwrap();

        let mut cursor = io::Cursor::new(buf);
        let read_back = read_all(&mut cursor).unwrap();
        assert_eq!(read_back, records);
    }

    #[test]
    fn empty_stream_yields_no_records() {
        let mut cursor = io::Cursor::new(std::vec::Vec::<u8>::new());
        let read_back = read_all(&mut cursor).unwrap();
        assert!(read_back.is_empty());
    }

    #[test]
    fn negative_entry_count_is_corrupt() {
        let mut buf = std::vec::Vec::new();
        buf.extend_from_slice(&10_010i32.to_le_bytes());
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        let mut cursor = io::Cursor::new(buf);
        let err = read_record(&mut cursor, 0).unwrap_err();
        assert!(matches!(err, Error::CorruptDump { index: 0, .. }));
    }
}
