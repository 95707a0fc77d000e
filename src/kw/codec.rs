//! Keyword codec: one header record followed by zero or more data records.
//!
//! Writers split the payload at [`EclType::block_size`] elements per record.
//! Readers accept any split that keeps whole elements in each record and
//! whose byte total matches the header; the chunking never leaks past this
//! module.
//!
//! All numeric elements use the stream's [`Endian`].  BOOL elements are
//! 4-byte integers, `-1` for true and `0` for false.  CHAR and `C0nn`
//! elements are blank-padded single-byte strings.

use std::io::{Cursor, Read, Seek, Write};

use tracing::trace;

use crate::error::{EclError, Result};
use crate::fortio::{Endian, FortIo};
use crate::kw::header::{latin1, KeywordHeader};
use crate::kw::types::{EclType, BOOL_FALSE_INT, BOOL_TRUE_INT};
use crate::kw::{Keyword, KeywordData};

// ── Header ────────────────────────────────────────────────────────────────────

pub fn decode_header(bytes: &[u8], endian: Endian) -> Result<KeywordHeader> {
    KeywordHeader::decode(bytes, endian, 0)
}

/// Read a header record at the current position.
pub fn read_header<S: Read + Seek>(fortio: &mut FortIo<S>) -> Result<KeywordHeader> {
    let offset = fortio.position()?;
    let mut buf = Vec::with_capacity(super::HEADER_LEN);
    fortio.read_record_into(&mut buf)?;
    KeywordHeader::decode(&buf, fortio.endian(), offset)
}

// ── Payload ───────────────────────────────────────────────────────────────────

/// Interpret the reassembled payload bytes of `header`.
pub fn decode_payload(bytes: &[u8], header: &KeywordHeader, endian: Endian) -> Result<Keyword> {
    decode_payload_at(bytes, header, endian, 0)
}

fn decode_payload_at(bytes: &[u8], header: &KeywordHeader, endian: Endian, offset: u64) -> Result<Keyword> {
    let expected = header.data_bytes();
    if bytes.len() as u64 != expected {
        return Err(EclError::format(offset, format!(
            "keyword {} carries {} payload bytes, header declares {expected}",
            header.name(), bytes.len()
        )));
    }
    let ty = header.ecl_type();
    let size = ty.element_size();
    let data = match ty {
        EclType::Int    => KeywordData::Int(bytes.chunks_exact(4).map(|c| endian.read_i32(c)).collect()),
        EclType::Float  => KeywordData::Float(bytes.chunks_exact(4).map(|c| endian.read_f32(c)).collect()),
        EclType::Double => KeywordData::Double(bytes.chunks_exact(8).map(|c| endian.read_f64(c)).collect()),
        EclType::Bool   => KeywordData::Bool(
            bytes
                .chunks_exact(4)
                .map(|c| match endian.read_i32(c) {
                    BOOL_TRUE_INT  => Ok(true),
                    BOOL_FALSE_INT => Ok(false),
                    other => Err(EclError::format(offset, format!(
                        "keyword {}: {other} is not a logical value", header.name()
                    ))),
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        EclType::Char | EclType::String(_) => KeywordData::Str(
            bytes
                .chunks_exact(size)
                .map(|c| latin1(c).trim_end_matches(' ').to_owned())
                .collect(),
        ),
        EclType::Mess => KeywordData::Mess(header.count()),
    };
    trace!(name = header.name(), count = header.count(), "decoded payload");
    Keyword::from_parts(header.clone(), data)
}

/// Flat payload bytes of `kw`, before any record splitting.
pub fn encode_payload(kw: &Keyword, endian: Endian) -> Vec<u8> {
    let ty = kw.ecl_type();
    let size = ty.element_size();
    let mut out = vec![0u8; kw.header().data_bytes() as usize];
    match kw.data() {
        KeywordData::Int(v) => {
            for (c, x) in out.chunks_exact_mut(4).zip(v) { endian.write_i32(c, *x) }
        }
        KeywordData::Float(v) => {
            for (c, x) in out.chunks_exact_mut(4).zip(v) { endian.write_f32(c, *x) }
        }
        KeywordData::Double(v) => {
            for (c, x) in out.chunks_exact_mut(8).zip(v) { endian.write_f64(c, *x) }
        }
        KeywordData::Bool(v) => {
            for (c, x) in out.chunks_exact_mut(4).zip(v) {
                endian.write_i32(c, if *x { BOOL_TRUE_INT } else { BOOL_FALSE_INT })
            }
        }
        KeywordData::Str(v) => {
            for (c, s) in out.chunks_exact_mut(size).zip(v) {
                c.fill(b' ');
                for (slot, ch) in c.iter_mut().zip(s.chars()) {
                    *slot = ch as u8;
                }
            }
        }
        KeywordData::Mess(_) => {}
    }
    out
}

// ── Whole keywords ────────────────────────────────────────────────────────────

/// Append `kw` at the current position.  Returns bytes written.
pub fn write_keyword<S: Write + Seek>(fortio: &mut FortIo<S>, kw: &Keyword) -> Result<u64> {
    let endian = fortio.endian();
    let mut written = fortio.write_record(&kw.header().encode(endian))?;
    let payload = encode_payload(kw, endian);
    let record_bytes = kw.ecl_type().block_size() * kw.ecl_type().element_size();
    if record_bytes > 0 {
        for chunk in payload.chunks(record_bytes) {
            written += fortio.write_record(chunk)?;
        }
    }
    trace!(name = kw.name(), written, "wrote keyword");
    Ok(written)
}

/// Read one whole keyword at the current position.
pub fn read_keyword<S: Read + Seek>(fortio: &mut FortIo<S>) -> Result<Keyword> {
    let header = read_header(fortio)?;
    read_data(fortio, &header)
}

/// Read and reassemble the data records that follow `header`.
pub fn read_data<S: Read + Seek>(fortio: &mut FortIo<S>, header: &KeywordHeader) -> Result<Keyword> {
    let offset = fortio.position()?;
    ensure_fits(fortio, header, offset)?;
    let mut bytes = Vec::with_capacity(header.data_bytes() as usize);
    walk_data(fortio, header, |f, _| f.read_record_into(&mut bytes).map(|_| ()))?;
    decode_payload_at(&bytes, header, fortio.endian(), offset)
}

/// Step over the data records of `header`, validating every marker.
/// Returns the on-disk size of the data records.
pub fn skip_data<S: Read + Seek>(fortio: &mut FortIo<S>, header: &KeywordHeader) -> Result<u64> {
    let start = fortio.position()?;
    walk_data(fortio, header, |f, _| f.skip_record().map(|_| ()))?;
    Ok(fortio.position()? - start)
}

/// Record layout of the data that follows `header`: `(payload offset,
/// payload length)` per record.  The stream is left after the last record.
pub(crate) fn data_layout<S: Read + Seek>(
    fortio: &mut FortIo<S>,
    header: &KeywordHeader,
) -> Result<Vec<(u64, usize)>> {
    let at = fortio.position()?;
    ensure_fits(fortio, header, at)?;
    let mut layout = Vec::with_capacity(header.data_records());
    walk_data(fortio, header, |f, len| {
        let payload_at = f.position()? + crate::fortio::MARKER_SIZE;
        f.skip_record()?;
        layout.push((payload_at, len));
        Ok(())
    })?;
    Ok(layout)
}

/// Reject a header whose declared payload cannot fit in the rest of the
/// stream, before anything is sized from it.
fn ensure_fits<S: Read + Seek>(fortio: &mut FortIo<S>, header: &KeywordHeader, at: u64) -> Result<()> {
    let remaining = fortio.stream_len()?.saturating_sub(at);
    if header.data_bytes() > remaining {
        return Err(EclError::format(at, format!(
            "keyword {} declares {} data bytes but only {remaining} remain",
            header.name(),
            header.data_bytes()
        )));
    }
    Ok(())
}

/// Drive `step` once per data record.  `step` must consume exactly one
/// record; its second argument is the record's payload length as announced
/// by the leading marker.
fn walk_data<S, F>(fortio: &mut FortIo<S>, header: &KeywordHeader, mut step: F) -> Result<()>
where
    S: Read + Seek,
    F: FnMut(&mut FortIo<S>, usize) -> Result<()>,
{
    let expected = header.data_bytes();
    let size = header.ecl_type().element_size() as u64;
    let mut seen = 0u64;
    while seen < expected {
        let at = fortio.position()?;
        let len = fortio.leading_marker(at)? as u64;
        fortio.seek_to(at)?;
        if len == 0 || len % size != 0 || seen + len > expected {
            return Err(EclError::format(at, format!(
                "data record of {len} bytes does not fit keyword {} ({seen} of {expected} bytes read)",
                header.name()
            )));
        }
        step(fortio, len as usize)?;
        seen += len;
    }
    Ok(())
}

// ── Byte-buffer helpers ───────────────────────────────────────────────────────

/// Frame `kw` into a standalone byte buffer.
pub fn encode(kw: &Keyword, endian: Endian) -> Result<Vec<u8>> {
    let mut fortio = FortIo::new(Cursor::new(Vec::with_capacity(kw.fortio_size() as usize)), endian);
    write_keyword(&mut fortio, kw)?;
    Ok(fortio.into_inner().into_inner())
}

/// Decode one framed keyword from the start of `bytes`.
pub fn decode(bytes: &[u8], endian: Endian) -> Result<Keyword> {
    read_keyword(&mut FortIo::new(Cursor::new(bytes), endian))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn large_numeric_keywords_split_at_the_block_size() {
        let kw = Keyword::new_int("BIG", (0..2500).collect()).unwrap();
        let bytes = encode(&kw, Endian::Big).unwrap();
        // header record, then 1000 + 1000 + 500 element records
        assert_eq!(bytes.len() as u64, kw.fortio_size());
        assert_eq!(&bytes[24..28], &4000i32.to_be_bytes());
        assert_eq!(decode(&bytes, Endian::Big).unwrap(), kw);
    }

    #[test]
    fn char_keywords_use_their_own_block_size() {
        let names: Vec<String> = (0..106).map(|i| format!("W{i}")).collect();
        let kw = Keyword::new_char("WGNAMES", &names).unwrap();
        let bytes = encode(&kw, Endian::Little).unwrap();
        assert_eq!(&bytes[24..28], &(105i32 * 8).to_le_bytes());
        let back = decode(&bytes, Endian::Little).unwrap();
        assert_eq!(back.strings().unwrap()[105], "W105");
        assert_eq!(back, kw);
    }

    #[test]
    fn readers_accept_foreign_record_splits() {
        let kw = Keyword::new_double("TIME", vec![1.0, 2.0, 3.0]).unwrap();
        let mut f = FortIo::new(Cursor::new(Vec::new()), Endian::Big);
        f.write_record(&kw.header().encode(Endian::Big)).unwrap();
        let payload = encode_payload(&kw, Endian::Big);
        f.write_record(&payload[..8]).unwrap();
        f.write_record(&payload[8..]).unwrap();
        let bytes = f.into_inner().into_inner();
        assert_eq!(decode(&bytes, Endian::Big).unwrap(), kw);
    }

    #[test]
    fn oversized_counts_are_format_errors() {
        let header = KeywordHeader::new("HUGE", i32::MAX as usize, EclType::String(999)).unwrap();
        let mut f = FortIo::new(Cursor::new(Vec::new()), Endian::Big);
        f.write_record(&header.encode(Endian::Big)).unwrap();
        f.write_record(&[b' '; 999]).unwrap();
        let bytes = f.into_inner().into_inner();
        assert!(decode(&bytes, Endian::Big).unwrap_err().is_format());

        let mut f = FortIo::new(Cursor::new(bytes), Endian::Big);
        let header = read_header(&mut f).unwrap();
        assert!(data_layout(&mut f, &header).unwrap_err().is_format());
    }

    #[test]
    fn records_must_hold_whole_elements() {
        let kw = Keyword::new_int("I", vec![7, 8]).unwrap();
        let mut f = FortIo::new(Cursor::new(Vec::new()), Endian::Big);
        f.write_record(&kw.header().encode(Endian::Big)).unwrap();
        let payload = encode_payload(&kw, Endian::Big);
        f.write_record(&payload[..6]).unwrap();
        f.write_record(&payload[6..]).unwrap();
        let bytes = f.into_inner().into_inner();
        assert!(decode(&bytes, Endian::Big).unwrap_err().is_format());
    }

    #[test]
    fn bools_map_to_minus_one_and_zero() {
        let kw = Keyword::new_bool("LOGIHEAD", vec![true, false]).unwrap();
        let payload = encode_payload(&kw, Endian::Big);
        assert_eq!(payload, [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0]);

        let bad = [0, 0, 0, 1];
        let h = KeywordHeader::new("LOGIHEAD", 1, EclType::Bool).unwrap();
        assert!(decode_payload(&bad, &h, Endian::Big).unwrap_err().is_format());
    }

    #[test]
    fn empty_and_message_keywords_have_no_data_records() {
        for kw in [
            Keyword::new_float("EMPTY", vec![]).unwrap(),
            Keyword::new_mess("ENDSOL").unwrap(),
        ] {
            let bytes = encode(&kw, Endian::Big).unwrap();
            assert_eq!(bytes.len(), 24);
            assert_eq!(decode(&bytes, Endian::Big).unwrap(), kw);
        }
    }

    #[test]
    fn truncated_payload_is_a_format_error() {
        let kw = Keyword::new_float("SWAT", vec![0.5; 10]).unwrap();
        let mut bytes = encode(&kw, Endian::Big).unwrap();
        bytes.truncate(bytes.len() - 6);
        assert!(decode(&bytes, Endian::Big).unwrap_err().is_format());
    }

    #[test]
    fn skip_reports_on_disk_size() {
        let kw = Keyword::new_double("PRESSURE", vec![250.0; 1200]).unwrap();
        let bytes = encode(&kw, Endian::Big).unwrap();
        let mut f = FortIo::new(Cursor::new(bytes), Endian::Big);
        let h = read_header(&mut f).unwrap();
        assert_eq!(skip_data(&mut f, &h).unwrap(), 1200 * 8 + 2 * 8);
        assert!(f.at_eof().unwrap());
    }
}
