//! One framed GDSII record: `[length: u16 BE][tag: u16 BE][payload]`, and the
//! payload decoders/encoders for the data types the format uses (spec.md
//! §4.1). The tag's low byte marks the data type; we expose the full 16-bit
//! tag and let callers dispatch on the constants below, as the original
//! record stream does.

use std::io::{self, Read, Write};

use crate::error::GdsError;

#[allow(dead_code)]
pub mod tag {
    pub const HEADER: u16 = 0x0002;
    pub const BGNLIB: u16 = 0x0102;
    pub const LIBNAME: u16 = 0x0206;
    pub const UNITS: u16 = 0x0305;
    pub const ENDLIB: u16 = 0x0400;
    pub const BGNSTR: u16 = 0x0502;
    pub const STRNAME: u16 = 0x0606;
    pub const ENDSTR: u16 = 0x0700;
    pub const BOUNDARY: u16 = 0x0800;
    pub const PATH: u16 = 0x0900;
    pub const SREF: u16 = 0x0A00;
    pub const AREF: u16 = 0x0B00;
    pub const TEXT: u16 = 0x0C00;
    pub const LAYER: u16 = 0x0D02;
    pub const DATATYPE: u16 = 0x0E02;
    pub const WIDTH: u16 = 0x0F03;
    pub const XY: u16 = 0x1003;
    pub const ENDEL: u16 = 0x1100;
    pub const SNAME: u16 = 0x1206;
    pub const COLROW: u16 = 0x1302;
    pub const TEXTNODE: u16 = 0x1400;
    pub const NODE: u16 = 0x1500;
    pub const TEXTTYPE: u16 = 0x1602;
    pub const PRESENTATION: u16 = 0x1701;
    pub const STRING: u16 = 0x1906;
    pub const STRANS: u16 = 0x1A01;
    pub const MAG: u16 = 0x1B05;
    pub const ANGLE: u16 = 0x1C05;
    pub const REFLIBS: u16 = 0x1F06;
    pub const FONTS: u16 = 0x2006;
    pub const PATHTYPE: u16 = 0x2102;
    pub const GENERATIONS: u16 = 0x2202;
    pub const ATTRTABLE: u16 = 0x2306;
    pub const ELFLAGS: u16 = 0x2601;
    pub const NODETYPE: u16 = 0x2A02;
    pub const PROPATTR: u16 = 0x2B02;
    pub const PROPVALUE: u16 = 0x2C06;
    pub const BOX: u16 = 0x2D00;
    pub const BOXTYPE: u16 = 0x2E02;
    pub const PLEX: u16 = 0x2F03;
    pub const BGNEXTN: u16 = 0x3003;
    pub const ENDEXTN: u16 = 0x3103;
    pub const FORMAT: u16 = 0x3602;
}

/// Record tags the loader accepts but never retains (spec.md §4.2).
pub fn is_ignored(t: u16) -> bool {
    use tag::*;
    matches!(
        t,
        TEXT | NODE
            | BOX
            | DATATYPE
            | ELFLAGS
            | PLEX
            | PROPATTR
            | PROPVALUE
            | REFLIBS
            | FONTS
            | ATTRTABLE
            | BGNEXTN
            | ENDEXTN
            | FORMAT
            | GENERATIONS
            | PRESENTATION
            | STRING
            | TEXTNODE
            | TEXTTYPE
            | BOXTYPE
            | NODETYPE
    )
}

/// One framed record as read from the stream: a 16-bit tag and its raw
/// payload bytes.
#[derive(Debug)]
pub struct Record {
    pub tag: u16,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn as_i16_vec(&self) -> Vec<i16> {
        self.payload
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    pub fn as_u16_vec(&self) -> Vec<u16> {
        self.payload
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    pub fn as_i32_vec(&self) -> Vec<i32> {
        self.payload
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn as_u32_vec(&self) -> Vec<u32> {
        self.payload
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn as_string(&self) -> String {
        let bytes = self.payload.strip_suffix(&[0u8]).unwrap_or(&self.payload);
        bytes.iter().map(|&b| b as char).collect()
    }

    pub fn as_f64_vec(&self) -> Vec<f64> {
        self.payload
            .chunks_exact(8)
            .map(|c| gds_real8_to_f64(c.try_into().unwrap()))
            .collect()
    }
}

/// Decode an 8-byte IBM-style base-16 excess-64 float (spec.md §4.1).
pub fn gds_real8_to_f64(bytes: &[u8; 8]) -> f64 {
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }
    let negative = bytes[0] & 0x80 != 0;
    let exponent = (bytes[0] & 0x7F) as i32 - 64;

    let mut fraction = 0.0f64;
    let mut denom = 256.0f64;
    for &b in &bytes[1..] {
        fraction += b as f64 / denom;
        denom *= 256.0;
    }

    let magnitude = 16f64.powi(exponent) * fraction;
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode an f64 as an 8-byte IBM-style base-16 excess-64 float.
pub fn f64_to_gds_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0u8; 8];
    }

    let sign_bit: u8 = if value < 0.0 { 0x80 } else { 0x00 };
    let mut mantissa = value.abs();
    let mut exponent: i32 = 0;

    while mantissa >= 1.0 {
        mantissa /= 16.0;
        exponent += 1;
    }
    while mantissa < 1.0 / 16.0 {
        mantissa *= 16.0;
        exponent -= 1;
    }

    let frac_bits = (mantissa * (1u64 << 56) as f64).round() as u64;
    let mut out = [0u8; 8];
    out[0] = sign_bit | ((exponent + 64) as u8 & 0x7F);
    for i in 0..7 {
        out[7 - i] = ((frac_bits >> (i * 8)) & 0xFF) as u8;
    }
    out
}

pub fn read_record<R: Read>(reader: &mut R) -> Result<Option<Record>, GdsError> {
    let mut len_buf = [0u8; 2];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(GdsError::Io(e)),
    }

    let total_len = u16::from_be_bytes(len_buf) as usize;
    if total_len < 4 {
        return Err(GdsError::Format {
            offset: 0,
            message: format!("record length {} is less than the minimum of 4", total_len),
        });
    }

    let mut tag_buf = [0u8; 2];
    reader.read_exact(&mut tag_buf)?;
    let tag = u16::from_be_bytes(tag_buf);

    let payload_len = total_len - 4;
    let mut payload = vec![0u8; payload_len];
    if payload_len > 0 {
        reader.read_exact(&mut payload)?;
    }

    Ok(Some(Record { tag, payload }))
}

pub fn write_record<W: Write>(writer: &mut W, tag: u16, data: &[u8]) -> Result<(), GdsError> {
    let total_len = data.len() + 4;
    let total_len: u16 = total_len.try_into().map_err(|_| {
        GdsError::Argument(format!(
            "record payload of {} bytes exceeds the u16 length field",
            data.len()
        ))
    })?;
    writer.write_all(&total_len.to_be_bytes())?;
    writer.write_all(&tag.to_be_bytes())?;
    writer.write_all(data)?;
    Ok(())
}

pub fn write_i16_record<W: Write>(
    writer: &mut W,
    tag: u16,
    values: &[i16],
) -> Result<(), GdsError> {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    write_record(writer, tag, &data)
}

pub fn write_u16_record<W: Write>(
    writer: &mut W,
    tag: u16,
    values: &[u16],
) -> Result<(), GdsError> {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    write_record(writer, tag, &data)
}

pub fn write_i32_record<W: Write>(
    writer: &mut W,
    tag: u16,
    values: &[i32],
) -> Result<(), GdsError> {
    let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    write_record(writer, tag, &data)
}

pub fn write_string_record<W: Write>(writer: &mut W, tag: u16, s: &str) -> Result<(), GdsError> {
    let mut data: Vec<u8> = s.bytes().collect();
    if !data.len().is_multiple_of(2) {
        data.push(0);
    }
    write_record(writer, tag, &data)
}

pub fn write_real8_record<W: Write>(
    writer: &mut W,
    tag: u16,
    values: &[f64],
) -> Result<(), GdsError> {
    let data: Vec<u8> = values.iter().flat_map(|&v| f64_to_gds_real8(v)).collect();
    write_record(writer, tag, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn s1_float_decode() {
        let bytes = [0x41, 0x10, 0, 0, 0, 0, 0, 0];
        assert_eq!(gds_real8_to_f64(&bytes), 1.0);
    }

    #[test]
    fn float_roundtrip() {
        for &v in &[0.0, 1.0, -1.0, 0.001, 1e-9, 123.456, 1000.0, -0.5] {
            let bytes = f64_to_gds_real8(v);
            let back = gds_real8_to_f64(&bytes);
            assert!((back - v).abs() < v.abs() * 1e-12 + 1e-15, "{v} -> {back}");
        }
    }

    #[test]
    fn record_framing_roundtrip() {
        let mut buf = Vec::new();
        write_record(&mut buf, 0x1003, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let mut cursor = Cursor::new(buf);
        let rec = read_record(&mut cursor).unwrap().unwrap();
        assert_eq!(rec.tag, 0x1003);
        assert_eq!(rec.payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn string_odd_length_padded_and_trimmed() {
        let mut buf = Vec::new();
        write_string_record(&mut buf, tag::LIBNAME, "ODD").unwrap();
        assert_eq!(buf.len(), 4 + 4); // "ODD" + pad byte
        let mut cursor = Cursor::new(buf);
        let rec = read_record(&mut cursor).unwrap().unwrap();
        assert_eq!(rec.as_string(), "ODD");
    }

    #[test]
    fn record_too_short_is_fatal() {
        let buf = vec![0u8, 2, 0, 0];
        let mut cursor = Cursor::new(buf);
        assert!(read_record(&mut cursor).is_err());
    }
}
