//! Stream writer for flattened output: the library prolog/epilog and one
//! BOUNDARY element per emitted polygon (spec.md §4.6). All cell hierarchy
//! is gone by the time this runs — the written library has exactly one
//! structure, `TOP`, holding whatever polygons the flattening engine
//! collapsed into it.

use std::io::Write;

use gdsflat_core::{Database, Pair};

use crate::codec::{self, tag};
use crate::error::GdsError;

pub struct GdsWriter<W: Write> {
    writer: W,
}

impl<W: Write> GdsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// HEADER, BGNLIB, LIBNAME, UNITS (echoing the source database's raw
    /// 16-byte payload so output units are bit-exact with the input),
    /// BGNSTR, STRNAME.
    pub fn write_prolog(&mut self, db: &Database, struct_name: &str) -> Result<(), GdsError> {
        codec::write_u16_record(&mut self.writer, tag::HEADER, &[600])?;
        codec::write_record(&mut self.writer, tag::BGNLIB, &[0u8; 24])?;
        codec::write_string_record(&mut self.writer, tag::LIBNAME, "")?;

        let units = if db.raw_units == [0u8; 16] {
            default_units_payload()
        } else {
            db.raw_units
        };
        codec::write_record(&mut self.writer, tag::UNITS, &units)?;

        codec::write_record(&mut self.writer, tag::BGNSTR, &[0u8; 24])?;
        codec::write_string_record(&mut self.writer, tag::STRNAME, struct_name)?;
        Ok(())
    }

    /// One BOUNDARY element: LAYER, DATATYPE=0, XY, ENDEL.
    pub fn write_boundary(&mut self, layer: u16, vertices: &[Pair]) -> Result<(), GdsError> {
        codec::write_record(&mut self.writer, tag::BOUNDARY, &[])?;
        codec::write_u16_record(&mut self.writer, tag::LAYER, &[layer])?;
        codec::write_u16_record(&mut self.writer, tag::DATATYPE, &[0])?;
        let xy: Vec<i32> = vertices.iter().flat_map(|p| [p.x, p.y]).collect();
        codec::write_i32_record(&mut self.writer, tag::XY, &xy)?;
        codec::write_record(&mut self.writer, tag::ENDEL, &[])?;
        Ok(())
    }

    /// ENDSTR, ENDLIB.
    pub fn write_epilog(&mut self) -> Result<(), GdsError> {
        codec::write_record(&mut self.writer, tag::ENDSTR, &[])?;
        codec::write_record(&mut self.writer, tag::ENDLIB, &[])?;
        Ok(())
    }
}

fn default_units_payload() -> [u8; 16] {
    let mut payload = [0u8; 16];
    payload[0..8].copy_from_slice(&codec::f64_to_gds_real8(0.001));
    payload[8..16].copy_from_slice(&codec::f64_to_gds_real8(1e-9));
    payload
}
