//! Drives the record stream to build an in-memory `Database` (spec.md §4.2).
//! Tracks the cell under construction and the current element mode; any
//! record illegal for that mode, or any tag this core doesn't recognise at
//! all, is fatal. Element-body records (LAYER, WIDTH, SNAME, STRANS, MAG,
//! ANGLE, COLROW, XY) seen with no element open are body records of a
//! skipped TEXT/NODE/BOX element and are silently ignored, matching the
//! accepted-but-ignored set's "never produce errors" guarantee (spec.md §7).

use std::io::Read;

use gdsflat_core::cell::{ARef, Boundary, Cell, PathElement, SRef};
use gdsflat_core::{Database, Pair};

use crate::codec::{self, tag, Record};
use crate::error::GdsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementMode {
    None,
    Boundary,
    Path,
    SRef,
    ARef,
}

/// Streaming GDSII reader. Generic over `Read` only — the loader never
/// seeks, it consumes the stream strictly in order.
pub struct GdsReader<R: Read> {
    reader: R,
}

impl<R: Read> GdsReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read the whole stream and build a `Database`.
    pub fn read(mut self) -> Result<Database, GdsError> {
        let mut db = Database::new();

        self.read_header(&mut db)?;
        self.read_lib_body(&mut db)?;

        Ok(db)
    }

    fn next_record(&mut self) -> Result<Record, GdsError> {
        codec::read_record(&mut self.reader)?.ok_or_else(|| GdsError::Format {
            offset: 0,
            message: "unexpected end of stream".into(),
        })
    }

    fn read_header(&mut self, db: &mut Database) -> Result<(), GdsError> {
        let rec = self.next_record()?;
        if rec.tag != tag::HEADER {
            return Err(GdsError::UnexpectedRecord {
                tag: rec.tag,
                expected: tag::HEADER,
            });
        }
        let version = rec.as_u16_vec().first().copied().unwrap_or(0);
        if version != 6 && version != 600 {
            return Err(GdsError::UnsupportedVersion(version));
        }
        db.version = version;
        Ok(())
    }

    fn read_lib_body(&mut self, db: &mut Database) -> Result<(), GdsError> {
        loop {
            let rec = self.next_record()?;
            match rec.tag {
                tag::BGNLIB => {}
                tag::LIBNAME => {
                    let name = rec.as_string();
                    log::info!("library name: {name}");
                    db.libnames.push(name);
                }
                tag::UNITS => {
                    let floats = rec.as_f64_vec();
                    if floats.len() != 2 {
                        return Err(GdsError::Format {
                            offset: 0,
                            message: "UNITS record must contain exactly two floats".into(),
                        });
                    }
                    db.uu_per_dbunit = floats[0];
                    db.meter_per_dbunit = floats[1];
                    if rec.payload.len() == 16 {
                        db.raw_units.copy_from_slice(&rec.payload);
                    }
                }
                tag::BGNSTR => {
                    let cell = self.read_structure()?;
                    db.add_cell(cell);
                }
                tag::ENDLIB => {
                    log::info!("end of library, {} cells loaded", db.cell_count());
                    return Ok(());
                }
                t if codec::is_ignored(t) => {}
                t => {
                    return Err(GdsError::Format {
                        offset: 0,
                        message: format!("unknown record tag 0x{t:04X} outside a structure"),
                    })
                }
            }
        }
    }

    fn read_structure(&mut self) -> Result<Cell, GdsError> {
        let mut cell = Cell::new(String::new());
        let mut mode = ElementMode::None;

        let mut boundary_layer = 0u16;
        let mut boundary_vertices: Vec<Pair> = Vec::new();

        let mut path_layer = 0u16;
        let mut path_vertices: Vec<Pair> = Vec::new();
        let mut path_type = 0u16;
        let mut path_width = 0u32;

        let mut sref_target = String::new();
        let mut sref_origin = Pair::new(0, 0);
        let mut sref_mag = 1.0;
        let mut sref_angle = 0.0;
        let mut sref_mirror = false;

        let mut aref_target = String::new();
        let mut aref_points: Vec<Pair> = Vec::new();
        let mut aref_cols = 0u16;
        let mut aref_rows = 0u16;
        let mut aref_mag = 1.0;
        let mut aref_angle = 0.0;
        let mut aref_mirror = false;

        loop {
            let rec = self.next_record()?;
            match rec.tag {
                tag::STRNAME => cell.name = rec.as_string(),

                tag::BOUNDARY => {
                    mode = ElementMode::Boundary;
                    boundary_layer = 0;
                    boundary_vertices.clear();
                }
                tag::PATH => {
                    mode = ElementMode::Path;
                    path_layer = 0;
                    path_vertices.clear();
                    path_type = 0;
                    path_width = 0;
                }
                tag::SREF => {
                    mode = ElementMode::SRef;
                    sref_target.clear();
                    sref_origin = Pair::new(0, 0);
                    sref_mag = 1.0;
                    sref_angle = 0.0;
                    sref_mirror = false;
                }
                tag::AREF => {
                    mode = ElementMode::ARef;
                    aref_target.clear();
                    aref_points.clear();
                    aref_cols = 0;
                    aref_rows = 0;
                    aref_mag = 1.0;
                    aref_angle = 0.0;
                    aref_mirror = false;
                }

                tag::LAYER => match mode {
                    ElementMode::Boundary => boundary_layer = first_u16(&rec)?,
                    ElementMode::Path => path_layer = first_u16(&rec)?,
                    ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    _ => return Err(illegal("LAYER", mode)),
                },

                tag::WIDTH => match mode {
                    ElementMode::Path => path_width = first_u32(&rec)?,
                    ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    _ => return Err(illegal("WIDTH", mode)),
                },

                tag::PATHTYPE => match mode {
                    ElementMode::Path => path_type = first_u16(&rec)?,
                    ElementMode::None => {} // accepted outside a PATH, per spec.md §4.2
                    _ => return Err(illegal("PATHTYPE", mode)),
                },

                tag::SNAME => match mode {
                    ElementMode::SRef => sref_target = rec.as_string(),
                    ElementMode::ARef => aref_target = rec.as_string(),
                    ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    _ => return Err(illegal("SNAME", mode)),
                },

                tag::STRANS => match mode {
                    ElementMode::SRef => sref_mirror = mirror_bit(&rec)?,
                    ElementMode::ARef => aref_mirror = mirror_bit(&rec)?,
                    ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    _ => return Err(illegal("STRANS", mode)),
                },

                tag::MAG => match mode {
                    ElementMode::SRef => sref_mag = first_f64(&rec)?,
                    ElementMode::ARef => aref_mag = first_f64(&rec)?,
                    ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    _ => return Err(illegal("MAG", mode)),
                },

                tag::ANGLE => match mode {
                    ElementMode::SRef => sref_angle = first_f64(&rec)?,
                    ElementMode::ARef => aref_angle = first_f64(&rec)?,
                    ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    _ => return Err(illegal("ANGLE", mode)),
                },

                tag::COLROW => match mode {
                    ElementMode::ARef => {
                        let vals = rec.as_u16_vec();
                        if vals.len() != 2 {
                            return Err(GdsError::Format {
                                offset: 0,
                                message: "COLROW record must contain two u16 values".into(),
                            });
                        }
                        aref_cols = vals[0];
                        aref_rows = vals[1];
                    }
                    ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    _ => return Err(illegal("COLROW", mode)),
                },

                tag::XY => {
                    let pairs = xy_pairs(&rec)?;
                    match mode {
                        ElementMode::Boundary => {
                            if pairs.len() < 4 || pairs.len() > 8190 {
                                return Err(GdsError::Format {
                                    offset: 0,
                                    message: format!(
                                        "BOUNDARY XY vertex count {} out of range [4, 8190]",
                                        pairs.len()
                                    ),
                                });
                            }
                            boundary_vertices = pairs;
                        }
                        ElementMode::Path => {
                            if pairs.len() < 2 || pairs.len() > 8190 {
                                return Err(GdsError::Format {
                                    offset: 0,
                                    message: format!(
                                        "PATH XY vertex count {} out of range [2, 8190]",
                                        pairs.len()
                                    ),
                                });
                            }
                            path_vertices = pairs;
                        }
                        ElementMode::SRef => {
                            if pairs.len() != 1 {
                                return Err(GdsError::Format {
                                    offset: 0,
                                    message: "SREF XY record must contain exactly one pair".into(),
                                });
                            }
                            sref_origin = pairs[0];
                        }
                        ElementMode::ARef => {
                            if pairs.len() != 3 {
                                return Err(GdsError::Format {
                                    offset: 0,
                                    message: "AREF XY record must contain exactly three pairs"
                                        .into(),
                                });
                            }
                            aref_points = pairs;
                        }
                        ElementMode::None => {} // body record of a skipped TEXT/NODE/BOX element
                    }
                }

                tag::ENDEL => {
                    match mode {
                        ElementMode::Boundary => cell.boundaries.push(Boundary {
                            layer: boundary_layer,
                            vertices: std::mem::take(&mut boundary_vertices),
                        }),
                        ElementMode::Path => cell.paths.push(PathElement {
                            layer: path_layer,
                            vertices: std::mem::take(&mut path_vertices),
                            pathtype: path_type,
                            width: path_width,
                        }),
                        ElementMode::SRef => cell.srefs.push(SRef {
                            target: std::mem::take(&mut sref_target),
                            origin: sref_origin,
                            mag: sref_mag,
                            angle_deg: sref_angle,
                            mirror: sref_mirror,
                        }),
                        ElementMode::ARef => {
                            if aref_points.len() != 3 {
                                return Err(GdsError::Format {
                                    offset: 0,
                                    message: "AREF committed without an XY record".into(),
                                });
                            }
                            cell.arefs.push(ARef {
                                target: std::mem::take(&mut aref_target),
                                p1: aref_points[0],
                                p2: aref_points[1],
                                p3: aref_points[2],
                                cols: aref_cols,
                                rows: aref_rows,
                                mag: aref_mag,
                                angle_deg: aref_angle,
                                mirror: aref_mirror,
                            })
                        }
                        ElementMode::None => {}
                    }
                    mode = ElementMode::None;
                }

                tag::ENDSTR => return Ok(cell),

                t if codec::is_ignored(t) => {}
                t => {
                    return Err(GdsError::Format {
                        offset: 0,
                        message: format!("unknown record tag 0x{t:04X} inside a structure"),
                    })
                }
            }
        }
    }
}

fn illegal(name: &str, mode: ElementMode) -> GdsError {
    GdsError::Format {
        offset: 0,
        message: format!("{name} record is illegal for the current element ({mode:?})"),
    }
}

fn first_u16(rec: &Record) -> Result<u16, GdsError> {
    rec.as_u16_vec()
        .first()
        .copied()
        .ok_or_else(|| GdsError::Format {
            offset: 0,
            message: "expected a u16 payload".into(),
        })
}

fn first_u32(rec: &Record) -> Result<u32, GdsError> {
    rec.as_u32_vec()
        .first()
        .copied()
        .ok_or_else(|| GdsError::Format {
            offset: 0,
            message: "expected a u32 payload".into(),
        })
}

fn first_f64(rec: &Record) -> Result<f64, GdsError> {
    rec.as_f64_vec()
        .first()
        .copied()
        .ok_or_else(|| GdsError::Format {
            offset: 0,
            message: "expected a float payload".into(),
        })
}

fn mirror_bit(rec: &Record) -> Result<bool, GdsError> {
    let flags = first_u16(rec)?;
    Ok(flags & 0x8000 != 0)
}

fn xy_pairs(rec: &Record) -> Result<Vec<Pair>, GdsError> {
    if !rec.payload.len().is_multiple_of(8) {
        return Err(GdsError::Format {
            offset: 0,
            message: format!(
                "XY payload of {} bytes is not a multiple of 8",
                rec.payload.len()
            ),
        });
    }
    let coords = rec.as_i32_vec();
    Ok(coords
        .chunks_exact(2)
        .map(|c| Pair::new(c[0], c[1]))
        .collect())
}
