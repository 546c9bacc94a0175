//! Flattening engine: recursively composes the accumulated placement
//! `Transform` down an SRef/AREF instance tree and emits absolute polygons
//! (spec.md §4.4). Grounded in the original `Recurse`/`TransformPoly`
//! traversal; `opensilicon-core` has no hierarchy-flattening counterpart, so
//! this module is built fresh in the teacher's idiom rather than adapted
//! from an existing file.

use std::io::Write;

use gdsflat_core::cell::{ARef, Cell, Transform};
use gdsflat_core::{expand_path, BBox, Database, Pair};

use crate::error::GdsError;
use crate::writer::GdsWriter;

/// Axis-aligned clip rectangle in the database's user units (spec.md §4.4).
#[derive(Debug, Clone, Copy)]
pub struct ClipRect {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

/// Where to send the polygons a `collapse` call produces. Both sinks may be
/// active at once; each receives every emitted polygon independently.
pub struct CollapseOptions<'a> {
    pub clip: Option<ClipRect>,
    pub max_polys: u64,
    pub output: Option<&'a mut dyn Write>,
    pub sink: Option<&'a mut Vec<(u16, Vec<Pair>)>>,
}

impl<'a> Default for CollapseOptions<'a> {
    fn default() -> Self {
        Self {
            clip: None,
            max_polys: u64::MAX,
            output: None,
            sink: None,
        }
    }
}

/// A destination for flattened polygons. `WriterSink` and `CollectSink`
/// cover spec.md §4.4's two sink kinds; `collapse` drives whichever is
/// configured (possibly both) from a single traversal.
trait PolygonSink {
    fn emit(&mut self, layer: u16, vertices: &[Pair]) -> Result<(), GdsError>;
}

struct WriterSink<'a, W: Write> {
    writer: &'a mut GdsWriter<W>,
}

impl<'a, W: Write> PolygonSink for WriterSink<'a, W> {
    fn emit(&mut self, layer: u16, vertices: &[Pair]) -> Result<(), GdsError> {
        self.writer.write_boundary(layer, vertices)
    }
}

struct CollectSink<'a> {
    polygons: &'a mut Vec<(u16, Vec<Pair>)>,
}

impl<'a> PolygonSink for CollectSink<'a> {
    fn emit(&mut self, layer: u16, vertices: &[Pair]) -> Result<(), GdsError> {
        self.polygons.push((layer, vertices.to_vec()));
        Ok(())
    }
}

/// Flatten `cell_name` from `db` into absolute polygons, optionally clipping
/// and/or writing a stream prolog/epilog around them (spec.md §4.4).
pub fn collapse(db: &Database, cell_name: &str, mut opts: CollapseOptions) -> Result<(), GdsError> {
    if cell_name.is_empty() {
        return Err(GdsError::Argument("cell name must not be empty".into()));
    }

    let clip_db_units = opts
        .clip
        .map(|c| to_dbunit_clip(&c, db.uu_per_dbunit))
        .transpose()?;

    let mut writer = opts.output.take().map(GdsWriter::new);
    if let Some(w) = writer.as_mut() {
        w.write_prolog(db, "TOP")?;
    }

    let mut emitted = 0u64;
    let result = (|| -> Result<(), GdsError> {
        let root = db
            .find_cell(cell_name)
            .ok_or_else(|| GdsError::UndefinedCell(cell_name.to_string()))?;
        collapse_cell(
            db,
            root,
            Transform::default(),
            clip_db_units.as_ref(),
            opts.max_polys,
            &mut emitted,
            writer.as_mut(),
            opts.sink.as_deref_mut(),
        )
    })();

    if let Some(w) = writer.as_mut() {
        w.write_epilog()?;
    }

    result
}

fn to_dbunit_clip(clip: &ClipRect, uu_per_dbunit: f64) -> Result<BBox, GdsError> {
    if clip.xmax <= clip.xmin || clip.ymax <= clip.ymin {
        return Err(GdsError::Argument(
            "clip rectangle must satisfy xmax > xmin and ymax > ymin".into(),
        ));
    }
    if uu_per_dbunit <= 0.0 {
        return Err(GdsError::Argument(
            "database has no valid user-unit-per-dbunit scale".into(),
        ));
    }
    let to_db = |v: f64| (v / uu_per_dbunit) as i32;
    Ok(BBox {
        min: Pair::new(to_db(clip.xmin), to_db(clip.ymin)),
        max: Pair::new(to_db(clip.xmax), to_db(clip.ymax)),
    })
}

#[allow(clippy::too_many_arguments)]
fn collapse_cell<W: Write>(
    db: &Database,
    cell: &Cell,
    transform: Transform,
    clip: Option<&BBox>,
    max_polys: u64,
    emitted: &mut u64,
    mut writer: Option<&mut GdsWriter<W>>,
    mut sink: Option<&mut Vec<(u16, Vec<Pair>)>>,
) -> Result<(), GdsError> {
    log::debug!("flattening cell '{}' at {:?}", cell.name, transform);

    for boundary in &cell.boundaries {
        if *emitted >= max_polys {
            return Ok(());
        }
        let absolute: Vec<Pair> = boundary
            .vertices
            .iter()
            .map(|&p| transform.apply(p))
            .collect();
        emit_if_visible(
            boundary.layer,
            &absolute,
            clip,
            emitted,
            writer.as_deref_mut(),
            sink.as_deref_mut(),
        )?;
    }

    for path in &cell.paths {
        if *emitted >= max_polys {
            return Ok(());
        }
        let local_poly = expand_path(&path.vertices, path.width, path.pathtype);
        let absolute: Vec<Pair> = local_poly.iter().map(|&p| transform.apply(p)).collect();
        emit_if_visible(
            path.layer,
            &absolute,
            clip,
            emitted,
            writer.as_deref_mut(),
            sink.as_deref_mut(),
        )?;
    }

    for sref in &cell.srefs {
        if *emitted >= max_polys {
            return Ok(());
        }
        let child = db
            .find_cell(&sref.target)
            .ok_or_else(|| GdsError::UndefinedCell(sref.target.clone()))?;
        let child_transform = transform.compose_sref(sref);
        collapse_cell(
            db,
            child,
            child_transform,
            clip,
            max_polys,
            emitted,
            writer.as_deref_mut(),
            sink.as_deref_mut(),
        )?;
    }

    for aref in &cell.arefs {
        if *emitted >= max_polys {
            return Ok(());
        }
        let child = db
            .find_cell(&aref.target)
            .ok_or_else(|| GdsError::UndefinedCell(aref.target.clone()))?;
        collapse_aref(
            db,
            child,
            aref,
            transform,
            clip,
            max_polys,
            emitted,
            writer.as_deref_mut(),
            sink.as_deref_mut(),
        )?;
    }

    Ok(())
}

/// Iterate an AREF's lattice column-major, rotating each lattice origin
/// through the parent transform before composing (spec.md §4.4/§9 — this is
/// the half of the SRef/AREF asymmetry that lives here rather than in
/// `Transform::compose_aref_at`, since only the per-(col,row) point depends
/// on the loop index).
#[allow(clippy::too_many_arguments)]
fn collapse_aref<W: Write>(
    db: &Database,
    child: &Cell,
    aref: &ARef,
    transform: Transform,
    clip: Option<&BBox>,
    max_polys: u64,
    emitted: &mut u64,
    mut writer: Option<&mut GdsWriter<W>>,
    mut sink: Option<&mut Vec<(u16, Vec<Pair>)>>,
) -> Result<(), GdsError> {
    let cols = aref.cols.max(1) as i64;
    let rows = aref.rows.max(1) as i64;
    let col_step_x = (aref.p2.x - aref.p1.x) as f64 / cols as f64;
    let col_step_y = (aref.p2.y - aref.p1.y) as f64 / cols as f64;
    let row_step_x = (aref.p3.x - aref.p1.x) as f64 / rows as f64;
    let row_step_y = (aref.p3.y - aref.p1.y) as f64 / rows as f64;

    for col in 0..cols {
        for row in 0..rows {
            if *emitted >= max_polys {
                return Ok(());
            }
            let lattice = Pair::new(
                aref.p1.x + (col as f64 * col_step_x + row as f64 * row_step_x) as i32,
                aref.p1.y + (col as f64 * col_step_y + row as f64 * row_step_y) as i32,
            );
            let rotated_origin = transform.apply(lattice);
            let instance_transform =
                transform.compose_aref_at(rotated_origin, aref.mag, aref.angle_deg, aref.mirror);
            collapse_cell(
                db,
                child,
                instance_transform,
                clip,
                max_polys,
                emitted,
                writer.as_deref_mut(),
                sink.as_deref_mut(),
            )?;
        }
    }
    Ok(())
}

fn emit_if_visible<W: Write>(
    layer: u16,
    absolute: &[Pair],
    clip: Option<&BBox>,
    emitted: &mut u64,
    writer: Option<&mut GdsWriter<W>>,
    sink: Option<&mut Vec<(u16, Vec<Pair>)>>,
) -> Result<(), GdsError> {
    if let Some(clip) = clip {
        let Some(bbox) = BBox::from_closed_polygon(absolute) else {
            return Ok(());
        };
        if !bbox.overlaps(clip) {
            return Ok(());
        }
    }

    if let Some(w) = writer {
        let mut s = WriterSink { writer: w };
        s.emit(layer, absolute)?;
    }
    if let Some(v) = sink {
        let mut s = CollectSink { polygons: v };
        s.emit(layer, absolute)?;
    }
    *emitted += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdsflat_core::cell::{Boundary, SRef};

    fn rect(layer: u16, x0: i32, y0: i32, x1: i32, y1: i32) -> Boundary {
        Boundary {
            layer,
            vertices: vec![
                Pair::new(x0, y0),
                Pair::new(x1, y0),
                Pair::new(x1, y1),
                Pair::new(x0, y1),
                Pair::new(x0, y0),
            ],
        }
    }

    #[test]
    fn s5_aref_grid_produces_expected_origins() {
        let mut db = Database::new();
        let mut child = Cell::new("CHILD");
        child.boundaries.push(rect(1, 0, 0, 10, 10));
        db.add_cell(child);

        let mut top = Cell::new("TOP");
        top.arefs.push(ARef {
            target: "CHILD".into(),
            p1: Pair::new(0, 0),
            p2: Pair::new(300, 0),
            p3: Pair::new(0, 200),
            cols: 3,
            rows: 2,
            mag: 1.0,
            angle_deg: 0.0,
            mirror: false,
        });
        db.add_cell(top);

        let mut polys = Vec::new();
        collapse(
            &db,
            "TOP",
            CollapseOptions {
                sink: Some(&mut polys),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(polys.len(), 6);
        let mut origins: Vec<Pair> = polys.iter().map(|(_, v)| v[0]).collect();
        origins.sort_by_key(|p| (p.x, p.y));
        let mut expected = vec![
            Pair::new(0, 0),
            Pair::new(100, 0),
            Pair::new(200, 0),
            Pair::new(0, 100),
            Pair::new(100, 100),
            Pair::new(200, 100),
        ];
        expected.sort_by_key(|p| (p.x, p.y));
        assert_eq!(origins, expected);
    }

    #[test]
    fn aref_emission_order_is_column_major() {
        let mut db = Database::new();
        let mut child = Cell::new("CHILD");
        child.boundaries.push(rect(1, 0, 0, 10, 10));
        db.add_cell(child);

        let mut top = Cell::new("TOP");
        top.arefs.push(ARef {
            target: "CHILD".into(),
            p1: Pair::new(0, 0),
            p2: Pair::new(300, 0),
            p3: Pair::new(0, 200),
            cols: 3,
            rows: 2,
            mag: 1.0,
            angle_deg: 0.0,
            mirror: false,
        });
        db.add_cell(top);

        let mut polys = Vec::new();
        collapse(
            &db,
            "TOP",
            CollapseOptions {
                sink: Some(&mut polys),
                ..Default::default()
            },
        )
        .unwrap();

        // outer loop over columns, inner over rows (spec.md §4.4/§5; Gds.cpp:481-482)
        let origins: Vec<Pair> = polys.iter().map(|(_, v)| v[0]).collect();
        let expected = vec![
            Pair::new(0, 0),
            Pair::new(0, 100),
            Pair::new(100, 0),
            Pair::new(100, 100),
            Pair::new(200, 0),
            Pair::new(200, 100),
        ];
        assert_eq!(origins, expected);
    }

    #[test]
    fn empty_cell_name_is_argument_error() {
        let db = Database::new();
        let err = collapse(&db, "", CollapseOptions::default()).unwrap_err();
        assert!(matches!(err, GdsError::Argument(_)));
    }

    #[test]
    fn s6_max_polys_caps_emission() {
        let mut db = Database::new();
        let mut top = Cell::new("TOP");
        for i in 0..10 {
            top.boundaries.push(rect(1, i * 10, 0, i * 10 + 5, 5));
        }
        db.add_cell(top);

        let mut buf = Vec::new();
        let mut polys = Vec::new();
        collapse(
            &db,
            "TOP",
            CollapseOptions {
                max_polys: 3,
                output: Some(&mut buf),
                sink: Some(&mut polys),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(polys.len(), 3);

        let loaded = crate::loader::GdsReader::new(std::io::Cursor::new(buf))
            .read()
            .unwrap();
        let top = loaded.find_cell("TOP").unwrap();
        assert_eq!(top.boundaries.len(), 3);
    }

    #[test]
    fn undefined_sref_target_is_fatal() {
        let mut db = Database::new();
        let mut top = Cell::new("TOP");
        top.srefs.push(SRef {
            target: "MISSING".into(),
            origin: Pair::new(0, 0),
            mag: 1.0,
            angle_deg: 0.0,
            mirror: false,
        });
        db.add_cell(top);

        let err = collapse(&db, "TOP", CollapseOptions::default()).unwrap_err();
        assert!(matches!(err, GdsError::UndefinedCell(_)));
    }

    #[test]
    fn clip_rejects_degenerate_rect() {
        let db = Database::new();
        let opts = CollapseOptions {
            clip: Some(ClipRect {
                xmin: 10.0,
                ymin: 0.0,
                xmax: 5.0,
                ymax: 5.0,
            }),
            ..Default::default()
        };
        let err = collapse(&db, "TOP", opts).unwrap_err();
        assert!(matches!(err, GdsError::Argument(_)) || matches!(err, GdsError::UndefinedCell(_)));
    }
}
