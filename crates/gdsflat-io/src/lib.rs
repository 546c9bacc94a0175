//! # gdsflat-io
//!
//! GDSII stream codec, the hierarchical database loader, the flattening
//! engine, and the matching stream writer. Reads a library into
//! `gdsflat_core::Database`, then collapses a chosen cell's instance tree
//! into absolute polygons, optionally clipped and/or re-emitted as a new
//! GDSII stream.

pub mod codec;
pub mod error;
pub mod flatten;
pub mod loader;
pub mod writer;

pub use error::GdsError;
pub use flatten::{collapse, ClipRect, CollapseOptions};
pub use loader::GdsReader;
pub use writer::GdsWriter;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use gdsflat_core::Database;

/// Open and fully load a GDSII stream from a filesystem path.
pub fn open_file(path: impl AsRef<Path>) -> Result<Database, GdsError> {
    let file = File::open(path)?;
    GdsReader::new(BufReader::new(file)).read()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdsflat_core::cell::{Boundary, PathElement, SRef};
    use gdsflat_core::{Cell, Pair};
    use std::io::Cursor;

    #[test]
    fn load_flatten_write_roundtrip() {
        let mut db = Database::new();

        let mut child = Cell::new("CHILD");
        child.boundaries.push(Boundary {
            layer: 2,
            vertices: vec![
                Pair::new(0, 0),
                Pair::new(10, 0),
                Pair::new(10, 10),
                Pair::new(0, 10),
                Pair::new(0, 0),
            ],
        });
        child.paths.push(PathElement {
            layer: 3,
            vertices: vec![Pair::new(0, 0), Pair::new(50, 0)],
            pathtype: 0,
            width: 10,
        });
        db.add_cell(child);

        let mut top = Cell::new("TOP");
        top.srefs.push(SRef {
            target: "CHILD".into(),
            origin: Pair::new(100, 100),
            mag: 1.0,
            angle_deg: 0.0,
            mirror: false,
        });
        db.add_cell(top);

        let mut written = Vec::new();
        collapse(
            &db,
            "TOP",
            CollapseOptions {
                output: Some(&mut written),
                ..Default::default()
            },
        )
        .unwrap();

        let reloaded = GdsReader::new(Cursor::new(written)).read().unwrap();
        let flat_top = reloaded.find_cell("TOP").unwrap();
        // the child's boundary plus its path, expanded to a boundary
        assert_eq!(flat_top.boundaries.len(), 2);
        assert_eq!(flat_top.paths.len(), 0); // paths are written as boundaries
        assert_eq!(flat_top.srefs.len(), 0); // hierarchy is gone
        assert_eq!(flat_top.boundaries[0].vertices[0], Pair::new(100, 100));
    }

    #[test]
    fn clip_excludes_out_of_range_polygons() {
        let mut db = Database::new();
        db.uu_per_dbunit = 1.0;

        let mut top = Cell::new("TOP");
        top.boundaries.push(Boundary {
            layer: 1,
            vertices: vec![
                Pair::new(0, 0),
                Pair::new(10, 0),
                Pair::new(10, 10),
                Pair::new(0, 10),
                Pair::new(0, 0),
            ],
        });
        top.boundaries.push(Boundary {
            layer: 1,
            vertices: vec![
                Pair::new(1000, 1000),
                Pair::new(1010, 1000),
                Pair::new(1010, 1010),
                Pair::new(1000, 1010),
                Pair::new(1000, 1000),
            ],
        });
        db.add_cell(top);

        let mut polys = Vec::new();
        collapse(
            &db,
            "TOP",
            CollapseOptions {
                clip: Some(ClipRect {
                    xmin: 0.0,
                    ymin: 0.0,
                    xmax: 20.0,
                    ymax: 20.0,
                }),
                sink: Some(&mut polys),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(polys.len(), 1);
    }
}
