//! # gdsflat-core
//!
//! The GDSII layout data model: cells, subcell references, the accumulated
//! placement transform used when flattening a hierarchy, and the geometry
//! primitives and algorithms (path mitre expansion, point-in-polygon) that
//! operate on it. No parsing or I/O lives here — see `gdsflat-io`.

pub mod cell;
pub mod database;
pub mod geometry;

pub use cell::{ARef, Boundary, Cell, PathElement, SRef, Transform};
pub use database::Database;
pub use geometry::{expand_path, point_in_polygon, BBox, Pair};
