use serde::{Deserialize, Serialize};

use crate::geometry::Pair;

/// A closed polygon element on a single layer (spec.md §3 "Boundary element").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Boundary {
    pub layer: u16,
    pub vertices: Vec<Pair>,
}

/// A centerline-plus-width element (spec.md §3 "Path element").
/// Named `PathElement` to avoid clashing with `std::path::Path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathElement {
    pub layer: u16,
    pub vertices: Vec<Pair>,
    pub pathtype: u16,
    pub width: u32,
}

/// A single instance of another cell (spec.md §3 "SRef").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SRef {
    pub target: String,
    pub origin: Pair,
    pub mag: f64,
    pub angle_deg: f64,
    pub mirror: bool,
}

/// A regular 2D array of instances of another cell (spec.md §3 "ARef").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ARef {
    pub target: String,
    pub p1: Pair,
    pub p2: Pair,
    pub p3: Pair,
    pub cols: u16,
    pub rows: u16,
    pub mag: f64,
    pub angle_deg: f64,
    pub mirror: bool,
}

/// A named container of geometric elements and references to other cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub boundaries: Vec<Boundary>,
    pub paths: Vec<PathElement>,
    pub srefs: Vec<SRef>,
    pub arefs: Vec<ARef>,
}

impl Cell {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boundaries: Vec::new(),
            paths: Vec::new(),
            srefs: Vec::new(),
            arefs: Vec::new(),
        }
    }
}

/// Accumulated placement transform during flattening (spec.md §3, §4.4).
///
/// Composition with a child SRef does *not* rotate the child's local origin
/// by the accumulated transform; composition with an ARef placement *does*
/// rotate the reference-grid origin first. This asymmetry is inherited
/// verbatim from the source implementation (spec.md §9's pinned-down open
/// question) and is not a bug.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub dx: i32,
    pub dy: i32,
    pub mag: f64,
    pub angle_deg: f64,
    pub mirror: bool,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            dx: 0,
            dy: 0,
            mag: 1.0,
            angle_deg: 0.0,
            mirror: false,
        }
    }
}

impl Transform {
    /// Apply this transform to a point, per spec.md §4.4.
    pub fn apply(&self, p: Pair) -> Pair {
        let sign = if self.mirror { -1.0 } else { 1.0 };
        let theta = std::f64::consts::PI * self.angle_deg / 180.0;
        let (sin_t, cos_t) = theta.sin_cos();
        let x = self.dx as f64 + self.mag * (p.x as f64 * cos_t - sign * p.y as f64 * sin_t);
        let y = self.dy as f64 + self.mag * (p.x as f64 * sin_t + sign * p.y as f64 * cos_t);
        Pair::new(x as i32, y as i32)
    }

    /// Compose an SRef's local transform onto `self` (the ancestor
    /// transform). The local origin is translated, not rotated/scaled by
    /// `self` — see the type's doc comment.
    pub fn compose_sref(&self, sref: &SRef) -> Self {
        Self {
            dx: self.dx + sref.origin.x,
            dy: self.dy + sref.origin.y,
            mag: self.mag * sref.mag,
            angle_deg: self.angle_deg + sref.angle_deg,
            mirror: self.mirror ^ sref.mirror,
        }
    }

    /// Compose an ARef placement onto `self`. `origin` is the reference's
    /// local-frame lattice point, already transformed by `self` (the
    /// rotate-then-place step done by the caller, since it depends on the
    /// per-(col,row) lattice point, not just the ARef's own fields).
    pub fn compose_aref_at(&self, origin: Pair, mag: f64, angle_deg: f64, mirror: bool) -> Self {
        Self {
            dx: origin.x,
            dy: origin.y,
            mag: self.mag * mag,
            angle_deg: self.angle_deg + angle_deg,
            mirror: self.mirror ^ mirror,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s2_sref_composition() {
        let parent = Transform {
            dx: 100,
            dy: 200,
            mag: 2.0,
            angle_deg: 90.0,
            mirror: false,
        };
        let child = SRef {
            target: "CHILD".into(),
            origin: Pair::new(10, 20),
            mag: 1.5,
            angle_deg: 45.0,
            mirror: true,
        };
        let composed = parent.compose_sref(&child);
        assert_eq!(composed.dx, 110);
        assert_eq!(composed.dy, 220);
        assert!((composed.mag - 3.0).abs() < 1e-9);
        assert!((composed.angle_deg - 135.0).abs() < 1e-9);
        assert!(composed.mirror);
    }

    #[test]
    fn s3_point_transform() {
        let t = Transform {
            dx: 0,
            dy: 0,
            mag: 1.0,
            angle_deg: 90.0,
            mirror: false,
        };
        let out = t.apply(Pair::new(10, 0));
        assert_eq!(out, Pair::new(0, 10));
    }

    #[test]
    fn identity_transform_is_default() {
        let t = Transform::default();
        let p = Pair::new(42, -7);
        assert_eq!(t.apply(p), p);
    }
}
