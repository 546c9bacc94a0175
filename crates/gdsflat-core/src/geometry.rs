use serde::{Deserialize, Serialize};

/// A 2D integer vertex in database units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub x: i32,
    pub y: i32,
}

impl Pair {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned bounding box in database units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Pair,
    pub max: Pair,
}

impl BBox {
    /// Bounding box of `points`, excluding the closing vertex (`points` is
    /// assumed closed, i.e. `points[0] == points[last]`) per spec.md's clip
    /// definition.
    pub fn from_closed_polygon(points: &[Pair]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let open = &points[..points.len() - 1];
        let mut min_x = i32::MAX;
        let mut min_y = i32::MAX;
        let mut max_x = i32::MIN;
        let mut max_y = i32::MIN;
        for p in open {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Pair::new(min_x, min_y),
            max: Pair::new(max_x, max_y),
        })
    }

    /// Overlap test per spec.md §4.4: `min.y <= top && max.y >= bottom &&
    /// min.x <= right && max.x >= left`.
    pub fn overlaps(&self, clip: &BBox) -> bool {
        self.min.y <= clip.max.y
            && self.max.y >= clip.min.y
            && self.min.x <= clip.max.x
            && self.max.x >= clip.min.x
    }
}

/// An implicit line `a*x + b*y + c = 0`, used by path mitre expansion.
#[derive(Debug, Clone, Copy)]
struct Line {
    a: f64,
    b: f64,
    c: f64,
}

fn extend_vector(tail: Pair, head: Pair, length: f64) -> Pair {
    let segx = (tail.x - head.x) as f64;
    let segy = (tail.y - head.y) as f64;
    let norm = (segx * segx + segy * segy).sqrt();
    if norm == 0.0 {
        return tail;
    }
    Pair::new(
        tail.x + ((length / norm) * segx) as i32,
        tail.y + ((length / norm) * segy) as i32,
    )
}

/// Line-line intersection in homogeneous coordinates. Falls back to the
/// segment's own vertex when the two lines are parallel, since well-formed
/// GDSII paths never hit this branch and the original source leaves the
/// behaviour undefined (spec.md §9).
fn intersect_lines(one: &Line, two: &Line, fallback: Pair) -> Pair {
    let xh = one.b * two.c - two.b * one.c;
    let yh = two.a * one.c - one.a * two.c;
    let wh = one.a * two.b - two.a * one.b;
    if wh == 0.0 {
        return fallback;
    }
    Pair::new((xh / wh).round() as i32, (yh / wh).round() as i32)
}

fn project_point(p: Pair, line: &Line) -> Pair {
    // Normal to `line` through `p`.
    let normal = Line {
        a: line.b,
        b: -line.a,
        c: line.a * p.y as f64 - line.b * p.x as f64,
    };
    intersect_lines(line, &normal, p)
}

/// Expand a centerline polyline of `n` vertices and integer `width` into a
/// closed `2n + 1`-vertex mitred polygon, per spec.md §4.3.
///
/// `pathtype == 2` extends each end by half the width along the path's
/// tangent before projecting; any other value keeps flush ends.
pub fn expand_path(points: &[Pair], width: u32, pathtype: u16) -> Vec<Pair> {
    let n = points.len();
    assert!(n >= 2, "path expansion requires at least two vertices");

    let hwidth = width as f64 / 2.0;

    let mut plus = Vec::with_capacity(n - 1);
    let mut minus = Vec::with_capacity(n - 1);
    for seg in points.windows(2) {
        let (p0, p1) = (seg[0], seg[1]);
        let a = (p1.y - p0.y) as f64;
        let b = -(p1.x - p0.x) as f64;
        let c = -a * p0.x as f64 - b * p0.y as f64;
        let offset = hwidth * (a * a + b * b).sqrt();
        plus.push(Line {
            a,
            b,
            c: c + offset,
        });
        minus.push(Line {
            a,
            b,
            c: c - offset,
        });
    }

    let extended = pathtype == 2;
    let head = if extended {
        extend_vector(points[0], points[1], hwidth)
    } else {
        points[0]
    };
    let tail = if extended {
        extend_vector(points[n - 1], points[n - 2], hwidth)
    } else {
        points[n - 1]
    };

    let mut out = vec![Pair::new(0, 0); 2 * n + 1];
    out[0] = project_point(head, &plus[0]);
    out[2 * n - 1] = project_point(head, &minus[0]);
    out[2 * n] = out[0];

    for i in 1..n - 1 {
        out[i] = intersect_lines(&plus[i - 1], &plus[i], points[i]);
        out[2 * n - 1 - i] = intersect_lines(&minus[i - 1], &minus[i], points[i]);
    }

    out[n - 1] = project_point(tail, &plus[n - 2]);
    out[n] = project_point(tail, &minus[n - 2]);

    out
}

/// Ray-casting point-in-polygon test per spec.md §4.6. `points` is a closed
/// polygon (first vertex repeated as last).
pub fn point_in_polygon(points: &[Pair], test: Pair) -> bool {
    let mut count = 0u32;
    for seg in points.windows(2) {
        let (a, b) = (seg[0], seg[1]);
        let crosses = (a.x <= test.x && b.x > test.x) || (a.x > test.x && b.x <= test.x);
        if !crosses {
            continue;
        }
        let y_at_x = a.y as f64 + (test.x - a.x) as f64 * (b.y - a.y) as f64 / (b.x - a.x) as f64;
        if (test.y as f64) < y_at_x {
            count += 1;
        }
    }
    count % 2 == 1
}
