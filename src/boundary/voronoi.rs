//! Voronoi tessellation derived from a Delaunay triangulation
//!
//! The Voronoi cell of a site is the ring of circumcentres of the Delaunay
//! triangles around it. A site on the convex hull touches the outer face
//! and has an unbounded cell, which is reported as absent.

use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};

use crate::error::{BoundaryError, Result};

/// Relative lattice size used to snap circumcentres
const SNAP_RELATIVE: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct Site {
    position: Point2<f64>,
    index: usize,
}

impl HasPosition for Site {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Bounded Voronoi cells and the ridges between them
#[derive(Debug, Clone, Default)]
pub struct VoronoiTessellation {
    /// Counter-clockwise cell ring per site; `None` for unbounded or
    /// degenerate cells
    cells: Vec<Option<Vec<[f64; 2]>>>,
    /// Site pairs sharing a ridge of non-zero length, `a < b`, sorted
    ridges: Vec<(usize, usize)>,
}

impl VoronoiTessellation {
    /// Tessellate the plane around `sites`.
    ///
    /// Circumcentres are snapped to a lattice of `extent * 1e-9` so that
    /// neighbouring cells share bit-identical vertices. Ridges that collapse
    /// to a point (four co-circular sites, as on a regular mesh) do not make
    /// their sites neighbours.
    pub fn build(sites: &[[f64; 2]]) -> Result<Self> {
        if sites.is_empty() {
            return Ok(Self::default());
        }

        let quantum = snap_quantum(sites);
        let snap = |p: Point2<f64>| -> [f64; 2] {
            [(p.x / quantum).round() * quantum, (p.y / quantum).round() * quantum]
        };

        let vertices: Vec<Site> = sites
            .iter()
            .enumerate()
            .map(|(index, &[x, y])| Site {
                position: Point2::new(x, y),
                index,
            })
            .collect();
        let triangulation: DelaunayTriangulation<Site> = DelaunayTriangulation::bulk_load(vertices)
            .map_err(|e| BoundaryError::Computation(format!("triangulation failed: {e:?}")))?;

        let mut cells: Vec<Option<Vec<[f64; 2]>>> = vec![None; sites.len()];
        for vertex in triangulation.vertices() {
            let site = *vertex.data();
            let mut ring = Vec::new();
            let mut bounded = true;
            for edge in vertex.out_edges() {
                match edge.face().as_inner() {
                    Some(face) => ring.push(snap(face.circumcenter())),
                    None => {
                        bounded = false;
                        break;
                    }
                }
            }
            if bounded {
                cells[site.index] = order_ring(ring, [site.position.x, site.position.y]);
            }
        }

        let mut ridges = Vec::new();
        for edge in triangulation.undirected_edges() {
            let directed = edge.as_directed();
            let (Some(left), Some(right)) = (directed.face().as_inner(), directed.rev().face().as_inner())
            else {
                continue;
            };
            if snap(left.circumcenter()) == snap(right.circumcenter()) {
                continue;
            }
            let [a, b] = edge.vertices();
            let (a, b) = (a.data().index, b.data().index);
            ridges.push((a.min(b), a.max(b)));
        }
        ridges.sort_unstable();
        ridges.dedup();

        Ok(Self { cells, ridges })
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bounded cell of `site`, if any
    pub fn cell(&self, site: usize) -> Option<&[[f64; 2]]> {
        self.cells.get(site).and_then(|c| c.as_deref())
    }

    /// Number of bounded cells
    pub fn bounded_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn ridges(&self) -> &[(usize, usize)] {
        &self.ridges
    }
}

fn snap_quantum(sites: &[[f64; 2]]) -> f64 {
    let (mut lo, mut hi) = ([f64::INFINITY; 2], [f64::NEG_INFINITY; 2]);
    for p in sites {
        for axis in 0..2 {
            lo[axis] = lo[axis].min(p[axis]);
            hi[axis] = hi[axis].max(p[axis]);
        }
    }
    let extent = (hi[0] - lo[0]).max(hi[1] - lo[1]);
    if extent.is_finite() && extent > 0.0 {
        extent * SNAP_RELATIVE
    } else {
        SNAP_RELATIVE
    }
}

/// Sort ring vertices counter-clockwise around `center` and drop repeats.
/// Rings with fewer than three distinct vertices are degenerate.
fn order_ring(mut ring: Vec<[f64; 2]>, center: [f64; 2]) -> Option<Vec<[f64; 2]>> {
    ring.sort_by(|a, b| {
        let ta = (a[1] - center[1]).atan2(a[0] - center[0]);
        let tb = (b[1] - center[1]).atan2(b[0] - center[0]);
        ta.total_cmp(&tb)
    });
    ring.dedup();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    (ring.len() >= 3).then_some(ring)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(nx: usize, ny: usize, step: f64) -> Vec<[f64; 2]> {
        (0..ny)
            .flat_map(|r| (0..nx).map(move |c| [c as f64 * step, r as f64 * step]))
            .collect()
    }

    fn ring_area(ring: &[[f64; 2]]) -> f64 {
        let n = ring.len();
        (0..n)
            .map(|i| {
                let (a, b) = (ring[i], ring[(i + 1) % n]);
                a[0] * b[1] - b[0] * a[1]
            })
            .sum::<f64>()
            / 2.0
    }

    #[test]
    fn test_lattice_interior_cells_are_squares() {
        let v = VoronoiTessellation::build(&lattice(4, 4, 0.5)).unwrap();
        assert_eq!(v.len(), 16);
        assert_eq!(v.bounded_cells(), 4);

        // Site (1, 1) is interior
        let cell = v.cell(5).unwrap();
        assert_eq!(cell.len(), 4);
        assert!((ring_area(cell) - 0.25).abs() < 1e-9);
        // Hull sites are unbounded
        assert!(v.cell(0).is_none());
    }

    #[test]
    fn test_lattice_diagonals_are_not_ridges() {
        let v = VoronoiTessellation::build(&lattice(4, 4, 1.0)).unwrap();
        // Interior sites 5, 6, 9, 10: 5-6, 5-9, 6-10, 9-10 are neighbours
        assert!(v.ridges().contains(&(5, 6)));
        assert!(v.ridges().contains(&(5, 9)));
        assert!(!v.ridges().contains(&(5, 10)));
        assert!(!v.ridges().contains(&(6, 9)));
    }

    #[test]
    fn test_scattered_sites() {
        let sites = [[0.0, 0.0], [2.0, 0.1], [1.0, 1.9], [1.0, 0.7], [-0.5, 1.4], [2.3, 1.6]];
        let v = VoronoiTessellation::build(&sites).unwrap();
        // Only the site enclosed by the hull has a bounded cell
        assert!(v.cell(3).is_some());
        assert_eq!(v.bounded_cells(), 1);
        assert!(ring_area(v.cell(3).unwrap()) > 0.0);
    }

    #[test]
    fn test_collinear_sites_have_no_cells() {
        let sites = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        let v = VoronoiTessellation::build(&sites).unwrap();
        assert_eq!(v.bounded_cells(), 0);
        assert!(v.ridges().is_empty());
    }

    #[test]
    fn test_empty() {
        let v = VoronoiTessellation::build(&[]).unwrap();
        assert!(v.is_empty());
    }
}
