//! Region extraction: Voronoi cells merged into same-class polygons

use geo::{Area, Coord, LineString, Polygon};
use ndarray::Array2;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use super::voronoi::VoronoiTessellation;
use crate::error::{BoundaryError, Result};
use crate::utils::Timer;

/// One contiguous same-class area
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Closed exterior ring (first vertex repeated at the end)
    pub exterior: Vec<[f64; 2]>,
    /// Display name of the class
    pub class_name: String,
    /// Raw predicted label
    pub label: i64,
}

impl Region {
    /// Unsigned area enclosed by the exterior ring
    pub fn area(&self) -> f64 {
        ring_polygon(&self.exterior).unsigned_area()
    }
}

/// A valid cell carried through merging
struct Cell<'a> {
    site: usize,
    class: usize,
    ring: &'a [[f64; 2]],
}

/// Merges a classified mesh into class regions
pub struct RegionExtractor;

impl RegionExtractor {
    /// Extract one polygon per connected same-class area of the mesh.
    ///
    /// `xx`, `yy` and `z` must share a shape. The display name of label `l`
    /// is `class_names[l]`; cells whose label has no name are dropped, as
    /// are unbounded or degenerate Voronoi cells along the mesh edge.
    /// Regions come out ordered by the first mesh point they contain.
    pub fn extract(
        xx: &Array2<f64>,
        yy: &Array2<f64>,
        z: &Array2<i64>,
        class_names: &[String],
    ) -> Result<Vec<Region>> {
        if xx.dim() != yy.dim() || xx.dim() != z.dim() {
            return Err(BoundaryError::shape(
                format!("xx, yy and z of shape {:?}", xx.dim()),
                format!("yy {:?}, z {:?}", yy.dim(), z.dim()),
            ));
        }
        if z.is_empty() {
            return Ok(Vec::new());
        }

        let timer = Timer::start();

        // Dense class index over the labels actually present
        let mut present: Vec<i64> = z.iter().copied().collect();
        present.sort_unstable();
        present.dedup();
        let dense: HashMap<i64, usize> =
            present.iter().enumerate().map(|(i, &label)| (label, i)).collect();
        let names: Vec<Option<&String>> = present
            .iter()
            .map(|&label| usize::try_from(label).ok().and_then(|l| class_names.get(l)))
            .collect();

        let sites: Vec<[f64; 2]> = xx.iter().zip(yy.iter()).map(|(&x, &y)| [x, y]).collect();
        let labels: Vec<i64> = z.iter().copied().collect();
        let voronoi = VoronoiTessellation::build(&sites)?;

        let mut cells = Vec::new();
        let mut cell_of_site: HashMap<usize, usize> = HashMap::new();
        for (site, &label) in labels.iter().enumerate() {
            let class = dense[&label];
            if names[class].is_none() {
                continue;
            }
            let Some(ring) = voronoi.cell(site) else {
                continue;
            };
            cell_of_site.insert(site, cells.len());
            cells.push(Cell { site, class, ring });
        }

        // Same-class neighbours across a ridge share a component
        let mut components_of: UnionFind<usize> = UnionFind::new(cells.len());
        for &(a, b) in voronoi.ridges() {
            if let (Some(&ca), Some(&cb)) = (cell_of_site.get(&a), cell_of_site.get(&b)) {
                if cells[ca].class == cells[cb].class {
                    components_of.union(ca, cb);
                }
            }
        }

        // Cells are in ascending site order, so each member list is too
        let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for c in 0..cells.len() {
            grouped.entry(components_of.find(c)).or_default().push(c);
        }
        let mut components: Vec<Vec<usize>> = grouped.into_values().collect();
        components.sort_by_key(|members| members.first().map(|&c| cells[c].site));

        let mut regions = Vec::with_capacity(components.len());
        for members in &components {
            let Some(&first) = members.first() else {
                continue;
            };
            let class = cells[first].class;
            if let Some(&stray) = members.iter().find(|&&c| cells[c].class != class) {
                return Err(BoundaryError::Computation(format!(
                    "merged region mixes classes {} and {}",
                    present[class], present[cells[stray].class]
                )));
            }

            let rings: Vec<&[[f64; 2]]> = members.iter().map(|&c| cells[c].ring).collect();
            let Some(exterior) = trace_outline(&rings) else {
                continue;
            };
            let label = present[class];
            regions.push(Region {
                exterior,
                class_name: names[class].cloned().unwrap_or_else(|| label.to_string()),
                label,
            });
        }

        debug!(
            sites = sites.len(),
            bounded = cells.len(),
            regions = regions.len(),
            elapsed_ms = timer.elapsed_ms(),
            "regions extracted"
        );

        Ok(regions)
    }

    /// Region counts per class name
    pub fn class_counts(regions: &[Region]) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for region in regions {
            *counts.entry(region.class_name.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

fn ring_polygon(ring: &[[f64; 2]]) -> Polygon<f64> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|&[x, y]| Coord { x, y }).collect();
    Polygon::new(LineString::new(coords), vec![])
}

/// Bit pattern of a snapped vertex; `-0.0` and `0.0` coincide
type VertexKey = (u64, u64);

fn vertex_key(p: [f64; 2]) -> VertexKey {
    ((p[0] + 0.0).to_bits(), (p[1] + 0.0).to_bits())
}

fn signed_area(ring: &[[f64; 2]]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a[0] * b[1] - b[0] * a[1]
        })
        .sum::<f64>()
        / 2.0
}

/// Left-turn angle from direction `d_in` to `d_out`, in `(-pi, pi]`
fn turn(d_in: [f64; 2], d_out: [f64; 2]) -> f64 {
    let cross = d_in[0] * d_out[1] - d_in[1] * d_out[0];
    let dot = d_in[0] * d_out[0] + d_in[1] * d_out[1];
    cross.atan2(dot)
}

/// Outline of the union of counter-clockwise cell rings that share
/// bit-identical vertices.
///
/// Edges used by two cells are interior; the rest are chained into loops,
/// taking the sharpest left turn where the outline touches itself. The
/// counter-clockwise loop of largest area is the exterior, returned closed
/// with collinear vertices removed. Holes are dropped.
fn trace_outline(rings: &[&[[f64; 2]]]) -> Option<Vec<[f64; 2]>> {
    let mut directed: Vec<([f64; 2], [f64; 2])> = Vec::new();
    let mut uses: BTreeMap<(VertexKey, VertexKey), usize> = BTreeMap::new();
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            let (ka, kb) = (vertex_key(a), vertex_key(b));
            if ka == kb {
                continue;
            }
            *uses.entry((ka.min(kb), ka.max(kb))).or_insert(0) += 1;
            directed.push((a, b));
        }
    }

    let edges: Vec<([f64; 2], [f64; 2])> = directed
        .into_iter()
        .filter(|&(a, b)| {
            let (ka, kb) = (vertex_key(a), vertex_key(b));
            uses.get(&(ka.min(kb), ka.max(kb))) == Some(&1)
        })
        .collect();

    let mut outgoing: BTreeMap<VertexKey, Vec<usize>> = BTreeMap::new();
    for (e, &(a, _)) in edges.iter().enumerate() {
        outgoing.entry(vertex_key(a)).or_default().push(e);
    }

    let mut used = vec![false; edges.len()];
    let mut best: Option<(f64, Vec<[f64; 2]>)> = None;
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;
        let mut ring = vec![edges[start].0];
        let mut current = start;
        loop {
            let (from, to) = edges[current];
            let d_in = [to[0] - from[0], to[1] - from[1]];
            let candidates = outgoing.get(&vertex_key(to)).map(Vec::as_slice).unwrap_or(&[]);
            let next = candidates
                .iter()
                .copied()
                .filter(|&e| !used[e] || e == start)
                .max_by(|&x, &y| {
                    let dx = [edges[x].1[0] - to[0], edges[x].1[1] - to[1]];
                    let dy = [edges[y].1[0] - to[0], edges[y].1[1] - to[1]];
                    turn(d_in, dx).total_cmp(&turn(d_in, dy)).then(y.cmp(&x))
                });
            match next {
                Some(e) if e == start => break,
                Some(e) => {
                    used[e] = true;
                    ring.push(to);
                    current = e;
                }
                None => break,
            }
        }

        let area = signed_area(&ring);
        if area > 0.0 && best.as_ref().map_or(true, |(a, _)| area > *a) {
            best = Some((area, ring));
        }
    }

    let (_, ring) = best?;
    let mut exterior = drop_collinear(ring);
    if exterior.len() < 3 {
        return None;
    }
    exterior.push(exterior[0]);
    Some(exterior)
}

/// Remove vertices lying on the segment between their neighbours
fn drop_collinear(ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let (p, c, q) = (ring[(i + n - 1) % n], ring[i], ring[(i + 1) % n]);
            let (u, v) = ([c[0] - p[0], c[1] - p[1]], [q[0] - c[0], q[1] - c[1]]);
            let cross = u[0] * v[1] - u[1] * v[0];
            let scale = u[0].hypot(u[1]) * v[0].hypot(v[1]);
            cross.abs() > 1e-12 * scale || u[0] * v[0] + u[1] * v[1] < 0.0
        })
        .map(|i| ring[i])
        .collect()
}
