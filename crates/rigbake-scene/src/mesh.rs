//! Polygon mesh as exposed by the scene tool
//!
//! The layout mirrors how authoring tools store meshes: shared vertices,
//! per-corner loops (a loop is one corner of one polygon) and polygons
//! that are runs of consecutive loops. UV layers store one value per loop.

use glam::{Vec2, Vec3};
use rigbake_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Membership of a vertex in a vertex group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupWeight {
    /// Vertex-group index on the owning object
    pub group: u32,
    pub weight: f32,
}

/// A shared mesh vertex
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshVertex {
    pub position: Vec3,
    /// Group memberships in the order the tool reports them
    #[serde(default)]
    pub groups: Vec<GroupWeight>,
}

/// One polygon corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshLoop {
    /// Index into [`Mesh::vertices`]
    pub vertex: u32,
    /// Split (per-corner) normal
    pub normal: Vec3,
}

/// A run of `loop_total` consecutive loops starting at `loop_start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polygon {
    pub loop_start: u32,
    pub loop_total: u32,
}

/// Per-loop texture coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvLayer {
    pub name: String,
    pub data: Vec<Vec2>,
}

/// A polygonal mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub loops: Vec<MeshLoop>,
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub uv_layers: Vec<UvLayer>,
}

impl Mesh {
    /// True when every polygon has exactly three corners
    pub fn is_triangulated(&self) -> bool {
        self.polygons.iter().all(|p| p.loop_total == 3)
    }

    /// The first UV layer, if any
    pub fn active_uv_layer(&self) -> Option<&UvLayer> {
        self.uv_layers.first()
    }

    /// Check that every polygon, loop and UV layer stays inside the mesh
    pub fn validate(&self) -> Result<()> {
        for (index, polygon) in self.polygons.iter().enumerate() {
            if polygon.loop_total < 3 {
                return Err(Error::invalid_topology(format!(
                    "polygon {} has {} corners",
                    index, polygon.loop_total
                )));
            }
            let end = polygon.loop_start as usize + polygon.loop_total as usize;
            if end > self.loops.len() {
                return Err(Error::invalid_topology(format!(
                    "polygon {} spans loops {}..{} but the mesh has {} loops",
                    index,
                    polygon.loop_start,
                    end,
                    self.loops.len()
                )));
            }
        }

        for (index, corner) in self.loops.iter().enumerate() {
            if corner.vertex as usize >= self.vertices.len() {
                return Err(Error::invalid_topology(format!(
                    "loop {} references vertex {} of {}",
                    index,
                    corner.vertex,
                    self.vertices.len()
                )));
            }
        }

        for layer in &self.uv_layers {
            if layer.data.len() != self.loops.len() {
                return Err(Error::invalid_topology(format!(
                    "UV layer '{}' has {} values for {} loops",
                    layer.name,
                    layer.data.len(),
                    self.loops.len()
                )));
            }
        }

        Ok(())
    }

    /// Split every polygon into triangles, in place.
    ///
    /// Loops and UV values are copied per triangle corner, so each corner
    /// keeps the normal and UV it had on the original polygon. Returns
    /// the resulting triangle count.
    pub fn triangulate(&mut self) -> Result<usize> {
        self.validate()?;

        let mut loops = Vec::with_capacity(self.loops.len());
        let mut polygons = Vec::with_capacity(self.polygons.len());
        let mut uv_data: Vec<Vec<Vec2>> = vec![Vec::with_capacity(self.loops.len()); self.uv_layers.len()];

        for polygon in &self.polygons {
            let start = polygon.loop_start as usize;
            let corners = &self.loops[start..start + polygon.loop_total as usize];
            let points: Vec<Vec3> = corners
                .iter()
                .map(|c| self.vertices[c.vertex as usize].position)
                .collect();

            for triangle in triangulate_polygon(&points) {
                polygons.push(Polygon {
                    loop_start: loops.len() as u32,
                    loop_total: 3,
                });
                for local in triangle {
                    let source = start + local;
                    loops.push(self.loops[source]);
                    for (layer, data) in self.uv_layers.iter().zip(uv_data.iter_mut()) {
                        data.push(layer.data[source]);
                    }
                }
            }
        }

        for (layer, data) in self.uv_layers.iter_mut().zip(uv_data) {
            layer.data = data;
        }
        self.loops = loops;
        self.polygons = polygons;

        tracing::debug!(triangles = self.polygons.len(), "Mesh triangulated");
        Ok(self.polygons.len())
    }
}

/// Triangulate one polygon given its corner positions.
///
/// Returns triangles as indices into `points`, wound in polygon order.
/// Ear clipping on the polygon's best-fit plane; falls back to a fan when
/// the outline is degenerate or no ear can be found.
pub fn triangulate_polygon(points: &[Vec3]) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![[0, 1, 2]];
    }

    // Tolerances below are in units of the polygon's own extent
    let min = points.iter().copied().fold(Vec3::splat(f32::INFINITY), Vec3::min);
    let max = points.iter().copied().fold(Vec3::splat(f32::NEG_INFINITY), Vec3::max);
    let extent = (max - min).max_element();
    if !extent.is_finite() || extent <= 0.0 {
        return fan(&(0..n).collect::<Vec<_>>());
    }
    let unit: Vec<Vec3> = points.iter().map(|&p| (p - min) / extent).collect();

    let normal = newell_normal(&unit);
    if normal.length_squared() <= f32::EPSILON {
        return fan(&(0..n).collect::<Vec<_>>());
    }
    let (u, v) = normal.normalize().any_orthonormal_pair();
    let flat: Vec<Vec2> = unit.iter().map(|p| Vec2::new(p.dot(u), p.dot(v))).collect();

    let orientation = if signed_area(&flat) >= 0.0 { 1.0 } else { -1.0 };

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        // Start at the second corner so convex input comes out as a fan from corner 0
        let ear = (0..m)
            .map(|step| (step + 1) % m)
            .find(|&k| is_ear(&flat, &remaining, k, orientation));

        match ear {
            Some(k) => {
                let a = remaining[(k + m - 1) % m];
                let b = remaining[k];
                let c = remaining[(k + 1) % m];
                triangles.push([a, b, c]);
                remaining.remove(k);
            }
            None => {
                triangles.extend(fan(&remaining));
                return triangles;
            }
        }
    }

    triangles.push([remaining[0], remaining[1], remaining[2]]);
    triangles
}

fn fan(corners: &[usize]) -> Vec<[usize; 3]> {
    (1..corners.len().saturating_sub(1))
        .map(|k| [corners[0], corners[k], corners[k + 1]])
        .collect()
}

fn newell_normal(points: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

fn signed_area(points: &[Vec2]) -> f32 {
    let mut area = 0.0;
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        area += current.perp_dot(next);
    }
    area * 0.5
}

fn is_ear(points: &[Vec2], remaining: &[usize], k: usize, orientation: f32) -> bool {
    let m = remaining.len();
    let a = points[remaining[(k + m - 1) % m]];
    let b = points[remaining[k]];
    let c = points[remaining[(k + 1) % m]];

    let turn = (b - a).perp_dot(c - b) * orientation;
    if turn <= f32::EPSILON {
        return false;
    }

    remaining.iter().enumerate().all(|(j, &index)| {
        if j == k || j == (k + m - 1) % m || j == (k + 1) % m {
            return true;
        }
        let p = points[index];
        if p == a || p == b || p == c {
            return true;
        }
        !point_in_triangle(p, a, b, c, orientation)
    })
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2, orientation: f32) -> bool {
    let d1 = (b - a).perp_dot(p - a) * orientation;
    let d2 = (c - b).perp_dot(p - b) * orientation;
    let d3 = (a - c).perp_dot(p - c) * orientation;
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}
