//! Per-corner skinned vertex stream
//!
//! Every triangle corner becomes its own vertex. Nothing is shared or
//! merged, so the index buffer is always `0..vertex_count`; see
//! [`crate::dedup`] for the optional merge pass.
//!
//! A mesh without UV layers is exported with zero UVs and a warning.

use glam::{Vec2, Vec3};
use rigbake_core::{Error, Result};
use rigbake_scene::{Mesh, MeshVertex, VertexGroups};
use smallvec::SmallVec;

use crate::skeleton::Skeleton;

/// One bone driving a vertex
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Influence {
    pub bone_index: usize,
    /// Raw group weight; sums are not normalized
    pub weight: f32,
}

/// Influence list in vertex-group iteration order
pub type Influences = SmallVec<[Influence; 4]>;

/// A triangle corner ready for the runtime
#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedVertex {
    pub position: Vec3,
    /// Corner normal, not the shared vertex normal
    pub normal: Vec3,
    /// First UV layer, zero when the mesh has none
    pub uv: Vec2,
    pub influences: Influences,
}

/// Vertex stream plus index buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedMesh {
    pub vertices: Vec<SkinnedVertex>,
    pub indices: Vec<u32>,
}

impl SkinnedMesh {
    /// Triangle count
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// True when the index buffer is `0..vertex_count`
    pub fn is_identity_indexed(&self) -> bool {
        self.indices.len() == self.vertices.len()
            && self.indices.iter().enumerate().all(|(i, &idx)| idx as usize == i)
    }
}

/// Skins a mesh against a built skeleton
pub struct MeshSkinner<'a> {
    skeleton: &'a Skeleton,
}

impl<'a> MeshSkinner<'a> {
    pub fn new(skeleton: &'a Skeleton) -> Self {
        Self { skeleton }
    }

    /// Triangulate the working copy `mesh` and emit one vertex per corner.
    ///
    /// Fails with [`Error::Binding`] when a vertex group has no skeleton
    /// node of the same name.
    pub fn skin(&self, mut mesh: Mesh, groups: &VertexGroups) -> Result<SkinnedMesh> {
        let triangles = mesh.triangulate()?;

        let uv_layer = mesh.active_uv_layer();
        match uv_layer {
            None => tracing::warn!("Mesh has no UV layer, writing zero UVs"),
            Some(layer) if mesh.uv_layers.len() > 1 => tracing::debug!(
                layer = %layer.name,
                layers = mesh.uv_layers.len(),
                "Using first UV layer only"
            ),
            Some(_) => {}
        }

        // Influences are resolved lazily so unused vertices never fail the export
        let mut resolved: Vec<Option<Influences>> = vec![None; mesh.vertices.len()];

        let corner_count = triangles * 3;
        let mut vertices = Vec::with_capacity(corner_count);
        let mut indices = Vec::with_capacity(corner_count);

        for polygon in &mesh.polygons {
            let start = polygon.loop_start as usize;
            for loop_index in start..start + polygon.loop_total as usize {
                let corner = mesh.loops[loop_index];
                let vertex_index = corner.vertex as usize;
                let vertex = &mesh.vertices[vertex_index];

                let influences = match &resolved[vertex_index] {
                    Some(influences) => influences.clone(),
                    None => {
                        let influences = self.resolve(vertex_index, vertex, groups)?;
                        resolved[vertex_index] = Some(influences.clone());
                        influences
                    }
                };

                let uv = uv_layer.map_or(Vec2::ZERO, |layer| layer.data[loop_index]);

                indices.push(vertices.len() as u32);
                vertices.push(SkinnedVertex {
                    position: vertex.position,
                    normal: corner.normal,
                    uv,
                    influences,
                });
            }
        }

        tracing::info!(
            triangles,
            vertices = vertices.len(),
            "Mesh skinned"
        );

        Ok(SkinnedMesh { vertices, indices })
    }

    fn resolve(&self, vertex_index: usize, vertex: &MeshVertex, groups: &VertexGroups) -> Result<Influences> {
        vertex
            .groups
            .iter()
            .map(|membership| {
                let name = groups.get(&membership.group).ok_or(Error::UnknownGroupIndex {
                    vertex: vertex_index,
                    group_index: membership.group,
                })?;
                let bone_index = self
                    .skeleton
                    .index_of(name)
                    .ok_or_else(|| Error::Binding { group: name.clone() })?;
                Ok(Influence {
                    bone_index,
                    weight: membership.weight,
                })
            })
            .collect()
    }
}
