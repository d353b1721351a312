//! Optional vertex merge pass
//!
//! Corners that would serialize identically (position, UV, normal and
//! influences after six-decimal rounding) collapse into one vertex. The
//! first occurrence keeps its slot, so the output order is stable.

use std::collections::HashMap;

use crate::skinning::{SkinnedMesh, SkinnedVertex};

/// Hashable, quantized view of a vertex
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VertexKey {
    attributes: [i64; 8],
    influences: Vec<(usize, i64)>,
}

impl VertexKey {
    fn new(vertex: &SkinnedVertex) -> Self {
        let p = vertex.position;
        let n = vertex.normal;
        let uv = vertex.uv;
        Self {
            attributes: [p.x, p.y, p.z, uv.x, uv.y, n.x, n.y, n.z].map(fixed),
            influences: vertex
                .influences
                .iter()
                .map(|i| (i.bone_index, fixed(i.weight)))
                .collect(),
        }
    }
}

/// Six-decimal fixed point; -0.0 and 0.0 share a key
fn fixed(value: f32) -> i64 {
    (f64::from(value) * 1e6).round() as i64
}

/// Merge duplicate corners and rewrite the index buffer
pub fn deduplicate(mesh: &SkinnedMesh) -> SkinnedMesh {
    let mut index_map: HashMap<VertexKey, u32> = HashMap::new();
    let mut vertices = Vec::new();

    let indices = mesh
        .indices
        .iter()
        .map(|&idx| {
            let vertex = &mesh.vertices[idx as usize];
            *index_map.entry(VertexKey::new(vertex)).or_insert_with(|| {
                let new_idx = vertices.len() as u32;
                vertices.push(vertex.clone());
                new_idx
            })
        })
        .collect();

    tracing::debug!(
        before = mesh.vertices.len(),
        after = vertices.len(),
        "Vertices deduplicated"
    );

    SkinnedMesh { vertices, indices }
}
