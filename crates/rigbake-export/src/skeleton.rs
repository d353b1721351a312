//! Indexed bone hierarchy
//!
//! Node indices follow the order the scene lists bones in, so a parent
//! always has a lower index than its children.

use std::collections::HashMap;

use glam::Mat4;
use rigbake_core::{safe_inverse, Error, Result};
use rigbake_scene::Bone;

/// A bone of the exported skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonNode {
    /// Bone name
    pub name: String,
    /// Position in the skeleton, equal to the bone's position in the source list
    pub index: usize,
    /// Parent node index (None for root nodes)
    pub parent: Option<usize>,
    /// Inverse of the rest-pose local-to-world transform
    pub inverse_bind: Mat4,
}

impl SkeletonNode {
    /// Parent index as written to the asset, -1 for roots
    pub fn parent_index(&self) -> i64 {
        self.parent.map_or(-1, |p| p as i64)
    }

    /// Check if this is a root node
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Immutable skeleton built once per export
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    /// Armature the bones came from
    armature: String,
    nodes: Vec<SkeletonNode>,
    by_name: HashMap<String, usize>,
}

impl Skeleton {
    /// Name of the source armature
    pub fn armature(&self) -> &str {
        &self.armature
    }

    /// Nodes in index order
    pub fn nodes(&self) -> &[SkeletonNode] {
        &self.nodes
    }

    /// Get node count
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the skeleton has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Find node by name
    pub fn find(&self, name: &str) -> Option<&SkeletonNode> {
        self.by_name.get(name).map(|&idx| &self.nodes[idx])
    }

    /// Find node index by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Get node by index
    pub fn get(&self, index: usize) -> Option<&SkeletonNode> {
        self.nodes.get(index)
    }

    /// Root node indices
    pub fn roots(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|n| n.index)
            .collect()
    }

    /// Get children of a node
    pub fn children(&self, index: usize) -> Vec<usize> {
        self.nodes
            .iter()
            .filter(|n| n.parent == Some(index))
            .map(|n| n.index)
            .collect()
    }
}

/// Builds a [`Skeleton`] from the scene's bone list
pub struct SkeletonBuilder;

impl SkeletonBuilder {
    /// Index the bones of `armature` in the order given.
    ///
    /// Every parent must appear before its children; a parent that has
    /// not been built yet is a fatal [`Error::HierarchyOrder`].
    pub fn build(armature: &str, bones: &[Bone]) -> Result<Skeleton> {
        let mut nodes = Vec::with_capacity(bones.len());
        let mut by_name = HashMap::with_capacity(bones.len());

        for (index, bone) in bones.iter().enumerate() {
            let parent = match &bone.parent {
                None => None,
                Some(parent) => Some(by_name.get(parent).copied().ok_or_else(|| {
                    Error::HierarchyOrder {
                        bone: bone.name.clone(),
                        parent: parent.clone(),
                    }
                })?),
            };

            let inverse = safe_inverse(&bone.rest_matrix);
            if inverse.is_degenerate() {
                tracing::warn!(
                    bone = %bone.name,
                    "Singular rest matrix, inverse bind pose is a best-effort substitute"
                );
            }

            if by_name.insert(bone.name.clone(), index).is_some() {
                return Err(Error::invalid_data(format!(
                    "duplicate bone name '{}' in armature '{}'",
                    bone.name, armature
                )));
            }

            nodes.push(SkeletonNode {
                name: bone.name.clone(),
                index,
                parent,
                inverse_bind: inverse.matrix(),
            });
        }

        tracing::info!(armature = %armature, nodes = nodes.len(), "Skeleton built");

        Ok(Skeleton {
            armature: armature.to_string(),
            nodes,
            by_name,
        })
    }
}
