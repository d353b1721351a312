//! Scene collaborator capabilities
//!
//! These traits are the only way the export pipeline talks to the host
//! tool. Field contracts are fixed: matrices are armature-space and use
//! the column-vector convention of `glam`.

use std::collections::BTreeMap;

use glam::Mat4;
use rigbake_core::Result;
use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;

/// Vertex-group index to vertex-group name, as defined on a mesh object
pub type VertexGroups = BTreeMap<u32, String>;

/// A bone in rest pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    /// Unique bone name
    pub name: String,
    /// Parent bone name, `None` for roots
    pub parent: Option<String>,
    /// Rest-pose local-to-armature transform
    pub rest_matrix: Mat4,
}

impl Bone {
    /// Create a root bone
    pub fn new(name: impl Into<String>, rest_matrix: Mat4) -> Self {
        Self {
            name: name.into(),
            parent: None,
            rest_matrix,
        }
    }

    /// Set the parent bone name
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// A bone as seen through the pose cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseBone {
    pub name: String,
    pub parent: Option<String>,
}

/// An armature object currently present in the scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armature {
    pub name: String,
    /// Pose bones in the armature's own order
    pub bones: Vec<PoseBone>,
}

/// A named animation clip authored in the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    /// First and last authored frame; may be fractional
    pub frame_range: (f32, f32),
}

impl Action {
    pub fn new(name: impl Into<String>, start: f32, end: f32) -> Self {
        Self {
            name: name.into(),
            frame_range: (start, end),
        }
    }
}

/// Read-only scene queries
pub trait Scene {
    /// Armatures in scene order
    fn armatures(&self) -> Vec<Armature>;

    /// Rest-pose bones of one armature, parents listed before children
    fn bones(&self, armature: &str) -> Result<Vec<Bone>>;

    /// A working copy of the mesh bound to `object`.
    ///
    /// The copy is owned by the caller; triangulating it never touches
    /// the source asset.
    fn mesh(&self, object: &str) -> Result<Mesh>;

    /// Vertex groups defined on the mesh object
    fn vertex_groups(&self, object: &str) -> Result<VertexGroups>;

    /// Actions in scene order
    fn actions(&self) -> Vec<Action>;

    /// Frames per second of the scene timeline
    fn fps(&self) -> f32;
}

/// Frame stepping and pose evaluation.
///
/// The cursor (active action and current frame) is shared, mutable
/// state of the whole scene. Nothing else may read or move it while a
/// sampler is stepping through frames, and anything reading it after an
/// export sees whatever the exporter left behind unless the caller
/// restores it. Parallel samplers need one scene value each.
pub trait PoseQuery {
    /// Name of the action currently driving the armatures
    fn active_action(&self) -> Option<String>;

    /// Assign the action that drives every armature; `None` clears it
    fn set_action(&mut self, action: Option<&str>) -> Result<()>;

    /// Frame the cursor currently sits on
    fn current_frame(&self) -> i32;

    /// Move the cursor and re-evaluate poses
    fn set_frame(&mut self, frame: i32) -> Result<()>;

    /// Armature-space pose matrix of `bone` at the current frame
    fn query_pose(&self, armature: &str, bone: &str) -> Result<Mat4>;
}
