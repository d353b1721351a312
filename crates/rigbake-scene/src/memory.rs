//! In-memory scene backed by a JSON scene dump
//!
//! A host-tool script writes the dump; the exporter reads it through the
//! same [`Scene`]/[`PoseQuery`] traits a live tool binding would provide.
//!
//! Matrices in the dump are 16 floats, row-major. Pose channels hold
//! armature-space keys per frame; evaluation holds the latest key at or
//! before the cursor. A bone without keys follows its nearest keyed
//! ancestor through the rest offsets, and reports its rest matrix when
//! nothing above it is keyed.

use std::collections::HashMap;
use std::path::Path;

use glam::Mat4;
use rigbake_core::math::from_row_major;
use rigbake_core::safe_inverse;
use rigbake_core::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;
use crate::traits::{Action, Armature, Bone, PoseBone, PoseQuery, Scene, VertexGroups};

/// Root of a JSON scene dump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDump {
    pub fps: f32,
    #[serde(default)]
    pub armatures: Vec<ArmatureDump>,
    #[serde(default)]
    pub objects: Vec<MeshObjectDump>,
    #[serde(default)]
    pub actions: Vec<ActionDump>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmatureDump {
    pub name: String,
    pub bones: Vec<BoneDump>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneDump {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Rest matrix, row-major
    pub rest: [f32; 16],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshObjectDump {
    pub name: String,
    pub mesh: Mesh,
    #[serde(default)]
    pub vertex_groups: Vec<VertexGroupDump>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexGroupDump {
    pub index: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDump {
    pub name: String,
    pub frame_range: [f32; 2],
    #[serde(default)]
    pub channels: Vec<PoseChannelDump>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseChannelDump {
    pub armature: String,
    pub bone: String,
    pub keys: Vec<PoseKeyDump>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseKeyDump {
    pub frame: i32,
    /// Armature-space pose matrix, row-major
    pub matrix: [f32; 16],
}

#[derive(Debug, Clone)]
struct ArmatureEntry {
    name: String,
    bones: Vec<Bone>,
}

#[derive(Debug, Clone)]
struct MeshObject {
    name: String,
    mesh: Mesh,
    vertex_groups: VertexGroups,
}

/// Keys of one bone, sorted by frame
type Channel = Vec<(i32, Mat4)>;

#[derive(Debug, Clone, Default)]
struct PoseCursor {
    frame: i32,
    action: Option<String>,
}

/// A scene held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryScene {
    fps: f32,
    armatures: Vec<ArmatureEntry>,
    objects: Vec<MeshObject>,
    actions: Vec<Action>,
    /// action -> (armature, bone) -> keys
    channels: HashMap<String, HashMap<(String, String), Channel>>,
    cursor: PoseCursor,
}

impl MemoryScene {
    /// Create an empty scene with the given frame rate
    pub fn new(fps: f32) -> Self {
        Self {
            fps,
            ..Self::default()
        }
    }

    /// Add an armature; bones must list parents before children
    pub fn add_armature(&mut self, name: impl Into<String>, bones: Vec<Bone>) -> &mut Self {
        self.armatures.push(ArmatureEntry {
            name: name.into(),
            bones,
        });
        self
    }

    /// Add a mesh object with its vertex groups
    pub fn add_mesh_object(
        &mut self,
        name: impl Into<String>,
        mesh: Mesh,
        vertex_groups: VertexGroups,
    ) -> &mut Self {
        self.objects.push(MeshObject {
            name: name.into(),
            mesh,
            vertex_groups,
        });
        self
    }

    /// Add an action
    pub fn add_action(&mut self, action: Action) -> &mut Self {
        self.channels.entry(action.name.clone()).or_default();
        self.actions.push(action);
        self
    }

    /// Key an armature-space pose for a bone; replaces an existing key on the same frame
    pub fn add_pose_key(
        &mut self,
        action: &str,
        armature: &str,
        bone: &str,
        frame: i32,
        matrix: Mat4,
    ) -> Result<&mut Self> {
        if !self.actions.iter().any(|a| a.name == action) {
            return Err(Error::ActionNotFound {
                name: action.to_string(),
            });
        }
        if self.find_bone(armature, bone).is_none() {
            return Err(Error::invalid_data(format!(
                "pose key for unknown bone '{armature}/{bone}' in action '{action}'"
            )));
        }

        let channel = self
            .channels
            .entry(action.to_string())
            .or_default()
            .entry((armature.to_string(), bone.to_string()))
            .or_default();

        match channel.binary_search_by_key(&frame, |(f, _)| *f) {
            Ok(pos) => channel[pos].1 = matrix,
            Err(pos) => channel.insert(pos, (frame, matrix)),
        }
        Ok(self)
    }

    /// Build a scene from a parsed dump
    pub fn from_dump(dump: SceneDump) -> Result<Self> {
        let mut scene = Self::new(dump.fps);

        for armature in dump.armatures {
            let bones = armature
                .bones
                .into_iter()
                .map(|b| Bone {
                    name: b.name,
                    parent: b.parent,
                    rest_matrix: from_row_major(&b.rest),
                })
                .collect();
            scene.add_armature(armature.name, bones);
        }

        for object in dump.objects {
            let groups = object
                .vertex_groups
                .into_iter()
                .map(|g| (g.index, g.name))
                .collect();
            scene.add_mesh_object(object.name, object.mesh, groups);
        }

        for action in dump.actions {
            let name = action.name.clone();
            scene.add_action(Action::new(
                action.name,
                action.frame_range[0],
                action.frame_range[1],
            ));
            for channel in action.channels {
                for key in channel.keys {
                    scene.add_pose_key(
                        &name,
                        &channel.armature,
                        &channel.bone,
                        key.frame,
                        from_row_major(&key.matrix),
                    )?;
                }
            }
        }

        tracing::debug!(
            armatures = scene.armatures.len(),
            objects = scene.objects.len(),
            actions = scene.actions.len(),
            "Scene loaded"
        );

        Ok(scene)
    }

    /// Parse a scene dump from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let dump: SceneDump = serde_json::from_str(json)
            .map_err(|e| Error::invalid_data(format!("scene dump: {e}")))?;
        Self::from_dump(dump)
    }

    /// Load a scene dump from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .with_context(|| format!("reading scene dump {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("loading {}", path.display()))
    }

    fn find_armature(&self, name: &str) -> Option<&ArmatureEntry> {
        self.armatures.iter().find(|a| a.name == name)
    }

    fn find_bone(&self, armature: &str, bone: &str) -> Option<&Bone> {
        self.find_armature(armature)
            .and_then(|a| a.bones.iter().find(|b| b.name == bone))
    }

    fn find_object(&self, name: &str) -> Result<&MeshObject> {
        self.objects
            .iter()
            .find(|o| o.name == name)
            .ok_or_else(|| Error::MeshNotFound {
                name: name.to_string(),
            })
    }

    /// Armature-space pose of `bone` and whether any key drives it.
    ///
    /// Unkeyed bones follow a driven parent, keeping their rest offset to
    /// it. `depth` bounds the parent walk for cyclic dumps.
    fn evaluate(&self, armature: &str, bone: &str, depth: usize) -> Result<(Mat4, bool)> {
        let pose_error = |message: &str| Error::PoseQuery {
            armature: armature.to_string(),
            bone: bone.to_string(),
            frame: self.cursor.frame,
            message: message.to_string(),
        };
        let entry = self.find_bone(armature, bone).ok_or_else(|| pose_error("no such bone"))?;

        if let Some(key) = self.key_at_cursor(armature, bone) {
            return Ok((key, true));
        }
        let Some(parent) = &entry.parent else {
            return Ok((entry.rest_matrix, false));
        };
        if depth == 0 {
            return Err(pose_error("bone hierarchy has a cycle"));
        }

        let (parent_pose, driven) = self.evaluate(armature, parent, depth - 1)?;
        if !driven {
            return Ok((entry.rest_matrix, false));
        }
        let parent_rest = self
            .find_bone(armature, parent)
            .map(|b| b.rest_matrix)
            .ok_or_else(|| pose_error("no such parent bone"))?;
        let offset = safe_inverse(&parent_rest).matrix() * entry.rest_matrix;
        Ok((parent_pose * offset, true))
    }

    fn key_at_cursor(&self, armature: &str, bone: &str) -> Option<Mat4> {
        let keys = self
            .cursor
            .action
            .as_ref()
            .and_then(|action| self.channels.get(action))
            .and_then(|channels| channels.get(&(armature.to_string(), bone.to_string())))
            .filter(|keys| !keys.is_empty())?;

        let frame = self.cursor.frame;
        let matrix = match keys.binary_search_by_key(&frame, |(f, _)| *f) {
            Ok(pos) => keys[pos].1,
            Err(0) => keys[0].1,
            Err(pos) => keys[pos - 1].1,
        };
        Some(matrix)
    }
}

impl Scene for MemoryScene {
    fn armatures(&self) -> Vec<Armature> {
        self.armatures
            .iter()
            .map(|a| Armature {
                name: a.name.clone(),
                bones: a
                    .bones
                    .iter()
                    .map(|b| PoseBone {
                        name: b.name.clone(),
                        parent: b.parent.clone(),
                    })
                    .collect(),
            })
            .collect()
    }

    fn bones(&self, armature: &str) -> Result<Vec<Bone>> {
        self.find_armature(armature)
            .map(|a| a.bones.clone())
            .ok_or_else(|| Error::ArmatureNotFound {
                name: armature.to_string(),
            })
    }

    fn mesh(&self, object: &str) -> Result<Mesh> {
        self.find_object(object).map(|o| o.mesh.clone())
    }

    fn vertex_groups(&self, object: &str) -> Result<VertexGroups> {
        self.find_object(object).map(|o| o.vertex_groups.clone())
    }

    fn actions(&self) -> Vec<Action> {
        self.actions.clone()
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}

impl PoseQuery for MemoryScene {
    fn active_action(&self) -> Option<String> {
        self.cursor.action.clone()
    }

    fn set_action(&mut self, action: Option<&str>) -> Result<()> {
        if let Some(name) = action {
            if !self.channels.contains_key(name) {
                return Err(Error::ActionNotFound {
                    name: name.to_string(),
                });
            }
        }
        self.cursor.action = action.map(str::to_string);
        Ok(())
    }

    fn current_frame(&self) -> i32 {
        self.cursor.frame
    }

    fn set_frame(&mut self, frame: i32) -> Result<()> {
        self.cursor.frame = frame;
        Ok(())
    }

    fn query_pose(&self, armature: &str, bone: &str) -> Result<Mat4> {
        let depth = self.find_armature(armature).map_or(0, |a| a.bones.len());
        self.evaluate(armature, bone, depth).map(|(pose, _)| pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn two_bone_scene() -> MemoryScene {
        let mut scene = MemoryScene::new(30.0);
        scene.add_armature(
            "Armature",
            vec![
                Bone::new("root", Mat4::IDENTITY),
                Bone::new("child", Mat4::from_translation(Vec3::Y)).with_parent("root"),
            ],
        );
        scene.add_action(Action::new("Wave", 1.0, 10.0));
        scene
    }

    #[test]
    fn test_query_pose_without_action_returns_rest() {
        let scene = two_bone_scene();
        let pose = scene.query_pose("Armature", "child").unwrap();
        assert_eq!(pose, Mat4::from_translation(Vec3::Y));
    }

    #[test]
    fn test_query_pose_holds_previous_key() {
        let mut scene = two_bone_scene();
        let a = Mat4::from_translation(Vec3::X);
        let b = Mat4::from_translation(Vec3::Z);
        scene.add_pose_key("Wave", "Armature", "root", 5, b).unwrap();
        scene.add_pose_key("Wave", "Armature", "root", 1, a).unwrap();
        scene.set_action(Some("Wave")).unwrap();

        scene.set_frame(0).unwrap();
        assert_eq!(scene.query_pose("Armature", "root").unwrap(), a);
        scene.set_frame(3).unwrap();
        assert_eq!(scene.query_pose("Armature", "root").unwrap(), a);
        scene.set_frame(5).unwrap();
        assert_eq!(scene.query_pose("Armature", "root").unwrap(), b);
        scene.set_frame(40).unwrap();
        assert_eq!(scene.query_pose("Armature", "root").unwrap(), b);

        // unkeyed child follows its keyed parent
        assert_eq!(
            scene.query_pose("Armature", "child").unwrap(),
            Mat4::from_translation(Vec3::Z + Vec3::Y)
        );
    }

    #[test]
    fn test_unkeyed_child_keeps_rest_offset_to_parent() {
        let mut scene = MemoryScene::new(24.0);
        let root_rest = Mat4::from_translation(Vec3::X);
        let child_rest = Mat4::from_translation(Vec3::new(1.0, 2.0, 0.0));
        scene.add_armature(
            "Armature",
            vec![
                Bone::new("root", root_rest),
                Bone::new("child", child_rest).with_parent("root"),
                Bone::new("tip", Mat4::from_translation(Vec3::new(1.0, 3.0, 0.0))).with_parent("child"),
            ],
        );
        scene.add_action(Action::new("Turn", 0.0, 1.0));
        let turned = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2) * root_rest;
        scene.add_pose_key("Turn", "Armature", "root", 0, turned).unwrap();
        scene.set_action(Some("Turn")).unwrap();

        let child = scene.query_pose("Armature", "child").unwrap();
        assert!(child.abs_diff_eq(turned * root_rest.inverse() * child_rest, 1e-6));

        let tip = scene.query_pose("Armature", "tip").unwrap();
        let expected = Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2)
            * Mat4::from_translation(Vec3::new(1.0, 3.0, 0.0));
        assert!(tip.abs_diff_eq(expected, 1e-5), "{tip:?}");

        // Without an active action everything is at rest
        scene.set_action(None).unwrap();
        assert_eq!(scene.query_pose("Armature", "tip").unwrap(), Mat4::from_translation(Vec3::new(1.0, 3.0, 0.0)));
    }

    #[test]
    fn test_query_unknown_bone_fails() {
        let scene = two_bone_scene();
        let err = scene.query_pose("Armature", "tail").unwrap_err();
        assert!(matches!(err, Error::PoseQuery { .. }));
    }

    #[test]
    fn test_set_unknown_action_fails() {
        let mut scene = two_bone_scene();
        assert!(scene.set_action(Some("Run")).is_err());
        assert!(scene.set_action(None).is_ok());
    }

    #[test]
    fn test_key_for_unknown_bone_rejected() {
        let mut scene = two_bone_scene();
        assert!(scene
            .add_pose_key("Wave", "Armature", "tail", 1, Mat4::IDENTITY)
            .is_err());
    }

    #[test]
    fn test_from_json_str() {
        let json = r#"{
            "fps": 24,
            "armatures": [{
                "name": "Rig",
                "bones": [
                    {"name": "hips", "rest": [1,0,0,0, 0,1,0,2, 0,0,1,0, 0,0,0,1]},
                    {"name": "spine", "parent": "hips", "rest": [1,0,0,0, 0,1,0,3, 0,0,1,0, 0,0,0,1]}
                ]
            }],
            "objects": [{
                "name": "Body",
                "mesh": {
                    "vertices": [
                        {"position": [0,0,0], "groups": [{"group": 0, "weight": 1.0}]},
                        {"position": [1,0,0]},
                        {"position": [0,1,0]}
                    ],
                    "loops": [
                        {"vertex": 0, "normal": [0,0,1]},
                        {"vertex": 1, "normal": [0,0,1]},
                        {"vertex": 2, "normal": [0,0,1]}
                    ],
                    "polygons": [{"loop_start": 0, "loop_total": 3}]
                },
                "vertex_groups": [{"index": 0, "name": "hips"}]
            }],
            "actions": [{
                "name": "Idle",
                "frame_range": [1, 4],
                "channels": [{
                    "armature": "Rig",
                    "bone": "hips",
                    "keys": [{"frame": 1, "matrix": [1,0,0,5, 0,1,0,0, 0,0,1,0, 0,0,0,1]}]
                }]
            }]
        }"#;

        let mut scene = MemoryScene::from_json_str(json).unwrap();
        assert_eq!(scene.fps(), 24.0);

        let bones = scene.bones("Rig").unwrap();
        assert_eq!(bones.len(), 2);
        assert_eq!(bones[1].parent.as_deref(), Some("hips"));
        // row-major translation lands in the w axis
        assert_eq!(bones[0].rest_matrix.w_axis.y, 2.0);

        let mesh = scene.mesh("Body").unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert!(mesh.uv_layers.is_empty());
        assert_eq!(scene.vertex_groups("Body").unwrap()[&0], "hips");

        scene.set_action(Some("Idle")).unwrap();
        scene.set_frame(2).unwrap();
        let pose = scene.query_pose("Rig", "hips").unwrap();
        assert_eq!(pose.w_axis.x, 5.0);
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MemoryScene::from_path(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err.root(), Error::Io(_)));
    }

    #[test]
    fn test_missing_mesh_object() {
        let scene = two_bone_scene();
        assert!(scene.mesh("Body").unwrap_err().is_not_found());
    }
}
