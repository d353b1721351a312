//! Export pipeline orchestration
//!
//! Stages run one after another on the calling thread:
//! skeleton, skinning, (optional dedup), animation, serialization.
//! The first failing stage aborts the run.

use std::path::{Path, PathBuf};

use rigbake_core::logging::instrument_stage;
use rigbake_core::{Error, Result, ResultExt};
use rigbake_scene::{PoseQuery, Scene};
use serde::{Deserialize, Serialize};

use crate::anim::{AssetSerializer, ExportedAsset};
use crate::animation::{AnimationSampler, SamplingMode};
use crate::dedup::deduplicate;
use crate::obj::ObjWriter;
use crate::skeleton::SkeletonBuilder;
use crate::skinning::MeshSkinner;

/// Export options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Armature to build the skeleton from; the first one in the scene when unset
    pub armature: Option<String>,
    /// Mesh object to skin
    pub mesh: String,
    pub sampling_mode: SamplingMode,
    /// Merge identical corners after skinning
    pub deduplicate: bool,
    /// Also dump the skinned mesh as OBJ
    pub obj_path: Option<PathBuf>,
}

impl ExportOptions {
    /// Create options for one mesh object
    pub fn for_mesh(mesh: impl Into<String>) -> Self {
        Self {
            mesh: mesh.into(),
            ..Self::default()
        }
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .with_context(|| format!("reading options {}", path.display()))?;
        serde_json::from_str(&text).map_err(|e| Error::InvalidConfig {
            message: format!("{}: {e}", path.display()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.mesh.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "no mesh object given".to_string(),
            });
        }
        if matches!(&self.armature, Some(name) if name.trim().is_empty()) {
            return Err(Error::InvalidConfig {
                message: "empty armature name".to_string(),
            });
        }
        Ok(())
    }
}

/// What an export run produced
#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub output: PathBuf,
    pub armature: String,
    pub bones: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub clips: usize,
    pub samples: usize,
    pub bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obj: Option<PathBuf>,
}

/// Runs all export stages against one scene
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    options: ExportOptions,
}

impl ExportPipeline {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }

    /// Build skeleton, skinned mesh and clips without touching the disk
    pub fn run<S>(&self, scene: &mut S) -> Result<ExportedAsset>
    where
        S: Scene + PoseQuery,
    {
        self.options.validate()?;

        let armature = match &self.options.armature {
            Some(name) => name.clone(),
            None => scene
                .armatures()
                .into_iter()
                .next()
                .map(|a| a.name)
                .ok_or(Error::NoArmature)?,
        };

        let skeleton = instrument_stage("skeleton", || {
            let bones = scene.bones(&armature)?;
            SkeletonBuilder::build(&armature, &bones)
        })
        .with_context(|| format!("building skeleton '{armature}'"))?;

        let mesh_name = &self.options.mesh;
        let mut mesh = instrument_stage("skinning", || {
            let mesh = scene.mesh(mesh_name)?;
            let groups = scene.vertex_groups(mesh_name)?;
            MeshSkinner::new(&skeleton).skin(mesh, &groups)
        })
        .with_context(|| format!("skinning mesh '{mesh_name}'"))?;

        if self.options.deduplicate {
            mesh = instrument_stage("dedup", || deduplicate(&mesh));
        }

        let sampler = AnimationSampler::new(self.options.sampling_mode);
        let clips = instrument_stage("animation", || sampler.sample_all(scene, &skeleton))
            .context("sampling animations")?;

        Ok(ExportedAsset::new(skeleton, mesh, clips))
    }

    /// Run the pipeline and write the asset to `output`
    pub fn export<S>(&self, scene: &mut S, output: impl AsRef<Path>) -> Result<ExportSummary>
    where
        S: Scene + PoseQuery,
    {
        let output = output.as_ref();
        let asset = self.run(scene)?;

        let bytes = instrument_stage("serialize", || AssetSerializer::new().write_to_path(&asset, output))
            .with_context(|| format!("writing {}", output.display()))?;

        if let Some(obj_path) = &self.options.obj_path {
            ObjWriter::new(&self.options.mesh)
                .write_to_path(&asset.mesh, obj_path)
                .with_context(|| format!("writing {}", obj_path.display()))?;
        }

        let summary = ExportSummary {
            output: output.to_path_buf(),
            armature: asset.skeleton.armature().to_string(),
            bones: asset.skeleton.len(),
            vertices: asset.mesh.vertices.len(),
            triangles: asset.mesh.triangle_count(),
            clips: asset.clips.len(),
            samples: asset.sample_count(),
            bytes,
            obj: self.options.obj_path.clone(),
        };

        tracing::info!(
            output = %output.display(),
            bones = summary.bones,
            vertices = summary.vertices,
            clips = summary.clips,
            "Export complete"
        );

        Ok(summary)
    }
}
