//! `.anim` asset output
//!
//! Line-oriented text, no header or version field. Producer and engine
//! loader change in lockstep.

pub mod serializer;

pub use serializer::AssetSerializer;

use crate::animation::AnimationClip;
use crate::skeleton::Skeleton;
use crate::skinning::SkinnedMesh;

/// Everything one export run writes
#[derive(Debug, Clone, Default)]
pub struct ExportedAsset {
    pub skeleton: Skeleton,
    pub mesh: SkinnedMesh,
    pub clips: Vec<AnimationClip>,
}

impl ExportedAsset {
    pub fn new(skeleton: Skeleton, mesh: SkinnedMesh, clips: Vec<AnimationClip>) -> Self {
        Self {
            skeleton,
            mesh,
            clips,
        }
    }

    /// Samples over all clips and tracks
    pub fn sample_count(&self) -> usize {
        self.clips.iter().map(AnimationClip::sample_count).sum()
    }
}
