//! rigbake export pipeline
//!
//! Turns a rigged, skinned and animated asset living in a scene into a
//! single `.anim` file:
//! - [`skeleton`]: indexed bone hierarchy with inverse bind matrices
//! - [`skinning`]: triangulated per-corner vertex stream with bone influences
//! - [`animation`]: clips resampled into parent-relative per-bone tracks
//! - [`anim`]: the on-disk grammar, written atomically
//!
//! [`obj`] and [`dedup`] are optional extras that never change the `.anim`
//! output unless asked for.

pub mod anim;
pub mod animation;
pub mod dedup;
pub mod obj;
pub mod pipeline;
pub mod skeleton;
pub mod skinning;

pub use anim::{AssetSerializer, ExportedAsset};
pub use animation::{AnimationClip, AnimationSampler, AnimationTrack, FrameWindow, Sample, SamplingMode};
pub use dedup::deduplicate;
pub use obj::ObjWriter;
pub use pipeline::{ExportOptions, ExportPipeline, ExportSummary};
pub use skeleton::{Skeleton, SkeletonBuilder, SkeletonNode};
pub use skinning::{Influence, MeshSkinner, SkinnedMesh, SkinnedVertex};
