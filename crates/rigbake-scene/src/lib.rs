//! rigbake-scene
//!
//! The boundary between the exporter and the scene-authoring tool that
//! owns the asset. The exporter only sees the [`Scene`] and [`PoseQuery`]
//! capabilities and the plain data contracts defined here.
//!
//! [`MemoryScene`] implements both traits over a JSON scene dump, which
//! is how the command line tool feeds assets into the pipeline.

pub mod memory;
pub mod mesh;
pub mod traits;

pub use memory::{MemoryScene, SceneDump};
pub use mesh::{GroupWeight, Mesh, MeshLoop, MeshVertex, Polygon, UvLayer};
pub use traits::{Action, Armature, Bone, PoseBone, PoseQuery, Scene, VertexGroups};
