//! Unified error handling for rigbake
//!
//! Every failure an export run can hit is fatal for that run: the
//! pipeline stops at the first error and leaves any previous asset on
//! disk untouched. Degenerate matrix inversions are not errors; see
//! [`crate::math::safe_inverse`].

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for all rigbake operations
#[derive(Error, Debug)]
pub enum Error {
    // ==================== I/O Errors ====================

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Finalizing the temp file over the destination failed
    #[error("Failed to finalize asset at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==================== Binding Errors ====================

    /// A mesh vertex group names a bone the skeleton does not have
    #[error("Vertex group '{group}' has no matching skeleton node")]
    Binding {
        group: String,
    },

    /// A vertex references a group index the mesh object does not define
    #[error("Vertex {vertex} references unknown vertex group index {group_index}")]
    UnknownGroupIndex {
        vertex: usize,
        group_index: u32,
    },

    /// A bone's parent was not built before the bone itself
    #[error("Bone '{bone}' references parent '{parent}' before it was built")]
    HierarchyOrder {
        bone: String,
        parent: String,
    },

    // ==================== Scene Errors ====================

    /// Armature not present in the scene
    #[error("Armature not found: {name}")]
    ArmatureNotFound {
        name: String,
    },

    /// Mesh object not present in the scene
    #[error("Mesh not found: {name}")]
    MeshNotFound {
        name: String,
    },

    /// Action not present in the scene
    #[error("Action not found: {name}")]
    ActionNotFound {
        name: String,
    },

    /// Sampling needs an armature but the scene has none
    #[error("Scene contains no armature")]
    NoArmature,

    /// Single-armature sampling found more than one armature
    #[error("Scene contains {count} armatures; single-armature export requires exactly one")]
    MultipleArmatures {
        count: usize,
    },

    /// Frame rate is zero, negative or not finite
    #[error("Invalid frame rate: {fps}")]
    InvalidFrameRate {
        fps: f32,
    },

    /// Pose query failed for a bone at a frame
    #[error("Pose query failed for '{armature}/{bone}' at frame {frame}: {message}")]
    PoseQuery {
        armature: String,
        bone: String,
        frame: i32,
        message: String,
    },

    /// Polygon or loop data points outside the mesh
    #[error("Invalid mesh topology: {message}")]
    InvalidTopology {
        message: String,
    },

    // ==================== Output Errors ====================

    /// A name cannot be written as a single token
    #[error("Invalid {kind} name '{name}': names must be non-empty and contain no whitespace")]
    InvalidName {
        kind: &'static str,
        name: String,
    },

    // ==================== Data / Config Errors ====================

    /// Invalid data structure
    #[error("Invalid data: {message}")]
    InvalidData {
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    // ==================== General Errors ====================

    /// Custom error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid data error
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Error::InvalidData {
            message: message.into(),
        }
    }

    /// Create an invalid topology error
    pub fn invalid_topology(message: impl Into<String>) -> Self {
        Error::InvalidTopology {
            message: message.into(),
        }
    }

    /// Strip any context wrappers and return the underlying error
    pub fn root(&self) -> &Error {
        match self {
            Error::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this is a skeleton/mesh binding mismatch
    pub fn is_binding_error(&self) -> bool {
        matches!(
            self.root(),
            Error::Binding { .. } | Error::UnknownGroupIndex { .. }
        )
    }

    /// Check if this is a "not found" type error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Error::ArmatureNotFound { .. }
                | Error::MeshNotFound { .. }
                | Error::ActionNotFound { .. }
                | Error::NoArmature
        )
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::Binding { group: "Spine".into() };
        let contextualized = err.with_context("while skinning MutantMesh");

        assert!(contextualized.to_string().contains("while skinning MutantMesh"));
        assert!(contextualized.to_string().contains("Spine"));
    }

    #[test]
    fn test_root_unwraps_nested_context() {
        let err = Error::NoArmature.with_context("inner").with_context("outer");
        assert!(matches!(err.root(), Error::NoArmature));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_is_binding_error() {
        assert!(Error::Binding { group: "a".into() }.is_binding_error());
        assert!(Error::UnknownGroupIndex { vertex: 0, group_index: 3 }.is_binding_error());
        assert!(!Error::NoArmature.is_binding_error());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::MeshNotFound { name: "Body".into() });
        let with_context = result.context("loading mesh");

        assert!(with_context.is_err());
        assert!(with_context.unwrap_err().to_string().contains("loading mesh"));
    }
}
