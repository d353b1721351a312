//! Loader-side consistency checks
//!
//! The engine asserts or reads out of bounds on any of these, so they
//! are reported up front instead.

use serde::Serialize;
use thiserror::Error;

use super::AnimAsset;

/// Joint slots in the engine's skinned vertex
pub const MAX_INFLUENCES: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("node {node} has parent {parent} outside the skeleton")]
    ParentOutOfRange { node: usize, parent: i64 },

    #[error("node {node} has parent {parent} that does not precede it")]
    ParentNotBefore { node: usize, parent: i64 },

    #[error("vertex {vertex} has {count} influences, the engine holds {}", MAX_INFLUENCES)]
    TooManyInfluences { vertex: usize, count: usize },

    #[error("vertex {vertex} references bone {bone_index} outside the skeleton")]
    InfluenceOutOfRange { vertex: usize, bone_index: u32 },

    #[error("index {position} is {index}, past the vertex stream")]
    IndexOutOfRange { position: usize, index: u32 },

    #[error("index count {count} is not a multiple of 3")]
    PartialTriangle { count: usize },

    #[error("clip '{clip}' has {tracks} tracks for {nodes} nodes")]
    TrackCountMismatch { clip: String, tracks: usize, nodes: usize },

    #[error("clip '{clip}' track '{track}' matches no node")]
    UnknownTrack { clip: String, track: String },

    #[error("clip '{clip}' track '{track}' has {samples} samples, first track has {expected}")]
    UnevenTracks {
        clip: String,
        track: String,
        samples: usize,
        expected: usize,
    },

    #[error("clip '{clip}' track '{track}' has non-increasing sample times")]
    UnorderedTimes { clip: String, track: String },
}

impl AnimAsset {
    /// Report every consistency problem; empty when the engine can load it
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let node_count = self.nodes.len();

        for (index, node) in self.nodes.iter().enumerate() {
            if node.parent < -1 || node.parent >= node_count as i64 {
                issues.push(ValidationIssue::ParentOutOfRange {
                    node: index,
                    parent: node.parent,
                });
            } else if node.parent >= index as i64 {
                issues.push(ValidationIssue::ParentNotBefore {
                    node: index,
                    parent: node.parent,
                });
            }
        }

        for (index, vertex) in self.vertices.iter().enumerate() {
            if vertex.bone_indices.len() > MAX_INFLUENCES {
                issues.push(ValidationIssue::TooManyInfluences {
                    vertex: index,
                    count: vertex.bone_indices.len(),
                });
            }
            for &bone_index in &vertex.bone_indices {
                if bone_index as usize >= node_count {
                    issues.push(ValidationIssue::InfluenceOutOfRange {
                        vertex: index,
                        bone_index,
                    });
                }
            }
        }

        if self.indices.len() % 3 != 0 {
            issues.push(ValidationIssue::PartialTriangle {
                count: self.indices.len(),
            });
        }
        for (position, &index) in self.indices.iter().enumerate() {
            if index as usize >= self.vertices.len() {
                issues.push(ValidationIssue::IndexOutOfRange { position, index });
            }
        }

        for clip in &self.clips {
            if clip.tracks.len() != node_count {
                issues.push(ValidationIssue::TrackCountMismatch {
                    clip: clip.name.clone(),
                    tracks: clip.tracks.len(),
                    nodes: node_count,
                });
            }

            let expected = clip.tracks.first().map(|t| t.times.len());
            for track in &clip.tracks {
                if self.node_index(&track.name).is_none() {
                    issues.push(ValidationIssue::UnknownTrack {
                        clip: clip.name.clone(),
                        track: track.name.clone(),
                    });
                }
                if let Some(expected) = expected.filter(|&e| e != track.times.len()) {
                    issues.push(ValidationIssue::UnevenTracks {
                        clip: clip.name.clone(),
                        track: track.name.clone(),
                        samples: track.times.len(),
                        expected,
                    });
                }
                if track.times.windows(2).any(|w| w[1] <= w[0]) {
                    issues.push(ValidationIssue::UnorderedTimes {
                        clip: clip.name.clone(),
                        track: track.name.clone(),
                    });
                }
            }
        }

        if !issues.is_empty() {
            tracing::debug!(issues = issues.len(), "Asset failed validation");
        }
        issues
    }
}
