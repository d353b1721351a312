//! `.anim` reader
//!
//! Reads the text asset the exporter writes, the same way the engine
//! loader walks it: counts first, then fixed-shape records.
//!
//! Layout:
//! - node count, then per node: name, parent index, 16 row-major floats
//! - vertex count, then per vertex: position, uv, normal, influence
//!   count, bone indices, weights
//! - index count and indices
//! - clip count, then per clip: name, duration, track count, and per
//!   track: name, sample count, sample times, one matrix per sample

mod reader;
pub mod validate;

pub use validate::ValidationIssue;

use std::io::Read;

use glam::Mat4;
use rigbake_core::math::from_row_major;
use serde::Serialize;

use crate::traits::{ParseResult, Parser};
use reader::{capacity, TokenReader};

/// A skeleton node as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimNode {
    pub name: String,
    /// -1 for roots
    pub parent: i64,
    /// Row-major
    pub inverse_bind: [f32; 16],
}

impl AnimNode {
    pub fn inverse_bind_matrix(&self) -> Mat4 {
        from_row_major(&self.inverse_bind)
    }

    pub fn is_root(&self) -> bool {
        self.parent < 0
    }
}

/// A skinned vertex as stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimVertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
    pub normal: [f32; 3],
    pub bone_indices: Vec<u32>,
    pub weights: Vec<f32>,
}

/// One bone track of a clip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimTrack {
    pub name: String,
    pub times: Vec<f32>,
    /// Row-major local matrices, one per time
    pub matrices: Vec<[f32; 16]>,
}

impl AnimTrack {
    /// Local matrix of sample `index`
    pub fn matrix(&self, index: usize) -> Option<Mat4> {
        self.matrices.get(index).map(from_row_major)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<AnimTrack>,
}

impl AnimClip {
    pub fn track(&self, name: &str) -> Option<&AnimTrack> {
        self.tracks.iter().find(|t| t.name == name)
    }
}

/// A whole parsed asset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnimAsset {
    pub nodes: Vec<AnimNode>,
    pub vertices: Vec<AnimVertex>,
    pub indices: Vec<u32>,
    pub clips: Vec<AnimClip>,
}

/// Counts for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnimSummary {
    pub nodes: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub clips: usize,
    pub tracks: usize,
    pub samples: usize,
}

impl AnimAsset {
    /// Find node index by name
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn summary(&self) -> AnimSummary {
        AnimSummary {
            nodes: self.nodes.len(),
            vertices: self.vertices.len(),
            triangles: self.indices.len() / 3,
            clips: self.clips.len(),
            tracks: self.clips.iter().map(|c| c.tracks.len()).sum(),
            samples: self
                .clips
                .iter()
                .flat_map(|c| &c.tracks)
                .map(|t| t.times.len())
                .sum(),
        }
    }
}

/// `.anim` parser
#[derive(Debug, Clone, Copy, Default)]
pub struct AnimParser;

impl AnimParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse asset text
    pub fn parse_str(&self, text: &str) -> ParseResult<AnimAsset> {
        let mut reader = TokenReader::new(text);

        let nodes = read_nodes(&mut reader).map_err(|e| e.with_context("skeleton"))?;
        let vertices = read_vertices(&mut reader).map_err(|e| e.with_context("vertices"))?;
        let indices = read_indices(&mut reader).map_err(|e| e.with_context("indices"))?;
        let clips = read_clips(&mut reader).map_err(|e| e.with_context("animations"))?;

        let tokens = reader.position();
        let trailing = reader.remaining();
        if trailing > 0 {
            tracing::warn!(tokens = trailing, "Ignoring trailing data after last clip");
        }

        let asset = AnimAsset {
            nodes,
            vertices,
            indices,
            clips,
        };
        tracing::debug!(
            tokens,
            nodes = asset.nodes.len(),
            vertices = asset.vertices.len(),
            clips = asset.clips.len(),
            "Parsed .anim asset"
        );
        Ok(asset)
    }
}

impl Parser for AnimParser {
    type Output = AnimAsset;

    fn name(&self) -> &str {
        "rigbake .anim"
    }

    fn extensions(&self) -> &[&str] {
        &["anim"]
    }

    fn parse<R: Read>(&self, mut reader: R) -> ParseResult<AnimAsset> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.parse_str(&text)
    }
}

fn read_nodes(reader: &mut TokenReader<'_>) -> ParseResult<Vec<AnimNode>> {
    let count = reader.count("node count")?;
    let mut nodes = Vec::with_capacity(capacity(count));
    for _ in 0..count {
        let name = reader.token("node name")?.to_string();
        let parent = reader.value("parent index")?;
        let inverse_bind = reader.floats::<16>("inverse bind matrix")?;
        nodes.push(AnimNode {
            name,
            parent,
            inverse_bind,
        });
    }
    Ok(nodes)
}

fn read_vertices(reader: &mut TokenReader<'_>) -> ParseResult<Vec<AnimVertex>> {
    let count = reader.count("vertex count")?;
    let mut vertices = Vec::with_capacity(capacity(count));
    for _ in 0..count {
        let position = reader.floats::<3>("position")?;
        let uv = reader.floats::<2>("uv")?;
        let normal = reader.floats::<3>("normal")?;
        let influences = reader.count("influence count")?;
        let bone_indices = (0..influences)
            .map(|_| reader.value("bone index"))
            .collect::<ParseResult<Vec<u32>>>()?;
        let weights = (0..influences)
            .map(|_| reader.value("weight"))
            .collect::<ParseResult<Vec<f32>>>()?;
        vertices.push(AnimVertex {
            position,
            uv,
            normal,
            bone_indices,
            weights,
        });
    }
    Ok(vertices)
}

fn read_indices(reader: &mut TokenReader<'_>) -> ParseResult<Vec<u32>> {
    let count = reader.count("index count")?;
    let mut indices = Vec::with_capacity(capacity(count));
    for _ in 0..count {
        indices.push(reader.value("index")?);
    }
    Ok(indices)
}

fn read_clips(reader: &mut TokenReader<'_>) -> ParseResult<Vec<AnimClip>> {
    let count = reader.count("animation count")?;
    let mut clips = Vec::with_capacity(capacity(count));
    for _ in 0..count {
        let name = reader.token("clip name")?.to_string();
        let duration = reader.value("duration")?;
        let track_count = reader.count("track count")?;

        let mut tracks = Vec::with_capacity(capacity(track_count));
        for _ in 0..track_count {
            let track_name = reader.token("track name")?.to_string();
            let samples = reader.count("sample count")?;
            let times = (0..samples)
                .map(|_| reader.value("sample time"))
                .collect::<ParseResult<Vec<f32>>>()?;
            let matrices = (0..samples)
                .map(|_| reader.floats::<16>("local matrix"))
                .collect::<ParseResult<Vec<_>>>()
                .map_err(|e| e.with_context(format!("track '{track_name}'")))?;
            tracks.push(AnimTrack {
                name: track_name,
                times,
                matrices,
            });
        }

        clips.push(AnimClip {
            name,
            duration,
            tracks,
        });
    }
    Ok(clips)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = "1.000000 0.000000 0.000000 0.000000 0.000000 1.000000 0.000000 0.000000 \
                            0.000000 0.000000 1.000000 0.000000 0.000000 0.000000 0.000000 1.000000";

    fn sample_text() -> String {
        let mut text = String::new();
        text.push_str("2\n");
        text.push_str(&format!("root -1\n{IDENTITY}\n"));
        text.push_str("tip 0\n1.000000 0.000000 0.000000 0.000000 0.000000 1.000000 0.000000 -2.000000 0.000000 0.000000 1.000000 0.000000 0.000000 0.000000 0.000000 1.000000\n");
        text.push_str("3\n");
        for _ in 0..2 {
            text.push_str("0.000000 1.000000 0.000000\n0.500000 0.500000\n0.000000 0.000000 1.000000\n2\n1 0\n0.600000 0.400000\n");
        }
        text.push_str("1.000000 1.000000 0.000000\n0.000000 0.000000\n0.000000 0.000000 1.000000\n0\n\n\n");
        text.push_str("3\n0 1 2\n");
        text.push_str("1\nWave\n0.033333\n2\n");
        text.push_str(&format!("root\n2\n0.000000 0.033333\n{IDENTITY}\n{IDENTITY}\n"));
        text.push_str(&format!("tip\n2\n0.000000 0.033333\n{IDENTITY}\n{IDENTITY}\n"));
        text
    }

    #[test]
    fn test_parse_sample_asset() {
        let asset = AnimParser.parse_str(&sample_text()).unwrap();

        assert_eq!(asset.nodes.len(), 2);
        assert_eq!(asset.nodes[1].name, "tip");
        assert_eq!(asset.nodes[1].parent, 0);
        assert!(asset.nodes[0].is_root());
        assert_eq!(asset.nodes[1].inverse_bind_matrix().w_axis.y, -2.0);

        assert_eq!(asset.vertices.len(), 3);
        assert_eq!(asset.vertices[0].bone_indices, vec![1, 0]);
        assert_eq!(asset.vertices[0].weights, vec![0.6, 0.4]);
        assert!(asset.vertices[2].bone_indices.is_empty());

        assert_eq!(asset.indices, vec![0, 1, 2]);
        assert_eq!(asset.clips[0].name, "Wave");
        assert_eq!(asset.clips[0].track("tip").unwrap().times, vec![0.0, 0.033333]);
        assert_eq!(asset.clips[0].tracks[0].matrix(1), Some(Mat4::IDENTITY));

        let summary = asset.summary();
        assert_eq!(summary.triangles, 1);
        assert_eq!(summary.tracks, 2);
        assert_eq!(summary.samples, 4);
    }

    #[test]
    fn test_truncated_asset_fails() {
        let text = sample_text();
        let cut = &text[..text.len() - 40];
        let err = AnimParser.parse_str(cut).unwrap_err();
        assert!(err.to_string().contains("animations"));
    }

    #[test]
    fn test_bad_number_fails() {
        let text = sample_text().replacen("0.600000", "six", 1);
        assert!(AnimParser.parse_str(&text).is_err());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.anim");
        std::fs::write(&path, sample_text()).unwrap();

        let parser = AnimParser::new();
        assert!(parser.can_parse(&path));
        assert!(!parser.can_parse(std::path::Path::new("model.obj")));
        assert_eq!(parser.parse_file(&path).unwrap().nodes.len(), 2);
    }
}
