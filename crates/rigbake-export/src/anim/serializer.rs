//! `.anim` writer
//!
//! Section order: skeleton nodes, skinned vertices, index buffer, clips.
//! Matrices are 16 row-major floats on one line. Every float is rounded
//! to six decimals and printed with exactly six fractional digits.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use rigbake_core::math::format_matrix;
use rigbake_core::{format_float, Error, Result};
use tempfile::NamedTempFile;

use super::ExportedAsset;

/// Writes an [`ExportedAsset`] in the `.anim` grammar
#[derive(Debug, Clone, Copy, Default)]
pub struct AssetSerializer;

impl AssetSerializer {
    pub fn new() -> Self {
        Self
    }

    /// Write the whole asset to `writer`.
    ///
    /// Names are checked before the first byte is written.
    pub fn write<W: Write>(&self, asset: &ExportedAsset, mut writer: W) -> Result<()> {
        validate_names(asset)?;

        let nodes = asset.skeleton.nodes();
        writeln!(writer, "{}", nodes.len())?;
        for node in nodes {
            writeln!(writer, "{} {}", node.name, node.parent_index())?;
            writeln!(writer, "{}", format_matrix(&node.inverse_bind))?;
        }

        let vertices = &asset.mesh.vertices;
        writeln!(writer, "{}", vertices.len())?;
        for vertex in vertices {
            writeln!(writer, "{}", join_floats(vertex.position.to_array()))?;
            writeln!(writer, "{}", join_floats(vertex.uv.to_array()))?;
            writeln!(writer, "{}", join_floats(vertex.normal.to_array()))?;
            writeln!(writer, "{}", vertex.influences.len())?;
            writeln!(writer, "{}", join(vertex.influences.iter().map(|i| i.bone_index)))?;
            writeln!(writer, "{}", join_floats(vertex.influences.iter().map(|i| i.weight)))?;
        }

        let indices = &asset.mesh.indices;
        writeln!(writer, "{}", indices.len())?;
        writeln!(writer, "{}", join(indices))?;

        writeln!(writer, "{}", asset.clips.len())?;
        for clip in &asset.clips {
            writeln!(writer, "{}", clip.name)?;
            writeln!(writer, "{}", format_float(clip.duration))?;
            writeln!(writer, "{}", clip.tracks.len())?;
            for track in &clip.tracks {
                writeln!(writer, "{}", track.name)?;
                writeln!(writer, "{}", track.samples.len())?;
                writeln!(writer, "{}", join_floats(track.times()))?;
                for sample in &track.samples {
                    writeln!(writer, "{}", format_matrix(&sample.local_matrix))?;
                }
            }
        }

        writer.flush()?;
        Ok(())
    }

    /// Render the asset into a string
    pub fn to_string(&self, asset: &ExportedAsset) -> Result<String> {
        let mut buffer = Vec::new();
        self.write(asset, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::invalid_data(e.to_string()))
    }

    /// Write to `path` through a temporary file in the same directory.
    ///
    /// The destination is replaced only after everything was written and
    /// synced; on failure an existing file at `path` is left untouched.
    /// Returns the number of bytes written.
    pub fn write_to_path(&self, asset: &ExportedAsset, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        validate_names(asset)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        self.write(asset, BufWriter::new(&mut temp))?;
        temp.as_file().sync_all()?;
        let bytes = temp.as_file().metadata()?.len();

        temp.persist(path).map_err(|e| Error::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        tracing::info!(path = %path.display(), bytes, "Asset written");
        Ok(bytes)
    }
}

/// Names are single whitespace-free tokens in the grammar
fn validate_names(asset: &ExportedAsset) -> Result<()> {
    for node in asset.skeleton.nodes() {
        check_name("bone", &node.name)?;
    }
    for clip in &asset.clips {
        check_name("clip", &clip.name)?;
        for track in &clip.tracks {
            check_name("track", &track.name)?;
        }
    }
    Ok(())
}

fn check_name(kind: &'static str, name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidName {
            kind,
            name: name.to_string(),
        });
    }
    Ok(())
}

fn join<T: ToString>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn join_floats(values: impl IntoIterator<Item = f32>) -> String {
    values
        .into_iter()
        .map(format_float)
        .collect::<Vec<_>>()
        .join(" ")
}
