//! Wavefront OBJ dump of the skinned vertex stream
//!
//! Debug output only. Positions, UVs and normals are written once per
//! vertex of the stream, faces reference all three through the same
//! 1-based index (`f a/a/a`).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rigbake_core::{format_float, Error, Result};

use crate::skinning::SkinnedMesh;

/// OBJ writer for a [`SkinnedMesh`]
#[derive(Debug, Clone)]
pub struct ObjWriter {
    object_name: String,
}

impl Default for ObjWriter {
    fn default() -> Self {
        Self::new("rigbake")
    }
}

impl ObjWriter {
    pub fn new(object_name: impl Into<String>) -> Self {
        Self {
            object_name: object_name.into(),
        }
    }

    /// Write `mesh` as a single OBJ object
    pub fn write<W: Write>(&self, mesh: &SkinnedMesh, mut writer: W) -> Result<()> {
        if mesh.indices.len() % 3 != 0 {
            return Err(Error::invalid_data(format!(
                "index count {} is not a multiple of 3",
                mesh.indices.len()
            )));
        }
        if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= mesh.vertices.len()) {
            return Err(Error::invalid_data(format!(
                "index {} out of range for {} vertices",
                bad,
                mesh.vertices.len()
            )));
        }

        writeln!(writer, "o {}", self.object_name)?;
        for v in &mesh.vertices {
            let p = v.position;
            writeln!(writer, "v {} {} {}", format_float(p.x), format_float(p.y), format_float(p.z))?;
        }
        for v in &mesh.vertices {
            writeln!(writer, "vt {} {}", format_float(v.uv.x), format_float(v.uv.y))?;
        }
        for v in &mesh.vertices {
            let n = v.normal;
            writeln!(writer, "vn {} {} {}", format_float(n.x), format_float(n.y), format_float(n.z))?;
        }
        for tri in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] + 1, tri[1] + 1, tri[2] + 1];
            writeln!(writer, "f {a}/{a}/{a} {b}/{b}/{b} {c}/{c}/{c}")?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write to a file, replacing it
    pub fn write_to_path(&self, mesh: &SkinnedMesh, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)?;
        self.write(mesh, BufWriter::new(file))?;
        tracing::debug!(path = %path.display(), triangles = mesh.triangle_count(), "OBJ written");
        Ok(())
    }
}
