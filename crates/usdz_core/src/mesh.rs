//! Triangle mesh helper used by importers.
//!
//! Importers gather geometry into a [`Mesh`] and turn it into a USD `Mesh`
//! prim with [`Mesh::to_prim`].

use glam::{Vec2, Vec3};

use crate::usd::{prim_types, Prim, Value};

/// A mesh consisting of vertex positions, optional normals and UVs, and triangle indices.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional, one per vertex)
    pub normals: Option<Vec<Vec3>>,

    /// UV coordinates (optional, one per vertex)
    pub uvs: Option<Vec<Vec2>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        Self {
            positions,
            normals,
            uvs: None,
            indices,
        }
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned extent as (min, max).
    pub fn extent(&self) -> Option<(Vec3, Vec3)> {
        if self.positions.is_empty() {
            return None;
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for pos in &self.positions {
            min = min.min(*pos);
            max = max.max(*pos);
        }
        Some((min, max))
    }

    /// Compute smooth vertex normals by averaging counter-clockwise face normals.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        for face in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (face[0] as usize, face[1] as usize, face[2] as usize);
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let face_normal = (self.positions[i1] - p0).cross(self.positions[i2] - p0);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Y);
        }

        self.normals = Some(normals);
    }

    /// Ensure the mesh has one normal per vertex, computing them if necessary.
    pub fn ensure_normals(&mut self) {
        let should_compute = match &self.normals {
            None => true,
            Some(normals) => normals.len() != self.positions.len(),
        };
        if should_compute {
            self.compute_normals();
        }
    }

    /// Build a USD `Mesh` prim named `name`.
    pub fn to_prim(&self, name: &str) -> Prim {
        let mut prim = Prim::new(prim_types::MESH, name);

        prim.set_attribute("doubleSided", "bool", Value::Bool(false));
        if let Some((min, max)) = self.extent() {
            prim.set_attribute("extent", "float3[]", Value::Float3Array(vec![min, max]));
        }
        prim.set_attribute(
            "faceVertexCounts",
            "int[]",
            Value::IntArray(vec![3; self.triangle_count()]),
        );
        prim.set_attribute(
            "faceVertexIndices",
            "int[]",
            Value::IntArray(self.indices.iter().map(|&i| i as i32).collect()),
        );
        prim.set_attribute("points", "point3f[]", Value::Float3Array(self.positions.clone()));

        if let Some(normals) = &self.normals {
            let attribute = prim.attribute_mut("normals", "normal3f[]");
            attribute.value = Some(Value::Float3Array(normals.clone()));
            attribute.metadata = Some("(\n    interpolation = \"vertex\"\n)".to_string());
        }
        if let Some(uvs) = &self.uvs {
            let attribute = prim.attribute_mut("primvars:st", "texCoord2f[]");
            attribute.value = Some(Value::Float2Array(uvs.clone()));
            attribute.metadata = Some("(\n    interpolation = \"vertex\"\n)".to_string());
        }
        prim.set_uniform("subdivisionScheme", "token", Value::Token("none".into()));
        prim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2], None)
    }

    #[test]
    fn test_compute_normals_ccw() {
        let mut mesh = triangle();
        mesh.compute_normals();
        for n in mesh.normals.as_ref().unwrap() {
            assert!((*n - Vec3::Z).length() < 1e-5);
        }
    }

    #[test]
    fn test_to_prim_authors_geometry() {
        let mut mesh = triangle().with_uvs(vec![Vec2::ZERO, Vec2::X, Vec2::Y]);
        mesh.ensure_normals();
        let prim = mesh.to_prim("Tri");

        assert!(prim.is_mesh());
        assert_eq!(prim.attribute("faceVertexCounts").unwrap().value, Some(Value::IntArray(vec![3])));
        assert_eq!(
            prim.attribute("extent").unwrap().value,
            Some(Value::Float3Array(vec![Vec3::ZERO, Vec3::new(1.0, 1.0, 0.0)]))
        );
        assert!(prim.attribute("primvars:st").unwrap().metadata.is_some());
        assert!(prim.attribute("subdivisionScheme").unwrap().uniform);
    }
}
