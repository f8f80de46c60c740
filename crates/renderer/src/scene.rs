//! Built-in demo geometry.
//!
//! Both shapes lie in the z = 0 plane and wind counter-clockwise when seen
//! from +Z, which is the front face after the Vulkan y-flip.

use mini_vk_rhi::vertex::Vertex;

/// CPU-side geometry ready to be uploaded as a [`crate::Mesh`].
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Two-triangle quad: 4 vertices, 6 indices.
pub fn quad() -> MeshData {
    let vertices = vec![
        Vertex::from_arrays([-0.4, 0.4, 0.0], [1.0, 0.0, 0.0]),
        Vertex::from_arrays([-0.4, -0.4, 0.0], [0.0, 1.0, 0.0]),
        Vertex::from_arrays([0.4, -0.4, 0.0], [0.0, 0.0, 1.0]),
        Vertex::from_arrays([0.4, 0.4, 0.0], [1.0, 1.0, 0.0]),
    ];
    MeshData::new(vertices, vec![0, 1, 2, 2, 3, 0])
}

/// Five-vertex fan around vertex 0: 5 vertices, 9 indices.
pub fn fan() -> MeshData {
    let vertices = vec![
        Vertex::from_arrays([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]),
        Vertex::from_arrays([-0.6, 0.6, 0.0], [1.0, 0.0, 1.0]),
        Vertex::from_arrays([-0.6, -0.6, 0.0], [0.0, 1.0, 1.0]),
        Vertex::from_arrays([0.6, -0.6, 0.0], [1.0, 0.5, 0.0]),
        Vertex::from_arrays([0.6, 0.6, 0.0], [0.5, 0.0, 1.0]),
    ];
    MeshData::new(vertices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4])
}

/// The quad followed by the fan.
pub fn demo_scene() -> Vec<MeshData> {
    vec![quad(), fan()]
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;

    fn signed_area(data: &MeshData, tri: &[u32]) -> f32 {
        let p = |i: u32| data.vertices[i as usize].position;
        let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
        (b - a).cross(c - a).dot(Vec3::Z)
    }

    #[test]
    fn test_quad_counts() {
        let quad = quad();
        assert_eq!(quad.vertices.len(), 4);
        assert_eq!(quad.indices.len(), 6);
        assert_eq!(quad.triangle_count(), 2);
    }

    #[test]
    fn test_fan_counts() {
        let fan = fan();
        assert_eq!(fan.vertices.len(), 5);
        assert_eq!(fan.indices.len(), 9);
        assert_eq!(fan.triangle_count(), 3);
    }

    #[test]
    fn test_indices_in_range() {
        for mesh in demo_scene() {
            let n = mesh.vertices.len() as u32;
            assert!(mesh.indices.iter().all(|&i| i < n));
        }
    }

    #[test]
    fn test_consistent_winding() {
        for mesh in demo_scene() {
            for tri in mesh.indices.chunks_exact(3) {
                assert!(signed_area(&mesh, tri) > 0.0, "triangle {:?} is clockwise", tri);
            }
        }
    }

    #[test]
    fn test_demo_scene_order() {
        let counts: Vec<usize> = demo_scene().iter().map(|m| m.indices.len()).collect();
        assert_eq!(counts, vec![6, 9]);
    }
}
