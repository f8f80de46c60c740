//! Uniform buffer object definitions for shaders.
//!
//! These structures must match the GLSL uniform block layouts exactly.
//! All structures use `#[repr(C)]` for predictable memory layout and implement
//! `Pod` and `Zeroable` for safe byte casting.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Vertical field of view of the demo camera, in degrees.
pub const FOV_Y_DEGREES: f32 = 45.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;
/// Camera position; it looks at the origin with +Y up.
pub const EYE: Vec3 = Vec3::new(0.0, 0.0, 2.0);

/// Transform triple consumed by the vertex shader (set 0, binding 0).
///
/// # Memory Layout
///
/// - Offset 0: projection matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: model matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct UboViewProjection {
    pub projection: Mat4,
    pub view: Mat4,
    pub model: Mat4,
}

impl UboViewProjection {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Demo camera for a surface with the given aspect ratio and an identity model.
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            projection: vulkan_perspective(aspect_ratio),
            view: Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Y),
            model: Mat4::IDENTITY,
        }
    }

    /// Byte view for uploading.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Right-handed perspective with the Y axis flipped, since Vulkan clip space
/// points Y down.
pub fn vulkan_perspective(aspect_ratio: f32) -> Mat4 {
    let mut projection = Mat4::perspective_rh(
        FOV_Y_DEGREES.to_radians(),
        aspect_ratio,
        NEAR_PLANE,
        FAR_PLANE,
    );
    projection.y_axis.y *= -1.0;
    projection
}

#[cfg(test)]
mod tests {
    use glam::Vec4;

    use super::*;

    #[test]
    fn test_ubo_size() {
        assert_eq!(UboViewProjection::SIZE, 192);
    }

    #[test]
    fn test_ubo_alignment() {
        assert_eq!(std::mem::align_of::<UboViewProjection>(), 16);
    }

    #[test]
    fn test_field_order_in_bytes() {
        let mut ubo = UboViewProjection::new(1.0);
        ubo.model = Mat4::from_scale(Vec3::splat(3.0));
        let bytes = ubo.as_bytes();
        assert_eq!(bytes.len(), UboViewProjection::SIZE);

        let model_x: f32 = bytemuck::pod_read_unaligned(&bytes[128..132]);
        assert_eq!(model_x, 3.0);
    }

    #[test]
    fn test_new_starts_with_identity_model() {
        let ubo = UboViewProjection::new(800.0 / 600.0);
        assert_eq!(ubo.model, Mat4::IDENTITY);
        assert_eq!(ubo.view, Mat4::look_at_rh(EYE, Vec3::ZERO, Vec3::Y));
    }

    #[test]
    fn test_projection_flips_y() {
        let flipped = vulkan_perspective(1.0);
        let plain = Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), 1.0, NEAR_PLANE, FAR_PLANE);
        assert_eq!(flipped.y_axis.y, -plain.y_axis.y);
        assert_eq!(flipped.x_axis, plain.x_axis);

        // A point above the camera axis lands in the upper half of Vulkan clip space (negative y).
        let clip = flipped * Vec4::new(0.0, 0.5, -2.0, 1.0);
        assert!(clip.y / clip.w < 0.0);
    }

    #[test]
    fn test_origin_is_in_front_of_camera() {
        let ubo = UboViewProjection::new(1.0);
        let clip = ubo.projection * ubo.view * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let depth = clip.z / clip.w;
        assert!(clip.w > 0.0);
        assert!((0.0..=1.0).contains(&depth));
    }
}
