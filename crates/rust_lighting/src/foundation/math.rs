//! Math utilities and types
//!
//! Provides the fundamental math types used by the lighting contract.

pub use nalgebra::{
    Vector2, Vector3, Vector4,
    Matrix4,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Hermite smoothstep between two edges, clamped to [0, 1]
    pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
        let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
        t * t * (3.0 - 2.0 * t)
    }

    /// Write a column-major matrix as 16 floats, the layout GLSL expects for `mat4`
    pub fn mat4_to_cols(matrix: &super::Mat4) -> [[f32; 4]; 4] {
        let mut cols = [[0.0; 4]; 4];
        for (c, col) in cols.iter_mut().enumerate() {
            for (r, value) in col.iter_mut().enumerate() {
                *value = matrix[(r, c)];
            }
        }
        cols
    }
}

/// Extension trait for Mat4 with projection and view helpers
///
/// Projections follow the Vulkan conventions used throughout the crate: they
/// expect view-space input that already went through
/// [`Mat4Ext::vulkan_coordinate_transform`] (Y down, Z into the screen) and
/// produce depth in [0, 1].
pub trait Mat4Ext {
    /// Create a perspective projection matrix
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Axis flip from Y-up right-handed view space to Vulkan's Y-down, Z-forward space
    fn vulkan_coordinate_transform() -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        // P = [a⁻¹/tan(φ/2)    0              0                    0           ]
        //     [0               1/tan(φ/2)     0                    0           ]
        //     [0               0              f/(f-n)              -nf/(f-n)   ]
        //     [0               0              1                    0           ]
        let tan_half_fovy = (fov_y * 0.5).tan();

        let mut result = Mat4::zeros();
        result[(0, 0)] = 1.0 / (aspect * tan_half_fovy);
        result[(1, 1)] = 1.0 / tan_half_fovy;
        result[(2, 2)] = far / (far - near);
        result[(2, 3)] = -(near * far) / (far - near);
        result[(3, 2)] = 1.0;
        result
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let mut result = Mat4::identity();
        result[(0, 0)] = 2.0 / (right - left);
        result[(1, 1)] = 2.0 / (top - bottom);
        result[(2, 2)] = 1.0 / (far - near);
        result[(0, 3)] = -(right + left) / (right - left);
        result[(1, 3)] = -(top + bottom) / (top - bottom);
        result[(2, 3)] = -near / (far - near);
        result
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        // Right-handed: the camera looks down -Z in view space
        let forward = (target - eye).normalize();
        let right = forward.cross(&up).normalize();
        let camera_up = right.cross(&forward);

        let translation = Mat4::new(
            1.0, 0.0, 0.0, -eye.x,
            0.0, 1.0, 0.0, -eye.y,
            0.0, 0.0, 1.0, -eye.z,
            0.0, 0.0, 0.0, 1.0,
        );

        let rotation = Mat4::new(
            right.x, right.y, right.z, 0.0,
            camera_up.x, camera_up.y, camera_up.z, 0.0,
            -forward.x, -forward.y, -forward.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        rotation * translation
    }

    fn vulkan_coordinate_transform() -> Mat4 {
        Mat4::new(
            1.0,  0.0,  0.0, 0.0,
            0.0, -1.0,  0.0, 0.0,
            0.0,  0.0, -1.0, 0.0,
            0.0,  0.0,  0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_look_at_maps_target_onto_negative_z() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let target = view.transform_point(&Point3::origin());
        assert_relative_eq!(target.coords, Vec3::new(0.0, 0.0, -5.0), epsilon = 1e-5);
    }

    #[test]
    fn test_orthographic_maps_box_to_vulkan_clip_volume() {
        let proj = Mat4::orthographic(-2.0, 2.0, -1.0, 1.0, 0.5, 10.5);
        let near_corner = proj.transform_point(&Point3::new(-2.0, -1.0, 0.5));
        let far_corner = proj.transform_point(&Point3::new(2.0, 1.0, 10.5));
        assert_relative_eq!(near_corner.coords, Vec3::new(-1.0, -1.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(far_corner.coords, Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_perspective_depth_range() {
        let proj = Mat4::perspective(utils::deg_to_rad(90.0), 1.0, 0.1, 100.0);
        let near = proj.transform_point(&Point3::new(0.0, 0.0, 0.1));
        let far = proj.transform_point(&Point3::new(0.0, 0.0, 100.0));
        assert_relative_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_smoothstep_is_continuous_at_edges() {
        assert_eq!(utils::smoothstep(0.5, 1.0, 0.5), 0.0);
        assert_eq!(utils::smoothstep(0.5, 1.0, 1.0), 1.0);
        assert!(utils::smoothstep(0.5, 1.0, 0.51) < 0.01);
    }

    #[test]
    fn test_mat4_to_cols_is_column_major() {
        let m = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0));
        let cols = utils::mat4_to_cols(&m);
        assert_eq!(cols[3], [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(cols[0], [1.0, 0.0, 0.0, 0.0]);
    }
}
