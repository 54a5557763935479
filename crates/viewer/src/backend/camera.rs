use glam::{Mat4, Vec2, Vec3, Vec4};

use super::picking::{Aabb, Ray};

/// Orbit camera used for pointer ray casting
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// Horizontal rotation angle (radians)
    pub yaw: f32,
    /// Vertical rotation angle (radians)
    pub pitch: f32,
    /// Distance from target
    pub distance: f32,
    /// Camera target point
    pub target: Vec3,
    /// Vertical field of view (radians)
    pub fov: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCamera {
    pub fn new() -> Self {
        Self {
            yaw: 0.6,
            pitch: 0.4,
            distance: 6.0,
            target: Vec3::ZERO,
            fov: 45.0_f32.to_radians(),
        }
    }

    /// Look at the center of `bounds` from far enough to see all of it
    pub fn frame(&mut self, bounds: &Aabb) {
        self.target = bounds.center();
        let radius = (bounds.size().length() * 0.5).max(0.5);
        self.distance = (radius / (self.fov * 0.5).sin()).clamp(0.5, 10_000.0);
    }

    /// Camera position in world space
    pub fn eye_position(&self) -> Vec3 {
        let cy = self.yaw.cos();
        let sy = self.yaw.sin();
        let cp = self.pitch.cos();
        let sp = self.pitch.sin();

        self.target
            + Vec3::new(
                self.distance * cp * sy,
                self.distance * sp,
                self.distance * cp * cy,
            )
    }

    /// View matrix (world -> camera)
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye_position(), self.target, Vec3::Y)
    }

    /// Projection matrix (camera -> clip)
    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let far = (self.distance * 4.0).max(200.0);
        Mat4::perspective_rh_gl(self.fov, aspect, 0.1, far)
    }

    /// Combined view-projection matrix
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Cast a ray from a pixel position on a `viewport`-sized surface
    pub fn screen_ray(&self, pointer: Vec2, viewport: Vec2) -> Ray {
        let viewport = viewport.max(Vec2::ONE);
        let aspect = viewport.x / viewport.y;

        // Screen → NDC
        let ndc_x = (pointer.x - viewport.x * 0.5) / (viewport.x * 0.5);
        let ndc_y = -(pointer.y - viewport.y * 0.5) / (viewport.y * 0.5);

        let vp_inv = self.view_projection(aspect).inverse();

        let near_world = vp_inv * Vec4::new(ndc_x, ndc_y, -1.0, 1.0);
        let far_world = vp_inv * Vec4::new(ndc_x, ndc_y, 1.0, 1.0);

        let near = near_world.truncate() / near_world.w;
        let far = far_world.truncate() / far_world.w;

        Ray {
            origin: self.eye_position(),
            direction: (far - near).normalize_or_zero(),
        }
    }

    /// Pixel position of a world point; `None` when behind the camera
    pub fn project(&self, point: Vec3, viewport: Vec2) -> Option<Vec2> {
        let viewport = viewport.max(Vec2::ONE);
        let clip = self.view_projection(viewport.x / viewport.y) * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let ndc = clip.truncate() / clip.w;
        Some(Vec2::new(
            (ndc.x + 1.0) * 0.5 * viewport.x,
            (1.0 - ndc.y) * 0.5 * viewport.y,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_ray_points_at_target() {
        let cam = OrbitCamera::new();
        let ray = cam.screen_ray(Vec2::new(400.0, 300.0), Vec2::new(800.0, 600.0));
        let to_target = (cam.target - cam.eye_position()).normalize();
        assert!(ray.direction.dot(to_target) > 0.999);
    }

    #[test]
    fn test_project_inverts_screen_ray() {
        let cam = OrbitCamera::new();
        let viewport = Vec2::new(800.0, 600.0);
        let pixel = cam.project(Vec3::new(0.5, 0.2, -0.3), viewport).unwrap();
        let ray = cam.screen_ray(pixel, viewport);
        let to_point = (Vec3::new(0.5, 0.2, -0.3) - cam.eye_position()).normalize();
        assert!(ray.direction.dot(to_point) > 0.9999);
    }

    #[test]
    fn test_frame_moves_target() {
        let mut cam = OrbitCamera::new();
        cam.frame(&Aabb::new(Vec3::new(8.0, 0.0, 0.0), Vec3::new(12.0, 2.0, 2.0)));
        assert_eq!(cam.target, Vec3::new(10.0, 1.0, 1.0));
        assert!(cam.distance > 2.0);
    }
}
