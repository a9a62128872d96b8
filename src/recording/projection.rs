//! World-to-screen projection and screen-space bounding boxes.
//!
//! Screen coordinates are pixels with the origin at the bottom-left corner of
//! the viewport; the third component is the view depth.

use bevy::prelude::*;

use crate::simulation::kinematics::Kinematics;

/// Maps world positions to screen pixels.
pub trait ScreenProjector: Send + Sync {
    fn world_to_screen(&self, point: Vec3) -> Vec3;
}

/// Pinhole camera described by a view-projection matrix.
#[derive(Clone, Debug)]
pub struct CameraProjector {
    view_proj: Mat4,
    viewport: Vec2,
}

impl CameraProjector {
    pub fn new(view_proj: Mat4, viewport: Vec2) -> Self {
        Self {
            view_proj,
            viewport,
        }
    }

    /// Perspective camera at `eye` looking at `target` with a vertical field of
    /// view in radians.
    pub fn looking_at(eye: Vec3, target: Vec3, fov_y: f32, viewport: Vec2) -> Self {
        let aspect = viewport.x / viewport.y.max(1.0);
        let projection = Mat4::perspective_rh(fov_y, aspect, 0.1, 1000.0);
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        Self::new(projection * view, viewport)
    }

    /// Elevated camera overlooking an intersection centred at the origin.
    pub fn overhead(viewport: Vec2) -> Self {
        Self::looking_at(
            Vec3::new(-40.0, 60.0, -40.0),
            Vec3::ZERO,
            60f32.to_radians(),
            viewport,
        )
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }
}

impl Default for CameraProjector {
    fn default() -> Self {
        Self::overhead(Vec2::new(1280.0, 720.0))
    }
}

impl ScreenProjector for CameraProjector {
    fn world_to_screen(&self, point: Vec3) -> Vec3 {
        let clip = self.view_proj * point.extend(1.0);
        if clip.w.abs() <= f32::EPSILON {
            // Point on the camera plane has no finite projection.
            return Vec3::ZERO;
        }
        let ndc = clip.truncate() / clip.w;
        Vec3::new(
            (ndc.x * 0.5 + 0.5) * self.viewport.x,
            (ndc.y * 0.5 + 0.5) * self.viewport.y,
            clip.w,
        )
    }
}

/// Local-space bounds of one visual part of a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartBounds {
    /// Centre relative to the vehicle origin, in the vehicle's frame
    /// (+z forward, +y up).
    pub center: Vec3,
    pub half_extents: Vec3,
    /// Parts that are not rendered do not contribute to the bounding box.
    pub rendered: bool,
}

impl PartBounds {
    pub fn rendered(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
            rendered: true,
        }
    }

    /// Car body and cabin, same proportions as a 4.2 x 1.7 x 1.3 sedan.
    pub fn sedan() -> Vec<PartBounds> {
        let (length, width, height) = (4.2, 1.7, 1.3);
        vec![
            PartBounds::rendered(
                Vec3::new(0.0, height * 0.3, 0.0),
                Vec3::new(width * 0.5, height * 0.3, length * 0.5),
            ),
            PartBounds::rendered(
                Vec3::new(0.0, height * 0.8, -length * 0.05),
                Vec3::new(width * 0.45, height * 0.2, length * 0.25),
            ),
        ]
    }
}

/// Axis-aligned world bounds of the rendered parts, or `None` if no part is
/// rendered.
pub fn world_bounds(parts: &[PartBounds], kinematics: &Kinematics) -> Option<(Vec3, Vec3)> {
    let ground_forward = Vec3::new(kinematics.forward.x, 0.0, kinematics.forward.z).normalize_or_zero();
    let rotation = if ground_forward == Vec3::ZERO {
        Quat::IDENTITY
    } else {
        Quat::from_rotation_arc(Vec3::Z, ground_forward)
    };

    let mut bounds: Option<(Vec3, Vec3)> = None;
    for part in parts.iter().filter(|p| p.rendered) {
        for corner in box_corners(part.center, part.half_extents) {
            let world = kinematics.position + rotation * corner;
            bounds = Some(match bounds {
                Some((min, max)) => (min.min(world), max.max(world)),
                None => (world, world),
            });
        }
    }
    bounds
}

/// Screen-space bounding rectangle of a world AABB: centre and size.
pub fn screen_rect(projector: &dyn ScreenProjector, min: Vec3, max: Vec3) -> (Vec2, Vec2) {
    let mut lo = Vec2::splat(f32::INFINITY);
    let mut hi = Vec2::splat(f32::NEG_INFINITY);
    for corner in box_corners((min + max) * 0.5, (max - min) * 0.5) {
        let screen = projector.world_to_screen(corner).truncate();
        lo = lo.min(screen);
        hi = hi.max(screen);
    }
    ((lo + hi) * 0.5, hi - lo)
}

fn box_corners(center: Vec3, half: Vec3) -> [Vec3; 8] {
    let mut corners = [Vec3::ZERO; 8];
    for (i, corner) in corners.iter_mut().enumerate() {
        let sign = Vec3::new(
            if i & 1 == 0 { -1.0 } else { 1.0 },
            if i & 2 == 0 { -1.0 } else { 1.0 },
            if i & 4 == 0 { -1.0 } else { 1.0 },
        );
        *corner = center + half * sign;
    }
    corners
}
