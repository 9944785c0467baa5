use glam::{EulerRot, Mat4, Quat, Vec3};
use std::collections::HashSet;
use winit::{
    event::{ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
};

/// Eyes rendered per frame at most.
pub const MAX_EYES: usize = 2;
/// Interpupillary distance used for the side-by-side preview (meters).
pub const DEFAULT_IPD_M: f32 = 0.063;
/// Standing eye height; the layer group starts centred here.
pub const EYE_HEIGHT_M: f32 = 1.7;

/// One rendered view: where the eye is and how it projects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeCamera {
    pub view: Mat4,
    pub projection: Mat4,
    pub world_position: Vec3,
}

impl EyeCamera {
    /// An eye at `position` looking along `orientation`'s -Z.
    pub fn from_pose(position: Vec3, orientation: Quat, projection: Mat4) -> Self {
        Self {
            view: Mat4::from_rotation_translation(orientation, position).inverse(),
            projection,
            world_position: position,
        }
    }
}

/// The views of one frame. An immersive session yields two eyes sharing one
/// head pose; the desktop fallback yields one.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraRig {
    Mono(EyeCamera),
    Stereo { eyes: [EyeCamera; 2], head: Vec3 },
}

impl CameraRig {
    pub fn eyes(&self) -> &[EyeCamera] {
        match self {
            CameraRig::Mono(eye) => std::slice::from_ref(eye),
            CameraRig::Stereo { eyes, .. } => eyes,
        }
    }

    /// Head position for view-dependent effects. Never a per-eye position.
    pub fn head_position(&self) -> Vec3 {
        match self {
            CameraRig::Mono(eye) => eye.world_position,
            CameraRig::Stereo { head, .. } => *head,
        }
    }

    #[inline]
    pub fn is_stereo(&self) -> bool {
        matches!(self, CameraRig::Stereo { .. })
    }
}

/// Free-look head camera standing in for a tracked headset pose.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    /// Rotation about +Y (radians).
    pub yaw_rad: f32,
    /// Rotation about the local X axis (radians).
    pub pitch_rad: f32,
    pub fov_y_rad: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ipd_m: f32,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::new(0.0, EYE_HEIGHT_M, 0.0),
            yaw_rad: 0.0,
            pitch_rad: 0.0,
            fov_y_rad: 75.0f32.to_radians(),
            aspect,
            near: 0.1,
            far: 2000.0,
            ipd_m: DEFAULT_IPD_M,
        }
    }

    #[inline]
    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.yaw_rad, self.pitch_rad, 0.0)
    }

    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.orientation() * Vec3::X
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_rad, aspect.max(1e-3), self.near, self.far)
    }

    pub fn eye(&self) -> EyeCamera {
        EyeCamera::from_pose(self.position, self.orientation(), self.projection(self.aspect))
    }

    /// Builds this frame's views. In stereo each eye gets half the width and
    /// sits half the IPD either side of the head.
    pub fn rig(&self, stereo: bool) -> CameraRig {
        if !stereo {
            return CameraRig::Mono(self.eye());
        }
        let orientation = self.orientation();
        let projection = self.projection(self.aspect * 0.5);
        let half = self.right() * (self.ipd_m * 0.5);
        CameraRig::Stereo {
            eyes: [
                EyeCamera::from_pose(self.position - half, orientation, projection),
                EyeCamera::from_pose(self.position + half, orientation, projection),
            ],
            head: self.position,
        }
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

/// Mouse-look and WASD/QE head movement.
#[derive(Debug, Default)]
pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
    held: HashSet<KeyCode>,
    /// Head speed in meters per second.
    pub speed: f32,
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            speed: 0.5,
            ..Self::default()
        }
    }

    /// Returns true when the event moved or will move the camera.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut Camera) -> bool {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_look((position.x, position.y), camera)
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return false;
                };
                if !is_movement_key(code) {
                    return false;
                }
                match event.state {
                    ElementState::Pressed => self.held.insert(code),
                    ElementState::Released => self.held.remove(&code),
                };
                true
            }
            _ => false,
        }
    }

    /// Moves the head by the held keys.
    pub fn update(&self, dt: f32, camera: &mut Camera) {
        let mut dir = Vec3::ZERO;
        // Horizontal movement ignores pitch.
        let forward = Quat::from_rotation_y(camera.yaw_rad) * Vec3::NEG_Z;
        let right = Quat::from_rotation_y(camera.yaw_rad) * Vec3::X;
        for key in &self.held {
            dir += match key {
                KeyCode::KeyW => forward,
                KeyCode::KeyS => -forward,
                KeyCode::KeyD => right,
                KeyCode::KeyA => -right,
                KeyCode::KeyE => Vec3::Y,
                KeyCode::KeyQ => Vec3::NEG_Y,
                _ => Vec3::ZERO,
            };
        }
        if dir != Vec3::ZERO {
            camera.position += dir.normalize() * self.speed * dt.max(0.0);
        }
    }

    fn handle_cursor_look(&mut self, xy: (f64, f64), camera: &mut Camera) -> bool {
        let mut moved = false;
        if let Some(last) = self.last_mouse {
            if self.mouse_down {
                let dx = ((xy.0 - last.0) * 0.005) as f32;
                let dy = ((xy.1 - last.1) * 0.005) as f32;
                camera.yaw_rad -= dx;
                camera.pitch_rad = (camera.pitch_rad - dy).clamp(-1.5, 1.5);
                moved = true;
            }
        }
        self.last_mouse = Some(xy);
        moved
    }

    #[cfg(test)]
    fn hold(&mut self, key: KeyCode) {
        self.held.insert(key);
    }
}

fn is_movement_key(code: KeyCode) -> bool {
    matches!(
        code,
        KeyCode::KeyW
            | KeyCode::KeyA
            | KeyCode::KeyS
            | KeyCode::KeyD
            | KeyCode::KeyQ
            | KeyCode::KeyE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_head_looks_down_negative_z() {
        let cam = Camera::new(16.0 / 9.0);
        assert!((cam.forward() - Vec3::NEG_Z).length() < 1e-6);
        assert_eq!(cam.position.y, EYE_HEIGHT_M);
    }

    #[test]
    fn view_maps_eye_to_origin() {
        let cam = Camera::new(1.0);
        let eye = cam.eye();
        let p = eye.view.transform_point3(cam.position);
        assert!(p.length() < 1e-5);
    }

    #[test]
    fn stereo_eyes_straddle_the_head() {
        let mut cam = Camera::new(2.0);
        cam.yaw_rad = 0.7;
        let rig = cam.rig(true);
        assert!(rig.is_stereo());
        let [l, r] = match &rig {
            CameraRig::Stereo { eyes, .. } => [eyes[0], eyes[1]],
            CameraRig::Mono(_) => unreachable!(),
        };
        assert!((l.world_position.distance(r.world_position) - DEFAULT_IPD_M).abs() < 1e-5);
        let mid = (l.world_position + r.world_position) * 0.5;
        assert!((mid - rig.head_position()).length() < 1e-5);
        assert_eq!(rig.eyes().len(), 2);
    }

    #[test]
    fn mono_head_is_the_camera() {
        let cam = Camera::new(1.0);
        let rig = cam.rig(false);
        assert_eq!(rig.eyes().len(), 1);
        assert_eq!(rig.head_position(), cam.position);
    }

    #[test]
    fn drag_turns_the_head_without_zooming() {
        let mut cam = Camera::new(1.0);
        let fov = cam.fov_y_rad;
        let mut ctl = CameraController::new();
        ctl.mouse_down = true;
        assert!(!ctl.handle_cursor_look((100.0, 100.0), &mut cam));
        assert!(ctl.handle_cursor_look((140.0, 80.0), &mut cam));
        assert!((cam.yaw_rad + 0.2).abs() < 1e-6);
        assert!((cam.pitch_rad - 0.1).abs() < 1e-6);
        assert_eq!(cam.fov_y_rad, fov);
    }

    #[test]
    fn held_keys_move_the_head() {
        let mut cam = Camera::new(1.0);
        let mut ctl = CameraController::new();
        ctl.hold(KeyCode::KeyW);
        ctl.update(2.0, &mut cam);
        assert!((cam.position - Vec3::new(0.0, EYE_HEIGHT_M, -1.0)).length() < 1e-5);

        ctl.hold(KeyCode::KeyS);
        let before = cam.position;
        ctl.update(1.0, &mut cam);
        assert_eq!(cam.position, before);
    }
}
