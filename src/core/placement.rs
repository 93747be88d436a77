use crate::domain::model::{LengthClass, Pose};
use crate::domain::ports::{BoxCast, Layer, LayerMask, PhysicsProbe, ProbeHit};
use crate::utils::error::PlacementError;
use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Layers a vehicle may rest on.
pub const SURFACE_LAYERS: LayerMask = LayerMask::of(&[
    Layer::Default,
    Layer::Terrain,
    Layer::World,
    Layer::Construction,
]);

/// Layers that block a vehicle from being placed (walls, players, other vehicles).
pub const OBSTRUCTION_LAYERS: LayerMask = LayerMask::of(&[
    Layer::Default,
    Layer::Deployed,
    Layer::Player,
    Layer::Ai,
    Layer::VehicleDetailed,
    Layer::VehicleWorld,
    Layer::World,
    Layer::Construction,
    Layer::Tree,
]);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSettings {
    /// Distance in front of the actor to the probe anchor.
    #[serde(default = "default_forward_distance")]
    pub forward_distance: f32,
    /// Height of the probe anchor above the actor's feet (eye level).
    #[serde(default = "default_anchor_height")]
    pub anchor_height: f32,
    #[serde(default = "default_probe_depth")]
    pub probe_depth: f32,
    /// Roll in degrees per meter of height difference across the front axle.
    #[serde(default = "default_roll_factor")]
    pub roll_factor: f32,
    /// Extra height for the clearance box so vehicles can be placed on lifts.
    #[serde(default = "default_clearance_lift")]
    pub clearance_lift: f32,
    #[serde(default = "default_sweep_distance")]
    pub sweep_distance: f32,
    #[serde(default = "default_fallback_distance")]
    pub fallback_distance: f32,
    #[serde(default = "default_fallback_height")]
    pub fallback_height: f32,
}

fn default_forward_distance() -> f32 {
    // eye-level offset plus the short vehicle's half-width
    1.5 + half_extents(LengthClass::Short).x
}

fn default_anchor_height() -> f32 {
    1.5
}

fn default_probe_depth() -> f32 {
    4.0
}

fn default_roll_factor() -> f32 {
    30.0
}

fn default_clearance_lift() -> f32 {
    0.3
}

fn default_sweep_distance() -> f32 {
    0.1
}

fn default_fallback_distance() -> f32 {
    3.0
}

fn default_fallback_height() -> f32 {
    1.0
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            forward_distance: default_forward_distance(),
            anchor_height: default_anchor_height(),
            probe_depth: default_probe_depth(),
            roll_factor: default_roll_factor(),
            clearance_lift: default_clearance_lift(),
            sweep_distance: default_sweep_distance(),
            fallback_distance: default_fallback_distance(),
            fallback_height: default_fallback_height(),
        }
    }
}

/// Half width, half height, half length of a vehicle.
pub fn half_extents(length: LengthClass) -> Vec3 {
    match length {
        LengthClass::Short => Vec3::new(1.0, 1.1, 1.5),
        LengthClass::Medium => Vec3::new(1.0, 1.1, 2.3),
        LengthClass::Long => Vec3::new(1.0, 1.1, 3.0),
    }
}

/// Front-left, front-right, back-left, back-right offsets in vehicle space.
fn corner_offsets(length: LengthClass) -> [Vec3; 4] {
    let ext = half_extents(length);
    [
        Vec3::new(ext.x, 0.0, ext.z),
        Vec3::new(-ext.x, 0.0, ext.z),
        Vec3::new(ext.x, 0.0, -ext.z),
        Vec3::new(-ext.x, 0.0, -ext.z),
    ]
}

/// Horizontal unit forward; looking straight up or down falls back to +Z.
pub fn flat_forward(forward: Vec3) -> Vec3 {
    Vec3::new(forward.x, 0.0, forward.z)
        .try_normalize()
        .unwrap_or(Vec3::Z)
}

/// Actor yaw turned 90° so the vehicle lies alongside the actor.
pub fn relative_rotation(forward: Vec3) -> Quat {
    let forward = flat_forward(forward);
    let yaw = forward.x.atan2(forward.z);
    Quat::from_rotation_y(yaw - FRAC_PI_2)
}

/// Rotation whose +Z axis points along `forward` with +Y as close to `up` as possible.
fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let Some(z) = forward.try_normalize() else {
        return Quat::IDENTITY;
    };
    let Some(x) = up.cross(z).try_normalize() else {
        return Quat::IDENTITY;
    };
    let y = z.cross(x);
    Quat::from_mat3(&Mat3::from_cols(x, y, z))
}

#[derive(Debug, Clone, Default)]
pub struct PlacementSolver {
    settings: PlacementSettings,
}

impl PlacementSolver {
    pub fn new(settings: PlacementSettings) -> Self {
        Self { settings }
    }

    /// Ground-fitted pose in front of the actor that has room for the vehicle.
    pub fn find_placement<P: PhysicsProbe + ?Sized>(
        &self,
        probe: &P,
        actor_position: Vec3,
        actor_forward: Vec3,
        length: LengthClass,
    ) -> Result<Pose, PlacementError> {
        let pose = self.fit_to_surface(probe, actor_position, actor_forward, length)?;
        self.check_clearance(probe, &pose, length)?;
        Ok(pose)
    }

    /// Probes down from the four corners and rests the vehicle on the hits.
    pub fn fit_to_surface<P: PhysicsProbe + ?Sized>(
        &self,
        probe: &P,
        actor_position: Vec3,
        actor_forward: Vec3,
        length: LengthClass,
    ) -> Result<Pose, PlacementError> {
        let anchor = actor_position
            + Vec3::Y * self.settings.anchor_height
            + flat_forward(actor_forward) * self.settings.forward_distance;
        let initial = relative_rotation(actor_forward);

        let mut hits = [Vec3::ZERO; 4];
        for (hit, offset) in hits.iter_mut().zip(corner_offsets(length)) {
            let origin = anchor + initial * offset;
            let ProbeHit { point, .. } = probe
                .probe_down(origin, self.settings.probe_depth, SURFACE_LAYERS)
                .ok_or(PlacementError::NoSurface)?;
            *hit = point;
        }
        let [front_left, front_right, back_left, back_right] = hits;

        let roll = ((front_left.y - front_right.y) * self.settings.roll_factor).to_radians();
        let rotation = look_rotation(front_left - back_left, Vec3::Y) * Quat::from_rotation_z(roll);
        let position = front_left.lerp(back_right, 0.5);

        Ok(Pose { position, rotation })
    }

    pub fn check_clearance<P: PhysicsProbe + ?Sized>(
        &self,
        probe: &P,
        pose: &Pose,
        length: LengthClass,
    ) -> Result<(), PlacementError> {
        let cast = self.clearance_box(pose, length);
        if probe.box_cast_hits(&cast, OBSTRUCTION_LAYERS) {
            tracing::debug!("Clearance box at {:?} is obstructed", cast.center);
            return Err(PlacementError::InsufficientSpace);
        }
        Ok(())
    }

    pub fn clearance_box(&self, pose: &Pose, length: LengthClass) -> BoxCast {
        let ext = half_extents(length);
        let center = pose.position
            + pose.rotation * Vec3::new(0.0, ext.y, 0.0)
            + Vec3::Y * self.settings.clearance_lift;

        BoxCast {
            center,
            half_extents: ext,
            rotation: pose.rotation,
            direction: pose.rotation * Vec3::Z,
            distance: self.settings.sweep_distance,
        }
    }

    /// Fixed pose directly in front of the actor, not fitted to the ground.
    pub fn fallback_pose(&self, actor_position: Vec3, actor_forward: Vec3) -> Pose {
        let mut position =
            actor_position + flat_forward(actor_forward) * self.settings.fallback_distance;
        position.y = actor_position.y + self.settings.fallback_height;

        Pose {
            position,
            rotation: relative_rotation(actor_forward),
        }
    }

    pub fn settings(&self) -> &PlacementSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestProbe {
        ground: fn(Vec3) -> Option<f32>,
        obstructed: bool,
    }

    impl PhysicsProbe for TestProbe {
        fn probe_down(&self, origin: Vec3, max_distance: f32, _layers: LayerMask) -> Option<ProbeHit> {
            let height = (self.ground)(origin)?;
            let depth = origin.y - height;
            (0.0..=max_distance).contains(&depth).then(|| ProbeHit {
                point: Vec3::new(origin.x, height, origin.z),
                normal: Vec3::Y,
            })
        }

        fn box_cast_hits(&self, _cast: &BoxCast, layers: LayerMask) -> bool {
            assert!(layers.contains(Layer::Player));
            self.obstructed
        }
    }

    fn flat(_: Vec3) -> Option<f32> {
        Some(0.0)
    }

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-4), "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_flat_ground_placement() {
        let solver = PlacementSolver::default();
        let probe = TestProbe { ground: flat, obstructed: false };

        let pose = solver
            .find_placement(&probe, Vec3::ZERO, Vec3::Z, LengthClass::Medium)
            .unwrap();

        assert_vec_close(pose.position, Vec3::new(0.0, 0.0, 2.5));
        // Lies alongside the actor: vehicle forward is the actor's left.
        assert_vec_close(pose.rotation * Vec3::Z, Vec3::new(-1.0, 0.0, 0.0));
        // No induced roll on level ground.
        assert!((pose.rotation * Vec3::X).y.abs() < 1e-5);
    }

    #[test]
    fn test_placement_is_deterministic() {
        let solver = PlacementSolver::default();
        let probe = TestProbe { ground: flat, obstructed: false };
        let forward = Vec3::new(0.3, -0.4, 0.8);

        let first = solver.find_placement(&probe, Vec3::new(10.0, 2.0, -4.0), forward, LengthClass::Long);
        let second = solver.find_placement(&probe, Vec3::new(10.0, 2.0, -4.0), forward, LengthClass::Long);

        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_corner_is_no_surface() {
        fn cliff(origin: Vec3) -> Option<f32> {
            (origin.x > -1.0).then_some(0.0)
        }
        let solver = PlacementSolver::default();
        let probe = TestProbe { ground: cliff, obstructed: false };

        let result = solver.find_placement(&probe, Vec3::ZERO, Vec3::Z, LengthClass::Short);
        assert_eq!(result, Err(PlacementError::NoSurface));
    }

    #[test]
    fn test_ground_out_of_probe_range_is_no_surface() {
        fn pit(_: Vec3) -> Option<f32> {
            Some(-10.0)
        }
        let solver = PlacementSolver::default();
        let probe = TestProbe { ground: pit, obstructed: false };

        let result = solver.fit_to_surface(&probe, Vec3::ZERO, Vec3::Z, LengthClass::Short);
        assert_eq!(result, Err(PlacementError::NoSurface));
    }

    #[test]
    fn test_cross_slope_banks_vehicle() {
        // Rises towards +z, which is the vehicle's left when the actor faces +z.
        fn bank(origin: Vec3) -> Option<f32> {
            Some(origin.z * 0.1)
        }
        let solver = PlacementSolver::default();
        let probe = TestProbe { ground: bank, obstructed: false };

        let pose = solver
            .fit_to_surface(&probe, Vec3::ZERO, Vec3::Z, LengthClass::Medium)
            .unwrap();

        let right = pose.rotation * Vec3::X;
        assert!(right.y.abs() > 0.01);
        assert!((pose.position.y - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_obstruction_is_insufficient_space() {
        let solver = PlacementSolver::default();
        let probe = TestProbe { ground: flat, obstructed: true };

        let result = solver.find_placement(&probe, Vec3::ZERO, Vec3::Z, LengthClass::Long);
        assert_eq!(result, Err(PlacementError::InsufficientSpace));
    }

    #[test]
    fn test_clearance_box_sits_above_pose() {
        let solver = PlacementSolver::default();
        let pose = Pose {
            position: Vec3::new(0.0, 5.0, 0.0),
            rotation: Quat::IDENTITY,
        };

        let cast = solver.clearance_box(&pose, LengthClass::Short);
        assert_vec_close(cast.center, Vec3::new(0.0, 5.0 + 1.1 + 0.3, 0.0));
        assert_vec_close(cast.half_extents, Vec3::new(1.0, 1.1, 1.5));
        assert_vec_close(cast.direction, Vec3::Z);
    }

    #[test]
    fn test_fallback_pose_in_front_of_actor() {
        let solver = PlacementSolver::default();

        let pose = solver.fallback_pose(Vec3::new(1.0, 10.0, 1.0), Vec3::new(1.0, -1.0, 0.0));

        assert_vec_close(pose.position, Vec3::new(4.0, 11.0, 1.0));
        assert_vec_close(pose.rotation * Vec3::Z, Vec3::Z);
    }

    #[test]
    fn test_default_anchor_clears_short_vehicle_width() {
        let settings = PlacementSettings::default();

        assert_eq!(
            settings.forward_distance,
            settings.anchor_height + half_extents(LengthClass::Short).x
        );
        assert_eq!(settings.forward_distance, 2.5);
    }
}
