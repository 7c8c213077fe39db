use crate::particle::ParticleState;
use crate::V2;

/// Called by the solver at every begin-step, after accelerations are
/// cleared and gravity is applied.
pub trait ExternalForce {
	fn apply(&mut self, particles: &mut ParticleState, step_time: f32);
}

/// Uniform acceleration on every particle, e.g. wind.
pub struct Uniform(pub V2);

impl ExternalForce for Uniform {
	fn apply(&mut self, particles: &mut ParticleState, _step_time: f32) {
		for id in 0..particles.len() {
			particles.add_accel(id, self.0);
		}
	}
}

/// Radial attraction (negative strength repels) inside a disc, falling
/// off linearly towards the border.
pub struct ForceZone {
	pub center: V2,
	pub radius: f32,
	pub strength: f32,
}

impl ExternalForce for ForceZone {
	fn apply(&mut self, particles: &mut ParticleState, _step_time: f32) {
		for id in 0..particles.len() {
			let d = self.center - particles.pos[id];
			let l = d.magnitude();
			if l >= self.radius || !l.is_normal() {
				continue;
			}
			let falloff = 1.0 - l / self.radius;
			particles.add_accel(id, d / l * self.strength * falloff);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::particle::ParticleTemplate;

	#[test]
	fn test_zone_only_inside_radius() {
		let mut ps = ParticleState::default();
		let inside = ps.push(ParticleTemplate {
			imass: 1.0,
			pos: V2::new(1., 0.),
		});
		let outside = ps.push(ParticleTemplate {
			imass: 1.0,
			pos: V2::new(5., 0.),
		});
		let mut zone = ForceZone {
			center: V2::zeros(),
			radius: 2.0,
			strength: 4.0,
		};
		zone.apply(&mut ps, 0.02);
		assert_eq!(ps.accel[inside], V2::new(-2., 0.));
		assert_eq!(ps.accel[outside], V2::zeros());
	}
}
