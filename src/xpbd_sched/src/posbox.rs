use crate::particle::ParticleState;
use crate::V2;

/// Axis aligned world bounds enforced after every substep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Posbox {
	pub min: V2,
	pub max: V2,
}

impl Posbox {
	pub fn new(min: V2, max: V2) -> Self {
		Self { min, max }
	}

	pub fn clamp(&self, pos: &mut V2) -> bool {
		let mut flag = false;
		for axis in 0..2 {
			if pos[axis] < self.min[axis] {
				pos[axis] = self.min[axis];
				flag = true;
			} else if pos[axis] > self.max[axis] {
				pos[axis] = self.max[axis];
				flag = true;
			}
		}
		flag
	}

	/// Clamps every movable particle, returns how many were moved.
	pub fn apply(&self, particles: &mut ParticleState) -> usize {
		let mut count = 0;
		for (pos, &imass) in particles.pos.iter_mut().zip(particles.imass.iter()) {
			if imass != 0.0 && self.clamp(pos) {
				count += 1;
			}
		}
		count
	}
}
