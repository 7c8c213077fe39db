use crate::V2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticleTemplate {
	pub imass: f32,
	pub pos: V2,
}

/// Flat particle storage owned by a solver, indexed by global particle id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleState {
	pub pos: Vec<V2>,
	pub ppos: Vec<V2>,
	pub vel: Vec<V2>,
	pub accel: Vec<V2>,
	pub imass: Vec<f32>, // 0 is pinned
}

impl ParticleState {
	pub fn len(&self) -> usize {
		self.pos.len()
	}

	pub fn is_empty(&self) -> bool {
		self.pos.is_empty()
	}

	pub fn push(&mut self, template: ParticleTemplate) -> usize {
		self.pos.push(template.pos);
		self.ppos.push(template.pos);
		self.vel.push(V2::zeros());
		self.accel.push(V2::zeros());
		self.imass.push(template.imass);
		self.pos.len() - 1
	}

	pub fn reset_pos(&mut self, id: usize, p: V2) {
		self.pos[id] = p;
		self.ppos[id] = p;
		self.vel[id] = V2::zeros();
	}

	pub fn add_accel(&mut self, id: usize, a: V2) {
		if self.imass[id] != 0.0 {
			self.accel[id] += a;
		}
	}

	pub fn clear_accel(&mut self) {
		self.accel.iter_mut().for_each(|a| *a = V2::zeros());
	}

	/// Explicit prediction step, clamped to `max_dp` per particle.
	pub fn integrate(&mut self, t: f32, max_dp: f32) {
		for id in 0..self.pos.len() {
			self.ppos[id] = self.pos[id];
			if self.imass[id] == 0f32 {
				continue;
			}
			self.vel[id] += self.accel[id] * t;
			let mut dp = self.vel[id] * t;
			if dp.magnitude() > max_dp {
				dp = dp.normalize() * max_dp;
			}
			self.pos[id] += dp;
		}
	}

	pub fn update_vel(&mut self, t: f32) {
		for id in 0..self.pos.len() {
			self.vel[id] = (self.pos[id] - self.ppos[id]) / t;
		}
	}
}
