use fnv::FnvHashSet;

use crate::constraint::ConstraintKind;

/// A group of constraints of one kind that share no particle.
///
/// Slots are kept ordered as `[active..., inactive...]`. Only the active
/// prefix is solved, so deactivating a constraint never reallocates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstraintBatch<K: ConstraintKind> {
	particles: Vec<usize>,
	params: Vec<K::Params>,
	lambdas: Vec<f32>,
	active: usize,
}

impl<K: ConstraintKind> ConstraintBatch<K> {
	pub fn new() -> Self {
		Self {
			particles: Vec::new(),
			params: Vec::new(),
			lambdas: Vec::new(),
			active: 0,
		}
	}

	pub fn len(&self) -> usize {
		self.params.len()
	}

	pub fn is_empty(&self) -> bool {
		self.params.is_empty()
	}

	pub fn active_count(&self) -> usize {
		self.active
	}

	pub fn is_active(&self, slot: usize) -> bool {
		slot < self.active
	}

	pub fn particles(&self, slot: usize) -> &[usize] {
		&self.particles[slot * K::ARITY..(slot + 1) * K::ARITY]
	}

	pub fn params(&self, slot: usize) -> &K::Params {
		&self.params[slot]
	}

	pub fn lambda(&self, slot: usize) -> f32 {
		self.lambdas[slot]
	}

	/// Appends an active constraint and returns its slot.
	pub fn push(&mut self, particles: &[usize], params: K::Params) -> usize {
		assert_eq!(particles.len(), K::ARITY, "wrong particle count");
		self.particles.extend_from_slice(particles);
		self.params.push(params);
		self.lambdas.push(0.0);
		let last = self.params.len() - 1;
		self.swap_slots(self.active, last);
		self.active += 1;
		self.active - 1
	}

	fn swap_slots(&mut self, a: usize, b: usize) {
		if a == b {
			return;
		}
		for k in 0..K::ARITY {
			self.particles.swap(a * K::ARITY + k, b * K::ARITY + k);
		}
		self.params.swap(a, b);
		self.lambdas.swap(a, b);
	}

	/// Moves `slot` into the active prefix. Returns its new slot.
	pub fn activate(&mut self, slot: usize) -> usize {
		if slot < self.active {
			return slot;
		}
		self.swap_slots(slot, self.active);
		self.active += 1;
		self.active - 1
	}

	/// Moves `slot` out of the active prefix. Returns its new slot.
	pub fn deactivate(&mut self, slot: usize) -> usize {
		if slot >= self.active {
			return slot;
		}
		self.active -= 1;
		self.swap_slots(slot, self.active);
		self.active
	}

	pub fn reset_lambdas(&mut self) {
		self.lambdas[..self.active]
			.iter_mut()
			.for_each(|l| *l = 0.0);
	}

	/// Appends `other` and returns the shared slot of its first active
	/// constraint. Active constraints of `other` land right after the
	/// current active prefix, inactive ones at the very end.
	pub fn append(&mut self, other: &Self) -> usize {
		let offset = self.active;
		let split = self.active * K::ARITY;
		let other_split = other.active * K::ARITY;

		let tail_particles = self.particles.split_off(split);
		let tail_params = self.params.split_off(self.active);
		let tail_lambdas = self.lambdas.split_off(self.active);

		self.particles
			.extend_from_slice(&other.particles[..other_split]);
		self.params.extend_from_slice(&other.params[..other.active]);
		self.lambdas.extend_from_slice(&other.lambdas[..other.active]);

		self.particles.extend(tail_particles);
		self.params.extend(tail_params);
		self.lambdas.extend(tail_lambdas);

		self.particles
			.extend_from_slice(&other.particles[other_split..]);
		self.params.extend_from_slice(&other.params[other.active..]);
		self.lambdas.extend_from_slice(&other.lambdas[other.active..]);

		self.active += other.active;
		offset
	}

	/// Per-slot activation flags, in slot order.
	pub fn activity(&self) -> Vec<bool> {
		(0..self.len()).map(|slot| self.is_active(slot)).collect()
	}

	/// Copy where slot `s` is active iff `active[s]`. Both parts keep the
	/// slot order of `self`, so the `k`-th set flag becomes active slot `k`.
	pub fn with_activity(&self, active: &[bool]) -> Self {
		assert_eq!(active.len(), self.len(), "activity mask length");
		let mut batch = Self::new();
		for pass in [true, false] {
			for slot in (0..self.len()).filter(|&s| active[s] == pass) {
				batch.particles.extend_from_slice(self.particles(slot));
				batch.params.push(self.params[slot].clone());
				batch.lambdas.push(self.lambdas[slot]);
			}
			if pass {
				batch.active = batch.len();
			}
		}
		batch
	}

	pub fn max_particle(&self) -> Option<usize> {
		self.particles.iter().copied().max()
	}

	pub fn offset_particles(&mut self, base: usize) {
		self.particles.iter_mut().for_each(|p| *p += base);
	}

	/// Particle, parameter and lambda views of the active prefix.
	pub fn active_parts(&mut self) -> (&[usize], &[K::Params], &mut [f32]) {
		(
			&self.particles[..self.active * K::ARITY],
			&self.params[..self.active],
			&mut self.lambdas[..self.active],
		)
	}

	/// First particle referenced twice by the batch, if any.
	pub fn duplicate_particle(&self) -> Option<usize> {
		let mut seen = FnvHashSet::default();
		self.particles.iter().copied().find(|&p| !seen.insert(p))
	}
}
