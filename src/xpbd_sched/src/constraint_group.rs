use crate::batch_solver::BatchSolver;
use crate::constraint::{BatchOffsets, ConstraintType, TypedConstraintSet};
use crate::error::ParallelSafetyError;
use crate::particle::ParticleState;

/// The solver-level constraint sets, one per constraint type.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintGroup {
	sets: Vec<TypedConstraintSet>,
}

impl Default for ConstraintGroup {
	fn default() -> Self {
		Self {
			sets: ConstraintType::ALL
				.iter()
				.map(|&ty| TypedConstraintSet::empty(ty))
				.collect(),
		}
	}
}

impl ConstraintGroup {
	pub fn set(&self, ty: ConstraintType) -> &TypedConstraintSet {
		&self.sets[ty as usize]
	}

	pub fn sets(&self) -> &[TypedConstraintSet] {
		&self.sets
	}

	/// Active constraint count per type, in `ConstraintType::ALL` order.
	pub fn len(&self) -> Vec<usize> {
		self.sets.iter().map(|s| s.active_count()).collect()
	}

	pub fn merge(
		&mut self,
		offsets: &mut BatchOffsets,
		other: &TypedConstraintSet,
	) -> bool {
		self.sets[other.ty() as usize].merge(offsets, other)
	}

	pub fn clear(&mut self) {
		self.sets.iter_mut().for_each(|s| s.clear());
	}

	pub fn clear_type(&mut self, ty: ConstraintType) {
		self.sets[ty as usize].clear();
	}

	pub fn reset_lambdas(&mut self) {
		self.sets.iter_mut().for_each(|s| s.reset_lambdas());
	}

	pub fn validate(&self) -> Result<(), ParallelSafetyError> {
		self.sets.iter().try_for_each(|s| s.validate())
	}

	pub fn solve_constraints<B: BatchSolver>(
		&mut self,
		solver: &mut B,
		particles: &mut ParticleState,
		dt: f32,
		substeps_left: usize,
	) {
		for set in self.sets.iter_mut() {
			set.solve(solver, particles, dt, substeps_left);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::constraint::distance::{Distance, DistanceParams};
	use crate::constraint_set::ConstraintSet;

	#[test]
	fn test_merge_routes_by_type() {
		let mut group = ConstraintGroup::default();
		let set: TypedConstraintSet = ConstraintSet::<Distance>::from_topology(
			vec![0, 1, 1, 2],
			vec![DistanceParams::new(1.0), DistanceParams::new(1.0)],
		)
		.unwrap()
		.into();
		let mut offsets = BatchOffsets::default();
		assert!(group.merge(&mut offsets, &set));
		assert_eq!(group.len(), vec![2, 0]);
		assert_eq!(group.set(ConstraintType::Distance).batch_count(), 2);
		assert_eq!(offsets[&ConstraintType::Distance], vec![0, 0]);
		group.clear_type(ConstraintType::Volume);
		assert_eq!(group.len(), vec![2, 0]);
		group.clear_type(ConstraintType::Distance);
		assert_eq!(group.set(ConstraintType::Distance).batch_count(), 0);
		group.merge(&mut offsets, &set);
		group.clear();
		assert_eq!(group.len(), vec![0, 0]);
	}
}
