use std::fmt::Debug;

use fnv::FnvHashMap;

use crate::batch_solver::BatchSolver;
use crate::constraint_set::ConstraintSet;
use crate::particle::ParticleState;
use crate::V2;

pub mod distance;
pub mod volume;

use distance::Distance;
use volume::Volume;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConstraintType {
	Distance,
	Volume,
}

impl ConstraintType {
	pub const ALL: [ConstraintType; 2] =
		[ConstraintType::Distance, ConstraintType::Volume];
}

/// Describes one homogeneous kind of constraint: how many particles each
/// constraint references, what it stores, and how it is projected.
pub trait ConstraintKind:
	Clone + Debug + Default + PartialEq + Send + Sync + 'static
{
	const TYPE: ConstraintType;
	const ARITY: usize;
	type Params: Clone + Debug + PartialEq + Send + Sync;

	/// Writes one correction per referenced particle into `correct` and
	/// accumulates the lambda. Reads positions only.
	fn project(
		particles: &[usize],
		params: &Self::Params,
		lambda: &mut f32,
		pos: &[V2],
		imass: &[f32],
		dt: f32,
		correct: &mut [V2],
	);
}

/// Batch offsets recorded by the last merge, per constraint type.
pub type BatchOffsets = FnvHashMap<ConstraintType, Vec<usize>>;

#[derive(Clone, Debug, PartialEq)]
pub enum TypedConstraintSet {
	Distance(ConstraintSet<Distance>),
	Volume(ConstraintSet<Volume>),
}

impl From<ConstraintSet<Distance>> for TypedConstraintSet {
	fn from(set: ConstraintSet<Distance>) -> Self {
		Self::Distance(set)
	}
}

impl From<ConstraintSet<Volume>> for TypedConstraintSet {
	fn from(set: ConstraintSet<Volume>) -> Self {
		Self::Volume(set)
	}
}

impl TypedConstraintSet {
	pub fn empty(ty: ConstraintType) -> Self {
		match ty {
			ConstraintType::Distance => Self::Distance(ConstraintSet::new()),
			ConstraintType::Volume => Self::Volume(ConstraintSet::new()),
		}
	}

	pub fn ty(&self) -> ConstraintType {
		match self {
			Self::Distance(_) => ConstraintType::Distance,
			Self::Volume(_) => ConstraintType::Volume,
		}
	}

	pub fn batch_count(&self) -> usize {
		match self {
			Self::Distance(set) => set.batch_count(),
			Self::Volume(set) => set.batch_count(),
		}
	}

	pub fn constraint_count(&self) -> usize {
		match self {
			Self::Distance(set) => set.constraint_count(),
			Self::Volume(set) => set.constraint_count(),
		}
	}

	pub fn active_count(&self) -> usize {
		match self {
			Self::Distance(set) => set.active_count(),
			Self::Volume(set) => set.active_count(),
		}
	}

	/// Merges `other` into this set, recording its batch offsets under the
	/// set's type. Merging a different constraint type is a no-op.
	pub fn merge(
		&mut self,
		offsets: &mut BatchOffsets,
		other: &TypedConstraintSet,
	) -> bool {
		let ty = other.ty();
		match (self, other) {
			(Self::Distance(a), Self::Distance(b)) => {
				a.merge(offsets.entry(ty).or_default(), b)
			}
			(Self::Volume(a), Self::Volume(b)) => {
				a.merge(offsets.entry(ty).or_default(), b)
			}
			(a, b) => {
				log::warn!(
					"refusing to merge {:?} constraints into a {:?} set",
					b.ty(),
					a.ty()
				);
				return false;
			}
		}
		true
	}

	pub fn max_particle(&self) -> Option<usize> {
		match self {
			Self::Distance(set) => set.max_particle(),
			Self::Volume(set) => set.max_particle(),
		}
	}

	pub fn activity(&self) -> Vec<Vec<bool>> {
		match self {
			Self::Distance(set) => set.activity(),
			Self::Volume(set) => set.activity(),
		}
	}

	pub fn with_activity(&self, active: &[Vec<bool>]) -> Self {
		match self {
			Self::Distance(set) => Self::Distance(set.with_activity(active)),
			Self::Volume(set) => Self::Volume(set.with_activity(active)),
		}
	}

	pub fn offset_particles(&mut self, base: usize) {
		match self {
			Self::Distance(set) => set.offset_particles(base),
			Self::Volume(set) => set.offset_particles(base),
		}
	}

	pub fn clear(&mut self) {
		match self {
			Self::Distance(set) => set.clear(),
			Self::Volume(set) => set.clear(),
		}
	}

	pub fn reset_lambdas(&mut self) {
		match self {
			Self::Distance(set) => set.reset_lambdas(),
			Self::Volume(set) => set.reset_lambdas(),
		}
	}

	pub fn validate(&self) -> Result<(), crate::error::ParallelSafetyError> {
		match self {
			Self::Distance(set) => set.validate(),
			Self::Volume(set) => set.validate(),
		}
	}

	pub fn solve<B: BatchSolver>(
		&mut self,
		solver: &mut B,
		particles: &mut ParticleState,
		dt: f32,
		substeps_left: usize,
	) {
		match self {
			Self::Distance(set) => set.solve(solver, particles, dt, substeps_left),
			Self::Volume(set) => set.solve(solver, particles, dt, substeps_left),
		}
	}
}
