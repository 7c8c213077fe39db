use crate::batch::ConstraintBatch;
use crate::batch_solver::{BatchRef, BatchSolver};
use crate::coloring;
use crate::constraint::ConstraintKind;
use crate::error::{ParallelSafetyError, TopologyError};
use crate::particle::ParticleState;

/// All constraints of one kind owned by a blueprint or a solver, grouped
/// into batches by color.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstraintSet<K: ConstraintKind> {
	batches: Vec<ConstraintBatch<K>>,
}

impl<K: ConstraintKind> ConstraintSet<K> {
	pub fn new() -> Self {
		Self {
			batches: Vec::new(),
		}
	}

	/// Colors the constraints given as a flat particle list (`K::ARITY`
	/// indices each) and places every constraint in the batch of its color.
	pub fn from_topology(
		particles: Vec<usize>,
		params: Vec<K::Params>,
	) -> Result<Self, TopologyError> {
		if particles.len() % K::ARITY != 0 {
			return Err(TopologyError::Arity {
				len: particles.len(),
				arity: K::ARITY,
			});
		}
		let count = particles.len() / K::ARITY;
		if params.len() != count {
			return Err(TopologyError::ParamCount {
				params: params.len(),
				constraints: count,
			});
		}
		let offsets: Vec<usize> = (0..=count).map(|i| i * K::ARITY).collect();
		let mut sorted = particles.clone();
		let colors = coloring::colorize(&mut sorted, &offsets)?;

		let mut set = Self::new();
		set.grow(coloring::batch_count(&colors));
		for ((ps, p), color) in particles
			.chunks(K::ARITY)
			.zip(params.into_iter())
			.zip(colors.into_iter())
		{
			set.batches[color].push(ps, p);
		}
		Ok(set)
	}

	pub fn batch_count(&self) -> usize {
		self.batches.len()
	}

	pub fn batches(&self) -> &[ConstraintBatch<K>] {
		&self.batches
	}

	pub fn batch_mut(&mut self, index: usize) -> &mut ConstraintBatch<K> {
		&mut self.batches[index]
	}

	pub fn constraint_count(&self) -> usize {
		self.batches.iter().map(|b| b.len()).sum()
	}

	pub fn active_count(&self) -> usize {
		self.batches.iter().map(|b| b.active_count()).sum()
	}

	pub fn add_batch(&mut self, batch: ConstraintBatch<K>) {
		self.batches.push(batch);
	}

	fn grow(&mut self, count: usize) {
		while self.batches.len() < count {
			self.batches.push(ConstraintBatch::new());
		}
	}

	/// Appends `other` batch by batch. `offsets[i]` receives the shared
	/// slot of `other`'s first active constraint in batch `i`.
	///
	/// Batch `i` of `other` joins batch `i` of `self`, so the result only
	/// stays parallel-safe if both sets reference disjoint particles. The
	/// caller guarantees that, and must not merge while a step is running.
	pub fn merge(&mut self, offsets: &mut Vec<usize>, other: &ConstraintSet<K>) {
		offsets.clear();
		self.grow(other.batch_count());
		for (batch, src) in self.batches.iter_mut().zip(other.batches.iter()) {
			offsets.push(batch.append(src));
		}
	}

	pub fn max_particle(&self) -> Option<usize> {
		self.batches.iter().filter_map(|b| b.max_particle()).max()
	}

	/// Activation flags of every slot, batch by batch.
	pub fn activity(&self) -> Vec<Vec<bool>> {
		self.batches.iter().map(|b| b.activity()).collect()
	}

	/// Copy with the activation given per batch and slot.
	pub fn with_activity(&self, active: &[Vec<bool>]) -> Self {
		assert_eq!(active.len(), self.batch_count(), "activity batch count");
		Self {
			batches: self
				.batches
				.iter()
				.zip(active.iter())
				.map(|(b, a)| b.with_activity(a))
				.collect(),
		}
	}

	pub fn offset_particles(&mut self, base: usize) {
		self.batches
			.iter_mut()
			.for_each(|b| b.offset_particles(base));
	}

	pub fn clear(&mut self) {
		self.batches.clear();
	}

	pub fn reset_lambdas(&mut self) {
		self.batches.iter_mut().for_each(|b| b.reset_lambdas());
	}

	/// Checks that no batch references a particle twice.
	pub fn validate(&self) -> Result<(), ParallelSafetyError> {
		for (batch, b) in self.batches.iter().enumerate() {
			if let Some(particle) = b.duplicate_particle() {
				return Err(ParallelSafetyError { batch, particle });
			}
		}
		Ok(())
	}

	/// Hands every non-empty batch to `solver`, in batch order.
	pub fn solve<B: BatchSolver>(
		&mut self,
		solver: &mut B,
		particles: &mut ParticleState,
		dt: f32,
		substeps_left: usize,
	) {
		for (index, batch) in self.batches.iter_mut().enumerate() {
			if batch.active_count() == 0 {
				continue;
			}
			let id = BatchRef {
				ty: K::TYPE,
				index,
			};
			solver.solve_batch(id, batch, particles, dt, substeps_left);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::constraint::distance::{Distance, DistanceParams};

	fn set_with(batches: &[usize], base: usize) -> ConstraintSet<Distance> {
		let mut set = ConstraintSet::new();
		let mut next = base;
		for &n in batches {
			let mut batch = ConstraintBatch::new();
			for _ in 0..n {
				batch.push(&[next, next + 1], DistanceParams::new(1.0));
				next += 2;
			}
			set.add_batch(batch);
		}
		set
	}

	#[test]
	fn test_merge_grows_to_larger() {
		let mut a = set_with(&[1, 1], 0);
		let b = set_with(&[1, 1, 1, 1], 100);
		let mut offsets = vec![];
		a.merge(&mut offsets, &b);
		assert_eq!(a.batch_count(), 4);
		assert_eq!(offsets, vec![1, 1, 0, 0]);
	}

	#[test]
	fn test_merge_never_shrinks() {
		let mut a = set_with(&[1, 1, 1], 0);
		let b = set_with(&[2], 100);
		let mut offsets = vec![7, 7, 7, 7];
		a.merge(&mut offsets, &b);
		assert_eq!(a.batch_count(), 3);
		assert_eq!(offsets, vec![1]);
		assert_eq!(a.batches()[0].len(), 3);
	}

	#[test]
	fn test_merge_offset() {
		let mut a = set_with(&[2], 0);
		let b = set_with(&[3], 100);
		let mut offsets = vec![];
		a.merge(&mut offsets, &b);
		assert_eq!(offsets[0], 2);
		assert_eq!(a.batches()[0].len(), 5);
		for k in 0..3 {
			assert_eq!(
				a.batches()[0].particles(offsets[0] + k),
				b.batches()[0].particles(k)
			);
		}
		assert!(a.validate().is_ok());
	}

	#[test]
	fn test_from_topology_preserves_order() {
		// chain 0-1-2-3
		let set = ConstraintSet::<Distance>::from_topology(
			vec![1, 0, 1, 2, 3, 2],
			vec![
				DistanceParams::new(1.0),
				DistanceParams::new(2.0),
				DistanceParams::new(3.0),
			],
		)
		.unwrap();
		assert_eq!(set.batch_count(), 2);
		assert_eq!(set.constraint_count(), 3);
		assert_eq!(set.batches()[0].particles(0), &[1, 0]);
		assert_eq!(set.batches()[0].particles(1), &[3, 2]);
		assert_eq!(set.batches()[1].particles(0), &[1, 2]);
		assert_eq!(set.batches()[1].params(0).l0, 2.0);
		assert!(set.validate().is_ok());
	}

	#[test]
	fn test_from_topology_errors() {
		let err = ConstraintSet::<Distance>::from_topology(vec![0, 1, 2], vec![])
			.unwrap_err();
		assert_eq!(err, TopologyError::Arity { len: 3, arity: 2 });
		let err = ConstraintSet::<Distance>::from_topology(vec![0, 1], vec![])
			.unwrap_err();
		assert_eq!(
			err,
			TopologyError::ParamCount {
				params: 0,
				constraints: 1
			}
		);
	}

	#[test]
	fn test_validate_reports_overlap() {
		let mut a = set_with(&[1], 0);
		let b = set_with(&[1], 0);
		a.merge(&mut vec![], &b);
		assert_eq!(
			a.validate(),
			Err(ParallelSafetyError {
				batch: 0,
				particle: 0
			})
		);
	}
}
