use crate::batch::ConstraintBatch;
use crate::constraint::{ConstraintKind, ConstraintType};
use crate::particle::ParticleState;
use crate::V2;

/// Arena index of a batch inside a solver's constraint group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BatchRef {
	pub ty: ConstraintType,
	pub index: usize,
}

/// Solves one batch per call. Called once per batch per substep, batches
/// of a type in index order.
pub trait BatchSolver {
	fn solve_batch<K: ConstraintKind>(
		&mut self,
		id: BatchRef,
		batch: &mut ConstraintBatch<K>,
		particles: &mut ParticleState,
		dt: f32,
		substeps_left: usize,
	);
}

/// CPU XPBD projection. Corrections of a batch are computed from a
/// read-only view of the positions, then scattered; constraints of one
/// batch share no particle, so the scatter order does not matter.
#[derive(Default)]
pub struct XpbdBatchSolver {
	correct: Vec<V2>,
}

impl XpbdBatchSolver {
	#[cfg(not(debug_assertions))]
	fn project_all<K: ConstraintKind>(
		correct: &mut [V2],
		ps: &[usize],
		params: &[K::Params],
		lambdas: &mut [f32],
		particles: &ParticleState,
		dt: f32,
	) {
		use rayon::prelude::*;
		correct
			.par_chunks_mut(K::ARITY)
			.zip(ps.par_chunks(K::ARITY))
			.zip(params.par_iter())
			.zip(lambdas.par_iter_mut())
			.for_each(|(((c, p), param), lambda)| {
				K::project(p, param, lambda, &particles.pos, &particles.imass, dt, c)
			});
	}

	#[cfg(debug_assertions)]
	fn project_all<K: ConstraintKind>(
		correct: &mut [V2],
		ps: &[usize],
		params: &[K::Params],
		lambdas: &mut [f32],
		particles: &ParticleState,
		dt: f32,
	) {
		correct
			.chunks_mut(K::ARITY)
			.zip(ps.chunks(K::ARITY))
			.zip(params.iter())
			.zip(lambdas.iter_mut())
			.for_each(|(((c, p), param), lambda)| {
				K::project(p, param, lambda, &particles.pos, &particles.imass, dt, c)
			});
	}
}

impl BatchSolver for XpbdBatchSolver {
	fn solve_batch<K: ConstraintKind>(
		&mut self,
		_id: BatchRef,
		batch: &mut ConstraintBatch<K>,
		particles: &mut ParticleState,
		dt: f32,
		_substeps_left: usize,
	) {
		let (ps, params, lambdas) = batch.active_parts();
		self.correct.clear();
		self.correct.resize(ps.len(), V2::zeros());
		Self::project_all::<K>(&mut self.correct, ps, params, lambdas, particles, dt);
		for (&p, c) in ps.iter().zip(self.correct.iter()) {
			particles.pos[p] += c;
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::constraint::distance::{Distance, DistanceParams};
	use crate::particle::ParticleTemplate;

	#[test]
	fn test_solve_batch_applies_corrections() {
		let mut particles = ParticleState::default();
		for x in [0., 2., 10., 12.] {
			particles.push(ParticleTemplate {
				imass: 1.0,
				pos: V2::new(x, 0.),
			});
		}
		let mut batch = ConstraintBatch::<Distance>::new();
		batch.push(&[0, 1], DistanceParams::new(1.0).with_compliance(0.0));
		batch.push(&[2, 3], DistanceParams::new(1.0).with_compliance(0.0));
		batch.deactivate(1);

		let mut solver = XpbdBatchSolver::default();
		let id = BatchRef {
			ty: ConstraintType::Distance,
			index: 0,
		};
		solver.solve_batch(id, &mut batch, &mut particles, 0.01, 1);
		assert!(((particles.pos[1] - particles.pos[0]).magnitude() - 1.0).abs() < 1e-6);
		// inactive constraint untouched
		assert_eq!(particles.pos[2], V2::new(10., 0.));
		assert_eq!(particles.pos[3], V2::new(12., 0.));
		assert!(batch.lambda(0) != 0.0);
	}
}
