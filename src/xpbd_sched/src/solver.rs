use crate::batch_solver::{BatchSolver, XpbdBatchSolver};
use crate::blueprint::Blueprint;
use crate::constraint::{BatchOffsets, ConstraintType, TypedConstraintSet};
use crate::constraint_group::ConstraintGroup;
use crate::error::TopologyError;
use crate::force::ExternalForce;
use crate::particle::{ParticleState, ParticleTemplate};
use crate::posbox::Posbox;
use crate::time_manager::{interpolation_factor, StepSolver};
use crate::V2;

#[derive(Clone, Debug, PartialEq)]
pub struct SolverParams {
	pub gravity: V2,
	pub max_displacement: f32,
	pub bounds: Option<Posbox>,
}

impl Default for SolverParams {
	fn default() -> Self {
		Self {
			gravity: V2::new(0., -9.8),
			max_displacement: f32::INFINITY,
			bounds: None,
		}
	}
}

impl SolverParams {
	pub fn with_gravity(mut self, gravity: V2) -> Self {
		self.gravity = gravity;
		self
	}

	pub fn with_max_displacement(mut self, max_dp: f32) -> Self {
		self.max_displacement = max_dp;
		self
	}

	pub fn with_bounds(mut self, bounds: Posbox) -> Self {
		self.bounds = Some(bounds);
		self
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActorHandle {
	index: usize,
	generation: u32,
}

// One constraint set of an actor, in global particle indices. Slots never
// move; activation lives in `active` and is applied when merging.
struct ActorSet {
	local: TypedConstraintSet,
	active: Vec<Vec<bool>>,
}

impl ActorSet {
	fn view(&self) -> TypedConstraintSet {
		self.local.with_activity(&self.active)
	}
}

struct Actor {
	generation: u32,
	particle_base: usize,
	particle_count: usize,
	// at most one per constraint type
	sets: Vec<ActorSet>,
	offsets: BatchOffsets,
}

impl Actor {
	fn set(&self, ty: ConstraintType) -> Option<&ActorSet> {
		self.sets.iter().find(|s| s.local.ty() == ty)
	}
}

/// Owns the particles, the merged constraint group and the actors of one
/// simulation.
///
/// Actors are added and removed between steps only; nothing here locks
/// against a merge racing a running step.
pub struct Solver<B: BatchSolver = XpbdBatchSolver> {
	params: SolverParams,
	particles: ParticleState,
	constraints: ConstraintGroup,
	actors: Vec<Option<Actor>>,
	free_actors: Vec<usize>,
	generations: Vec<u32>,
	forces: Vec<Box<dyn ExternalForce>>,
	batch_solver: B,
	pending_pos: Vec<(usize, V2)>,
	dirty: bool,
	stepping: bool,
	start_pos: Vec<V2>,
	rendered: Vec<V2>,
}

impl Default for Solver {
	fn default() -> Self {
		Self::new(SolverParams::default())
	}
}

impl Solver {
	pub fn new(params: SolverParams) -> Self {
		Self::with_batch_solver(params, XpbdBatchSolver::default())
	}
}

impl<B: BatchSolver> Solver<B> {
	pub fn with_batch_solver(params: SolverParams, batch_solver: B) -> Self {
		Self {
			params,
			particles: ParticleState::default(),
			constraints: ConstraintGroup::default(),
			actors: Vec::new(),
			free_actors: Vec::new(),
			generations: Vec::new(),
			forces: Vec::new(),
			batch_solver,
			pending_pos: Vec::new(),
			dirty: false,
			stepping: false,
			start_pos: Vec::new(),
			rendered: Vec::new(),
		}
	}

	pub fn params(&self) -> &SolverParams {
		&self.params
	}

	pub fn particles(&self) -> &ParticleState {
		&self.particles
	}

	/// Positions for presentation, written by `end_step` and `interpolate`.
	pub fn rendered_positions(&self) -> &[V2] {
		&self.rendered
	}

	pub fn constraints(&self) -> &ConstraintGroup {
		&self.constraints
	}

	pub fn batch_solver(&self) -> &B {
		&self.batch_solver
	}

	pub fn actor_count(&self) -> usize {
		self.actors.iter().flatten().count()
	}

	pub fn add_force(&mut self, force: Box<dyn ExternalForce>) {
		self.forces.push(force);
	}

	/// Teleports a particle the next time a frame is prepared.
	pub fn queue_position(&mut self, particle: usize, pos: V2) {
		self.pending_pos.push((particle, pos));
	}

	fn actor(&self, handle: ActorHandle) -> Option<&Actor> {
		self.actors
			.get(handle.index)?
			.as_ref()
			.filter(|a| a.generation == handle.generation)
	}

	fn actor_mut(&mut self, handle: ActorHandle) -> Option<&mut Actor> {
		self.actors
			.get_mut(handle.index)?
			.as_mut()
			.filter(|a| a.generation == handle.generation)
	}

	/// Global particle range owned by the actor.
	pub fn actor_particles(
		&self,
		handle: ActorHandle,
	) -> Option<std::ops::Range<usize>> {
		self.actor(handle)
			.map(|a| a.particle_base..a.particle_base + a.particle_count)
	}

	/// Per-type batch offsets: local active constraint `k` of batch `i`
	/// sits at shared slot `offsets[ty][i] + k`.
	pub fn actor_offsets(&self, handle: ActorHandle) -> Option<&BatchOffsets> {
		self.actor(handle).map(|a| &a.offsets)
	}

	/// Appends the blueprint's particles, moved by `offset`, and merges its
	/// constraints into the shared batches. Every constraint must reference
	/// one of the blueprint's own particles; the actor then owns a fresh
	/// particle range, which keeps merged batches parallel-safe. Nothing is
	/// added on error.
	pub fn add_actor(
		&mut self,
		blueprint: &Blueprint,
		offset: V2,
	) -> Result<ActorHandle, TopologyError> {
		debug_assert!(!self.stepping, "actor added during a step");
		let count = blueprint.particles.len();
		for set in blueprint.constraints.iter() {
			match set.max_particle() {
				Some(particle) if particle >= count => {
					return Err(TopologyError::ParticleOutOfRange {
						particle,
						count,
					});
				}
				_ => {}
			}
		}

		let particle_base = self.particles.len();
		for p in blueprint.particles.iter() {
			let pos = p.pos + offset;
			self.particles.push(ParticleTemplate {
				imass: p.imass,
				pos,
			});
			self.start_pos.push(pos);
			self.rendered.push(pos);
		}

		let mut sets: Vec<ActorSet> = Vec::new();
		let mut scratch = BatchOffsets::default();
		for set in blueprint.constraints.iter() {
			let mut set = set.clone();
			set.offset_particles(particle_base);
			match sets.iter_mut().find(|s| s.local.ty() == set.ty()) {
				Some(own) => {
					own.local.merge(&mut scratch, &set);
				}
				None => sets.push(ActorSet {
					local: set,
					active: Vec::new(),
				}),
			}
		}
		let mut offsets = BatchOffsets::default();
		for set in sets.iter_mut() {
			set.active = set.local.activity();
			self.constraints.merge(&mut offsets, &set.view());
		}
		debug_assert!(self.constraints.validate().is_ok());

		let index = match self.free_actors.pop() {
			Some(index) => index,
			None => {
				self.actors.push(None);
				self.generations.push(0);
				self.actors.len() - 1
			}
		};
		let generation = self.generations[index];
		log::info!(
			"add actor {}: {} particles, {} constraints",
			index,
			count,
			blueprint.constraint_count()
		);
		self.actors[index] = Some(Actor {
			generation,
			particle_base,
			particle_count: count,
			sets,
			offsets,
		});
		Ok(ActorHandle { index, generation })
	}

	/// Whether constraint `local` of batch `batch` of the actor's `ty` set
	/// is active. `local` is the slot in the actor's own batch.
	pub fn is_constraint_active(
		&self,
		handle: ActorHandle,
		ty: ConstraintType,
		batch: usize,
		local: usize,
	) -> Option<bool> {
		let active = self.actor(handle)?.set(ty)?.active.get(batch)?;
		active.get(local).copied()
	}

	/// Shared slot of an active actor constraint. The `k`-th active
	/// constraint of the actor's batch `batch` sits at
	/// `offsets[ty][batch] + k`; inactive ones have no stable slot.
	pub fn constraint_slot(
		&self,
		handle: ActorHandle,
		ty: ConstraintType,
		batch: usize,
		local: usize,
	) -> Option<usize> {
		let actor = self.actor(handle)?;
		let active = actor.set(ty)?.active.get(batch)?;
		if !*active.get(local)? {
			return None;
		}
		let k = active[..local].iter().filter(|&&a| a).count();
		Some(actor.offsets.get(&ty)?.get(batch)? + k)
	}

	/// Enables or disables one actor constraint, addressed like
	/// [`Solver::constraint_slot`]. The shared `ty` set is re-merged at once,
	/// which moves the offsets of every actor sharing it. Returns false for
	/// a stale handle or an unknown constraint.
	pub fn set_constraint_active(
		&mut self,
		handle: ActorHandle,
		ty: ConstraintType,
		batch: usize,
		local: usize,
		active: bool,
	) -> bool {
		debug_assert!(!self.stepping, "activation changed during a step");
		let flag = self
			.actor_mut(handle)
			.and_then(|a| a.sets.iter_mut().find(|s| s.local.ty() == ty))
			.and_then(|s| s.active.get_mut(batch))
			.and_then(|b| b.get_mut(local));
		let Some(flag) = flag else {
			return false;
		};
		if *flag == active {
			return true;
		}
		*flag = active;
		if self.dirty {
			self.rebuild_constraints();
		} else {
			self.rebuild_type(ty);
		}
		log::debug!(
			"actor {} {:?} constraint {}/{} active: {}",
			handle.index,
			ty,
			batch,
			local,
			active
		);
		true
	}

	/// Releases the actor. Its particles are pinned in place and its
	/// constraints leave the shared batches on the next rebuild; storage is
	/// not compacted.
	pub fn remove_actor(&mut self, handle: ActorHandle) -> bool {
		debug_assert!(!self.stepping, "actor removed during a step");
		if self.actor(handle).is_none() {
			return false;
		}
		if let Some(actor) = self.actors[handle.index].take() {
			let range = actor.particle_base..actor.particle_base + actor.particle_count;
			for id in range {
				self.particles.imass[id] = 0.0;
				self.particles.vel[id] = V2::zeros();
			}
		}
		self.generations[handle.index] += 1;
		self.free_actors.push(handle.index);
		self.dirty = true;
		log::info!("remove actor {}", handle.index);
		true
	}

	/// Re-merges every live actor into empty shared batches, keeping each
	/// actor's constraint activation.
	pub fn rebuild_constraints(&mut self) {
		self.constraints.clear();
		for actor in self.actors.iter_mut().flatten() {
			actor.offsets.clear();
			for set in actor.sets.iter() {
				self.constraints.merge(&mut actor.offsets, &set.view());
			}
		}
		self.dirty = false;
		log::debug!("rebuilt constraints: {:?}", self.constraints.len());
	}

	fn rebuild_type(&mut self, ty: ConstraintType) {
		self.constraints.clear_type(ty);
		for actor in self.actors.iter_mut().flatten() {
			if let Some(set) = actor.sets.iter().find(|s| s.local.ty() == ty) {
				self.constraints.merge(&mut actor.offsets, &set.view());
			}
		}
	}
}

impl<B: BatchSolver> StepSolver for Solver<B> {
	fn prepare_frame(&mut self) {
		if self.dirty {
			self.rebuild_constraints();
		}
		let len = self.particles.len();
		for (id, pos) in self.pending_pos.drain(..) {
			if id < len {
				self.particles.reset_pos(id, pos);
			} else {
				log::warn!("ignoring position for unknown particle {}", id);
			}
		}
	}

	fn begin_step(&mut self, step_time: f32) {
		assert!(!self.stepping, "begin_step called twice without end_step");
		self.stepping = true;
		self.start_pos.clone_from(&self.particles.pos);
		self.constraints.reset_lambdas();
		self.particles.clear_accel();
		let gravity = self.params.gravity;
		for id in 0..self.particles.len() {
			self.particles.add_accel(id, gravity);
		}
		for force in self.forces.iter_mut() {
			force.apply(&mut self.particles, step_time);
		}
	}

	fn substep(&mut self, _step_time: f32, substep_time: f32, substeps_left: usize) {
		assert!(self.stepping, "substep called without begin_step");
		self.particles
			.integrate(substep_time, self.params.max_displacement);
		self.constraints.solve_constraints(
			&mut self.batch_solver,
			&mut self.particles,
			substep_time,
			substeps_left,
		);
		if let Some(bounds) = self.params.bounds {
			bounds.apply(&mut self.particles);
		}
		self.particles.update_vel(substep_time);
	}

	fn end_step(&mut self, _substep_time: f32) {
		assert!(self.stepping, "end_step called without begin_step");
		self.stepping = false;
		self.rendered.clone_from(&self.particles.pos);
	}

	fn interpolate(&mut self, step_time: f32, accumulated_time: f32) {
		let pos = &self.particles.pos;
		match interpolation_factor(accumulated_time, step_time) {
			None => self.rendered.clone_from(pos),
			Some(t) => {
				for ((r, start), end) in self
					.rendered
					.iter_mut()
					.zip(self.start_pos.iter())
					.zip(pos.iter())
				{
					*r = start + (end - start) * t;
				}
			}
		}
	}
}
