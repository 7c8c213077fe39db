use crate::constraint::distance::{Distance, DistanceParams};
use crate::constraint::volume::{Volume, VolumeParams};
use crate::constraint::TypedConstraintSet;
use crate::constraint_set::ConstraintSet;
use crate::error::BuildError;
use crate::particle::ParticleTemplate;
use crate::V2;

/// Particles and colored constraint sets of one object, in local
/// particle indices, ready to be added to a solver.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blueprint {
	pub particles: Vec<ParticleTemplate>,
	pub constraints: Vec<TypedConstraintSet>,
}

impl Blueprint {
	pub fn constraint_count(&self) -> usize {
		self.constraints.iter().map(|c| c.constraint_count()).sum()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildStage {
	Particles,
	DistanceTopology,
	DistanceColoring,
	VolumeTopology,
	VolumeColoring,
	Finished,
}

impl BuildStage {
	fn next(self) -> Option<Self> {
		use BuildStage::*;
		match self {
			Particles => Some(DistanceTopology),
			DistanceTopology => Some(DistanceColoring),
			DistanceColoring => Some(VolumeTopology),
			VolumeTopology => Some(VolumeColoring),
			VolumeColoring => Some(Finished),
			Finished => None,
		}
	}
}

#[derive(Debug, PartialEq)]
pub enum BuildProgress {
	Stage(BuildStage),
	Finished(Blueprint),
}

/// Step generator building a soft block of `x * y` particles held by
/// grid and diagonal distance constraints plus two area constraints per
/// cell. Each `next()` runs one stage.
pub struct BlockBuilder {
	imass: f32,
	x: usize,
	y: usize,
	size: f32,
	compl_d: f32,
	compl_v: f32,
	stage: Option<BuildStage>,

	particles: Vec<ParticleTemplate>,
	distance: (Vec<usize>, Vec<DistanceParams>),
	volume: (Vec<usize>, Vec<VolumeParams>),
	sets: Vec<TypedConstraintSet>,
}

impl BlockBuilder {
	pub fn new(x: usize, y: usize, size: f32) -> Self {
		Self {
			imass: 1.0,
			x,
			y,
			size,
			compl_d: 1e-5,
			compl_v: 1e-8,
			stage: Some(BuildStage::Particles),
			particles: Vec::new(),
			distance: Default::default(),
			volume: Default::default(),
			sets: Vec::new(),
		}
	}

	pub fn with_imass(mut self, imass: f32) -> Self {
		self.imass = imass;
		self
	}

	pub fn with_compliance(mut self, compl_d: f32, compl_v: f32) -> Self {
		self.compl_d = compl_d;
		self.compl_v = compl_v;
		self
	}

	fn id(&self, idx: usize, idy: usize) -> usize {
		idx * self.y + idy
	}

	fn pos(&self, idx: usize, idy: usize) -> V2 {
		self.particles[self.id(idx, idy)].pos
	}

	fn push_distance(&mut self, a: (usize, usize), b: (usize, usize)) {
		let params = DistanceParams::between(self.pos(a.0, a.1), self.pos(b.0, b.1))
			.attractive_only()
			.with_compliance(self.compl_d);
		let (ia, ib) = (self.id(a.0, a.1), self.id(b.0, b.1));
		self.distance.0.extend_from_slice(&[ia, ib]);
		self.distance.1.push(params);
	}

	fn push_volume(&mut self, ps: [(usize, usize); 3]) {
		let params = VolumeParams::of_triangle(
			self.pos(ps[0].0, ps[0].1),
			self.pos(ps[1].0, ps[1].1),
			self.pos(ps[2].0, ps[2].1),
		)
		.with_compliance(self.compl_v);
		for p in ps {
			self.volume.0.push(self.id(p.0, p.1));
		}
		self.volume.1.push(params);
	}

	fn run(&mut self, stage: BuildStage) -> Result<BuildProgress, BuildError> {
		let (x, y) = (self.x, self.y);
		match stage {
			BuildStage::Particles => {
				if x == 0 || y == 0 {
					return Err(BuildError::EmptyBlock { x, y });
				}
				if !(self.size > 0.0) {
					return Err(BuildError::Spacing(self.size));
				}
				for idx in 0..x {
					for idy in 0..y {
						self.particles.push(ParticleTemplate {
							imass: self.imass,
							pos: V2::new(self.size * idx as f32, self.size * idy as f32),
						});
					}
				}
			}
			BuildStage::DistanceTopology => {
				for idx in 1..x {
					for idy in 0..y {
						self.push_distance((idx, idy), (idx - 1, idy));
					}
				}
				for idx in 0..x {
					for idy in 1..y {
						self.push_distance((idx, idy), (idx, idy - 1));
					}
				}
				for idx in 1..x {
					for idy in 1..y {
						self.push_distance((idx - 1, idy), (idx, idy - 1));
						self.push_distance((idx - 1, idy - 1), (idx, idy));
					}
				}
			}
			BuildStage::DistanceColoring => {
				let (ps, params) = std::mem::take(&mut self.distance);
				let set = ConstraintSet::<Distance>::from_topology(ps, params)?;
				self.sets.push(set.into());
			}
			BuildStage::VolumeTopology => {
				for idx in 1..x {
					for idy in 1..y {
						self.push_volume([(idx, idy), (idx, idy - 1), (idx - 1, idy - 1)]);
						self.push_volume([(idx, idy), (idx - 1, idy), (idx - 1, idy - 1)]);
					}
				}
			}
			BuildStage::VolumeColoring => {
				let (ps, params) = std::mem::take(&mut self.volume);
				let set = ConstraintSet::<Volume>::from_topology(ps, params)?;
				self.sets.push(set.into());
			}
			BuildStage::Finished => {
				return Ok(BuildProgress::Finished(Blueprint {
					particles: std::mem::take(&mut self.particles),
					constraints: std::mem::take(&mut self.sets),
				}));
			}
		}
		Ok(BuildProgress::Stage(stage))
	}
}

impl Iterator for BlockBuilder {
	type Item = Result<BuildProgress, BuildError>;

	fn next(&mut self) -> Option<Self::Item> {
		let stage = self.stage?;
		let result = self.run(stage);
		self.stage = match result {
			Ok(_) => stage.next(),
			Err(_) => None,
		};
		Some(result)
	}
}
