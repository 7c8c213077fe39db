use thiserror::Error;

/// Malformed constraint topology handed to the colorer or a set builder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
	#[error("constraint offsets decrease at constraint {index}: {start} > {end}")]
	NonMonotonic {
		index: usize,
		start: usize,
		end: usize,
	},

	#[error("last constraint offset {last} does not match {len} particle indices")]
	LengthMismatch { last: usize, len: usize },

	#[error("{len} particle indices is not a multiple of arity {arity}")]
	Arity { len: usize, arity: usize },

	#[error("{params} parameter entries for {constraints} constraints")]
	ParamCount { params: usize, constraints: usize },

	#[error("constraint offsets must start at 0, got {0}")]
	FirstOffset(usize),

	#[error("no constraint offsets for {len} particle indices")]
	MissingOffsets { len: usize },

	#[error("constraint references particle {particle} of {count}")]
	ParticleOutOfRange { particle: usize, count: usize },
}

/// Two constraints of one batch touch the same particle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("batch {batch} references particle {particle} more than once")]
pub struct ParallelSafetyError {
	pub batch: usize,
	pub particle: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
	#[error("block must be at least 1x1 particles, got {x}x{y}")]
	EmptyBlock { x: usize, y: usize },

	#[error("particle spacing must be positive, got {0}")]
	Spacing(f32),

	#[error(transparent)]
	Topology(#[from] TopologyError),
}
