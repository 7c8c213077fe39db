/// The stepping interface a scheduler drives. Substeps of a tick are
/// always called one after another, never concurrently.
pub trait StepSolver {
	/// Gathers external state ahead of stepping. Calling it twice without a
	/// step in between has no further effect.
	fn prepare_frame(&mut self);

	fn begin_step(&mut self, step_time: f32);

	fn substep(&mut self, step_time: f32, substep_time: f32, substeps_left: usize);

	fn end_step(&mut self, substep_time: f32);

	/// Presentation only. Must not change the state read by stepping.
	fn interpolate(&mut self, step_time: f32, accumulated_time: f32);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UpdateMode {
	/// Prepare and step within `advance`.
	#[default]
	Eager,
	/// `advance` prepares, `flush` steps.
	Deferred,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepConfig {
	pub dt: f32,
	pub substeps: usize,
	pub mode: UpdateMode,
	pub max_steps: usize,
}

impl Default for StepConfig {
	fn default() -> Self {
		Self {
			dt: 0.02,
			substeps: 4,
			mode: UpdateMode::Eager,
			max_steps: 5,
		}
	}
}

impl StepConfig {
	pub fn with_dt(mut self, dt: f32) -> Self {
		assert!(dt > 0.0, "fixed step must be positive, got {}", dt);
		self.dt = dt;
		self
	}

	pub fn with_substeps(mut self, substeps: usize) -> Self {
		assert!(substeps > 0, "substep count must be positive");
		self.substeps = substeps;
		self
	}

	pub fn with_mode(mut self, mode: UpdateMode) -> Self {
		self.mode = mode;
		self
	}

	pub fn with_max_steps(mut self, max_steps: usize) -> Self {
		self.max_steps = max_steps;
		self
	}
}

/// Blend factor for presentation. `None` means show the latest
/// authoritative state; this includes negative accumulated time.
pub fn interpolation_factor(
	accumulated_time: f32,
	step_time: f32,
) -> Option<f32> {
	if accumulated_time <= 0.0 {
		return None;
	}
	Some((accumulated_time / step_time).min(1.0))
}

/// Real time not yet consumed by fixed ticks. Goes negative right after a
/// tick and before the frame's real time is added.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SimulationClock {
	accumulated: f32,
}

impl SimulationClock {
	pub fn accumulated(&self) -> f32 {
		self.accumulated
	}

	pub fn add(&mut self, t: f32) {
		self.accumulated += t;
	}

	pub fn consume(&mut self, dt: f32) {
		self.accumulated -= dt;
	}

	fn owed_ticks(&self, dt: f32, max_steps: usize) -> usize {
		let mut t = self.accumulated;
		let mut n = 0;
		while t > 0.0 && n < max_steps {
			t -= dt;
			n += 1;
		}
		n
	}

	pub fn interpolation_factor(&self, step_time: f32) -> Option<f32> {
		interpolation_factor(self.accumulated, step_time)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
	Idle,
	PreparingFrame,
	// 1-based
	Stepping(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameReport {
	pub ticks: usize,
	/// Accumulated time after the last tick, before this frame's real time.
	pub post_tick_time: f32,
	pub accumulated: f32,
}

pub struct StepScheduler {
	config: StepConfig,
	clock: SimulationClock,
	state: SchedulerState,
	pending: Option<(usize, f32)>,
}

impl Default for StepScheduler {
	fn default() -> Self {
		Self::new(StepConfig::default())
	}
}

impl StepScheduler {
	pub fn new(config: StepConfig) -> Self {
		assert!(config.dt > 0.0, "fixed step must be positive, got {}", config.dt);
		assert!(config.substeps > 0, "substep count must be positive");
		Self {
			config,
			clock: SimulationClock::default(),
			state: SchedulerState::Idle,
			pending: None,
		}
	}

	pub fn config(&self) -> &StepConfig {
		&self.config
	}

	pub fn clock(&self) -> &SimulationClock {
		&self.clock
	}

	pub fn state(&self) -> SchedulerState {
		self.state
	}

	/// Prepares a frame for `real_dt` seconds of host time. In eager mode
	/// the owed ticks run right away; in deferred mode they wait for
	/// [`StepScheduler::flush`] and `None` is returned.
	pub fn advance<S: StepSolver>(
		&mut self,
		solver: &mut S,
		real_dt: f32,
	) -> Option<FrameReport> {
		if self.pending.is_some() {
			log::debug!("previous deferred frame was never flushed");
			self.flush(solver);
		}
		self.state = SchedulerState::PreparingFrame;
		solver.prepare_frame();
		let ticks = self.clock.owed_ticks(self.config.dt, self.config.max_steps);
		self.pending = Some((ticks, real_dt.max(0.0)));
		match self.config.mode {
			UpdateMode::Eager => self.flush(solver),
			UpdateMode::Deferred => None,
		}
	}

	/// Runs the ticks prepared by the last `advance`, then adds the frame's
	/// real time and interpolates.
	pub fn flush<S: StepSolver>(&mut self, solver: &mut S) -> Option<FrameReport> {
		let (ticks, real_dt) = self.pending.take()?;
		let dt = self.config.dt;
		for _ in 0..ticks {
			self.step(solver);
			self.clock.consume(dt);
		}
		if self.clock.accumulated > 0.0 {
			log::debug!(
				"step cap {} reached, dropping {:.4}s of simulation time",
				self.config.max_steps,
				self.clock.accumulated
			);
			self.clock.accumulated = 0.0;
		}
		let post_tick_time = self.clock.accumulated;
		self.clock.add(real_dt);
		self.state = SchedulerState::Idle;
		solver.interpolate(dt, self.clock.accumulated);
		Some(FrameReport {
			ticks,
			post_tick_time,
			accumulated: self.clock.accumulated,
		})
	}

	/// One fixed tick: begin, every substep in order, end. Does not touch
	/// the clock.
	pub fn step<S: StepSolver>(&mut self, solver: &mut S) {
		let dt = self.config.dt;
		let n = self.config.substeps;
		let h = dt / n as f32;
		solver.begin_step(dt);
		for i in 0..n {
			self.state = SchedulerState::Stepping(i + 1);
			solver.substep(dt, h, n - i);
		}
		solver.end_step(h);
		self.state = SchedulerState::Idle;
	}
}
