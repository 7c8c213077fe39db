use std::time::{Duration, SystemTime};

use rand::Rng;
use xpbd_sched::blueprint::{BlockBuilder, BuildProgress};
use xpbd_sched::job::{Job, JobQueue, JobState};
use xpbd_sched::solver::{Solver, SolverParams};
use xpbd_sched::time_manager::{StepConfig, StepScheduler};
use xpbd_sched::V2;

fn main() {
	env_logger::init();
	let mut queue = JobQueue::default();
	let mut ids = vec![];
	for m in 0..2 {
		for n in 0..3 {
			let builder = BlockBuilder::new(25, 3, 0.04).with_compliance(
				1e-5 * (0.1f32).powf(m as f32),
				1e-8 * (0.1f32).powf(n as f32),
			);
			ids.push(queue.push(Job::start(builder, Duration::from_micros(200))));
		}
	}
	while queue.run_pending() > 0 {}

	let mut rng = rand::thread_rng();
	let mut solver = Solver::new(SolverParams::default());
	for (i, id) in ids.into_iter().enumerate() {
		let Some(job) = queue.take(id) else { continue };
		if job.state() != JobState::Completed {
			log::error!("blueprint {} not built: {:?}", i, job.state());
			continue;
		}
		if let Some(BuildProgress::Finished(bp)) = job.into_output() {
			let (m, n) = (i / 3, i % 3);
			let offset = V2::new(
				-5.0 + 0.2 * n as f32 + 2.0 * m as f32 + rng.gen_range(-0.05..0.05),
				-0.2 - 1.0 * n as f32 - 0.2 * (m % 2) as f32,
			);
			if let Err(e) = solver.add_actor(&bp, offset) {
				log::error!("blueprint {} rejected: {}", i, e);
			}
		}
	}

	let config = StepConfig::default().with_dt(0.01).with_substeps(10);
	let frame = config.dt;
	let mut scheduler = StepScheduler::new(config);
	let start = SystemTime::now();
	let rframes = 100;
	for _ in 0..rframes {
		scheduler.advance(&mut solver, frame);
	}
	let time = rframes as f32 * frame;
	let duration = SystemTime::now()
		.duration_since(start)
		.map(|d| d.as_micros())
		.unwrap_or(0);
	log::info!("{:?} active constraints", solver.constraints().len());
	eprintln!("{:.3}%", duration as f32 / time / 1e4);
}
