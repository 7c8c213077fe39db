// Cooperative background jobs.
// A job wraps a step generator (any iterator of `Result<T, E>`) and is
// advanced by `poll`. Nothing here spawns a thread: "asynchronous" means
// the job returns control to whoever polls it between steps.

use std::cell::Cell;
use std::fmt::Display;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
	Running,
	Completed,
	Failed,
	Cancelled,
}

impl JobState {
	pub fn is_terminal(self) -> bool {
		self != JobState::Running
	}
}

#[derive(Debug, PartialEq)]
pub enum JobPoll<'a, T, E> {
	/// Yielded after a step; latest value.
	Continue(&'a T),
	/// Sequence exhausted; latest value, if any step produced one.
	Done(Option<&'a T>),
	Failed(&'a E),
	Cancelled,
}

/// Requests cancellation of a job from outside the code polling it.
#[derive(Clone, Debug, Default)]
pub struct JobCanceller(Rc<Cell<bool>>);

impl JobCanceller {
	pub fn cancel(&self) {
		self.0.set(true);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.get()
	}
}

enum Status<E> {
	Running,
	Completed,
	Failed(E),
	Cancelled,
}

pub struct Job<T, E> {
	steps: Box<dyn Iterator<Item = Result<T, E>>>,
	status: Status<E>,
	results: Vec<T>,
	started: Instant,
	threshold: Duration,
	cancel: JobCanceller,
}

impl<T, E: Display> Job<T, E> {
	/// Starts timing and runs the synchronous part of the job: steps are
	/// taken back to back until `async_threshold` has elapsed, after which
	/// every further step returns control to the caller.
	pub fn start<I>(steps: I, async_threshold: Duration) -> Self
	where
		I: IntoIterator<Item = Result<T, E>>,
		I::IntoIter: 'static,
	{
		let mut job = Self {
			steps: Box::new(steps.into_iter()),
			status: Status::Running,
			results: Vec::new(),
			started: Instant::now(),
			threshold: async_threshold,
			cancel: JobCanceller::default(),
		};
		job.poll();
		job
	}

	pub fn state(&self) -> JobState {
		match self.status {
			Status::Running => JobState::Running,
			Status::Completed => JobState::Completed,
			Status::Failed(_) => JobState::Failed,
			Status::Cancelled => JobState::Cancelled,
		}
	}

	pub fn is_done(&self) -> bool {
		self.state().is_terminal()
	}

	pub fn canceller(&self) -> JobCanceller {
		self.cancel.clone()
	}

	/// Cooperative: the step in flight finishes, the next one never starts.
	pub fn stop(&self) {
		self.cancel.cancel();
	}

	fn advance(&mut self) {
		while let Status::Running = self.status {
			if self.cancel.is_cancelled() {
				log::debug!("job cancelled after {} steps", self.results.len());
				self.status = Status::Cancelled;
				break;
			}
			match self.steps.next() {
				Some(Ok(value)) => {
					self.results.push(value);
					if self.started.elapsed() >= self.threshold {
						break;
					}
				}
				Some(Err(e)) => {
					log::error!("job failed after {} steps: {}", self.results.len(), e);
					self.status = Status::Failed(e);
				}
				None => self.status = Status::Completed,
			}
		}
	}

	/// Advances the job until it yields or terminates. A running job only
	/// yields after storing a value.
	pub fn poll(&mut self) -> JobPoll<'_, T, E> {
		self.advance();
		match (&self.status, self.results.last()) {
			(Status::Running, Some(value)) => JobPoll::Continue(value),
			(Status::Failed(e), _) => JobPoll::Failed(e),
			(Status::Cancelled, _) => JobPoll::Cancelled,
			(_, last) => JobPoll::Done(last),
		}
	}

	/// Latest produced value, or the error that failed the job.
	pub fn result(&self) -> Result<Option<&T>, &E> {
		match &self.status {
			Status::Failed(e) => Err(e),
			_ => Ok(self.results.last()),
		}
	}

	/// Every value produced so far, in order.
	pub fn results(&self) -> &[T] {
		&self.results
	}

	/// Final value of a completed job. Failed or cancelled jobs give
	/// nothing, so partial output is never applied.
	pub fn into_output(mut self) -> Option<T> {
		match self.status {
			Status::Completed => self.results.pop(),
			_ => None,
		}
	}
}

/// Drains `steps` immediately, without timing or yielding.
pub fn run_synchronously<T, E, I>(steps: I) -> Result<Vec<T>, E>
where
	I: IntoIterator<Item = Result<T, E>>,
{
	steps.into_iter().collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobId {
	index: usize,
	generation: u32,
}

/// Polls every running job once per `run_pending`. Slots freed by `take`
/// are reused; ids of taken jobs stay invalid.
pub struct JobQueue<T, E> {
	jobs: Vec<Option<Job<T, E>>>,
	generations: Vec<u32>,
	free: Vec<usize>,
}

impl<T, E> Default for JobQueue<T, E> {
	fn default() -> Self {
		Self {
			jobs: Vec::new(),
			generations: Vec::new(),
			free: Vec::new(),
		}
	}
}

impl<T, E: Display> JobQueue<T, E> {
	pub fn push(&mut self, job: Job<T, E>) -> JobId {
		let index = match self.free.pop() {
			Some(index) => index,
			None => {
				self.jobs.push(None);
				self.generations.push(0);
				self.jobs.len() - 1
			}
		};
		self.jobs[index] = Some(job);
		JobId {
			index,
			generation: self.generations[index],
		}
	}

	fn valid(&self, id: JobId) -> bool {
		self.generations.get(id.index) == Some(&id.generation)
	}

	pub fn get(&self, id: JobId) -> Option<&Job<T, E>> {
		if !self.valid(id) {
			return None;
		}
		self.jobs.get(id.index).and_then(|j| j.as_ref())
	}

	pub fn take(&mut self, id: JobId) -> Option<Job<T, E>> {
		if !self.valid(id) {
			return None;
		}
		let job = self.jobs.get_mut(id.index).and_then(|j| j.take())?;
		self.generations[id.index] += 1;
		self.free.push(id.index);
		Some(job)
	}

	/// Number of live slots, taken ones excluded.
	pub fn len(&self) -> usize {
		self.jobs.iter().flatten().count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn running(&self) -> usize {
		self.jobs.iter().flatten().filter(|j| !j.is_done()).count()
	}

	/// Returns how many jobs are still running afterwards.
	pub fn run_pending(&mut self) -> usize {
		for job in self.jobs.iter_mut().flatten() {
			if !job.is_done() {
				job.poll();
			}
		}
		self.running()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[derive(Debug, PartialEq)]
	struct StepError(usize);

	impl Display for StepError {
		fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
			write!(f, "step {} failed", self.0)
		}
	}

	fn counting(n: usize) -> impl Iterator<Item = Result<usize, StepError>> {
		(1..=n).map(Ok)
	}

	#[test]
	fn test_large_threshold_runs_to_completion_in_start() {
		let job = Job::start(counting(5), Duration::MAX);
		assert_eq!(job.state(), JobState::Completed);
		assert_eq!(job.results(), &[1, 2, 3, 4, 5]);
		assert_eq!(job.result(), Ok(Some(&5)));
	}

	#[test]
	fn test_zero_threshold_yields_every_step() {
		let mut job = Job::start(counting(3), Duration::ZERO);
		assert_eq!(job.state(), JobState::Running);
		assert_eq!(job.results(), &[1]);
		assert_eq!(job.poll(), JobPoll::Continue(&2));
		assert_eq!(job.poll(), JobPoll::Continue(&3));
		assert_eq!(job.poll(), JobPoll::Done(Some(&3)));
		assert_eq!(job.state(), JobState::Completed);
		assert_eq!(job.into_output(), Some(3));
	}

	#[test]
	fn test_synchronous_equivalence() {
		let sync = run_synchronously(counting(7)).unwrap();
		let job = Job::start(counting(7), Duration::MAX);
		assert_eq!(job.results(), sync.as_slice());
	}

	#[test]
	fn test_failure_on_third_step() {
		let steps = (1..=5).map(|i| if i == 3 { Err(StepError(i)) } else { Ok(i) });
		let mut job = Job::start(steps, Duration::MAX);
		assert_eq!(job.state(), JobState::Failed);
		assert_eq!(job.results().len(), 2);
		assert_eq!(job.result(), Err(&StepError(3)));
		assert_eq!(job.poll(), JobPoll::Failed(&StepError(3)));
		assert_eq!(job.into_output(), None);
	}

	#[test]
	fn test_failure_in_synchronous_run() {
		let steps = (1..=5).map(|i| if i == 3 { Err(StepError(i)) } else { Ok(i) });
		assert_eq!(run_synchronously(steps), Err(StepError(3)));
	}

	#[test]
	fn test_stop_between_steps() {
		let mut job = Job::start(counting(5), Duration::ZERO);
		assert_eq!(job.poll(), JobPoll::Continue(&2));
		job.stop();
		assert_eq!(job.poll(), JobPoll::Cancelled);
		assert_eq!(job.results(), &[1, 2]);
		assert_eq!(job.poll(), JobPoll::Cancelled);
		assert_eq!(job.into_output(), None);
	}

	#[test]
	fn test_empty_sequence_completes() {
		let job = Job::start(counting(0), Duration::ZERO);
		assert_eq!(job.state(), JobState::Completed);
		assert_eq!(job.result(), Ok(None));
	}

	#[test]
	fn test_queue_polls_round_robin() {
		let mut queue = JobQueue::default();
		let a = queue.push(Job::start(counting(3), Duration::ZERO));
		let b = queue.push(Job::start(counting(1), Duration::ZERO));
		assert_eq!(queue.run_pending(), 1);
		assert_eq!(queue.get(a).unwrap().results(), &[1, 2]);
		assert_eq!(queue.get(b).unwrap().state(), JobState::Completed);
		queue.get(a).unwrap().canceller().cancel();
		assert_eq!(queue.run_pending(), 0);
		assert_eq!(queue.take(a).unwrap().state(), JobState::Cancelled);
		assert!(queue.get(a).is_none());
	}

	#[test]
	fn test_queue_reuses_taken_slots() {
		let mut queue = JobQueue::default();
		let a = queue.push(Job::start(counting(1), Duration::MAX));
		let b = queue.push(Job::start(counting(2), Duration::MAX));
		assert!(queue.take(a).is_some());
		assert!(queue.take(a).is_none());
		assert_eq!(queue.len(), 1);

		let c = queue.push(Job::start(counting(3), Duration::MAX));
		assert_ne!(a, c);
		assert!(queue.get(a).is_none());
		assert_eq!(queue.get(c).unwrap().results(), &[1, 2, 3]);
		assert_eq!(queue.get(b).unwrap().results(), &[1, 2]);
		// no slot is added while a freed one exists
		assert_eq!(queue.jobs.len(), 2);
		assert!(queue.take(b).is_some());
		assert!(queue.take(c).is_some());
		assert!(queue.is_empty());
	}
}
