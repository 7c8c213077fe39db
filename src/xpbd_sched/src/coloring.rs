// Greedy constraint coloring.
// Every color is a batch index: constraints with the same color never
// share a particle, so a batch can be projected in parallel.

use crate::error::TopologyError;

fn check_offsets(
	particle_count: usize,
	constraint_offsets: &[usize],
) -> Result<(), TopologyError> {
	for (index, w) in constraint_offsets.windows(2).enumerate() {
		if w[0] > w[1] {
			return Err(TopologyError::NonMonotonic {
				index,
				start: w[0],
				end: w[1],
			});
		}
	}
	match (constraint_offsets.first(), constraint_offsets.last()) {
		(None, _) if particle_count > 0 => {
			Err(TopologyError::MissingOffsets {
				len: particle_count,
			})
		}
		(Some(&first), _) if first != 0 => Err(TopologyError::FirstOffset(first)),
		(_, Some(&last)) if last != particle_count => {
			Err(TopologyError::LengthMismatch {
				last,
				len: particle_count,
			})
		}
		_ => Ok(()),
	}
}

// both slices sorted
fn shares_particle(a: &[usize], b: &[usize]) -> bool {
	let (mut i, mut j) = (0, 0);
	while i < a.len() && j < b.len() {
		match a[i].cmp(&b[j]) {
			std::cmp::Ordering::Less => i += 1,
			std::cmp::Ordering::Greater => j += 1,
			std::cmp::Ordering::Equal => return true,
		}
	}
	false
}

/// Assigns a color to every constraint.
///
/// Constraint `i` owns the index range
/// `constraint_offsets[i]..constraint_offsets[i + 1]`, the first offset is
/// 0 and the last one is `particle_indices.len()`. The slices are sorted
/// in place, so pass a copy if the original particle order matters.
/// Offsets are validated up front and nothing is touched on failure.
pub fn colorize(
	particle_indices: &mut [usize],
	constraint_offsets: &[usize],
) -> Result<Vec<usize>, TopologyError> {
	check_offsets(particle_indices.len(), constraint_offsets)?;
	let constraint_count = constraint_offsets.len().saturating_sub(1);
	if constraint_count == 0 {
		return Ok(Vec::new());
	}

	for w in constraint_offsets.windows(2) {
		particle_indices[w[0]..w[1]].sort_unstable();
	}

	let slice = |i: usize| {
		&particle_indices[constraint_offsets[i]..constraint_offsets[i + 1]]
	};
	let mut colors: Vec<usize> = Vec::with_capacity(constraint_count);
	let mut unavailable: Vec<bool> = Vec::new();
	for i in 0..constraint_count {
		let own = slice(i);
		// constraints after i have no color yet
		for (j, &color) in colors.iter().enumerate() {
			if shares_particle(own, slice(j)) {
				if color >= unavailable.len() {
					unavailable.resize(color + 1, false);
				}
				unavailable[color] = true;
			}
		}
		let color = unavailable
			.iter()
			.position(|&taken| !taken)
			.unwrap_or(unavailable.len());
		colors.push(color);
		unavailable.iter_mut().for_each(|x| *x = false);
	}
	Ok(colors)
}

/// Number of batches needed to hold the given colors.
pub fn batch_count(colors: &[usize]) -> usize {
	colors.iter().max().map_or(0, |&c| c + 1)
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_empty() {
		assert_eq!(colorize(&mut [], &[]).unwrap(), Vec::<usize>::new());
		assert_eq!(colorize(&mut [], &[0]).unwrap(), Vec::<usize>::new());
		assert_eq!(batch_count(&[]), 0);
	}

	#[test]
	fn test_path_uses_two_colors() {
		// constraint i joins particle i and i + 1
		let n = 9;
		let mut ps: Vec<usize> = (0..n).flat_map(|i| [i + 1, i]).collect();
		let offsets: Vec<usize> = (0..=n).map(|i| i * 2).collect();
		let colors = colorize(&mut ps, &offsets).unwrap();
		assert_eq!(batch_count(&colors), 2);
		for i in 1..n {
			assert_ne!(colors[i - 1], colors[i]);
		}
	}

	#[test]
	fn test_slices_sorted_in_place() {
		let mut ps = vec![3, 1, 2, 9, 4];
		colorize(&mut ps, &[0, 3, 5]).unwrap();
		assert_eq!(ps, vec![1, 2, 3, 4, 9]);
	}

	#[test]
	fn test_isolated_constraints_get_color_zero() {
		let mut ps = vec![0, 1, 2, 3, 4, 5];
		let colors = colorize(&mut ps, &[0, 2, 4, 6]).unwrap();
		assert_eq!(colors, vec![0, 0, 0]);
	}

	#[test]
	fn test_star_needs_one_color_per_constraint() {
		let mut ps = vec![0, 1, 0, 2, 0, 3, 0, 4];
		let colors = colorize(&mut ps, &[0, 2, 4, 6, 8]).unwrap();
		assert_eq!(colors, vec![0, 1, 2, 3]);
	}

	#[test]
	fn test_reuses_freed_color() {
		// c0 = {0,1}, c1 = {1,2}, c2 = {2,3}: c2 only conflicts with c1
		let mut ps = vec![0, 1, 1, 2, 2, 3];
		let colors = colorize(&mut ps, &[0, 2, 4, 6]).unwrap();
		assert_eq!(colors, vec![0, 1, 0]);
	}

	#[test]
	fn test_non_monotonic_fails_untouched() {
		let mut ps = vec![5, 4, 3, 2];
		let err = colorize(&mut ps, &[0, 3, 2, 4]).unwrap_err();
		assert_eq!(
			err,
			TopologyError::NonMonotonic {
				index: 1,
				start: 3,
				end: 2
			}
		);
		assert_eq!(ps, vec![5, 4, 3, 2]);
	}

	#[test]
	fn test_length_mismatch() {
		let mut ps = vec![0, 1, 2];
		let err = colorize(&mut ps, &[0, 2]).unwrap_err();
		assert_eq!(err, TopologyError::LengthMismatch { last: 2, len: 3 });
	}

	#[test]
	fn test_offsets_must_cover_every_index() {
		let mut ps = vec![3, 4];
		assert_eq!(
			colorize(&mut ps, &[]).unwrap_err(),
			TopologyError::MissingOffsets { len: 2 }
		);
		assert_eq!(
			colorize(&mut ps, &[1, 2]).unwrap_err(),
			TopologyError::FirstOffset(1)
		);
		assert_eq!(colorize(&mut ps, &[0, 2]).unwrap(), vec![0]);
	}

	#[test]
	fn test_shares_particle() {
		assert!(shares_particle(&[1, 4, 7], &[2, 3, 7]));
		assert!(!shares_particle(&[1, 4, 7], &[2, 3, 8]));
		assert!(!shares_particle(&[], &[0]));
	}
}
