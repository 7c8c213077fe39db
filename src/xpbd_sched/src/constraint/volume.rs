use crate::constraint::{ConstraintKind, ConstraintType};
use crate::V2;

// twice the signed area
fn area_p(p1: V2, p2: V2, p3: V2) -> f32 {
	p1[0] * p2[1] + p2[0] * p3[1] + p3[0] * p1[1]
		- p3[0] * p2[1]
		- p1[0] * p3[1]
		- p2[0] * p1[1]
}

#[derive(Clone, Debug, PartialEq)]
pub struct VolumeParams {
	pub s0: f32,
	pub compliance: f32,
}

impl VolumeParams {
	pub fn new(s0: f32) -> Self {
		Self {
			s0,
			compliance: 1e-9,
		}
	}

	pub fn of_triangle(p0: V2, p1: V2, p2: V2) -> Self {
		Self::new(area_p(p0, p1, p2))
	}

	pub fn with_compliance(mut self, c: f32) -> Self {
		self.compliance = c;
		self
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Volume;

impl ConstraintKind for Volume {
	const TYPE: ConstraintType = ConstraintType::Volume;
	const ARITY: usize = 3;
	type Params = VolumeParams;

	fn project(
		particles: &[usize],
		params: &VolumeParams,
		lambda: &mut f32,
		pos: &[V2],
		imass: &[f32],
		dt: f32,
		correct: &mut [V2],
	) {
		let imass0 = imass[particles[0]];
		let imass1 = imass[particles[1]];
		let imass2 = imass[particles[2]];
		if imass0 + imass1 + imass2 == 0.0 {
			return;
		}

		let pos0 = pos[particles[0]];
		let pos1 = pos[particles[1]];
		let pos2 = pos[particles[2]];
		let (x0, y0) = (pos0[0], pos0[1]);
		let (x1, y1) = (pos1[0], pos1[1]);
		let (x2, y2) = (pos2[0], pos2[1]);
		let ds = area_p(pos0, pos1, pos2) - params.s0;

		let grad0 = V2::new(y1 - y2, x2 - x1);
		let grad1 = V2::new(y2 - y0, x0 - x2);
		let grad2 = V2::new(y0 - y1, x1 - x0);

		let beta = imass0 * grad0.magnitude_squared()
			+ imass1 * grad1.magnitude_squared()
			+ imass2 * grad2.magnitude_squared();
		let compliance_t = params.compliance / dt.powi(2);
		if beta + compliance_t == 0.0 {
			// collapsed triangle
			return;
		}
		let dlambda = (-ds - compliance_t * *lambda) / (beta + compliance_t);
		*lambda += dlambda;
		correct[0] = dlambda * imass0 * grad0;
		correct[1] = dlambda * imass1 * grad1;
		correct[2] = dlambda * imass2 * grad2;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_area_p() {
		let p0 = V2::new(0., 0.);
		let p1 = V2::new(1., 0.);
		let p2 = V2::new(0., 2.);
		let a0 = area_p(p0, p1, p2);
		let a1 = area_p(p0, p2, p1);
		assert!((a0 - 2.).abs() < 1e-6);
		assert!((a0 + a1).abs() < 1e-6);
	}

	#[test]
	fn test_projection_moves_towards_rest_area() {
		let pos = [V2::new(0., 0.), V2::new(1., 0.), V2::new(0., 2.)];
		let params = VolumeParams::new(1.0).with_compliance(0.0);
		let mut lambda = 0.0;
		let mut correct = [V2::zeros(); 3];
		Volume::project(
			&[0, 1, 2],
			&params,
			&mut lambda,
			&pos,
			&[1.0, 1.0, 1.0],
			0.01,
			&mut correct,
		);
		let moved: Vec<V2> = pos
			.iter()
			.zip(correct.iter())
			.map(|(p, c)| p + c)
			.collect();
		let before = (area_p(pos[0], pos[1], pos[2]) - 1.0).abs();
		let after = (area_p(moved[0], moved[1], moved[2]) - 1.0).abs();
		assert!(after < before);
		assert!(lambda < 0.0);
	}
}
