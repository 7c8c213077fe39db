use crate::constraint::{ConstraintKind, ConstraintType};
use crate::V2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceType {
	#[default]
	Normal,
	Repulsive, // collision
	Attractive,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DistanceParams {
	pub l0: f32,
	pub compliance: f32,
	pub ty: DistanceType,
}

impl DistanceParams {
	pub fn new(l0: f32) -> Self {
		Self {
			l0,
			compliance: 1e-7,
			ty: DistanceType::Normal,
		}
	}

	pub fn between(p1: V2, p2: V2) -> Self {
		Self::new((p1 - p2).magnitude())
	}

	pub fn repulsive_only(mut self) -> Self {
		self.ty = DistanceType::Repulsive;
		self
	}

	pub fn attractive_only(mut self) -> Self {
		self.ty = DistanceType::Attractive;
		self
	}

	pub fn with_compliance(mut self, c: f32) -> Self {
		self.compliance = c;
		self
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Distance;

impl ConstraintKind for Distance {
	const TYPE: ConstraintType = ConstraintType::Distance;
	const ARITY: usize = 2;
	type Params = DistanceParams;

	fn project(
		particles: &[usize],
		params: &DistanceParams,
		lambda: &mut f32,
		pos: &[V2],
		imass: &[f32],
		dt: f32,
		correct: &mut [V2],
	) {
		let (p1, p2) = (particles[0], particles[1]);
		let imass1 = imass[p1];
		let imass2 = imass[p2];
		let w = imass1 + imass2;
		if w == 0.0 {
			return;
		}
		let dp = pos[p1] - pos[p2];
		let l = dp.magnitude();
		if !l.is_normal() {
			return;
		}
		let dl = l - params.l0;
		if params.ty == DistanceType::Repulsive && dl >= 0.
			|| params.ty == DistanceType::Attractive && dl <= 0.
		{
			return;
		}
		let compliance_t = params.compliance / dt.powi(2);
		let dlambda = (-dl - compliance_t * *lambda) / (w + compliance_t);
		let c = dlambda * dp / l;
		*lambda += dlambda;
		correct[0] = c * imass1;
		correct[1] = -c * imass2;
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn project(params: &DistanceParams, pos: &[V2], imass: &[f32]) -> [V2; 2] {
		let mut lambda = 0.0;
		let mut correct = [V2::zeros(); 2];
		Distance::project(&[0, 1], params, &mut lambda, pos, imass, 0.01, &mut correct);
		correct
	}

	#[test]
	fn test_rigid_restores_length() {
		let pos = [V2::new(0., 0.), V2::new(2., 0.)];
		let params = DistanceParams::new(1.0).with_compliance(0.0);
		let c = project(&params, &pos, &[1.0, 1.0]);
		let p1 = pos[0] + c[0];
		let p2 = pos[1] + c[1];
		assert!(((p1 - p2).magnitude() - 1.0).abs() < 1e-6);
		assert!((c[0] + c[1]).magnitude() < 1e-6);
	}

	#[test]
	fn test_pinned_end_does_not_move() {
		let pos = [V2::new(0., 0.), V2::new(2., 0.)];
		let params = DistanceParams::new(1.0).with_compliance(0.0);
		let c = project(&params, &pos, &[0.0, 1.0]);
		assert_eq!(c[0], V2::zeros());
		assert!((c[1] - V2::new(-1., 0.)).magnitude() < 1e-6);
	}

	#[test]
	fn test_one_sided_types() {
		let stretched = [V2::new(0., 0.), V2::new(2., 0.)];
		let params = DistanceParams::new(1.0).repulsive_only();
		assert_eq!(project(&params, &stretched, &[1.0, 1.0]), [V2::zeros(); 2]);
		let params = DistanceParams::new(3.0).attractive_only();
		assert_eq!(project(&params, &stretched, &[1.0, 1.0]), [V2::zeros(); 2]);
	}
}
