pub mod batch;
pub mod batch_solver;
pub mod blueprint;
pub mod coloring;
pub mod constraint;
pub mod constraint_group;
pub mod constraint_set;
pub mod error;
pub mod force;
pub mod job;
pub mod particle;
pub mod posbox;
pub mod solver;
pub mod time_manager;

pub type V2 = nalgebra::Vector2<f32>;
