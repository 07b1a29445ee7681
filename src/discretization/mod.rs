pub mod generator;
pub mod mesh;
