pub mod collaborator;
pub mod config;
pub mod solver;
