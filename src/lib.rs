//! Record physics-driven motion of scene objects at a fixed sample rate and
//! replay it later without the physics engine.

pub mod config;
pub mod error;
pub mod physics;
pub mod simulation;

pub use error::SimulationError;
