//! Forcelayout library
//!
//! N-dimensional force-directed layout physics: a Barnes-Hut tree for
//! pairwise repulsion, Hooke's-law springs, drag, and a speed-capped
//! symplectic Euler integrator, orchestrated by [`simulator::PhysicsSimulator`].

pub mod config;
pub mod error;
pub mod physics;
pub mod prelude;
pub mod resources;
pub mod simulator;
