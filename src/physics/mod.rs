pub mod aabb;
pub mod barnes_hut;
pub mod body;
pub mod engine;
pub mod forces;
pub mod integrators;
pub mod math;

/// Largest dimension count served by a stack-allocated kernel. Higher
/// counts run on a heap-backed kernel with the same semantics.
pub const MAX_STATIC_DIMENSIONS: usize = 6;
