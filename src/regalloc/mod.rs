//! Virtual-register allocators (spec.md §4.5, C7): a generic flat
//! fixed-pool-plus-storage allocator, and a constraint-driven linear
//! allocator built on top of it that consumes scheduler output.

pub mod flat;
pub mod linear;

pub use flat::{RegisterFilter, VRegAllocator, VRegAllocatorId};
pub use linear::{Allocation, Constraint, ConstraintKind, LinearRegAllocator};
