//! CPU reference computations used as ground truth

pub mod matmul;

pub use matmul::{
    compare_within_tolerance, cpu_matmul_f32, reference_matmul, Comparison, Mismatch, Tolerance,
};
