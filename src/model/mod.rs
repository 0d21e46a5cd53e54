//! Model construction and the staged build/compile/run facade

pub mod builder;
pub mod codegen;
pub mod matmul2d;
pub mod shape;

pub use builder::{InputSet, ModelLibBuilder};
pub use codegen::MatMulModel;
pub use matmul2d::MatMul2DLibBuilder;
pub use shape::ShapeTriple;
