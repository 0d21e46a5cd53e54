//! C code generation for a shape-specialized matmul model
//!
//! The emitted translation unit exports two symbols:
//!
//! - `run_main_graph(const float *a, const float *b, float *c)`
//! - `main_graph_shape(int64_t *dims)`, writing I, J, K
//!
//! Dimensions are compile-time constants so every configuration produces a
//! distinct binary.

use std::fmt::Write;

use crate::backend::{ENTRY_POINT, SHAPE_QUERY};
use crate::model::ShapeTriple;

/// A single-op model: `C = A * B` for one shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatMulModel {
    shape: ShapeTriple,
    output_offset: f32,
}

impl MatMulModel {
    pub fn new(shape: ShapeTriple) -> Self {
        MatMulModel {
            shape,
            output_offset: 0.0,
        }
    }

    /// Add a constant to every output element (negative control)
    pub fn with_output_offset(mut self, offset: f32) -> Self {
        self.output_offset = offset;
        self
    }

    pub fn shape(&self) -> ShapeTriple {
        self.shape
    }

    pub fn output_offset(&self) -> f32 {
        self.output_offset
    }

    /// Emit the C source for this model
    pub fn emit_c(&self) -> String {
        let shape = self.shape;
        let mut src = String::new();

        // Writing to a String cannot fail
        let _ = writeln!(
            src,
            "/* matmul model: A[{i}x{k}] * B[{k}x{j}] = C[{i}x{j}] */",
            i = shape.i(),
            j = shape.j(),
            k = shape.k()
        );
        src.push_str("#include <stdint.h>\n\n");
        src.push_str("#if defined(_WIN32)\n#define MODEL_EXPORT __declspec(dllexport)\n");
        src.push_str("#else\n#define MODEL_EXPORT __attribute__((visibility(\"default\")))\n#endif\n\n");
        let _ = writeln!(src, "#define DIM_I {}", shape.i());
        let _ = writeln!(src, "#define DIM_J {}", shape.j());
        let _ = writeln!(src, "#define DIM_K {}\n", shape.k());

        let _ = writeln!(src, "MODEL_EXPORT void {}(int64_t *dims) {{", SHAPE_QUERY);
        src.push_str("  dims[0] = DIM_I;\n  dims[1] = DIM_J;\n  dims[2] = DIM_K;\n}\n\n");

        let _ = writeln!(
            src,
            "MODEL_EXPORT void {}(const float *a, const float *b, float *c) {{",
            ENTRY_POINT
        );
        src.push_str("  for (int64_t i = 0; i < DIM_I; ++i) {\n");
        src.push_str("    float *row = c + i * DIM_J;\n");
        src.push_str("    for (int64_t j = 0; j < DIM_J; ++j)\n      row[j] = 0.0f;\n");
        src.push_str("    for (int64_t k = 0; k < DIM_K; ++k) {\n");
        src.push_str("      const float aik = a[i * DIM_K + k];\n");
        src.push_str("      const float *brow = b + k * DIM_J;\n");
        src.push_str("      for (int64_t j = 0; j < DIM_J; ++j)\n");
        src.push_str("        row[j] += aik * brow[j];\n");
        src.push_str("    }\n");
        if self.output_offset != 0.0 {
            src.push_str("    for (int64_t j = 0; j < DIM_J; ++j)\n");
            let _ = writeln!(src, "      row[j] += {};", c_float_literal(self.output_offset));
        }
        src.push_str("  }\n}\n");

        src
    }
}

/// Finite f32 as a C float literal
fn c_float_literal(value: f32) -> String {
    let text = format!("{:?}", value);
    if text.contains(['.', 'e', 'E']) {
        format!("{}f", text)
    } else {
        format!("{}.0f", text)
    }
}
