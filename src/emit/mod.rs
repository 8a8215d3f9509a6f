#![allow(non_snake_case)]

//! Code emission.
//!
//! Lowers the symbolic filter equations into procedures: the closed form part becomes a [`Tape`] over the state,
//! input and measurement symbols, the linear algebra part is applied numerically by the procedure.
//! Lowering is a pure function of the equations, no state is kept between procedures.

pub mod source;
pub mod tape;

use crate::artifact::{NoiseLayout, PredictProcedure, UpdateProcedure};
use crate::builder::{NoiseEquations, PredictEquations, UpdateEquations};
use crate::error::GenResult;
use crate::expr::{ExprId, Graph};

pub use tape::{Instr, Tape};

fn names(graph: &Graph, prefix: &str, symbols: &[ExprId]) -> Vec<String> {
    symbols
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}[{}] {}", prefix, i, graph.display(*s)))
        .collect()
}

fn matrix_names(out: &mut Vec<String>, name: &str, rows: usize, cols: usize) {
    for i in 0..rows {
        for j in 0..cols {
            out.push(format!("{}[{}][{}]", name, i, j));
        }
    }
}

/// Lowers the predict equations, inputs are laid out as `x ++ u ++ [dt]`.
///
/// Outputs are laid out as `x' ++ F (row major) ++ q`.
pub fn emit_predict(
    graph: &Graph,
    state: &[ExprId],
    u: &[ExprId],
    dt: ExprId,
    eq: &PredictEquations,
) -> GenResult<PredictProcedure> {
    let n = state.len();
    let mut inputs = state.to_vec();
    inputs.extend_from_slice(u);
    inputs.push(dt);

    let mut outputs = eq.x_next.clone();
    outputs.extend(eq.F.iter().flatten());
    outputs.extend_from_slice(&eq.q);

    let tape = Tape::lower(graph, &inputs, &outputs, "predict")?;

    let mut input_names = names(graph, "x", state);
    input_names.extend(names(graph, "u", u));
    input_names.push(format!("dt {}", graph.display(dt)));

    let mut output_names: Vec<String> = (0..n).map(|i| format!("x'[{}]", i)).collect();
    matrix_names(&mut output_names, "F", n, n);
    output_names.extend((0..n).map(|i| format!("q[{}]", i)));

    Ok(PredictProcedure::new(n, u.len(), tape, input_names, output_names))
}

/// Lowers the update equations of measurement `name`, inputs are laid out as `x ++ z`.
///
/// Outputs are laid out as `y ++ H (row major)` followed by `G` or `R` (row major) for mapped or modelled noise.
pub fn emit_update(
    graph: &Graph,
    name: &str,
    state: &[ExprId],
    z: &[ExprId],
    eq: &UpdateEquations,
) -> GenResult<UpdateProcedure> {
    let n = state.len();
    let m = eq.innovation.len();
    let mut inputs = state.to_vec();
    inputs.extend_from_slice(z);

    let mut outputs = eq.innovation.clone();
    outputs.extend(eq.H.iter().flatten());

    let mut output_names: Vec<String> = (0..m).map(|i| format!("y[{}]", i)).collect();
    matrix_names(&mut output_names, "H", m, n);

    let noise = match &eq.noise {
        NoiseEquations::Supplied => NoiseLayout::Supplied,
        NoiseEquations::Mapped { G } => {
            outputs.extend(G.iter().flatten());
            matrix_names(&mut output_names, "G", m, z.len());
            NoiseLayout::Mapped
        }
        NoiseEquations::Modelled { R } => {
            outputs.extend(R.iter().flatten());
            matrix_names(&mut output_names, "R", m, m);
            NoiseLayout::Modelled
        }
    };

    let tape = Tape::lower(graph, &inputs, &outputs, &format!("update_{}", name))?;

    let mut input_names = names(graph, "x", state);
    input_names.extend(names(graph, "z", z));

    Ok(UpdateProcedure::new(
        name.to_string(),
        n,
        m,
        z.len(),
        noise,
        tape,
        input_names,
        output_names,
    ))
}
