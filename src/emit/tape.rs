//! Straight line evaluation tapes.
//!
//! A tape is the lowered form of a set of expressions: one instruction per distinct node, in an order where every
//! operand precedes its use. Slot `i` holds the value of instruction `i`. Evaluation is a single forward pass with
//! the operations exactly as built, so results are reproducible bit for bit.

use std::collections::HashMap;

use crate::error::{GenResult, GenerationError};
use crate::expr::{self, ExprId, Func, Graph, Node};

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Instr {
    Const(f64),
    Input(usize),
    Add(usize, usize),
    Mul(usize, usize),
    Div(usize, usize),
    Pow(usize, usize),
    Neg(usize),
    Apply(Func, usize),
    Min(usize, usize),
    Max(usize, usize),
    /// `if s[a] <= s[b] { s[le] } else { s[gt] }`
    Select(usize, usize, usize, usize),
}

#[derive(Clone, Debug)]
pub struct Tape {
    instrs: Vec<Instr>,
    inputs: usize,
    outputs: Vec<usize>,
}

impl Tape {
    /// Lowers `outputs` to a tape reading the symbols `inputs` in order.
    ///
    /// Any other symbol reached from `outputs` is an undeclared symbol of `context`.
    pub fn lower(graph: &Graph, inputs: &[ExprId], outputs: &[ExprId], context: &str) -> GenResult<Tape> {
        let mut slots: HashMap<ExprId, usize> = HashMap::new();
        let mut instrs = Vec::new();
        for id in graph.reachable(outputs) {
            let s = |e: ExprId| slots[&e];
            let instr = match graph.node(id) {
                Node::Const(bits) => Instr::Const(f64::from_bits(bits)),
                Node::Symbol(_) => match inputs.iter().position(|i| *i == id) {
                    Some(position) => Instr::Input(position),
                    None => {
                        return Err(GenerationError::UndeclaredSymbol {
                            symbol: graph.display(id).to_string(),
                            context: context.to_string(),
                        })
                    }
                },
                Node::Add(a, b) => Instr::Add(s(a), s(b)),
                Node::Mul(a, b) => Instr::Mul(s(a), s(b)),
                Node::Div(a, b) => Instr::Div(s(a), s(b)),
                Node::Pow(a, b) => Instr::Pow(s(a), s(b)),
                Node::Neg(a) => Instr::Neg(s(a)),
                Node::Apply(func, a) => Instr::Apply(func, s(a)),
                Node::Min(a, b) => Instr::Min(s(a), s(b)),
                Node::Max(a, b) => Instr::Max(s(a), s(b)),
                Node::Select(a, b, le, gt) => Instr::Select(s(a), s(b), s(le), s(gt)),
            };
            slots.insert(id, instrs.len());
            instrs.push(instr);
        }

        Ok(Tape {
            instrs,
            inputs: inputs.len(),
            outputs: outputs.iter().map(|o| slots[o]).collect(),
        })
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.instrs
    }

    pub fn input_len(&self) -> usize {
        self.inputs
    }

    pub fn output_len(&self) -> usize {
        self.outputs.len()
    }

    /// Slots holding the outputs, in output order.
    pub fn output_slots(&self) -> &[usize] {
        &self.outputs
    }

    /// Evaluates the tape.
    pub fn eval(&self, input: &[f64], output: &mut [f64]) -> Result<(), &'static str> {
        if input.len() != self.inputs || output.len() != self.outputs.len() {
            return Err("tape dimension mismatch");
        }

        let mut s: Vec<f64> = Vec::with_capacity(self.instrs.len());
        for instr in &self.instrs {
            let value = match *instr {
                Instr::Const(c) => c,
                Instr::Input(i) => input[i],
                Instr::Add(a, b) => s[a] + s[b],
                Instr::Mul(a, b) => s[a] * s[b],
                Instr::Div(a, b) => s[a] / s[b],
                Instr::Pow(a, b) => s[a].powf(s[b]),
                Instr::Neg(a) => -s[a],
                Instr::Apply(func, a) => func.eval(s[a]),
                Instr::Min(a, b) => expr::min(s[a], s[b]),
                Instr::Max(a, b) => expr::max(s[a], s[b]),
                Instr::Select(a, b, le, gt) => expr::select(s[a], s[b], s[le], s[gt]),
            };
            s.push(value);
        }
        for (o, slot) in output.iter_mut().zip(self.outputs.iter()) {
            *o = s[*slot];
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tape_matches_graph_evaluation() {
        let mut g = Graph::new();
        let v = g.symbols("a b");
        let (a, b) = (v[0], v[1]);
        let ab = g.mul(a, b);
        let s = g.sin(ab);
        let m = g.min(s, b);
        let h = g.heaviside(a);
        let e = g.add(m, h);
        let outputs = [e, ab, s];

        let tape = Tape::lower(&g, &[a, b], &outputs, "test").unwrap();
        // a, b, a*b, sin, min, heaviside, add
        assert_eq!(tape.instructions().len(), 7);

        let mut out = [0.; 3];
        tape.eval(&[0.7, -0.2], &mut out).unwrap();
        let point = [(a, 0.7), (b, -0.2)].iter().cloned().collect();
        let expect = g.eval_many(&outputs, &point).unwrap();
        assert_eq!(out.to_vec(), expect);

        assert!(tape.eval(&[0.7], &mut out).is_err());
    }

    #[test]
    fn undeclared_input() {
        let mut g = Graph::new();
        let v = g.symbols("a b");
        let e = g.add(v[0], v[1]);
        let err = Tape::lower(&g, &[v[0]], &[e], "predict").unwrap_err();
        assert_eq!(
            err,
            GenerationError::UndeclaredSymbol {
                symbol: "b".to_string(),
                context: "predict".to_string()
            }
        );
    }
}
