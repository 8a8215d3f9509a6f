//! Numeric evaluation of expressions.
//!
//! The scalar kernels here define the forward semantics of every primitive and are shared by
//! [`Graph::eval`] and the emitted procedures.

use std::collections::HashMap;

use super::{ExprId, Func, Graph, Node};
use crate::error::{GenResult, GenerationError};

/// -1, 0 or 1. Unlike `f64::signum` zero maps to zero.
pub fn sign(a: f64) -> f64 {
    if a > 0.0 {
        1.0
    } else if a < 0.0 {
        -1.0
    } else {
        a * 0.0
    }
}

/// Unit step with 1/2 at zero.
pub fn heaviside(a: f64) -> f64 {
    if a > 0.0 {
        1.0
    } else if a < 0.0 {
        0.0
    } else {
        // NaN propagates
        a * 0.0 + 0.5
    }
}

/// Minimum, ties go to `a`.
pub fn min(a: f64, b: f64) -> f64 {
    if a <= b {
        a
    } else {
        b
    }
}

/// Maximum, ties go to `a`.
pub fn max(a: f64, b: f64) -> f64 {
    if a >= b {
        a
    } else {
        b
    }
}

pub fn select(a: f64, b: f64, le: f64, gt: f64) -> f64 {
    if a <= b {
        le
    } else {
        gt
    }
}

impl Func {
    pub fn eval(self, a: f64) -> f64 {
        match self {
            Func::Exp => a.exp(),
            Func::Log => a.ln(),
            Func::Sqrt => a.sqrt(),
            Func::Sin => a.sin(),
            Func::Cos => a.cos(),
            Func::Tan => a.tan(),
            Func::Atan => a.atan(),
            Func::Abs => a.abs(),
            Func::Sign => sign(a),
            Func::Heaviside => heaviside(a),
        }
    }
}

impl Graph {
    /// Evaluate `root` with symbols bound to values.
    pub fn eval(&self, root: ExprId, bindings: &HashMap<ExprId, f64>) -> GenResult<f64> {
        Ok(self.eval_many(&[root], bindings)?[0])
    }

    /// Evaluate several roots sharing common sub-expressions.
    pub fn eval_many(&self, roots: &[ExprId], bindings: &HashMap<ExprId, f64>) -> GenResult<Vec<f64>> {
        let mut values: HashMap<ExprId, f64> = HashMap::new();
        for id in self.reachable(roots) {
            let v = |e: ExprId| values[&e];
            let value = match self.node(id) {
                Node::Const(bits) => f64::from_bits(bits),
                Node::Symbol(_) => match bindings.get(&id) {
                    Some(value) => *value,
                    None => {
                        return Err(GenerationError::UndeclaredSymbol {
                            symbol: self.display(id).to_string(),
                            context: "evaluation".to_string(),
                        })
                    }
                },
                Node::Add(a, b) => v(a) + v(b),
                Node::Mul(a, b) => v(a) * v(b),
                Node::Div(a, b) => v(a) / v(b),
                Node::Pow(a, b) => v(a).powf(v(b)),
                Node::Neg(a) => -v(a),
                Node::Apply(func, a) => func.eval(v(a)),
                Node::Min(a, b) => min(v(a), v(b)),
                Node::Max(a, b) => max(v(a), v(b)),
                Node::Select(a, b, le, gt) => select(v(a), v(b), v(le), v(gt)),
            };
            values.insert(id, value);
        }
        Ok(roots.iter().map(|r| values[r]).collect())
    }
}
