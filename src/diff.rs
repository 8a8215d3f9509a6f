#![allow(non_snake_case)]

//! Symbolic differentiation.
//!
//! Partial derivatives are built by the chain rule over the expression DAG, each node is differentiated once per
//! variable and cached, so shared sub-expressions stay shared in the derivatives.
//!
//! Non-smooth primitives use a fixed subgradient convention:
//!
//! | primitive      | derivative                                        |
//! |----------------|---------------------------------------------------|
//! | `abs(a)`       | `sign(a)*a'`, so 0 at `a = 0`                     |
//! | `sign(a)`      | 0, the jump at 0 is ignored                       |
//! | `heaviside(a)` | 0, the impulse at 0 is dropped                    |
//! | `min(a, b)`    | `a'` where `a <= b`, else `b'`                    |
//! | `max(a, b)`    | `a'` where `a >= b`, else `b'`                    |
//!
//! These are local linearisations, not distributional derivatives. Changing them changes the filter's behaviour
//! at control reversals.

use std::collections::HashMap;

use log::trace;
use nalgebra::DMatrix;

use crate::error::{GenResult, GenerationError};
use crate::expr::{ExprId, Func, Graph, Node};

/// Differentiates expressions of a [`Graph`], caching derivatives per (expression, variable).
pub struct Differentiator<'g> {
    graph: &'g mut Graph,
    cache: HashMap<(ExprId, ExprId), ExprId>,
}

impl<'g> Differentiator<'g> {
    pub fn new(graph: &'g mut Graph) -> Differentiator<'g> {
        Differentiator {
            graph,
            cache: HashMap::new(),
        }
    }

    /// Partial derivative of `expr` with respect to the symbol `var`.
    pub fn derivative(&mut self, expr: ExprId, var: ExprId) -> GenResult<ExprId> {
        if self.graph.symbol_name(var).is_none() {
            return Err(GenerationError::NotASymbol {
                what: "differentiation variable".to_string(),
                expr: self.graph.display(var).to_string(),
            });
        }

        for id in self.graph.reachable(&[expr]) {
            if self.cache.contains_key(&(id, var)) {
                continue;
            }
            let d = self.node_derivative(id, var)?;
            self.cache.insert((id, var), d);
        }
        Ok(self.cache[&(expr, var)])
    }

    fn d(&self, id: ExprId, var: ExprId) -> ExprId {
        self.cache[&(id, var)]
    }

    fn is_zero(&self, id: ExprId) -> bool {
        self.graph.is_const(id, 0.0)
    }

    fn undefined(&self, id: ExprId, var: ExprId, reason: &'static str) -> GenerationError {
        GenerationError::UndefinedDerivative {
            expr: self.graph.display(id).to_string(),
            var: self.graph.display(var).to_string(),
            reason,
        }
    }

    /// Derivative of one node, operand derivatives are already cached.
    fn node_derivative(&mut self, id: ExprId, var: ExprId) -> GenResult<ExprId> {
        let node = self.graph.node(id);
        let ds: Vec<ExprId> = node.operands().map(|op| self.d(op, var)).collect();
        let zero: Vec<bool> = ds.iter().map(|d| self.is_zero(*d)).collect();

        match node {
            Node::Div(_, b) if self.graph.is_const(b, 0.0) => {
                return Err(self.undefined(id, var, "division by zero"));
            }
            Node::Pow(a, _) if !zero[1] => {
                if let Some(base) = self.graph.as_const(a) {
                    if base <= 0.0 {
                        return Err(self.undefined(id, var, "variable exponent of a non-positive base"));
                    }
                }
            }
            _ => {}
        }

        let g = &mut *self.graph;
        let d = match node {
            Node::Const(_) => g.zero(),
            Node::Symbol(_) => {
                if id == var {
                    g.one()
                } else {
                    g.zero()
                }
            }
            Node::Add(_, _) => g.add(ds[0], ds[1]),
            Node::Neg(_) => g.neg(ds[0]),
            Node::Mul(a, b) => {
                let l = g.mul(ds[0], b);
                let r = g.mul(a, ds[1]);
                g.add(l, r)
            }
            Node::Div(a, b) => {
                let (da, db) = (ds[0], ds[1]);
                if zero[1] {
                    g.div(da, b)
                } else {
                    // (a'b - ab') / b²
                    let bb = g.mul(b, b);
                    let adb = g.mul(a, db);
                    if zero[0] {
                        let q = g.div(adb, bb);
                        g.neg(q)
                    } else {
                        let dab = g.mul(da, b);
                        let num = g.sub(dab, adb);
                        g.div(num, bb)
                    }
                }
            }
            Node::Pow(a, b) => {
                let (da, db) = (ds[0], ds[1]);
                if zero[0] && zero[1] {
                    g.zero()
                } else if zero[1] {
                    // b a^(b-1) a'
                    let one = g.one();
                    let bm1 = g.sub(b, one);
                    let p = g.pow(a, bm1);
                    let bp = g.mul(b, p);
                    g.mul(bp, da)
                } else {
                    // a^b (b' log(a) + b a'/a)
                    let la = g.log(a);
                    let t1 = g.mul(db, la);
                    let ada = g.div(da, a);
                    let t2 = g.mul(b, ada);
                    let s = g.add(t1, t2);
                    g.mul(id, s)
                }
            }
            Node::Apply(_, _) if zero[0] => g.zero(),
            Node::Apply(func, a) => {
                let da = ds[0];
                match func {
                    Func::Exp => g.mul(id, da),
                    Func::Log => g.div(da, a),
                    Func::Sqrt => {
                        let two = g.constant(2.);
                        let den = g.mul(two, id);
                        g.div(da, den)
                    }
                    Func::Sin => {
                        let c = g.cos(a);
                        g.mul(c, da)
                    }
                    Func::Cos => {
                        let s = g.sin(a);
                        let sd = g.mul(s, da);
                        g.neg(sd)
                    }
                    Func::Tan => {
                        let one = g.one();
                        let tt = g.mul(id, id);
                        let sec2 = g.add(one, tt);
                        g.mul(da, sec2)
                    }
                    Func::Atan => {
                        let one = g.one();
                        let aa = g.mul(a, a);
                        let den = g.add(one, aa);
                        g.div(da, den)
                    }
                    Func::Abs => {
                        let s = g.sign(a);
                        g.mul(s, da)
                    }
                    Func::Sign | Func::Heaviside => g.zero(),
                }
            }
            Node::Min(a, b) => g.select(a, b, ds[0], ds[1]),
            Node::Max(a, b) => g.select(b, a, ds[0], ds[1]),
            Node::Select(a, b, _, _) => g.select(a, b, ds[2], ds[3]),
        };
        Ok(d)
    }
}

/// Jacobian `∂f/∂vars`, one row per entry of `f`.
pub fn jacobian(graph: &mut Graph, f: &[ExprId], vars: &[ExprId]) -> GenResult<Vec<Vec<ExprId>>> {
    let mut differentiator = Differentiator::new(graph);
    let mut rows = Vec::with_capacity(f.len());
    for (i, fi) in f.iter().enumerate() {
        let mut row = Vec::with_capacity(vars.len());
        for var in vars {
            let d = differentiator.derivative(*fi, *var)?;
            trace!("d f[{}] / d {} = {}", i, differentiator.graph.display(*var), differentiator.graph.display(d));
            row.push(d);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Number of entries of a Jacobian which are not the constant zero.
pub fn non_zeros(graph: &Graph, jacobian: &[Vec<ExprId>]) -> usize {
    jacobian
        .iter()
        .flatten()
        .filter(|d| !graph.is_const(**d, 0.0))
        .count()
}

/// Central finite difference Jacobian of `f` at `point`.
///
/// The step for each variable is `step * max(|x|, 1)`. Used to validate symbolic Jacobians away from
/// non-smooth points, or one-sided at them.
pub fn central_difference(
    graph: &Graph,
    f: &[ExprId],
    vars: &[ExprId],
    point: &HashMap<ExprId, f64>,
    step: f64,
) -> GenResult<DMatrix<f64>> {
    let mut J = DMatrix::zeros(f.len(), vars.len());
    let mut bindings = point.clone();
    for (j, var) in vars.iter().enumerate() {
        let x = match point.get(var) {
            Some(x) => *x,
            None => {
                return Err(GenerationError::UndeclaredSymbol {
                    symbol: graph.display(*var).to_string(),
                    context: "finite difference point".to_string(),
                })
            }
        };
        let h = step * x.abs().max(1.);
        bindings.insert(*var, x + h);
        let fp = graph.eval_many(f, &bindings)?;
        bindings.insert(*var, x - h);
        let fm = graph.eval_many(f, &bindings)?;
        bindings.insert(*var, x);
        for i in 0..f.len() {
            J[(i, j)] = (fp[i] - fm[i]) / (2. * h);
        }
    }
    Ok(J)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(pairs: &[(ExprId, f64)]) -> HashMap<ExprId, f64> {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn smooth_functions_match_finite_difference() {
        let mut g = Graph::new();
        let v = g.symbols("x y");
        let (x, y) = (v[0], v[1]);
        let sx = g.sin(x);
        let exy = g.mul(x, y);
        let e = g.exp(exy);
        let f0 = g.mul(sx, e);
        let at_ = g.atan(y);
        let one = g.one();
        let den = g.sub(one, exy);
        let f1 = g.div(at_, den);
        let p = g.powf(y, -1.5);
        let sq = g.sqrt(y);
        let lg = g.log(y);
        let c = g.cos(x);
        let t = g.tan(x);
        let f2a = g.add(p, sq);
        let f2b = g.mul(lg, c);
        let f2c = g.add(f2a, f2b);
        let f2 = g.add(f2c, t);
        let xy = g.pow(y, x);
        let f = [f0, f1, f2, xy];

        let J = jacobian(&mut g, &f, &v).unwrap();
        let point = at(&[(x, 0.3), (y, 1.7)]);
        let numeric = central_difference(&g, &f, &v, &point, 1e-6).unwrap();
        for i in 0..f.len() {
            for j in 0..v.len() {
                let symbolic = g.eval(J[i][j], &point).unwrap();
                approx::assert_relative_eq!(symbolic, numeric[(i, j)], max_relative = 1e-6, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn non_smooth_subgradients() {
        let mut g = Graph::new();
        let v = g.symbols("a b");
        let (a, b) = (v[0], v[1]);
        let abs_a = g.abs(a);
        let sign_a = g.sign(a);
        let step_a = g.heaviside(a);
        let three = g.constant(3.);
        let three_b = g.mul(three, b);
        let min_ab = g.min(a, three_b);
        let max_ab = g.max(a, three_b);
        let f = [abs_a, sign_a, step_a, min_ab, max_ab];
        let J = jacobian(&mut g, &f, &v).unwrap();

        // Sign and step derivatives vanish identically
        assert!(g.is_const(J[1][0], 0.0));
        assert!(g.is_const(J[2][0], 0.0));

        let at_zero = at(&[(a, 0.0), (b, 0.0)]);
        assert_eq!(g.eval(J[0][0], &at_zero).unwrap(), 0.0);
        // Ties select the first operand
        assert_eq!(g.eval(J[3][0], &at_zero).unwrap(), 1.0);
        assert_eq!(g.eval(J[3][1], &at_zero).unwrap(), 0.0);
        assert_eq!(g.eval(J[4][0], &at_zero).unwrap(), 1.0);

        let left = at(&[(a, -2.0), (b, 1.0)]);
        assert_eq!(g.eval(J[0][0], &left).unwrap(), -1.0);
        assert_eq!(g.eval(J[3][0], &left).unwrap(), 1.0);
        assert_eq!(g.eval(J[4][1], &left).unwrap(), 3.0);

        let right = at(&[(a, 2.0), (b, -1.0)]);
        assert_eq!(g.eval(J[3][1], &right).unwrap(), 3.0);
        assert_eq!(g.eval(J[4][0], &right).unwrap(), 1.0);
    }

    #[test]
    fn division_by_zero_fails() {
        let mut g = Graph::new();
        let x = g.symbol("x");
        let zero = g.sub(x, x);
        let bad = g.div(x, zero);
        let err = jacobian(&mut g, &[bad], &[x]).unwrap_err();
        assert!(matches!(err, GenerationError::UndefinedDerivative { reason: "division by zero", .. }));
    }

    #[test]
    fn variables_must_be_symbols() {
        let mut g = Graph::new();
        let x = g.symbol("x");
        let two_x = g.add(x, x);
        assert!(matches!(
            jacobian(&mut g, &[x], &[two_x]),
            Err(GenerationError::NotASymbol { .. })
        ));
    }

    #[test]
    fn shared_derivatives_are_cached() {
        let mut g = Graph::new();
        let x = g.symbol("x");
        let s = g.sin(x);
        let f0 = g.mul(s, s);
        let f1 = g.add(s, x);
        let J = jacobian(&mut g, &[f0, f1], &[x]).unwrap();
        assert_eq!(non_zeros(&g, &J), 2);
        let cos_x = g.cos(x);
        let one = g.one();
        assert_eq!(J[1][0], g.add(cos_x, one));
    }
}
