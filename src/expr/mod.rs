//! Symbolic expressions.
//!
//! Expressions are nodes of a [`Graph`] arena and are addressed by an [`ExprId`].
//! Nodes are immutable and structurally hashed: building the same expression twice yields the same id,
//! so structural equality is id equality and common sub-expressions are shared.
//!
//! Construction performs the light simplification needed for closed form derivatives to stay small:
//! constant folding, additive and multiplicative identities and canonical operand order of commutative operators.
//! None of these rewrites change the value computed in IEEE arithmetic for finite operands.
//!
//! Non-smooth primitives ([`Func::Abs`], [`Func::Sign`], [`Func::Heaviside`], min, max) are tagged variants.
//! Their forward evaluation lives in `eval` and their subgradient rules in [`crate::diff`].

use std::collections::HashMap;

use crate::error::{GenResult, GenerationError};

mod display;
mod eval;

pub use display::ExprDisplay;
pub use eval::{heaviside, max, min, select, sign};

/// Index of an expression node in a [`Graph`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Unary functions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Func {
    Exp,
    Log,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Atan,
    /// Absolute value, subgradient `sign(x)`.
    Abs,
    /// -1, 0 or 1. Derivative 0 everywhere.
    Sign,
    /// Unit step: 1 for positive, 0 for negative and 1/2 at zero. Derivative 0 everywhere.
    Heaviside,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Sqrt => "sqrt",
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Atan => "atan",
            Func::Abs => "abs",
            Func::Sign => "sign",
            Func::Heaviside => "heaviside",
        }
    }
}

/// An expression node.
///
/// Constants are stored as their bit pattern so nodes can be hashed, `-0.0` is normalised to `0.0`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Const(u64),
    Symbol(u32),
    Add(ExprId, ExprId),
    Mul(ExprId, ExprId),
    Div(ExprId, ExprId),
    Pow(ExprId, ExprId),
    Neg(ExprId),
    Apply(Func, ExprId),
    Min(ExprId, ExprId),
    Max(ExprId, ExprId),
    /// `if a <= b { le } else { gt }`
    Select(ExprId, ExprId, ExprId, ExprId),
}

impl Node {
    /// Operands in evaluation order.
    pub fn operands(&self) -> impl Iterator<Item = ExprId> {
        let z = ExprId(0);
        let (ops, n) = match *self {
            Node::Const(_) | Node::Symbol(_) => ([z; 4], 0),
            Node::Neg(a) | Node::Apply(_, a) => ([a, z, z, z], 1),
            Node::Add(a, b)
            | Node::Mul(a, b)
            | Node::Div(a, b)
            | Node::Pow(a, b)
            | Node::Min(a, b)
            | Node::Max(a, b) => ([a, b, z, z], 2),
            Node::Select(a, b, le, gt) => ([a, b, le, gt], 4),
        };
        IntoIterator::into_iter(ops).take(n)
    }
}

/// Arena of structurally hashed expression nodes.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    dedup: HashMap<Node, ExprId>,
    symbols: Vec<String>,
}

impl Graph {
    pub fn new() -> Graph {
        Graph::default()
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: ExprId) -> Node {
        self.nodes[id.index()]
    }

    fn intern(&mut self, node: Node) -> ExprId {
        if let Some(id) = self.dedup.get(&node) {
            return *id;
        }
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.dedup.insert(node, id);
        id
    }

    /// A named real variable. The same name always yields the same expression.
    pub fn symbol(&mut self, name: &str) -> ExprId {
        let index = match self.symbols.iter().position(|s| s == name) {
            Some(index) => index,
            None => {
                self.symbols.push(name.to_string());
                self.symbols.len() - 1
            }
        };
        self.intern(Node::Symbol(index as u32))
    }

    /// Several symbols from a comma or whitespace separated list of names.
    pub fn symbols(&mut self, names: &str) -> Vec<ExprId> {
        names
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|name| !name.is_empty())
            .map(|name| self.symbol(name))
            .collect()
    }

    pub fn symbol_name(&self, id: ExprId) -> Option<&str> {
        match self.node(id) {
            Node::Symbol(s) => Some(&self.symbols[s as usize]),
            _ => None,
        }
    }

    pub fn constant(&mut self, value: f64) -> ExprId {
        let value = if value == 0.0 { 0.0 } else { value };
        self.intern(Node::Const(value.to_bits()))
    }

    pub fn zero(&mut self) -> ExprId {
        self.constant(0.0)
    }

    pub fn one(&mut self) -> ExprId {
        self.constant(1.0)
    }

    pub fn as_const(&self, id: ExprId) -> Option<f64> {
        match self.node(id) {
            Node::Const(bits) => Some(f64::from_bits(bits)),
            _ => None,
        }
    }

    pub fn is_const(&self, id: ExprId, value: f64) -> bool {
        self.as_const(id) == Some(value)
    }

    pub fn add(&mut self, a: ExprId, b: ExprId) -> ExprId {
        match (self.as_const(a), self.as_const(b)) {
            (Some(x), Some(y)) => return self.constant(x + y),
            (Some(x), _) if x == 0.0 => return b,
            (_, Some(y)) if y == 0.0 => return a,
            _ => {}
        }
        if self.node(b) == Node::Neg(a) || self.node(a) == Node::Neg(b) {
            return self.zero();
        }
        self.intern(Node::Add(a.min(b), a.max(b)))
    }

    pub fn sub(&mut self, a: ExprId, b: ExprId) -> ExprId {
        let nb = self.neg(b);
        self.add(a, nb)
    }

    pub fn neg(&mut self, a: ExprId) -> ExprId {
        if let Some(x) = self.as_const(a) {
            return self.constant(-x);
        }
        match self.node(a) {
            Node::Neg(inner) => inner,
            _ => self.intern(Node::Neg(a)),
        }
    }

    pub fn mul(&mut self, a: ExprId, b: ExprId) -> ExprId {
        match (self.as_const(a), self.as_const(b)) {
            (Some(x), Some(y)) => return self.constant(x * y),
            (Some(x), _) | (_, Some(x)) if x == 0.0 => return self.zero(),
            (Some(x), _) if x == 1.0 => return b,
            (_, Some(y)) if y == 1.0 => return a,
            (Some(x), _) if x == -1.0 => return self.neg(b),
            (_, Some(y)) if y == -1.0 => return self.neg(a),
            _ => {}
        }
        self.intern(Node::Mul(a.min(b), a.max(b)))
    }

    /// Division. A constant zero denominator is kept so it can be reported by [`Graph::check_defined`].
    pub fn div(&mut self, a: ExprId, b: ExprId) -> ExprId {
        match (self.as_const(a), self.as_const(b)) {
            (_, Some(y)) if y == 0.0 => {}
            (Some(x), Some(y)) => return self.constant(x / y),
            (Some(x), _) if x == 0.0 => return self.zero(),
            (_, Some(y)) if y == 1.0 => return a,
            (_, Some(y)) if y == -1.0 => return self.neg(a),
            _ => {}
        }
        self.intern(Node::Div(a, b))
    }

    pub fn pow(&mut self, a: ExprId, b: ExprId) -> ExprId {
        match (self.as_const(a), self.as_const(b)) {
            (_, Some(y)) if y == 0.0 => return self.one(),
            (_, Some(y)) if y == 1.0 => return a,
            (Some(x), _) if x == 1.0 => return self.one(),
            (Some(x), Some(y)) => {
                let v = x.powf(y);
                if v.is_finite() {
                    return self.constant(v);
                }
            }
            _ => {}
        }
        self.intern(Node::Pow(a, b))
    }

    pub fn powf(&mut self, a: ExprId, exponent: f64) -> ExprId {
        let b = self.constant(exponent);
        self.pow(a, b)
    }

    pub fn apply(&mut self, func: Func, a: ExprId) -> ExprId {
        if let Some(x) = self.as_const(a) {
            let v = func.eval(x);
            if v.is_finite() {
                return self.constant(v);
            }
        }
        match (func, self.node(a)) {
            (Func::Abs, Node::Apply(Func::Abs, _)) | (Func::Sign, Node::Apply(Func::Sign, _)) => a,
            (Func::Abs, Node::Neg(inner)) => self.apply(Func::Abs, inner),
            _ => self.intern(Node::Apply(func, a)),
        }
    }

    pub fn exp(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Exp, a)
    }

    pub fn log(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Log, a)
    }

    pub fn sqrt(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Sqrt, a)
    }

    pub fn sin(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Sin, a)
    }

    pub fn cos(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Cos, a)
    }

    pub fn tan(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Tan, a)
    }

    pub fn atan(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Atan, a)
    }

    pub fn abs(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Abs, a)
    }

    pub fn sign(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Sign, a)
    }

    pub fn heaviside(&mut self, a: ExprId) -> ExprId {
        self.apply(Func::Heaviside, a)
    }

    pub fn min(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if a == b {
            return a;
        }
        if let (Some(x), Some(y)) = (self.as_const(a), self.as_const(b)) {
            return self.constant(min(x, y));
        }
        self.intern(Node::Min(a, b))
    }

    pub fn max(&mut self, a: ExprId, b: ExprId) -> ExprId {
        if a == b {
            return a;
        }
        if let (Some(x), Some(y)) = (self.as_const(a), self.as_const(b)) {
            return self.constant(max(x, y));
        }
        self.intern(Node::Max(a, b))
    }

    /// `le` where `a <= b`, otherwise `gt`.
    pub fn select(&mut self, a: ExprId, b: ExprId, le: ExprId, gt: ExprId) -> ExprId {
        if le == gt {
            return le;
        }
        if let (Some(x), Some(y)) = (self.as_const(a), self.as_const(b)) {
            return if x <= y { le } else { gt };
        }
        self.intern(Node::Select(a, b, le, gt))
    }

    /// All nodes reachable from `roots`, operands before the nodes using them.
    ///
    /// The order is deterministic: depth first, operands in evaluation order, roots in the given order.
    pub fn reachable(&self, roots: &[ExprId]) -> Vec<ExprId> {
        let mut visited = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut stack: Vec<(ExprId, bool)> = Vec::new();
        for root in roots {
            stack.push((*root, false));
            while let Some((id, expanded)) = stack.pop() {
                if visited[id.index()] {
                    continue;
                }
                if expanded {
                    visited[id.index()] = true;
                    order.push(id);
                    continue;
                }
                stack.push((id, true));
                let operands: Vec<ExprId> = self.node(id).operands().collect();
                for op in operands.into_iter().rev() {
                    if !visited[op.index()] {
                        stack.push((op, false));
                    }
                }
            }
        }
        order
    }

    /// Symbols referenced by `roots`, in the order of [`Graph::reachable`].
    ///
    /// Operands of `Add` and `Mul` are stored in canonical order, so this is not the order the symbols were written in.
    pub fn free_symbols(&self, roots: &[ExprId]) -> Vec<ExprId> {
        self.reachable(roots)
            .into_iter()
            .filter(|id| matches!(self.node(*id), Node::Symbol(_)))
            .collect()
    }

    /// Checks that every symbol referenced by `roots` is in `declared`.
    pub fn check_declared(&self, roots: &[ExprId], declared: &[ExprId], context: &str) -> GenResult<()> {
        match self.free_symbols(roots).into_iter().find(|s| !declared.contains(s)) {
            Some(s) => Err(GenerationError::UndeclaredSymbol {
                symbol: self.display(s).to_string(),
                context: context.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Rejects expressions which are undefined wherever they are evaluated.
    ///
    /// Division by constant zero, logarithm of a non-positive constant, square root of a negative constant,
    /// zero to a negative power and non-finite constants are reported.
    pub fn check_defined(&self, roots: &[ExprId], context: &str) -> GenResult<()> {
        for id in self.reachable(roots) {
            let reason = match self.node(id) {
                Node::Const(bits) if !f64::from_bits(bits).is_finite() => Some("non-finite constant"),
                Node::Div(_, b) if self.is_const(b, 0.0) => Some("division by zero"),
                Node::Apply(Func::Log, a) => match self.as_const(a) {
                    Some(x) if x <= 0.0 => Some("logarithm of a non-positive constant"),
                    _ => None,
                },
                Node::Apply(Func::Sqrt, a) => match self.as_const(a) {
                    Some(x) if x < 0.0 => Some("square root of a negative constant"),
                    _ => None,
                },
                Node::Pow(a, b) => match (self.as_const(a), self.as_const(b)) {
                    (Some(x), Some(y)) if x == 0.0 && y < 0.0 => Some("zero to a negative power"),
                    (Some(x), Some(y)) if x < 0.0 && y.fract() != 0.0 => {
                        Some("fractional power of a negative constant")
                    }
                    _ => None,
                },
                _ => None,
            };
            if let Some(reason) = reason {
                return Err(GenerationError::UndefinedExpression {
                    expr: self.display(id).to_string(),
                    context: context.to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_sharing() {
        let mut g = Graph::new();
        let x = g.symbol("x");
        let y = g.symbol("y");
        let a = g.mul(x, y);
        let b = g.mul(y, x);
        assert_eq!(a, b);
        assert_eq!(g.symbol("x"), x);

        let s1 = g.sin(a);
        let s2 = g.sin(b);
        assert_eq!(s1, s2);
    }

    #[test]
    fn identities_fold() {
        let mut g = Graph::new();
        let x = g.symbol("x");
        let zero = g.zero();
        let one = g.one();
        assert_eq!(g.add(x, zero), x);
        assert_eq!(g.mul(x, one), x);
        assert_eq!(g.mul(zero, x), zero);
        assert_eq!(g.sub(x, x), zero);
        let nx = g.neg(x);
        assert_eq!(g.neg(nx), x);
        let two = g.constant(2.);
        let three = g.constant(3.);
        let six = g.mul(two, three);
        assert_eq!(g.as_const(six), Some(6.));
        assert_eq!(g.powf(x, 1.), x);
        assert_eq!(g.powf(x, 0.), one);
        let m = g.constant(-0.0);
        assert_eq!(m, zero);
    }

    #[test]
    fn division_by_zero_is_kept_and_rejected() {
        let mut g = Graph::new();
        let x = g.symbol("x");
        let zero = g.sub(x, x);
        let one = g.one();
        let bad = g.div(one, zero);
        assert!(matches!(g.node(bad), Node::Div(_, _)));
        let e = g.check_defined(&[bad], "test").unwrap_err();
        assert!(matches!(e, GenerationError::UndefinedExpression { reason: "division by zero", .. }));

        let fine = g.div(one, x);
        assert!(g.check_defined(&[fine], "test").is_ok());
    }

    #[test]
    fn reachable_orders_operands_first() {
        let mut g = Graph::new();
        let v = g.symbols("a, b c");
        let ab = g.add(v[0], v[1]);
        let abc = g.mul(ab, v[2]);
        let order = g.reachable(&[abc]);
        let pos = |id| order.iter().position(|o| *o == id).unwrap();
        assert!(pos(v[0]) < pos(ab));
        assert!(pos(ab) < pos(abc));
        assert_eq!(order.len(), 5);
        // `c` was created before `a + b`, so it is the first operand of the product
        assert_eq!(g.node(abc), Node::Mul(v[2], ab));
        assert_eq!(g.free_symbols(&[abc]), vec![v[2], v[0], v[1]]);
    }

    #[test]
    fn undeclared_symbol() {
        let mut g = Graph::new();
        let x = g.symbol("x");
        let y = g.symbol("y");
        let e = g.add(x, y);
        let err = g.check_declared(&[e], &[x], "transition").unwrap_err();
        assert_eq!(
            err,
            GenerationError::UndeclaredSymbol {
                symbol: "y".to_string(),
                context: "transition".to_string()
            }
        );
    }
}
