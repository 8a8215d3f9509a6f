//! Infix printing of expressions.

use std::fmt;

use super::{ExprId, Graph, Node};

const ADD: u8 = 1;
const MUL: u8 = 2;
const NEG: u8 = 3;
const POW: u8 = 4;
const ATOM: u8 = 5;

/// Displays an expression in infix form.
pub struct ExprDisplay<'a> {
    graph: &'a Graph,
    id: ExprId,
}

impl Graph {
    pub fn display(&self, id: ExprId) -> ExprDisplay<'_> {
        ExprDisplay { graph: self, id }
    }
}

impl<'a> ExprDisplay<'a> {
    fn precedence(&self, id: ExprId) -> u8 {
        match self.graph.node(id) {
            Node::Const(bits) if f64::from_bits(bits) < 0.0 => NEG,
            Node::Add(_, _) => ADD,
            Node::Mul(_, _) | Node::Div(_, _) => MUL,
            Node::Neg(_) => NEG,
            Node::Pow(_, _) => POW,
            _ => ATOM,
        }
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, id: ExprId, min_precedence: u8) -> fmt::Result {
        let parens = self.precedence(id) < min_precedence;
        if parens {
            write!(f, "(")?;
        }
        match self.graph.node(id) {
            Node::Const(bits) => write!(f, "{}", f64::from_bits(bits))?,
            Node::Symbol(s) => write!(f, "{}", self.graph.symbols[s as usize])?,
            Node::Add(a, b) => {
                self.write(f, a, ADD)?;
                match self.graph.node(b) {
                    Node::Neg(nb) => {
                        write!(f, " - ")?;
                        self.write(f, nb, MUL)?;
                    }
                    _ => {
                        write!(f, " + ")?;
                        self.write(f, b, MUL)?;
                    }
                }
            }
            Node::Mul(a, b) => {
                self.write(f, a, MUL)?;
                write!(f, "*")?;
                self.write(f, b, POW)?;
            }
            Node::Div(a, b) => {
                self.write(f, a, MUL)?;
                write!(f, "/")?;
                self.write(f, b, POW)?;
            }
            Node::Pow(a, b) => {
                self.write(f, a, ATOM)?;
                write!(f, "**")?;
                self.write(f, b, POW)?;
            }
            Node::Neg(a) => {
                write!(f, "-")?;
                self.write(f, a, POW)?;
            }
            Node::Apply(func, a) => {
                write!(f, "{}(", func.name())?;
                self.write(f, a, 0)?;
                write!(f, ")")?;
            }
            Node::Min(a, b) | Node::Max(a, b) => {
                let name = if let Node::Min(_, _) = self.graph.node(id) { "min" } else { "max" };
                write!(f, "{}(", name)?;
                self.write(f, a, 0)?;
                write!(f, ", ")?;
                self.write(f, b, 0)?;
                write!(f, ")")?;
            }
            Node::Select(a, b, le, gt) => {
                write!(f, "select(")?;
                self.write(f, a, 0)?;
                write!(f, " <= ")?;
                self.write(f, b, 0)?;
                write!(f, ", ")?;
                self.write(f, le, 0)?;
                write!(f, ", ")?;
                self.write(f, gt, 0)?;
                write!(f, ")")?;
            }
        }
        if parens {
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl<'a> fmt::Display for ExprDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write(f, self.id, 0)
    }
}
