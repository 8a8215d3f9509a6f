//! Rust source rendering of tapes.
//!
//! Each tape becomes a free standing function over flat `f64` arrays, one `let` per instruction.
//! The rendered code performs exactly the operations of the tape in the same order.

use std::fmt::Write;

use super::tape::{Instr, Tape};
use crate::expr::Func;

/// A literal which reads back as the same `f64`.
pub fn literal(v: f64) -> String {
    if v.is_nan() {
        "f64::NAN".to_string()
    } else if v == f64::INFINITY {
        "f64::INFINITY".to_string()
    } else if v == f64::NEG_INFINITY {
        "f64::NEG_INFINITY".to_string()
    } else {
        format!("{:?}", v)
    }
}

fn apply(func: Func, a: &str) -> String {
    match func {
        Func::Exp => format!("{}.exp()", a),
        Func::Log => format!("{}.ln()", a),
        Func::Sqrt => format!("{}.sqrt()", a),
        Func::Sin => format!("{}.sin()", a),
        Func::Cos => format!("{}.cos()", a),
        Func::Tan => format!("{}.tan()", a),
        Func::Atan => format!("{}.atan()", a),
        Func::Abs => format!("{}.abs()", a),
        Func::Sign => format!(
            "if {a} > 0.0 {{ 1.0 }} else if {a} < 0.0 {{ -1.0 }} else {{ {a} * 0.0 }}",
            a = a
        ),
        Func::Heaviside => format!(
            "if {a} > 0.0 {{ 1.0 }} else if {a} < 0.0 {{ 0.0 }} else {{ {a} * 0.0 + 0.5 }}",
            a = a
        ),
    }
}

/// Renders `tape` as `pub fn name(inp: &[f64; N], out: &mut [f64; M])`.
///
/// `input_names` and `output_names` label the array elements in the doc comment.
pub fn render(name: &str, tape: &Tape, input_names: &[String], output_names: &[String]) -> String {
    let mut src = String::new();
    let t = |slot: usize| format!("t{}", slot);

    // Writing to a String never fails
    let _ = writeln!(src, "/// Inputs:");
    for (i, input) in input_names.iter().enumerate() {
        let _ = writeln!(src, "/// - `inp[{}]`: {}", i, input);
    }
    let _ = writeln!(src, "///");
    let _ = writeln!(src, "/// Outputs:");
    for (o, output) in output_names.iter().enumerate() {
        let _ = writeln!(src, "/// - `out[{}]`: {}", o, output);
    }
    let _ = writeln!(
        src,
        "#[allow(unused_variables, clippy::all)]\npub fn {}(inp: &[f64; {}], out: &mut [f64; {}]) {{",
        name,
        tape.input_len(),
        tape.output_len()
    );

    for (slot, instr) in tape.instructions().iter().enumerate() {
        let rhs = match *instr {
            Instr::Const(c) => literal(c),
            Instr::Input(i) => format!("inp[{}]", i),
            Instr::Add(a, b) => format!("{} + {}", t(a), t(b)),
            Instr::Mul(a, b) => format!("{} * {}", t(a), t(b)),
            Instr::Div(a, b) => format!("{} / {}", t(a), t(b)),
            Instr::Pow(a, b) => format!("{}.powf({})", t(a), t(b)),
            Instr::Neg(a) => format!("-{}", t(a)),
            Instr::Apply(func, a) => apply(func, &t(a)),
            Instr::Min(a, b) => format!("if {a} <= {b} {{ {a} }} else {{ {b} }}", a = t(a), b = t(b)),
            Instr::Max(a, b) => format!("if {a} >= {b} {{ {a} }} else {{ {b} }}", a = t(a), b = t(b)),
            Instr::Select(a, b, le, gt) => format!(
                "if {} <= {} {{ {} }} else {{ {} }}",
                t(a),
                t(b),
                t(le),
                t(gt)
            ),
        };
        let _ = writeln!(src, "    let {}: f64 = {};", t(slot), rhs);
    }
    for (o, slot) in tape.output_slots().iter().enumerate() {
        let _ = writeln!(src, "    out[{}] = {};", o, t(*slot));
    }
    let _ = writeln!(src, "}}");

    src
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Graph;

    #[test]
    fn literals_round_trip() {
        for v in &[0.1, 1e-5, 4.0, -60.0, 117.0, 2.5e300] {
            assert_eq!(literal(*v).parse::<f64>().unwrap(), *v);
        }
        assert_eq!(literal(f64::NAN), "f64::NAN");
    }

    #[test]
    fn renders_function() {
        let mut g = Graph::new();
        let v = g.symbols("x y");
        let m = g.min(v[0], v[1]);
        let s = g.sign(m);
        let tape = Tape::lower(&g, &v, &[s, v[1]], "test").unwrap();
        let src = render(
            "demo_terms",
            &tape,
            &["x".to_string(), "y".to_string()],
            &["sign".to_string(), "y".to_string()],
        );
        assert!(src.contains("pub fn demo_terms(inp: &[f64; 2], out: &mut [f64; 2]) {"));
        assert!(src.contains("let t2: f64 = if t0 <= t1 { t0 } else { t1 };"));
        assert!(src.contains("out[1] = t1;"));
        assert!(src.contains("/// - `inp[0]`: x"));
    }
}
