//! The scalar expression mini-language used inside filter predicates,
//! projection assignments, join conditions and aggregate specifications.
//!
//! Determinism is first-class (spec §4.1): a [`Expr::Call`] carries whether
//! the function it invokes is pure. Non-deterministic expressions are
//! excluded from common-predicate extraction, OR/AND distribution, and any
//! rewrite that would duplicate evaluation (spec §8 scenario 3).

use crate::symbol::SymbolId;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Int64(i64),
    Double(f64),
    String(String),
    Null,
}

impl Hash for Literal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Literal::Boolean(b) => {
                0u8.hash(state);
                b.hash(state);
            }
            Literal::Int64(i) => {
                1u8.hash(state);
                i.hash(state);
            }
            Literal::Double(d) => {
                2u8.hash(state);
                d.to_bits().hash(state);
            }
            Literal::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            Literal::Null => 4u8.hash(state),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq, Hash)]
pub enum Expr {
    Symbol(SymbolId),
    Literal(Literal),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// A function call. `deterministic` is `false` for things like
    /// `rand()`/`current_timestamp()` that must not be evaluated more than
    /// once per row or reordered across a rewrite.
    Call {
        function: String,
        args: Vec<Expr>,
        deterministic: bool,
    },
}

impl Expr {
    pub fn symbol(id: SymbolId) -> Expr {
        Expr::Symbol(id)
    }

    pub fn boolean(b: bool) -> Expr {
        Expr::Literal(Literal::Boolean(b))
    }

    pub fn eq(left: Expr, right: Expr) -> Expr {
        Expr::Compare {
            op: CompareOp::Eq,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        let mut flat = Vec::new();
        for e in exprs {
            match e {
                Expr::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            1 => flat.into_iter().next().unwrap(),
            _ => Expr::And(flat),
        }
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        let mut flat = Vec::new();
        for e in exprs {
            match e {
                Expr::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            1 => flat.into_iter().next().unwrap(),
            _ => Expr::Or(flat),
        }
    }

    /// Whether this expression is pure: same inputs always produce the same
    /// output, with no side effects. An expression is non-deterministic if
    /// any sub-expression is.
    pub fn is_deterministic(&self) -> bool {
        match self {
            Expr::Symbol(_) | Expr::Literal(_) => true,
            Expr::Compare { left, right, .. } => left.is_deterministic() && right.is_deterministic(),
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().all(Expr::is_deterministic),
            Expr::Not(inner) => inner.is_deterministic(),
            Expr::Call {
                deterministic,
                args,
                ..
            } => *deterministic && args.iter().all(Expr::is_deterministic),
        }
    }

    /// Every symbol referenced anywhere in this expression tree, used to
    /// check invariant 1 of spec §3 (symbol scoping).
    pub fn referenced_symbols(&self, out: &mut Vec<SymbolId>) {
        match self {
            Expr::Symbol(id) => out.push(*id),
            Expr::Literal(_) => {}
            Expr::Compare { left, right, .. } => {
                left.referenced_symbols(out);
                right.referenced_symbols(out);
            }
            Expr::And(exprs) | Expr::Or(exprs) => {
                exprs.iter().for_each(|e| e.referenced_symbols(out))
            }
            Expr::Not(inner) => inner.referenced_symbols(out),
            Expr::Call { args, .. } => args.iter().for_each(|e| e.referenced_symbols(out)),
        }
    }

    /// Splits a conjunction into its top-level conjuncts, flattening nested
    /// `And`s. Non-conjunctions are returned as a single-element list.
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::And(exprs) => exprs.iter().collect(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Symbol(id) => write!(f, "{id}"),
            Expr::Literal(Literal::Boolean(b)) => write!(f, "{b}"),
            Expr::Literal(Literal::Int64(i)) => write!(f, "{i}"),
            Expr::Literal(Literal::Double(d)) => write!(f, "{d}"),
            Expr::Literal(Literal::String(s)) => write!(f, "'{s}'"),
            Expr::Literal(Literal::Null) => write!(f, "NULL"),
            Expr::Compare { op, left, right } => write!(f, "({left} {op:?} {right})"),
            Expr::And(exprs) => {
                let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(" AND "))
            }
            Expr::Or(exprs) => {
                let parts: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(" OR "))
            }
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::Call {
                function, args, ..
            } => {
                let parts: Vec<String> = args.iter().map(|e| e.to_string()).collect();
                write!(f, "{function}({})", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rand_call() -> Expr {
        Expr::Call {
            function: "rand".to_string(),
            args: vec![],
            deterministic: false,
        }
    }

    #[test]
    fn non_deterministic_call_poisons_containing_expr() {
        let e = Expr::and(vec![rand_call(), Expr::boolean(true)]);
        assert!(!e.is_deterministic());
    }

    #[test]
    fn and_flattens_nested_conjunctions() {
        let e = Expr::and(vec![
            Expr::and(vec![Expr::boolean(true), Expr::boolean(false)]),
            Expr::boolean(true),
        ]);
        assert_eq!(e.conjuncts().len(), 3);
    }
}
