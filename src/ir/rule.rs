use itertools::Itertools;

use crate::error::{IrErrorKind, IrResult};
use crate::ir::expr::{Expression, VarName};

pub type RelationName = String;

/// A relation applied to positional arguments, e.g. `Foo(a, _, 3)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    relation: RelationName,
    args: Vec<Expression>,
}

impl Atom {
    pub fn new(relation: impl Into<RelationName>, args: Vec<Expression>) -> IrResult<Self> {
        let relation = relation.into();
        if relation.is_empty() {
            return Err(IrErrorKind::NullnessViolation {
                what: "relation name",
            }
            .into());
        }
        Ok(Self { relation, args })
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn args(&self) -> &[Expression] {
        &self.args
    }

    pub fn to_ddlog(&self) -> String {
        format!(
            "{}({})",
            self.relation,
            self.args.iter().map(Expression::to_ddlog).join(", ")
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RuleBodyTerm {
    Atom(Atom),
    Negated(Atom),
    Filter(Expression),
    Assign { var: VarName, value: Expression },
}

impl RuleBodyTerm {
    pub fn atom(atom: Atom) -> Self {
        RuleBodyTerm::Atom(atom)
    }

    pub fn negated(atom: Atom) -> Self {
        RuleBodyTerm::Negated(atom)
    }

    /// A filter must be a definite truth value, so nullable `bool` is
    /// rejected just like for conditionals.
    pub fn filter(condition: Expression) -> IrResult<Self> {
        if !condition.ty().is_bool() {
            return Err(IrErrorKind::InvalidConditionType {
                context: "filter",
                found: condition.ty().clone(),
            }
            .into());
        }
        Ok(RuleBodyTerm::Filter(condition))
    }

    pub fn assign(var: impl Into<VarName>, value: Expression) -> IrResult<Self> {
        let var = var.into();
        if var.is_empty() {
            return Err(IrErrorKind::NullnessViolation {
                what: "variable name",
            }
            .into());
        }
        Ok(RuleBodyTerm::Assign { var, value })
    }

    pub fn to_ddlog(&self) -> String {
        match self {
            RuleBodyTerm::Atom(atom) => atom.to_ddlog(),
            RuleBodyTerm::Negated(atom) => format!("not {}", atom.to_ddlog()),
            RuleBodyTerm::Filter(condition) => condition.to_ddlog(),
            RuleBodyTerm::Assign { var, value } => format!("var {} = {}", var, value.to_ddlog()),
        }
    }
}

/// `head :- body.`; with an empty body the rule is a fact.
#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    head: Atom,
    body: Vec<RuleBodyTerm>,
}

impl Rule {
    pub fn new(head: Atom, body: Vec<RuleBodyTerm>) -> Self {
        Self { head, body }
    }

    pub fn with_term(head: Atom, term: RuleBodyTerm) -> Self {
        Self::new(head, vec![term])
    }

    pub fn fact(head: Atom) -> Self {
        Self::new(head, vec![])
    }

    pub fn head(&self) -> &Atom {
        &self.head
    }

    pub fn body(&self) -> &[RuleBodyTerm] {
        &self.body
    }

    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    pub fn to_ddlog(&self) -> String {
        let mut s = self.head.to_ddlog();
        if !self.body.is_empty() {
            s.push_str(" :- ");
            s.push_str(&self.body.iter().map(RuleBodyTerm::to_ddlog).join(","));
        }
        s.push('.');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IrErrorKind;
    use crate::ir::expr::BinaryOp;
    use crate::types::Type;

    fn atom(relation: &str, var: &str) -> Atom {
        Atom::new(relation, vec![Expression::var(var, Type::bigint()).unwrap()]).unwrap()
    }

    #[test]
    fn test_fact() {
        let rule = Rule::fact(atom("R", "x"));
        assert!(rule.is_fact());
        assert_eq!(rule.to_ddlog(), "R(x).");
    }

    #[test]
    fn test_rule_with_body() {
        let rule = Rule::new(
            atom("R", "x"),
            vec![
                RuleBodyTerm::atom(atom("A", "x")),
                RuleBodyTerm::atom(atom("B", "x")),
            ],
        );
        assert!(!rule.is_fact());
        assert_eq!(rule.to_ddlog(), "R(x) :- A(x),B(x).");
    }

    #[test]
    fn test_body_order_is_insertion_order() {
        let x = Expression::var("x", Type::bigint()).unwrap();
        let positive = Expression::binary(
            BinaryOp::Gt,
            x,
            Expression::int_literal(0, Type::bigint()).unwrap(),
        )
        .unwrap();
        let rule = Rule::new(
            atom("R", "x"),
            vec![
                RuleBodyTerm::negated(atom("B", "x")),
                RuleBodyTerm::filter(positive).unwrap(),
                RuleBodyTerm::atom(atom("A", "x")),
            ],
        );
        assert_eq!(rule.to_ddlog(), "R(x) :- not B(x),(x > 0),A(x).");
    }

    #[test]
    fn test_single_term_and_assignment() {
        let doubled = Expression::binary(
            BinaryOp::Mul,
            Expression::var("x", Type::bigint()).unwrap(),
            Expression::int_literal(2, Type::bigint()).unwrap(),
        )
        .unwrap();
        let rule = Rule::with_term(
            atom("R", "y"),
            RuleBodyTerm::assign("y", doubled).unwrap(),
        );
        assert_eq!(rule.body().len(), 1);
        assert_eq!(rule.to_ddlog(), "R(y) :- var y = (x * 2).");
    }

    #[test]
    fn test_atom_arguments() {
        let atom = Atom::new(
            "Foo",
            vec![
                Expression::var("a", Type::string()).unwrap(),
                Expression::wildcard(Type::bigint()),
                Expression::string_literal("z"),
            ],
        )
        .unwrap();
        assert_eq!(atom.relation(), "Foo");
        assert_eq!(atom.args().len(), 3);
        assert_eq!(atom.to_ddlog(), "Foo(a, _, \"z\")");

        let err = Atom::new("", vec![]).unwrap_err();
        assert_eq!(
            err.kind(),
            &IrErrorKind::NullnessViolation {
                what: "relation name"
            }
        );
    }

    #[test]
    fn test_filter_requires_definite_bool() {
        let err =
            RuleBodyTerm::filter(Expression::var("b", Type::bool().nullable()).unwrap())
                .unwrap_err();
        assert_eq!(
            err.kind(),
            &IrErrorKind::InvalidConditionType {
                context: "filter",
                found: Type::bool().nullable(),
            }
        );
        assert!(RuleBodyTerm::filter(Expression::string_literal("x")).is_err());
    }

    #[test]
    fn test_conditional_inside_rule() {
        let label = Expression::if_then_else(
            Expression::var("big", Type::bool()).unwrap(),
            Expression::string_literal("big"),
            Some(Expression::string_literal("small")),
        )
        .unwrap();
        let rule = Rule::with_term(
            Atom::new("Label", vec![label]).unwrap(),
            RuleBodyTerm::atom(
                Atom::new("Size", vec![Expression::var("big", Type::bool()).unwrap()]).unwrap(),
            ),
        );
        assert_eq!(
            rule.to_ddlog(),
            "Label(if big {\n\"big\"} else {\n\"small\"}) :- Size(big)."
        );
    }
}
