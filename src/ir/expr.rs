use itertools::Itertools;
use num_bigint::BigInt;

use crate::error::{IrErrorKind, IrResult};
use crate::types::{check_compatible_in, Type};

pub type VarName = String;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Int(BigInt),
    String(String),
    Null,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Add,
    Sub,
    Mul,
    Concat,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Concat => "++",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Neq
                | BinaryOp::Lt
                | BinaryOp::Lte
                | BinaryOp::Gt
                | BinaryOp::Gte
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Var(VarName),
    Literal(Literal),
    Wildcard,
    IfThenElse {
        cond: Box<Expression>,
        then: Box<Expression>,
        otherwise: Option<Box<Expression>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Not(Box<Expression>),
    IsNull(Box<Expression>),
    Some(Box<Expression>),
    Tuple(Vec<Expression>),
}

/// A typed expression node. The fields are private: the only way to obtain
/// one is through a constructor that validated it.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    kind: ExprKind,
    ty: Type,
}

fn expect_bool(op: &'static str, operand: &Expression) -> IrResult<()> {
    if operand.ty.is_bool() {
        Ok(())
    } else {
        Err(IrErrorKind::InvalidOperandType {
            op,
            found: operand.ty.clone(),
        }
        .into())
    }
}

impl Expression {
    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn var(name: impl Into<VarName>, ty: Type) -> IrResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(IrErrorKind::NullnessViolation {
                what: "variable name",
            }
            .into());
        }
        Ok(Self {
            kind: ExprKind::Var(name),
            ty,
        })
    }

    pub fn bool_literal(value: bool) -> Self {
        Self {
            kind: ExprKind::Literal(Literal::Bool(value)),
            ty: Type::bool(),
        }
    }

    pub fn int_literal(value: impl Into<BigInt>, ty: Type) -> IrResult<Self> {
        if !ty.is_integral() || ty.is_nullable() {
            return Err(IrErrorKind::InvalidOperandType {
                op: "integer literal",
                found: ty,
            }
            .into());
        }
        let value = value.into();
        if let Some((min, max)) = ty.integer_bounds() {
            if value < min || value > max {
                return Err(IrErrorKind::UnrepresentableValue {
                    value: value.to_string(),
                    ty,
                }
                .into());
            }
        }
        Ok(Self {
            kind: ExprKind::Literal(Literal::Int(value)),
            ty,
        })
    }

    pub fn string_literal(value: impl Into<String>) -> Self {
        Self {
            kind: ExprKind::Literal(Literal::String(value.into())),
            ty: Type::string(),
        }
    }

    /// The absent value of `ty`'s nullable counterpart.
    pub fn null(ty: &Type) -> Self {
        Self {
            kind: ExprKind::Literal(Literal::Null),
            ty: ty.nullable(),
        }
    }

    /// Matches anything; only meaningful as an atom argument.
    pub fn wildcard(ty: Type) -> Self {
        Self {
            kind: ExprKind::Wildcard,
            ty,
        }
    }

    /// Builds `if cond { then } else { otherwise }`.
    ///
    /// Without an else branch the node has `then`'s type. With one, the
    /// branches must agree up to nullability, and the node takes the else
    /// branch's type when `then` is nullable, `then`'s type otherwise.
    pub fn if_then_else(
        cond: Expression,
        then: Expression,
        otherwise: Option<Expression>,
    ) -> IrResult<Self> {
        let ty = match &otherwise {
            None => then.ty.clone(),
            Some(otherwise) => {
                check_compatible_in("conditional branches", &then.ty, &otherwise.ty, true)?;
                if then.ty.is_nullable() {
                    otherwise.ty.clone()
                } else {
                    then.ty.clone()
                }
            }
        };
        if !cond.ty.is_bool() {
            return Err(IrErrorKind::InvalidConditionType {
                context: "conditional",
                found: cond.ty,
            }
            .into());
        }
        Ok(Self {
            kind: ExprKind::IfThenElse {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: otherwise.map(Box::new),
            },
            ty,
        })
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> IrResult<Self> {
        let ty = match op {
            BinaryOp::And | BinaryOp::Or => {
                expect_bool(op.symbol(), &lhs)?;
                expect_bool(op.symbol(), &rhs)?;
                Type::bool()
            }
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => {
                check_compatible_in("comparison", &lhs.ty, &rhs.ty, false)?;
                Type::bool()
            }
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => {
                for operand in [&lhs, &rhs] {
                    if !operand.ty.is_numeric() || operand.ty.is_nullable() {
                        return Err(IrErrorKind::InvalidOperandType {
                            op: op.symbol(),
                            found: operand.ty.clone(),
                        }
                        .into());
                    }
                }
                check_compatible_in("arithmetic", &lhs.ty, &rhs.ty, false)?;
                lhs.ty.clone()
            }
            BinaryOp::Concat => {
                for operand in [&lhs, &rhs] {
                    if operand.ty != Type::string() {
                        return Err(IrErrorKind::InvalidOperandType {
                            op: op.symbol(),
                            found: operand.ty.clone(),
                        }
                        .into());
                    }
                }
                Type::string()
            }
        };
        Ok(Self {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        })
    }

    pub fn not(operand: Expression) -> IrResult<Self> {
        expect_bool("not", &operand)?;
        Ok(Self {
            kind: ExprKind::Not(Box::new(operand)),
            ty: Type::bool(),
        })
    }

    pub fn is_null(operand: Expression) -> IrResult<Self> {
        if !operand.ty.is_nullable() {
            return Err(IrErrorKind::InvalidOperandType {
                op: "is_null",
                found: operand.ty,
            }
            .into());
        }
        Ok(Self {
            kind: ExprKind::IsNull(Box::new(operand)),
            ty: Type::bool(),
        })
    }

    /// Lifts a non-null value into its nullable type.
    pub fn some(operand: Expression) -> IrResult<Self> {
        if operand.ty.is_nullable() {
            return Err(IrErrorKind::InvalidOperandType {
                op: "Some",
                found: operand.ty,
            }
            .into());
        }
        let ty = operand.ty.nullable();
        Ok(Self {
            kind: ExprKind::Some(Box::new(operand)),
            ty,
        })
    }

    pub fn tuple(items: Vec<Expression>) -> Self {
        let ty = Type::tuple(items.iter().map(|item| item.ty.clone()).collect());
        Self {
            kind: ExprKind::Tuple(items),
            ty,
        }
    }

    pub fn to_ddlog(&self) -> String {
        match &self.kind {
            ExprKind::Var(name) => name.clone(),
            ExprKind::Literal(literal) => match literal {
                Literal::Bool(b) => b.to_string(),
                Literal::Int(n) => n.to_string(),
                Literal::String(s) => quote_string(s),
                Literal::Null => "None".to_owned(),
            },
            ExprKind::Wildcard => "_".to_owned(),
            ExprKind::IfThenElse {
                cond,
                then,
                otherwise,
            } => {
                let mut s = format!("if {} {{\n{}}}", cond.to_ddlog(), then.to_ddlog());
                if let Some(otherwise) = otherwise {
                    s.push_str(&format!(" else {{\n{}}}", otherwise.to_ddlog()));
                }
                s
            }
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", lhs.to_ddlog(), op.symbol(), rhs.to_ddlog())
            }
            ExprKind::Not(operand) => format!("(not {})", operand.to_ddlog()),
            ExprKind::IsNull(operand) => format!("is_none({})", operand.to_ddlog()),
            ExprKind::Some(operand) => format!("Some{{{}}}", operand.to_ddlog()),
            ExprKind::Tuple(items) => {
                format!("({})", items.iter().map(Expression::to_ddlog).join(", "))
            }
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
