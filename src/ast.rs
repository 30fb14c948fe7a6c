use num_bigint::BigInt;

use crate::error::Location;
use crate::ir::BinaryOp;
use crate::types::Type;

pub type Identifier = String;
pub type RelationName = Identifier;
pub type ColumnName = Identifier;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Literal {
    Bool(bool),
    Integer(BigInt),
    String(String),
    Null,
}

#[derive(Clone, Debug, Default)]
pub struct Program {
    pub relations: Vec<RelationDecl>,
    pub rules: Vec<Rule>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Input,
    Output,
}

#[derive(Clone, Debug)]
pub struct RelationDecl {
    pub role: Role,
    pub name: RelationName,
    pub columns: Vec<ColumnDecl>,
    pub location: Location,
}

#[derive(Clone, Debug)]
pub struct ColumnDecl {
    pub name: ColumnName,
    pub ty: Type,
}

#[derive(Clone, Debug)]
pub struct Rule {
    pub name: RelationName,
    pub head: Vec<Expr>,
    pub clauses: Vec<Clause>,
    pub location: Location,
}

#[derive(Clone, Debug)]
pub enum Clause {
    Source(SourceClause),
    Condition(Expr),
}

#[derive(Clone, Debug)]
pub struct SourceClause {
    pub name: RelationName,
    pub negated: bool,
    pub params: Vec<Param>,
    pub location: Location,
}

#[derive(Clone, Debug)]
pub enum Param {
    Var(Identifier),
    Wildcard,
    Literal(Literal),
}

#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: Location,
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Var(Identifier),
    Literal(Literal),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    IsNull(Box<Expr>),
}
