//! Typed intermediate representation of DDlog programs.
//!
//! Every node is validated by its constructor, so anything reachable from a
//! [`Rule`] is well typed and prints as valid target syntax.

pub mod expr;
pub mod program;
pub mod rule;

pub use expr::{BinaryOp, ExprKind, Expression, Literal, VarName};
pub use program::{DdlogProgram, RelationDecl, RelationRole};
pub use rule::{Atom, RelationName, Rule, RuleBodyTerm};
