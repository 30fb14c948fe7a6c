use itertools::Itertools;

use crate::ir::rule::{RelationName, Rule};
use crate::types::Type;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationRole {
    Input,
    Output,
    Internal,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelationDecl {
    pub role: RelationRole,
    pub name: RelationName,
    pub columns: Vec<(String, Type)>,
}

impl RelationDecl {
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn column_type(&self, index: usize) -> Option<&Type> {
        self.columns.get(index).map(|(_, ty)| ty)
    }

    pub fn to_ddlog(&self) -> String {
        let prefix = match self.role {
            RelationRole::Input => "input relation",
            RelationRole::Output => "output relation",
            RelationRole::Internal => "relation",
        };
        format!(
            "{} {}({})",
            prefix,
            self.name,
            self.columns
                .iter()
                .map(|(name, ty)| format!("{}: {}", name, ty))
                .join(", ")
        )
    }
}

/// Relation declarations followed by rules, both printed in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DdlogProgram {
    pub relations: Vec<RelationDecl>,
    pub rules: Vec<Rule>,
}

impl DdlogProgram {
    pub fn relation(&self, name: &str) -> Option<&RelationDecl> {
        self.relations.iter().find(|decl| decl.name == name)
    }

    pub fn to_ddlog(&self) -> String {
        let mut s = String::new();
        for decl in &self.relations {
            s.push_str(&decl.to_ddlog());
            s.push('\n');
        }
        if !self.relations.is_empty() && !self.rules.is_empty() {
            s.push('\n');
        }
        for rule in &self.rules {
            s.push_str(&rule.to_ddlog());
            s.push('\n');
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Atom, Expression, RuleBodyTerm};

    #[test]
    fn test_program_layout() {
        let program = DdlogProgram {
            relations: vec![
                RelationDecl {
                    role: RelationRole::Input,
                    name: "Foo".to_owned(),
                    columns: vec![
                        ("a".to_owned(), Type::signed(64)),
                        ("c".to_owned(), Type::string().nullable()),
                    ],
                },
                RelationDecl {
                    role: RelationRole::Internal,
                    name: "Tmp".to_owned(),
                    columns: vec![("a".to_owned(), Type::signed(64))],
                },
            ],
            rules: vec![Rule::with_term(
                Atom::new(
                    "Tmp",
                    vec![Expression::var("a", Type::signed(64)).unwrap()],
                )
                .unwrap(),
                RuleBodyTerm::atom(
                    Atom::new(
                        "Foo",
                        vec![
                            Expression::var("a", Type::signed(64)).unwrap(),
                            Expression::wildcard(Type::string().nullable()),
                        ],
                    )
                    .unwrap(),
                ),
            )],
        };

        assert_eq!(
            program.to_ddlog(),
            "input relation Foo(a: signed<64>, c: Option<string>)\n\
             relation Tmp(a: signed<64>)\n\
             \n\
             Tmp(a) :- Foo(a, _).\n"
        );
        assert_eq!(program.relation("Tmp").map(RelationDecl::arity), Some(1));
        assert_eq!(
            program.relation("Foo").and_then(|decl| decl.column_type(1)),
            Some(&Type::string().nullable())
        );
    }
}
