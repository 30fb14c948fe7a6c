use std::collections::{hash_map, HashMap, HashSet};

use anyhow::{anyhow, Context, Result};
use itertools::Itertools;

use crate::ast::{
    self, Clause, ColumnName, Expr, ExprKind, Identifier, Literal, Param, Program, RelationName,
    Role, SourceClause,
};
use crate::error::{IrError, Location};
use crate::ir::{
    Atom, DdlogProgram, Expression, RelationDecl, RelationRole, Rule, RuleBodyTerm,
};
use crate::types::{check_compatible_in, Type};

/// Name of the relation an ad-hoc query is compiled into.
pub const QUERY_RELATION: &str = "query";

type Scope = HashMap<Identifier, Type>;

#[derive(Clone, Debug, Default)]
pub struct Prelude {
    relations: HashMap<RelationName, ast::RelationDecl>,
    rules: HashMap<RelationName, Vec<ast::Rule>>,
    // Source order, so that the emitted program is deterministic.
    relation_order: Vec<RelationName>,
    rule_order: Vec<RelationName>,
}

impl From<Program> for Prelude {
    fn from(program: Program) -> Self {
        let relation_order = program
            .relations
            .iter()
            .map(|decl| decl.name.clone())
            .unique()
            .collect();
        let rule_order = program
            .rules
            .iter()
            .map(|rule| rule.name.clone())
            .unique()
            .collect();

        let mut relations = HashMap::new();
        for decl in program.relations {
            if let Some(previous) = relations.insert(decl.name.clone(), decl) {
                tracing::warn!(
                    relation = %previous.name,
                    location = %previous.location,
                    "relation declared twice, keeping the last declaration"
                );
            }
        }

        let rules = program
            .rules
            .into_iter()
            .into_grouping_map_by(|rule| rule.name.clone())
            .collect();

        Self {
            relations,
            rules,
            relation_order,
            rule_order,
        }
    }
}

impl Prelude {
    /// Compiles every declared relation and every rule of the prelude.
    pub fn compile_program(&self) -> Result<DdlogProgram> {
        let mut builder = ProgramBuilder::new(self);
        for name in self.relation_order.iter().chain(&self.rule_order) {
            builder.compile_relation(name)?;
        }
        Ok(builder.program)
    }

    /// Compiles an ad-hoc query into an output relation holding every variable
    /// its source clauses bind, together with the relations it depends on.
    pub fn compile(&self, query: Vec<Clause>) -> Result<DdlogProgram> {
        let query_name = relation_name(QUERY_RELATION);
        if let Some(name) = self
            .relations
            .keys()
            .chain(self.rules.keys())
            .find(|name| relation_name(name) == query_name)
        {
            return Err(anyhow!(
                "The prelude relation {:?} clashes with the query relation {:?}",
                name,
                query_name
            ));
        }

        let location = query
            .first()
            .map(clause_location)
            .cloned()
            .ok_or_else(|| anyhow!("Empty query"))?;
        let head = auto_detect_columns(&query)
            .into_iter()
            .map(|column| Expr {
                kind: ExprKind::Var(column),
                location: location.clone(),
            })
            .collect();

        let rule = ast::Rule {
            name: QUERY_RELATION.to_owned(),
            head,
            clauses: query,
            location,
        };

        let mut builder = ProgramBuilder::new(self);
        builder.compile_rules(QUERY_RELATION, std::slice::from_ref(&rule), RelationRole::Output)?;
        Ok(builder.program)
    }
}

pub fn auto_detect_columns(clauses: &[Clause]) -> Vec<ColumnName> {
    clauses
        .iter()
        .filter_map(|clause| match clause {
            Clause::Source(source) if !source.negated => Some(source),
            _ => None,
        })
        .flat_map(|source| &source.params)
        .filter_map(|param| match param {
            Param::Var(name) => Some(name),
            Param::Wildcard | Param::Literal(_) => None,
        })
        .unique()
        .cloned()
        .collect()
}

fn clause_location(clause: &Clause) -> &Location {
    match clause {
        Clause::Source(source) => &source.location,
        Clause::Condition(expr) => &expr.location,
    }
}

/// DDlog relation names must start with an uppercase letter.
pub fn relation_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn relation_role(role: Role) -> RelationRole {
    match role {
        Role::Input => RelationRole::Input,
        Role::Output => RelationRole::Output,
    }
}

#[derive(Debug)]
struct ProgramBuilder<'a> {
    prelude: &'a Prelude,
    resolved: HashMap<RelationName, RelationDecl>,
    in_progress: HashSet<RelationName>,
    done: HashSet<RelationName>,
    program: DdlogProgram,
}

impl<'a> ProgramBuilder<'a> {
    fn new(prelude: &'a Prelude) -> Self {
        Self {
            prelude,
            resolved: HashMap::new(),
            in_progress: HashSet::new(),
            done: HashSet::new(),
            program: DdlogProgram::default(),
        }
    }

    fn resolve(&mut self, name: &str, decl: RelationDecl) -> Result<()> {
        if let Some(other) = self
            .resolved
            .iter()
            .find(|(other, resolved)| resolved.name == decl.name && other.as_str() != name)
            .map(|(other, _)| other)
        {
            return Err(anyhow!(
                "Relations {:?} and {:?} both map to {:?}",
                other,
                name,
                decl.name
            ));
        }
        self.program.relations.push(decl.clone());
        self.resolved.insert(name.to_owned(), decl);
        Ok(())
    }

    fn compile_relation(&mut self, name: &str) -> Result<()> {
        if self.done.contains(name) || self.in_progress.contains(name) {
            return Ok(());
        }

        let prelude = self.prelude;
        let rules = prelude.rules.get(name).map(Vec::as_slice).unwrap_or_default();

        if let Some(decl) = prelude.relations.get(name) {
            if decl.role == Role::Input && !rules.is_empty() {
                return Err(anyhow!(
                    "Input relation {:?} declared at {} cannot be the head of a rule",
                    name,
                    decl.location
                ));
            }
            let columns = decl
                .columns
                .iter()
                .map(|column| (column.name.clone(), column.ty.clone()))
                .collect();
            self.resolve(
                name,
                RelationDecl {
                    role: relation_role(decl.role),
                    name: relation_name(name),
                    columns,
                },
            )?;
        }

        self.compile_rules(name, rules, RelationRole::Internal)
    }

    /// Compiles the rules of one relation. If the relation was not declared,
    /// its columns are inferred from the first rule's head.
    fn compile_rules(
        &mut self,
        name: &str,
        rules: &[ast::Rule],
        inferred_role: RelationRole,
    ) -> Result<()> {
        tracing::debug!(relation = name, rules = rules.len(), "compiling relation");
        self.in_progress.insert(name.to_owned());

        for rule in rules {
            let (compiled, columns) = self
                .compile_rule(rule)
                .with_context(|| format!("Failed to compile rule for {:?} at {}", name, rule.location))?;

            if !self.resolved.contains_key(name) {
                let columns = columns
                    .into_iter()
                    .zip(compiled.head().args())
                    .map(|(column, arg)| (column, arg.ty().clone()))
                    .collect::<Vec<_>>();
                tracing::debug!(
                    relation = name,
                    columns = %columns.iter().map(|(column, ty)| format!("{}: {}", column, ty)).join(", "),
                    "inferred relation columns"
                );
                self.resolve(
                    name,
                    RelationDecl {
                        role: inferred_role,
                        name: relation_name(name),
                        columns,
                    },
                )?;
            }

            tracing::trace!(rule = %compiled.to_ddlog(), "compiled rule");
            self.program.rules.push(compiled);
        }

        self.in_progress.remove(name);
        self.done.insert(name.to_owned());
        Ok(())
    }

    fn relation_decl(&mut self, name: &str, location: &Location) -> Result<RelationDecl> {
        if !self.prelude.relations.contains_key(name) && !self.prelude.rules.contains_key(name) {
            return Err(anyhow!("Unknown relation {:?} at {}", name, location));
        }
        self.compile_relation(name)?;
        self.resolved.get(name).cloned().ok_or_else(|| {
            anyhow!(
                "Relation {:?} is used recursively at {} before its columns are known; declare it",
                name,
                location
            )
        })
    }

    /// Returns the rule and the column names to use if its relation has to be
    /// inferred.
    fn compile_rule(&mut self, rule: &ast::Rule) -> Result<(Rule, Vec<ColumnName>)> {
        let mut scope = Scope::new();
        let mut body = vec![];

        // Positive sources bind variables, so they go first; negated sources
        // and conditions may refer to variables bound by any of them.
        for clause in &rule.clauses {
            if let Clause::Source(source) = clause {
                if !source.negated {
                    let atom = self.compile_source(source, &mut scope)?;
                    body.push(RuleBodyTerm::atom(atom));
                }
            }
        }

        for clause in &rule.clauses {
            match clause {
                Clause::Source(source) if source.negated => {
                    let atom = self.compile_source(source, &mut scope)?;
                    body.push(RuleBodyTerm::negated(atom));
                }

                Clause::Source(_) => {}

                Clause::Condition(expr) => {
                    let condition = translate_expr(expr, &scope, None)?;
                    body.push(RuleBodyTerm::filter(condition).map_err(|e| e.at(&expr.location))?);
                }
            }
        }

        let head_decl = self.resolved.get(&rule.name);
        let args = match head_decl {
            Some(decl) => {
                if rule.head.len() != decl.arity() {
                    return Err(anyhow!(
                        "Relation {:?} has {} columns but the rule at {} produces {}",
                        rule.name,
                        decl.arity(),
                        rule.location,
                        rule.head.len()
                    ));
                }
                rule.head
                    .iter()
                    .zip(&decl.columns)
                    .map(|(expr, (_, ty))| {
                        let value = translate_expr(expr, &scope, Some(ty))?;
                        coerce(value, ty, "head column", &expr.location)
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            None => rule
                .head
                .iter()
                .map(|expr| translate_expr(expr, &scope, None))
                .collect::<Result<Vec<_>>>()?,
        };

        let head_vars = rule
            .head
            .iter()
            .filter_map(|expr| match &expr.kind {
                ExprKind::Var(name) => Some(name.as_str()),
                _ => None,
            })
            .collect::<HashSet<_>>();
        let mut columns: Vec<ColumnName> = vec![];
        for (i, expr) in rule.head.iter().enumerate() {
            let column = match &expr.kind {
                ExprKind::Var(name) if !columns.contains(name) => name.clone(),
                _ => {
                    // Synthesized names must not shadow a head variable.
                    let mut column = format!("col{}", i);
                    while head_vars.contains(column.as_str()) || columns.contains(&column) {
                        column.push('_');
                    }
                    column
                }
            };
            columns.push(column);
        }

        let head = Atom::new(relation_name(&rule.name), args).map_err(|e| e.at(&rule.location))?;
        Ok((Rule::new(head, body), columns))
    }

    fn compile_source(&mut self, source: &SourceClause, scope: &mut Scope) -> Result<Atom> {
        let decl = self.relation_decl(&source.name, &source.location)?;
        if source.params.len() != decl.arity() {
            return Err(anyhow!(
                "Relation {:?} has {} columns but {} were given at {}",
                source.name,
                decl.arity(),
                source.params.len(),
                source.location
            ));
        }

        let at = |e: IrError| e.at(&source.location);
        let args = source
            .params
            .iter()
            .zip(&decl.columns)
            .map(|(param, (_, ty))| -> Result<Expression> {
                Ok(match param {
                    Param::Var(name) => {
                        match scope.entry(name.clone()) {
                            hash_map::Entry::Occupied(bound) => {
                                // A repeated variable joins the two columns.
                                check_compatible_in("join", bound.get(), ty, false).map_err(at)?;
                            }
                            hash_map::Entry::Vacant(vacant) => {
                                if source.negated {
                                    return Err(anyhow!(
                                        "Variable {:?} in negated clause at {} is not bound by a positive clause",
                                        name,
                                        source.location
                                    ));
                                }
                                vacant.insert(ty.clone());
                            }
                        }
                        Expression::var(name.clone(), ty.clone()).map_err(at)?
                    }
                    Param::Wildcard => Expression::wildcard(ty.clone()),
                    Param::Literal(literal) => {
                        let value = translate_literal(literal, Some(ty), &source.location)?;
                        coerce(value, ty, "relation argument", &source.location)?
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Atom::new(decl.name, args).map_err(at)?)
    }
}

/// Fits `value` into a slot of type `ty`, lifting non-null values into
/// nullable slots.
fn coerce(value: Expression, ty: &Type, context: &'static str, location: &Location) -> Result<Expression> {
    check_compatible_in(context, ty, value.ty(), true).map_err(|e| e.at(location))?;
    let value = if ty.is_nullable() && !value.ty().is_nullable() {
        Expression::some(value).map_err(|e| e.at(location))?
    } else {
        value
    };
    check_compatible_in(context, ty, value.ty(), false).map_err(|e| e.at(location))?;
    Ok(value)
}

/// Integer and null literals take their type from the context.
fn is_untyped_literal(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Literal(Literal::Integer(_)) | ExprKind::Literal(Literal::Null)
    )
}

fn translate_literal(literal: &Literal, hint: Option<&Type>, location: &Location) -> Result<Expression> {
    Ok(match literal {
        Literal::Bool(b) => Expression::bool_literal(*b),
        Literal::String(s) => Expression::string_literal(s.clone()),
        Literal::Integer(n) => {
            let ty = hint
                .filter(|ty| ty.is_integral())
                .map(Type::non_null)
                .unwrap_or_else(Type::bigint);
            Expression::int_literal(n.clone(), ty).map_err(|e| e.at(location))?
        }
        Literal::Null => match hint {
            Some(ty) => Expression::null(ty),
            None => return Err(anyhow!("Cannot infer the type of null at {}", location)),
        },
    })
}

/// Translates both operands, typing an untyped literal from the other one.
fn translate_pair(
    first: &Expr,
    second: &Expr,
    scope: &Scope,
    hint: Option<&Type>,
) -> Result<(Expression, Expression)> {
    if is_untyped_literal(first) && !is_untyped_literal(second) {
        let second = translate_expr(second, scope, hint)?;
        let first = translate_expr(first, scope, Some(second.ty()))?;
        Ok((first, second))
    } else {
        let first = translate_expr(first, scope, hint)?;
        let second = translate_expr(second, scope, Some(first.ty()))?;
        Ok((first, second))
    }
}

fn translate_expr(expr: &Expr, scope: &Scope, hint: Option<&Type>) -> Result<Expression> {
    let at = |e: IrError| e.at(&expr.location);
    Ok(match &expr.kind {
        ExprKind::Var(name) => {
            let ty = scope
                .get(name)
                .ok_or_else(|| anyhow!("Unknown variable {:?} at {}", name, expr.location))?;
            Expression::var(name.clone(), ty.clone()).map_err(at)?
        }

        ExprKind::Literal(literal) => translate_literal(literal, hint, &expr.location)?,

        ExprKind::If {
            cond,
            then,
            otherwise,
        } => {
            let cond = translate_expr(cond, scope, None)?;
            let (then, otherwise) = match otherwise {
                Some(otherwise) => {
                    let (then, otherwise) = translate_pair(then, otherwise, scope, hint)?;
                    (then, Some(otherwise))
                }
                None => (translate_expr(then, scope, hint)?, None),
            };
            Expression::if_then_else(cond, then, otherwise).map_err(at)?
        }

        ExprKind::Binary { op, lhs, rhs } => {
            let (mut lhs, mut rhs) = translate_pair(lhs, rhs, scope, None)?;
            if op.is_comparison() && lhs.ty().is_compatible(rhs.ty(), true) {
                // DDlog only compares values of identical types.
                if lhs.ty().is_nullable() && !rhs.ty().is_nullable() {
                    rhs = Expression::some(rhs).map_err(at)?;
                } else if rhs.ty().is_nullable() && !lhs.ty().is_nullable() {
                    lhs = Expression::some(lhs).map_err(at)?;
                }
            }
            Expression::binary(*op, lhs, rhs).map_err(at)?
        }

        ExprKind::Not(operand) => {
            let operand = translate_expr(operand, scope, None)?;
            Expression::not(operand).map_err(at)?
        }

        ExprKind::IsNull(operand) => {
            let operand = translate_expr(operand, scope, None)?;
            Expression::is_null(operand).map_err(at)?
        }
    })
}
