use std::borrow::BorrowMut;

use anyhow::{anyhow, Context, Result};
use num_bigint::BigInt;
use pest::Parser as _;
use pest_derive::Parser;

use crate::ast::{
    Clause, ColumnDecl, Expr, ExprKind, Identifier, Literal, Param, Program, RelationDecl, Role,
    Rule as QueryRule, SourceClause,
};
use crate::error::Location;
use crate::ir::BinaryOp;
use crate::types::{Type, MAX_INTEGER_WIDTH};

#[derive(Parser)]
#[grammar = "ddql.pest"]
struct Parser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

/// Parses a program made of relation declarations and rules.
pub fn parse_program(code: &str) -> Result<Program> {
    let program = Parser::parse(Rule::program, code)
        .context("Failed to parse input")?
        .next()
        .unwrap();

    let mut relations = vec![];
    let mut rules = vec![];
    for pair in program.into_inner() {
        match pair.as_rule() {
            Rule::relation_decl => relations.push(RelationDecl::try_from(pair)?),
            Rule::rule => rules.push(QueryRule::from(pair)),
            Rule::EOI => {}
            _ => unreachable!(),
        }
    }

    Ok(Program { relations, rules })
}

/// Parses a bare list of clauses, as typed at the prompt.
pub fn parse_query(code: &str) -> Result<Vec<Clause>> {
    let query = Parser::parse(Rule::query, code)
        .context("Failed to parse query")?
        .next()
        .unwrap();
    let clauses = expect_next_rule(query.into_inner(), Rule::rule_clauses);
    Ok(clauses.into_inner().map(Clause::from).collect())
}

fn expect_next_rule<'a, P: BorrowMut<Pairs<'a>>>(mut pairs: P, expected: Rule) -> Pair<'a> {
    let pair = pairs.borrow_mut().next().expect("missing pair");
    assert_eq!(pair.as_rule(), expected);
    pair
}

fn convert_identifier(pair: Pair) -> Identifier {
    assert_eq!(pair.as_rule(), Rule::identifier);
    pair.as_str().to_string()
}

fn expect_identifier<'a, P: BorrowMut<Pairs<'a>>>(pairs: P) -> Identifier {
    convert_identifier(expect_next_rule(pairs, Rule::identifier))
}

fn location(pair: &Pair) -> Location {
    let (line, column) = pair.as_span().start_pos().line_col();
    // Spans of non-atomic rules may end with skipped whitespace.
    let fragment = pair.as_str().lines().next().unwrap_or_default().trim_end();
    Location {
        line,
        column,
        fragment: fragment.to_owned(),
    }
}

fn unescape(interior: &str) -> String {
    let mut s = String::with_capacity(interior.len());
    let mut chars = interior.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            s.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => s.push('\n'),
            Some('t') => s.push('\t'),
            Some(escaped) => s.push(escaped),
            None => {}
        }
    }
    s
}

fn convert_width(pair: Pair) -> Result<u32> {
    let width = expect_next_rule(pair.into_inner(), Rule::width);
    match width.as_str().parse::<u32>() {
        Ok(n) if n > 0 && n <= MAX_INTEGER_WIDTH => Ok(n),
        _ => Err(anyhow!(
            "Invalid integer width {:?} at {}",
            width.as_str(),
            location(&width)
        )),
    }
}

fn convert_type(pair: Pair) -> Result<Type> {
    assert_eq!(pair.as_rule(), Rule::type_name);
    let mut pairs = pair.into_inner();
    let base = pairs.next().unwrap();
    let ty = match base.as_rule() {
        Rule::bool_type => Type::bool(),
        Rule::bigint_type => Type::bigint(),
        Rule::string_type => Type::string(),
        Rule::double_type => Type::double(),
        Rule::int_type => Type::signed(64),
        Rule::signed_type => Type::signed(convert_width(base)?),
        Rule::bit_type => Type::bit(convert_width(base)?),
        _ => unreachable!(),
    };

    Ok(match pairs.next() {
        Some(marker) => {
            assert_eq!(marker.as_rule(), Rule::nullable_marker);
            ty.nullable()
        }
        None => ty,
    })
}

impl TryFrom<Pair<'_>> for RelationDecl {
    type Error = anyhow::Error;

    fn try_from(pair: Pair<'_>) -> Result<Self> {
        let location = location(&pair);
        let mut pairs = pair.into_inner();

        let role = match expect_next_rule(&mut pairs, Rule::relation_role).as_str() {
            "input" => Role::Input,
            _ => Role::Output,
        };
        let name = expect_identifier(&mut pairs);
        let columns = pairs
            .map(|column| -> Result<ColumnDecl> {
                let mut pairs = column.into_inner();
                let name = expect_identifier(&mut pairs);
                let ty = convert_type(pairs.next().unwrap())?;
                Ok(ColumnDecl { name, ty })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            role,
            name,
            columns,
            location,
        })
    }
}

impl From<Pair<'_>> for QueryRule {
    fn from(pair: Pair<'_>) -> Self {
        let location = location(&pair);
        let mut pairs = pair.into_inner();

        let head = expect_next_rule(&mut pairs, Rule::rule_head);
        let mut head_pairs = head.into_inner();
        let name = expect_identifier(&mut head_pairs);
        let head = head_pairs.map(Expr::from).collect();

        let clauses = expect_next_rule(&mut pairs, Rule::rule_clauses);
        let clauses = clauses.into_inner().map(Clause::from).collect();

        Self {
            name,
            head,
            clauses,
            location,
        }
    }
}

impl From<Pair<'_>> for Clause {
    fn from(pair: Pair<'_>) -> Self {
        match pair.as_rule() {
            Rule::src_clause => Clause::Source(SourceClause::from(pair)),

            Rule::negated_clause => {
                let mut pairs = pair.into_inner();
                expect_next_rule(&mut pairs, Rule::kw_not);
                let source = expect_next_rule(&mut pairs, Rule::src_clause);
                Clause::Source(SourceClause {
                    negated: true,
                    ..SourceClause::from(source)
                })
            }

            Rule::expr => Clause::Condition(Expr::from(pair)),

            _ => unreachable!(),
        }
    }
}

impl From<Pair<'_>> for SourceClause {
    fn from(pair: Pair<'_>) -> Self {
        let location = location(&pair);
        let mut pairs = pair.into_inner();
        let name = expect_identifier(&mut pairs);

        let params = pairs
            .map(|pair| match pair.as_rule() {
                Rule::wildcard => Param::Wildcard,
                Rule::identifier => Param::Var(convert_identifier(pair)),
                _ => Param::Literal(Literal::from(pair)),
            })
            .collect();

        Self {
            name,
            negated: false,
            params,
            location,
        }
    }
}

impl From<Pair<'_>> for Literal {
    fn from(pair: Pair<'_>) -> Self {
        match pair.as_rule() {
            Rule::bool_literal => Literal::Bool(pair.as_str() == "true"),
            Rule::null_literal => Literal::Null,
            Rule::int_literal => Literal::Integer(
                pair.as_str()
                    .parse::<BigInt>()
                    .expect("grammar only admits decimal digits"),
            ),
            Rule::string_literal => {
                let interior = expect_next_rule(pair.into_inner(), Rule::string_interior);
                Literal::String(unescape(interior.as_str()))
            }
            _ => unreachable!(),
        }
    }
}

fn convert_binary_op(pair: Pair) -> BinaryOp {
    match pair.as_str() {
        "or" => BinaryOp::Or,
        "and" => BinaryOp::And,
        "=" | "==" => BinaryOp::Eq,
        "!=" => BinaryOp::Neq,
        "<" => BinaryOp::Lt,
        "<=" => BinaryOp::Lte,
        ">" => BinaryOp::Gt,
        ">=" => BinaryOp::Gte,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Sub,
        "++" => BinaryOp::Concat,
        "*" => BinaryOp::Mul,
        op => unreachable!("unknown operator {:?}", op),
    }
}

impl From<Pair<'_>> for Expr {
    fn from(pair: Pair<'_>) -> Self {
        let location = location(&pair);
        let kind = match pair.as_rule() {
            Rule::expr => return Expr::from(pair.into_inner().next().unwrap()),

            Rule::if_expr => {
                let mut pairs = pair.into_inner();
                expect_next_rule(&mut pairs, Rule::kw_if);
                let cond = Expr::from(expect_next_rule(&mut pairs, Rule::expr));
                let then = Expr::from(expect_next_rule(&mut pairs, Rule::expr));
                let otherwise = pairs.next().map(|kw_else| {
                    assert_eq!(kw_else.as_rule(), Rule::kw_else);
                    Box::new(Expr::from(expect_next_rule(&mut pairs, Rule::expr)))
                });
                ExprKind::If {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise,
                }
            }

            Rule::or_expr | Rule::and_expr | Rule::cmp_expr | Rule::add_expr | Rule::mul_expr => {
                let mut pairs = pair.into_inner();
                let mut lhs = Expr::from(pairs.next().unwrap());
                while let Some(op) = pairs.next() {
                    let rhs = Expr::from(pairs.next().unwrap());
                    lhs = Expr {
                        kind: ExprKind::Binary {
                            op: convert_binary_op(op),
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        location: location.clone(),
                    };
                }
                return lhs;
            }

            Rule::unary_expr => {
                let mut negations = 0;
                let mut operand = None;
                for pair in pair.into_inner() {
                    match pair.as_rule() {
                        Rule::kw_not => negations += 1,
                        _ => operand = Some(Expr::from(pair)),
                    }
                }
                let mut expr = operand.expect("unary expression without operand");
                for _ in 0..negations {
                    expr = Expr {
                        kind: ExprKind::Not(Box::new(expr)),
                        location: location.clone(),
                    };
                }
                return expr;
            }

            Rule::is_null_expr => {
                let operand = expect_next_rule(pair.into_inner(), Rule::expr);
                ExprKind::IsNull(Box::new(Expr::from(operand)))
            }

            Rule::identifier => ExprKind::Var(convert_identifier(pair)),

            _ => ExprKind::Literal(Literal::from(pair)),
        };

        Self { kind, location }
    }
}
