//! Cypher-subset parser.
//!
//! Built as one nom parser per clause, sharing the expression and path
//! pattern grammars. `parse` is the public entry point; it returns either a
//! typed AST borrowing from the input or a `ParseFailure` carrying the byte
//! offset, line and column of the deepest parse point reached.

pub mod ast;
pub mod common;
pub mod create_clause;
pub mod delete_clause;
pub mod errors;
pub mod expression;
pub mod match_clause;
pub mod order_by_clause;
pub mod path_pattern;
pub mod return_clause;
pub mod set_clause;
pub mod unwind_clause;
pub mod where_clause;
pub mod with_clause;

use nom::{character::complete::multispace0, combinator::opt, IResult, Parser};

use ast::{CypherQuery, CypherStatement, UnionClause};
use common::keyword;
use errors::{CypherParsingError, ParseFailure};

/// Parse a complete Cypher statement.
pub fn parse(input: &str) -> Result<CypherStatement<'_>, ParseFailure> {
    if input.trim().is_empty() {
        return Err(ParseFailure::at_offset(input, 0, "empty query"));
    }

    match parse_statement(input) {
        Ok((rest, statement)) => {
            if rest.trim().is_empty() {
                Ok(statement)
            } else {
                Err(ParseFailure::at_remainder(
                    input,
                    rest,
                    format!("unexpected input: {}", snippet(rest)),
                ))
            }
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let (remainder, message) = e
                .deepest()
                .unwrap_or((input, "unable to parse query"));
            Err(ParseFailure::at_remainder(input, remainder, message))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(ParseFailure::at_offset(input, input.len(), "incomplete query"))
        }
    }
}

fn snippet(rest: &str) -> String {
    let trimmed = rest.trim_start();
    let head: String = trimmed.chars().take(24).collect();
    if trimmed.len() > head.len() {
        format!("'{}...'", head)
    } else {
        format!("'{}'", head)
    }
}

fn parse_statement(input: &str) -> IResult<&str, CypherStatement<'_>, CypherParsingError<'_>> {
    let (input, query) = parse_query(input)?;

    let mut unions = Vec::new();
    let mut remaining = input;
    loop {
        let (rest, _) = multispace0(remaining)?;
        match keyword::<CypherParsingError>("UNION").parse(rest) {
            Ok((rest, _)) => {
                let (rest, _) = multispace0(rest)?;
                let (rest, all) = opt(keyword("ALL")).parse(rest)?;
                let (rest, query) = parse_query(rest)?;
                unions.push(UnionClause {
                    all: all.is_some(),
                    query,
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => {
                remaining = rest;
                break;
            }
            Err(e) => return Err(e),
        }
    }

    Ok((remaining, CypherStatement { query, unions }))
}

/// One clause recognized by the query loop.
enum Clause<'a> {
    Reading(ast::ReadingClause<'a>),
    Unwind(ast::UnwindClause<'a>),
    With(ast::WithClause<'a>),
    Create(ast::CreateClause<'a>),
    Merge(ast::MergeClause<'a>),
    Set(ast::SetClause<'a>),
    Delete(ast::DeleteClause<'a>),
    Return(ast::ReturnClause<'a>),
    OrderBy(ast::OrderByClause<'a>),
    Skip(ast::SkipClause),
    Limit(ast::LimitClause),
}

fn parse_clause(input: &str) -> IResult<&str, Clause<'_>, CypherParsingError<'_>> {
    use nom::branch::alt;
    use nom::combinator::map;
    alt((
        map(match_clause::parse_optional_match_clause, Clause::Reading),
        map(match_clause::parse_match_clause, Clause::Reading),
        map(unwind_clause::parse_unwind_clause, Clause::Unwind),
        map(with_clause::parse_with_clause, Clause::With),
        map(create_clause::parse_create_clause, Clause::Create),
        map(create_clause::parse_merge_clause, Clause::Merge),
        map(set_clause::parse_set_clause, Clause::Set),
        map(delete_clause::parse_delete_clause, Clause::Delete),
        map(return_clause::parse_return_clause, Clause::Return),
        map(order_by_clause::parse_order_by_clause, Clause::OrderBy),
        map(order_by_clause::parse_skip_clause, Clause::Skip),
        map(order_by_clause::parse_limit_clause, Clause::Limit),
    ))
    .parse(input)
}

fn duplicate<'a, T>(
    slot: &Option<T>,
    input: &'a str,
    message: &'static str,
) -> Result<(), nom::Err<CypherParsingError<'a>>> {
    if slot.is_some() {
        Err(nom::Err::Failure(CypherParsingError::new(input, message)))
    } else {
        Ok(())
    }
}

fn parse_query(input: &str) -> IResult<&str, CypherQuery<'_>, CypherParsingError<'_>> {
    let mut query = CypherQuery::default();
    let mut remaining = input;
    let mut matched_any = false;

    loop {
        let (rest, _) = multispace0(remaining)?;
        if rest.is_empty() || starts_with_union(rest) {
            remaining = rest;
            break;
        }

        let (rest, clause) = match parse_clause(rest) {
            Ok(ok) => ok,
            Err(nom::Err::Error(e)) => {
                if matched_any {
                    // A recognized query followed by junk: stop and let the
                    // caller surface the leftover input.
                    remaining = rest;
                    break;
                }
                return Err(nom::Err::Error(e));
            }
            Err(e) => return Err(e),
        };

        match clause {
            Clause::Reading(c) => query.reading_clauses.push(c),
            Clause::Unwind(c) => query.unwind_clauses.push(c),
            Clause::With(c) => {
                duplicate(&query.with_clause, rest, "duplicate WITH clause")?;
                query.with_clause = Some(c);
            }
            Clause::Create(c) => query.create_clauses.push(c),
            Clause::Merge(c) => query.merge_clauses.push(c),
            Clause::Set(c) => {
                duplicate(&query.set_clause, rest, "duplicate SET clause")?;
                query.set_clause = Some(c);
            }
            Clause::Delete(c) => {
                duplicate(&query.delete_clause, rest, "duplicate DELETE clause")?;
                query.delete_clause = Some(c);
            }
            Clause::Return(c) => {
                duplicate(&query.return_clause, rest, "duplicate RETURN clause")?;
                query.return_clause = Some(c);
            }
            Clause::OrderBy(c) => {
                duplicate(&query.order_by_clause, rest, "duplicate ORDER BY clause")?;
                query.order_by_clause = Some(c);
            }
            Clause::Skip(c) => {
                duplicate(&query.skip_clause, rest, "duplicate SKIP clause")?;
                query.skip_clause = Some(c);
            }
            Clause::Limit(c) => {
                duplicate(&query.limit_clause, rest, "duplicate LIMIT clause")?;
                query.limit_clause = Some(c);
            }
        }
        matched_any = true;
        remaining = rest;
    }

    if !matched_any {
        return Err(nom::Err::Error(CypherParsingError::new(
            remaining,
            "expected a Cypher clause",
        )));
    }

    Ok((remaining, query))
}

fn starts_with_union(input: &str) -> bool {
    keyword::<nom::error::Error<&str>>("UNION").parse(input).is_ok()
}
