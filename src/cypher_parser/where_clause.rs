use nom::{character::complete::multispace0, error::context, IResult, Parser};

use super::ast::WhereClause;
use super::common::keyword;
use super::errors::{lift, CypherParsingError};
use super::expression;

pub fn parse_where_clause(
    input: &str,
) -> IResult<&str, WhereClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("WHERE").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, condition) = context("Error in WHERE condition", |i| {
        lift(expression::parse_expression(i))
    })
    .parse(input)?;
    Ok((input, WhereClause { condition }))
}
