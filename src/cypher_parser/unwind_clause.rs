use nom::{
    character::complete::multispace0, error::context, sequence::delimited, IResult, Parser,
};

use super::ast::UnwindClause;
use super::common::{keyword, parse_non_keyword_identifier};
use super::errors::{lift, CypherParsingError};
use super::expression;

/// `UNWIND expr AS alias`
pub fn parse_unwind_clause(
    input: &str,
) -> IResult<&str, UnwindClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("UNWIND").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, expr) = context("Error in UNWIND expression", |i| {
        lift(expression::parse_expression(i))
    })
    .parse(input)?;
    let (input, _) = delimited(multispace0, keyword("AS"), multispace0).parse(input)?;
    let (input, alias) = context("Expected alias after AS", |i| {
        lift(parse_non_keyword_identifier(i))
    })
    .parse(input)?;
    Ok((
        input,
        UnwindClause {
            expression: expr,
            alias,
        },
    ))
}
