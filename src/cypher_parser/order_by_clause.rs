use nom::{
    branch::alt,
    character::complete::{char, multispace0},
    combinator::{cut, map, opt},
    error::context,
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};

use super::ast::{LimitClause, OrderByClause, OrderByItem, SkipClause, SortOrder};
use super::common::{keyword, parse_i64};
use super::errors::{lift, CypherParsingError};
use super::expression;

/// `ORDER BY expr [ASC|DESC] [, expr [ASC|DESC]]*`
pub fn parse_order_by_clause(
    input: &str,
) -> IResult<&str, OrderByClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("ORDER").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = context("Expected BY after ORDER", cut(keyword("BY"))).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, items) = context(
        "Error in ORDER BY item",
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            cut(parse_order_by_item),
        ),
    )
    .parse(input)?;
    Ok((input, OrderByClause { items }))
}

fn parse_order_by_item(input: &str) -> IResult<&str, OrderByItem<'_>, CypherParsingError<'_>> {
    let (input, expr) = lift(expression::parse_expression(input))?;
    let (input, order) = opt(delimited(
        multispace0,
        alt((
            map(keyword("ASC"), |_| SortOrder::Asc),
            map(keyword("DESC"), |_| SortOrder::Desc),
        )),
        multispace0,
    ))
    .parse(input)?;
    Ok((
        input,
        OrderByItem {
            expression: expr,
            order: order.unwrap_or(SortOrder::Asc),
        },
    ))
}

/// `SKIP n`
pub fn parse_skip_clause(input: &str) -> IResult<&str, SkipClause, CypherParsingError<'_>> {
    let (input, _) = keyword("SKIP").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, count) = context("Expected count after SKIP", cut(|i| lift(parse_i64(i)))).parse(input)?;
    Ok((input, SkipClause { count }))
}

/// `LIMIT n`
pub fn parse_limit_clause(input: &str) -> IResult<&str, LimitClause, CypherParsingError<'_>> {
    let (input, _) = keyword("LIMIT").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, count) =
        context("Expected count after LIMIT", cut(|i| lift(parse_i64(i)))).parse(input)?;
    Ok((input, LimitClause { count }))
}
