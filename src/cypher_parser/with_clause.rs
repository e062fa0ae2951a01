use nom::{
    character::complete::{char, multispace0},
    combinator::{cut, opt},
    error::context,
    sequence::delimited,
    IResult, Parser,
};

use super::ast::{WithClause, WithItem};
use super::common::{keyword, parse_non_keyword_identifier};
use super::errors::{lift, CypherParsingError};
use super::expression;
use super::order_by_clause::{parse_limit_clause, parse_order_by_clause, parse_skip_clause};
use super::where_clause;

/// `WITH [DISTINCT] item [, item]* [ORDER BY ...] [SKIP n] [LIMIT n] [WHERE cond]`
///
/// The modifiers are part of WITH itself and apply to the intermediate
/// projection, carried forward to the next RETURN by the translator.
pub fn parse_with_clause(input: &str) -> IResult<&str, WithClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("WITH").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, distinct) = opt(keyword("DISTINCT")).parse(input)?;
    let (input, _) = multispace0(input)?;

    let (input, first) = context("Error in WITH item", cut(parse_with_item)).parse(input)?;
    let mut items = vec![first];
    let mut remaining = input;
    loop {
        match delimited(multispace0, char::<_, CypherParsingError>(','), multispace0)
            .parse(remaining)
        {
            Ok((rest, _)) => {
                let (rest, item) =
                    context("Error in WITH item", cut(parse_with_item)).parse(rest)?;
                items.push(item);
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    let (input, _) = multispace0(remaining)?;
    let (input, order_by) = opt(parse_order_by_clause).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, skip) = opt(parse_skip_clause).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, limit) = opt(parse_limit_clause).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, where_clause) = opt(where_clause::parse_where_clause).parse(input)?;

    Ok((
        input,
        WithClause {
            items,
            distinct: distinct.is_some(),
            order_by,
            skip,
            limit,
            where_clause,
        },
    ))
}

fn parse_with_item(input: &str) -> IResult<&str, WithItem<'_>, CypherParsingError<'_>> {
    let (input, expr) = lift(expression::parse_expression(input))?;
    let (input, alias) = opt(nom::sequence::preceded(
        delimited(multispace0, keyword("AS"), multispace0),
        cut(context("Expected alias after AS", |i| {
            lift(parse_non_keyword_identifier(i))
        })),
    ))
    .parse(input)?;
    Ok((
        input,
        WithItem {
            expression: expr,
            alias,
        },
    ))
}
