use nom::{
    character::complete::{char, multispace0},
    combinator::{cut, opt},
    error::context,
    sequence::delimited,
    IResult, Parser,
};

use super::ast::{ReturnClause, ReturnItem};
use super::common::{keyword, parse_non_keyword_identifier};
use super::errors::{lift, CypherParsingError};
use super::expression;

/// `RETURN [DISTINCT] item [, item]*`
///
/// Each item records the original expression text so it can serve as the
/// output column name when there is no `AS` alias.
pub fn parse_return_clause(
    input: &str,
) -> IResult<&str, ReturnClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("RETURN").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, distinct) = opt(keyword("DISTINCT")).parse(input)?;
    let (input, _) = multispace0(input)?;

    let (input, first) = context("Error in RETURN item", cut(parse_return_item)).parse(input)?;
    let mut items = vec![first];
    let mut remaining = input;
    loop {
        match delimited(multispace0, char::<_, CypherParsingError>(','), multispace0)
            .parse(remaining)
        {
            Ok((rest, _)) => {
                let (rest, item) =
                    context("Error in RETURN item", cut(parse_return_item)).parse(rest)?;
                items.push(item);
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((
        remaining,
        ReturnClause {
            distinct: distinct.is_some(),
            items,
        },
    ))
}

pub fn parse_return_item(input: &str) -> IResult<&str, ReturnItem<'_>, CypherParsingError<'_>> {
    let (rest, expr) = lift(expression::parse_expression(input))?;
    // The consumed slice, trimmed, is the default column name.
    let consumed = &input[..input.len() - rest.len()];
    let text = consumed.trim();

    let (rest, alias) = opt(nom::sequence::preceded(
        delimited(multispace0, keyword("AS"), multispace0),
        cut(context("Expected alias after AS", |i| {
            lift(parse_non_keyword_identifier(i))
        })),
    ))
    .parse(rest)?;

    Ok((
        rest,
        ReturnItem {
            expression: expr,
            alias,
            text,
        },
    ))
}
