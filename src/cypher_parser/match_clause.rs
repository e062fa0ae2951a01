use nom::{
    character::complete::{char, multispace0},
    combinator::{cut, opt},
    error::context,
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};

use super::ast::{MatchClause, ReadingClause};
use super::common::keyword;
use super::errors::{lift, CypherParsingError};
use super::path_pattern;
use super::where_clause;

/// `MATCH pattern [, pattern]* [WHERE cond]`
pub fn parse_match_clause(
    input: &str,
) -> IResult<&str, ReadingClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("MATCH").parse(input)?;
    let (input, clause) = parse_match_body(input)?;
    Ok((input, ReadingClause::Match(clause)))
}

/// `OPTIONAL MATCH pattern [, pattern]* [WHERE cond]`
pub fn parse_optional_match_clause(
    input: &str,
) -> IResult<&str, ReadingClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("OPTIONAL").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = context("Expected MATCH after OPTIONAL", cut(keyword("MATCH"))).parse(input)?;
    let (input, clause) = parse_match_body(input)?;
    Ok((input, ReadingClause::OptionalMatch(clause)))
}

fn parse_match_body(input: &str) -> IResult<&str, MatchClause<'_>, CypherParsingError<'_>> {
    let (input, _) = multispace0(input)?;
    let (input, patterns) = context(
        "Error in match pattern",
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            cut(|i| lift(path_pattern::parse_path_pattern(i))),
        ),
    )
    .parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, where_clause) = opt(where_clause::parse_where_clause).parse(input)?;
    Ok((
        input,
        MatchClause {
            patterns,
            where_clause,
        },
    ))
}
