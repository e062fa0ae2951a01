use nom::{
    character::complete::{char, multispace0},
    combinator::cut,
    error::context,
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};

use super::ast::{CreateClause, MergeClause};
use super::common::keyword;
use super::errors::{lift, CypherParsingError};
use super::path_pattern;

/// `CREATE pattern [, pattern]*`
pub fn parse_create_clause(
    input: &str,
) -> IResult<&str, CreateClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("CREATE").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, patterns) = context(
        "Error in create pattern",
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            cut(|i| lift(path_pattern::parse_path_pattern(i))),
        ),
    )
    .parse(input)?;
    Ok((input, CreateClause { patterns }))
}

/// `MERGE pattern` - a single pattern per clause.
pub fn parse_merge_clause(input: &str) -> IResult<&str, MergeClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("MERGE").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, pattern) = context("Error in merge pattern", |i| {
        lift(path_pattern::parse_path_pattern(i))
    })
    .parse(input)?;
    Ok((input, MergeClause { pattern }))
}
