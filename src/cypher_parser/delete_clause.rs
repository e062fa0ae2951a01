use nom::{
    character::complete::{char, multispace0},
    combinator::{cut, opt},
    error::context,
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};

use super::ast::DeleteClause;
use super::common::{keyword, parse_non_keyword_identifier};
use super::errors::{lift, CypherParsingError};

/// `DELETE v [, v]*` or `DETACH DELETE v [, v]*`
pub fn parse_delete_clause(
    input: &str,
) -> IResult<&str, DeleteClause<'_>, CypherParsingError<'_>> {
    let (input, detach) = opt(keyword("DETACH")).parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = if detach.is_some() {
        context("Expected DELETE after DETACH", cut(keyword("DELETE"))).parse(input)?
    } else {
        keyword("DELETE").parse(input)?
    };
    let (input, _) = multispace0(input)?;
    let (input, items) = context(
        "Error in DELETE item",
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            cut(|i| lift(parse_non_keyword_identifier(i))),
        ),
    )
    .parse(input)?;
    Ok((
        input,
        DeleteClause {
            detach: detach.is_some(),
            items,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete() {
        let (rest, clause) = parse_delete_clause("DELETE r").expect("parse");
        assert_eq!(rest, "");
        assert!(!clause.detach);
        assert_eq!(clause.items, vec!["r"]);
    }

    #[test]
    fn test_detach_delete_multiple() {
        let (rest, clause) = parse_delete_clause("DETACH DELETE n, m").expect("parse");
        assert_eq!(rest, "");
        assert!(clause.detach);
        assert_eq!(clause.items, vec!["n", "m"]);
    }

    #[test]
    fn test_detach_requires_delete() {
        assert!(parse_delete_clause("DETACH (n)").is_err());
    }
}
