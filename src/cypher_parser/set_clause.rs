use nom::{
    character::complete::{char, multispace0},
    combinator::cut,
    error::context,
    multi::separated_list1,
    sequence::delimited,
    IResult, Parser,
};

use super::ast::{Expression, SetClause, SetItem};
use super::common::keyword;
use super::errors::{lift, CypherParsingError};
use super::expression;

/// `SET n.key = expr [, n.key = expr]*`
pub fn parse_set_clause(input: &str) -> IResult<&str, SetClause<'_>, CypherParsingError<'_>> {
    let (input, _) = keyword("SET").parse(input)?;
    let (input, _) = multispace0(input)?;
    let (input, items) = context(
        "Error in SET item",
        separated_list1(
            delimited(multispace0, char(','), multispace0),
            cut(parse_set_item),
        ),
    )
    .parse(input)?;
    Ok((input, SetClause { items }))
}

fn parse_set_item(input: &str) -> IResult<&str, SetItem<'_>, CypherParsingError<'_>> {
    let (input, target) = lift(expression::parse_property_access(input))?;
    let target = match target {
        Expression::PropertyAccess(pa) => pa,
        _ => unreachable!("parse_property_access yields PropertyAccess"),
    };
    let (input, _) = delimited(multispace0, char('='), multispace0).parse(input)?;
    let (input, value) = lift(expression::parse_expression(input))?;
    Ok((input, SetItem { target, value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::ast::Literal;

    #[test]
    fn test_set_single() {
        let (rest, clause) = parse_set_clause("SET n.age = 31").expect("parse");
        assert_eq!(rest, "");
        assert_eq!(clause.items.len(), 1);
        assert_eq!(clause.items[0].target.base, "n");
        assert_eq!(clause.items[0].target.key, "age");
        assert_eq!(
            clause.items[0].value,
            Expression::Literal(Literal::Integer(31))
        );
    }

    #[test]
    fn test_set_multiple() {
        let (rest, clause) = parse_set_clause("SET n.a = 1, n.b = 'x'").expect("parse");
        assert_eq!(rest, "");
        assert_eq!(clause.items.len(), 2);
    }

    #[test]
    fn test_set_boolean_value() {
        let (_, clause) = parse_set_clause("SET n.active = false").expect("parse");
        assert_eq!(
            clause.items[0].value,
            Expression::Literal(Literal::Boolean(false))
        );
    }
}
