use nom::{
    branch::alt,
    character::complete::{char, multispace0},
    combinator::{map, opt, peek},
    multi::separated_list0,
    sequence::{delimited, separated_pair},
    IResult, Parser,
};

use super::ast::{
    Direction, NodePattern, PathPattern, PathSegment, PropertyEntry, RelationshipPattern,
    VarLengthSpec,
};
use super::common::{parse_identifier, parse_range_dots, parse_u32, ws};
use super::expression;

/// Guard against adversarial inputs chaining hundreds of relationships.
const MAX_SEGMENTS: usize = 50;

/// `(a:Person {name: 'x'})-[r:KNOWS*1..2]->(b:Person)-...`
pub fn parse_path_pattern(input: &str) -> IResult<&str, PathPattern<'_>> {
    let (input, start) = parse_node_pattern(input)?;

    let mut segments = Vec::new();
    let mut remaining = input;
    loop {
        if segments.len() >= MAX_SEGMENTS {
            return Err(nom::Err::Failure(nom::error::Error::new(
                remaining,
                nom::error::ErrorKind::TooLarge,
            )));
        }
        match parse_segment(remaining) {
            Ok((rest, segment)) => {
                segments.push(segment);
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }

    Ok((remaining, PathPattern { start, segments }))
}

fn parse_segment(input: &str) -> IResult<&str, PathSegment<'_>> {
    let (input, relationship) = parse_relationship_pattern(input)?;
    let (input, node) = parse_node_pattern(input)?;
    Ok((input, PathSegment { relationship, node }))
}

/// `(var:Label {props})` with every part optional.
pub fn parse_node_pattern(input: &str) -> IResult<&str, NodePattern<'_>> {
    let (input, _) = multispace0(input)?;
    delimited(char('('), parse_node_interior, ws(char(')'))).parse(input)
}

fn parse_node_interior(input: &str) -> IResult<&str, NodePattern<'_>> {
    let (input, variable) = ws(opt(parse_identifier)).parse(input)?;
    let (input, label) = opt(ws(nom::sequence::preceded(char(':'), ws(parse_identifier)))).parse(input)?;
    let (input, properties) = opt(parse_property_map).parse(input)?;
    Ok((
        input,
        NodePattern {
            variable,
            label,
            properties,
        },
    ))
}

/// `{key: value, ...}` inside node or relationship patterns.
pub fn parse_property_map(input: &str) -> IResult<&str, Vec<PropertyEntry<'_>>> {
    delimited(
        ws(char('{')),
        separated_list0(
            ws(char(',')),
            map(
                separated_pair(
                    ws(parse_identifier),
                    char(':'),
                    expression::parse_property_value,
                ),
                |(key, value)| PropertyEntry { key, value },
            ),
        ),
        ws(char('}')),
    )
    .parse(input)
}

/// Relationship with its direction arrows:
/// `-[...]->`, `<-[...]-`, `-[...]-`, and the bracketless `-->`, `<--`, `--`.
fn parse_relationship_pattern(input: &str) -> IResult<&str, RelationshipPattern<'_>> {
    let (input, _) = multispace0(input)?;

    // Leading `<-` means incoming; plain `-` leaves direction to the tail.
    let (input, left_arrow) = opt(char('<')).parse(input)?;
    let (input, _) = ws(char('-')).parse(input)?;

    // Optional bracketed interior.
    let (input, interior) = opt(parse_relationship_interior).parse(input)?;
    let (variable, rel_type, var_length, properties) = match interior {
        Some(parts) => parts,
        None => (None, None, None, None),
    };

    let (input, _) = ws(char('-')).parse(input)?;
    let (input, right_arrow) = opt(char('>')).parse(input)?;

    let direction = match (left_arrow.is_some(), right_arrow.is_some()) {
        (true, false) => Direction::Incoming,
        (false, true) => Direction::Outgoing,
        (false, false) => Direction::Either,
        (true, true) => {
            // `<-[..]->` is not a supported pattern.
            return Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )));
        }
    };

    Ok((
        input,
        RelationshipPattern {
            variable,
            rel_type,
            direction,
            properties,
            var_length,
        },
    ))
}

type RelInterior<'a> = (
    Option<&'a str>,
    Option<&'a str>,
    Option<VarLengthSpec>,
    Option<Vec<PropertyEntry<'a>>>,
);

/// `[var:TYPE *min..max {props}]`
fn parse_relationship_interior(input: &str) -> IResult<&str, RelInterior<'_>> {
    let (input, _) = char('[')(input)?;
    let (input, variable) = ws(opt(parse_identifier)).parse(input)?;
    let (input, rel_type) =
        opt(nom::sequence::preceded(char(':'), ws(parse_identifier))).parse(input)?;
    let (input, var_length) = parse_var_length_spec(input)?;
    let (input, properties) = opt(parse_property_map).parse(input)?;
    let (input, _) = ws(char(']')).parse(input)?;
    Ok((input, (variable, rel_type, var_length, properties)))
}

/// `*`, `*2`, `*1..3`, `*..5`, `*2..`
fn parse_var_length_spec(input: &str) -> IResult<&str, Option<VarLengthSpec>> {
    let (input, _) = multispace0(input)?;
    let (input, star) = opt(char('*')).parse(input)?;
    if star.is_none() {
        return Ok((input, None));
    }
    let (input, _) = multispace0(input)?;

    // *min..max | *..max | *min.. | *n | *
    let bounded = map(
        separated_pair(parse_u32, parse_range_dots, parse_u32),
        |(min, max)| VarLengthSpec {
            min_hops: Some(min),
            max_hops: Some(max),
        },
    );
    let upper_only = map(
        nom::sequence::preceded(parse_range_dots, parse_u32),
        |max| VarLengthSpec {
            min_hops: Some(1),
            max_hops: Some(max),
        },
    );
    let lower_only = map(
        nom::sequence::terminated(parse_u32, parse_range_dots),
        |min| VarLengthSpec {
            min_hops: Some(min),
            max_hops: None,
        },
    );
    let fixed = map(parse_u32, |n| VarLengthSpec {
        min_hops: Some(n),
        max_hops: Some(n),
    });
    // Bare `*`: peek the closing bracket or property map.
    let unbounded = map(peek(ws(alt((char(']'), char('{'))))), |_| VarLengthSpec {
        min_hops: None,
        max_hops: None,
    });

    let (input, spec) = alt((bounded, upper_only, lower_only, fixed, unbounded)).parse(input)?;
    Ok((input, Some(spec)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cypher_parser::ast::{Expression, Literal};

    fn parsed(input: &str) -> PathPattern<'_> {
        let (rest, pattern) = parse_path_pattern(input).expect("should parse");
        assert_eq!(rest.trim(), "", "unconsumed input: {rest:?}");
        pattern
    }

    #[test]
    fn test_empty_node() {
        let p = parsed("()");
        assert!(p.is_single_node());
        assert_eq!(p.start, NodePattern::default());
    }

    #[test]
    fn test_node_with_label_and_props() {
        let p = parsed("(n:Person {name: 'Alice', age: 30})");
        assert_eq!(p.start.variable, Some("n"));
        assert_eq!(p.start.label, Some("Person"));
        let props = p.start.properties.as_ref().expect("props");
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].key, "name");
        assert_eq!(
            props[0].value,
            Expression::Literal(Literal::String("Alice".into()))
        );
    }

    #[test]
    fn test_outgoing_relationship() {
        let p = parsed("(a)-[r:KNOWS]->(b)");
        assert_eq!(p.segments.len(), 1);
        let seg = &p.segments[0];
        assert_eq!(seg.relationship.variable, Some("r"));
        assert_eq!(seg.relationship.rel_type, Some("KNOWS"));
        assert_eq!(seg.relationship.direction, Direction::Outgoing);
        assert_eq!(seg.node.variable, Some("b"));
    }

    #[test]
    fn test_incoming_relationship() {
        let p = parsed("(a)<-[:LIKES]-(b)");
        assert_eq!(p.segments[0].relationship.direction, Direction::Incoming);
        assert_eq!(p.segments[0].relationship.rel_type, Some("LIKES"));
    }

    #[test]
    fn test_undirected_relationship() {
        let p = parsed("(a)-[:SEES]-(b)");
        assert_eq!(p.segments[0].relationship.direction, Direction::Either);
    }

    #[test]
    fn test_bracketless_arrows() {
        assert_eq!(
            parsed("(a)-->(b)").segments[0].relationship.direction,
            Direction::Outgoing
        );
        assert_eq!(
            parsed("(a)<--(b)").segments[0].relationship.direction,
            Direction::Incoming
        );
        assert_eq!(
            parsed("(a)--(b)").segments[0].relationship.direction,
            Direction::Either
        );
    }

    #[test]
    fn test_multi_segment_chain() {
        let p = parsed("(a:Person)-[:KNOWS]->(b:Person)-[:WORKS_AT]->(c:Company)");
        assert_eq!(p.segments.len(), 2);
        assert_eq!(p.segments[1].relationship.rel_type, Some("WORKS_AT"));
        assert_eq!(p.segments[1].node.label, Some("Company"));
    }

    #[test]
    fn test_var_length_specs() {
        let spec = parsed("(a)-[:KNOWS*1..3]->(b)").segments[0]
            .relationship
            .var_length
            .expect("spec");
        assert_eq!(spec.min_hops, Some(1));
        assert_eq!(spec.max_hops, Some(3));

        let spec = parsed("(a)-[:KNOWS*2]->(b)").segments[0]
            .relationship
            .var_length
            .expect("spec");
        assert_eq!(spec.min_hops, Some(2));
        assert_eq!(spec.max_hops, Some(2));

        let spec = parsed("(a)-[:KNOWS*..5]->(b)").segments[0]
            .relationship
            .var_length
            .expect("spec");
        assert_eq!(spec.min_hops, Some(1));
        assert_eq!(spec.max_hops, Some(5));

        let spec = parsed("(a)-[:KNOWS*2..]->(b)").segments[0]
            .relationship
            .var_length
            .expect("spec");
        assert_eq!(spec.min_hops, Some(2));
        assert_eq!(spec.max_hops, None);

        let spec = parsed("(a)-[:KNOWS*]->(b)").segments[0]
            .relationship
            .var_length
            .expect("spec");
        assert_eq!(spec.min_hops, None);
        assert_eq!(spec.max_hops, None);
    }

    #[test]
    fn test_relationship_properties() {
        let p = parsed("(a)-[r:RATED {stars: 5}]->(b)");
        let props = p.segments[0].relationship.properties.as_ref().expect("props");
        assert_eq!(props[0].key, "stars");
    }

    #[test]
    fn test_parameter_property_value() {
        let p = parsed("(u:User {id: $id})");
        let props = p.start.properties.as_ref().expect("props");
        assert_eq!(props[0].value, Expression::Parameter("id"));
    }

    #[test]
    fn test_bidirectional_rejected() {
        assert!(parse_path_pattern("(a)<-[:X]->(b)").is_err());
    }
}
