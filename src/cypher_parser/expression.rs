use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0},
    combinator::{map, opt, peek},
    multi::separated_list0,
    sequence::{delimited, preceded, separated_pair},
    IResult, Parser,
};

use super::ast::{
    CaseExpression, Expression, FunctionCall, ListComprehension, Literal, Operator,
    OperatorApplication, PropertyAccess,
};
use super::common::{
    keyword, numeric_text_is_float, parse_identifier, parse_non_keyword_identifier,
    parse_numeric_text, parse_string_literal, ws,
};
use super::path_pattern;

/// Entry point: full expression grammar, lowest precedence first.
pub fn parse_expression(input: &str) -> IResult<&str, Expression<'_>> {
    parse_or(input)
}

fn parse_or(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, first) = parse_and(input)?;
    let mut remaining = input;
    let mut expr = first;
    loop {
        match preceded(ws(keyword("OR")), parse_and).parse(remaining) {
            Ok((rest, rhs)) => {
                expr = Expression::Operator(OperatorApplication {
                    operator: Operator::Or,
                    operands: vec![expr, rhs],
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, expr))
}

fn parse_and(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, first) = parse_not(input)?;
    let mut remaining = input;
    let mut expr = first;
    loop {
        match preceded(ws(keyword("AND")), parse_not).parse(remaining) {
            Ok((rest, rhs)) => {
                expr = Expression::Operator(OperatorApplication {
                    operator: Operator::And,
                    operands: vec![expr, rhs],
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, expr))
}

fn parse_not(input: &str) -> IResult<&str, Expression<'_>> {
    alt((
        map(preceded(ws(keyword("NOT")), parse_not), |inner| {
            Expression::Operator(OperatorApplication {
                operator: Operator::Not,
                operands: vec![inner],
            })
        }),
        parse_comparison,
    ))
    .parse(input)
}

fn parse_comparison_operator(input: &str) -> IResult<&str, Operator> {
    alt((
        map(tag(">="), |_| Operator::GreaterThanEqual),
        map(tag("<="), |_| Operator::LessThanEqual),
        map(tag("<>"), |_| Operator::NotEqual),
        map(tag(">"), |_| Operator::GreaterThan),
        map(tag("<"), |_| Operator::LessThan),
        map(tag("="), |_| Operator::Equal),
        map(keyword("IN"), |_| Operator::In),
        map(keyword("CONTAINS"), |_| Operator::Contains),
        map(
            preceded(keyword("STARTS"), preceded(multispace0, keyword("WITH"))),
            |_| Operator::StartsWith,
        ),
        map(
            preceded(keyword("ENDS"), preceded(multispace0, keyword("WITH"))),
            |_| Operator::EndsWith,
        ),
    ))
    .parse(input)
}

fn parse_comparison(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, first) = parse_postfix(input)?;
    let mut remaining = input;
    let mut expr = first;
    loop {
        match (ws(parse_comparison_operator), parse_postfix).parse(remaining) {
            Ok((rest, (op, rhs))) => {
                expr = Expression::Operator(OperatorApplication {
                    operator: op,
                    operands: vec![expr, rhs],
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, expr))
}

/// `IS NULL` / `IS NOT NULL` postfix on an additive operand.
fn parse_postfix(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, expr) = parse_additive(input)?;
    let (input, postfix) = opt(preceded(
        ws(keyword("IS")),
        alt((
            map(
                preceded(keyword("NOT"), preceded(multispace0, keyword("NULL"))),
                |_| Operator::IsNotNull,
            ),
            map(keyword("NULL"), |_| Operator::IsNull),
        )),
    ))
    .parse(input)?;

    match postfix {
        Some(op) => Ok((
            input,
            Expression::Operator(OperatorApplication {
                operator: op,
                operands: vec![expr],
            }),
        )),
        None => Ok((input, expr)),
    }
}

fn parse_additive(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, first) = parse_multiplicative(input)?;
    let mut remaining = input;
    let mut expr = first;
    loop {
        let op_parser = alt((
            map(char('+'), |_| Operator::Addition),
            map(char('-'), |_| Operator::Subtraction),
        ));
        match (ws(op_parser), parse_multiplicative).parse(remaining) {
            Ok((rest, (op, rhs))) => {
                expr = Expression::Operator(OperatorApplication {
                    operator: op,
                    operands: vec![expr, rhs],
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, expr))
}

fn parse_multiplicative(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, first) = parse_primary(input)?;
    let mut remaining = input;
    let mut expr = first;
    loop {
        let op_parser = alt((
            map(char('*'), |_| Operator::Multiplication),
            map(char('/'), |_| Operator::Division),
            map(char('%'), |_| Operator::Modulo),
        ));
        match (ws(op_parser), parse_primary).parse(remaining) {
            Ok((rest, (op, rhs))) => {
                expr = Expression::Operator(OperatorApplication {
                    operator: op,
                    operands: vec![expr, rhs],
                });
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    Ok((remaining, expr))
}

fn parse_primary(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, _) = multispace0(input)?;
    alt((
        parse_case_expression,
        parse_exists_expression,
        parse_list_comprehension,
        parse_list_literal,
        parse_map_literal,
        parse_parameter,
        parse_function_call,
        parse_literal,
        parse_property_access,
        parse_variable,
        delimited(ws(char('(')), parse_expression, ws(char(')'))),
    ))
    .parse(input)
}

/// `CASE [subject] WHEN c THEN v ... [ELSE e] END`
fn parse_case_expression(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, _) = keyword::<nom::error::Error<&str>>("CASE").parse(input)?;
    let (after_ws, _) = multispace0(input)?;

    // Searched CASE starts directly with WHEN; simple CASE has a subject.
    let (input, subject) =
        if peek(keyword::<nom::error::Error<&str>>("WHEN")).parse(after_ws).is_ok() {
            (input, None)
        } else {
            let (rest, subject) = parse_expression(input)?;
            (rest, Some(subject))
        };

    let mut when_then = Vec::new();
    let mut remaining = input;
    loop {
        match preceded(
            ws(keyword("WHEN")),
            separated_pair(parse_expression, ws(keyword("THEN")), parse_expression),
        )
        .parse(remaining)
        {
            Ok((rest, pair)) => {
                when_then.push(pair);
                remaining = rest;
            }
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        }
    }
    if when_then.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(
            remaining,
            nom::error::ErrorKind::Tag,
        )));
    }

    let (input, else_expr) =
        opt(preceded(ws(keyword("ELSE")), parse_expression)).parse(remaining)?;
    let (input, _) = ws(keyword("END")).parse(input)?;

    Ok((
        input,
        Expression::Case(CaseExpression {
            subject: subject.map(Box::new),
            when_then,
            else_expr: else_expr.map(Box::new),
        }),
    ))
}

/// `EXISTS((a)-[:T]->(b))`
fn parse_exists_expression(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, _) = keyword::<nom::error::Error<&str>>("EXISTS").parse(input)?;
    let (input, pattern) = delimited(
        ws(char('(')),
        path_pattern::parse_path_pattern,
        ws(char(')')),
    )
    .parse(input)?;
    Ok((input, Expression::PatternExists(Box::new(pattern))))
}

/// `[x IN list WHERE cond | projection]` - tried before plain list literals.
fn parse_list_comprehension(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, _) = ws(char('[')).parse(input)?;
    let (input, variable) = ws(parse_non_keyword_identifier).parse(input)?;
    let (input, _) = ws(keyword("IN")).parse(input)?;
    let (input, list) = parse_expression(input)?;
    let (input, filter) = opt(preceded(ws(keyword("WHERE")), parse_expression)).parse(input)?;
    let (input, projection) = opt(preceded(ws(char('|')), parse_expression)).parse(input)?;
    let (input, _) = ws(char(']')).parse(input)?;
    Ok((
        input,
        Expression::ListComprehension(Box::new(ListComprehension {
            variable,
            list,
            filter,
            projection,
        })),
    ))
}

fn parse_list_literal(input: &str) -> IResult<&str, Expression<'_>> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), parse_expression),
            ws(char(']')),
        ),
        Expression::List,
    )
    .parse(input)
}

fn parse_map_literal(input: &str) -> IResult<&str, Expression<'_>> {
    map(
        delimited(
            ws(char('{')),
            separated_list0(
                ws(char(',')),
                separated_pair(ws(parse_identifier), char(':'), parse_expression),
            ),
            ws(char('}')),
        ),
        Expression::Map,
    )
    .parse(input)
}

/// `$name`
pub fn parse_parameter(input: &str) -> IResult<&str, Expression<'_>> {
    map(preceded(char('$'), parse_identifier), Expression::Parameter).parse(input)
}

fn parse_function_call(input: &str) -> IResult<&str, Expression<'_>> {
    let (input, name) = parse_non_keyword_identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(')(input)?;

    // count(*)
    if let Ok((rest, _)) = delimited(
        multispace0::<&str, nom::error::Error<&str>>,
        char('*'),
        ws(char(')')),
    )
    .parse(input)
    {
        return Ok((
            rest,
            Expression::FunctionCall(FunctionCall {
                name,
                args: vec![],
                star: true,
            }),
        ));
    }

    let (input, args) = separated_list0(ws(char(',')), parse_expression).parse(input)?;
    let (input, _) = ws(char(')')).parse(input)?;
    Ok((
        input,
        Expression::FunctionCall(FunctionCall {
            name,
            args,
            star: false,
        }),
    ))
}

fn parse_literal(input: &str) -> IResult<&str, Expression<'_>> {
    alt((
        map(parse_string_literal, |s| {
            Expression::Literal(Literal::String(s))
        }),
        parse_signed_number,
        map(keyword("true"), |_| Expression::Literal(Literal::Boolean(true))),
        map(keyword("false"), |_| {
            Expression::Literal(Literal::Boolean(false))
        }),
        map(keyword("null"), |_| Expression::Literal(Literal::Null)),
    ))
    .parse(input)
}

fn parse_signed_number(input: &str) -> IResult<&str, Expression<'_>> {
    let (rest, negative) = opt(char('-')).parse(input)?;
    let (rest, text) = parse_numeric_text(rest)?;
    let literal = if numeric_text_is_float(text) {
        match text.parse::<f64>() {
            Ok(f) => Literal::Float(if negative.is_some() { -f } else { f }),
            Err(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Float,
                )))
            }
        }
    } else {
        match text.parse::<i64>() {
            Ok(i) => Literal::Integer(if negative.is_some() { -i } else { i }),
            Err(_) => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Digit,
                )))
            }
        }
    };
    Ok((rest, Expression::Literal(literal)))
}

/// `var.key`
pub fn parse_property_access(input: &str) -> IResult<&str, Expression<'_>> {
    map(
        separated_pair(parse_non_keyword_identifier, char('.'), parse_identifier),
        |(base, key)| Expression::PropertyAccess(PropertyAccess { base, key }),
    )
    .parse(input)
}

fn parse_variable(input: &str) -> IResult<&str, Expression<'_>> {
    map(parse_non_keyword_identifier, Expression::Variable).parse(input)
}

/// Property values inside `{key: value}` maps reuse the full grammar.
pub fn parse_property_value(input: &str) -> IResult<&str, Expression<'_>> {
    parse_expression(input)
}
