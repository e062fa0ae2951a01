use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while1},
    character::complete::{anychar, char, multispace0, satisfy},
    combinator::{not, opt, peek, recognize, verify},
    error::ParseError,
    multi::{fold_many0, many0},
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

/// Whitespace-handling combinator.
pub fn ws<'a, O, E: ParseError<&'a str>, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = E>
where
    F: Parser<&'a str, Output = O, Error = E>,
{
    delimited(multispace0, inner, multispace0)
}

/// Case-insensitive keyword with a word boundary: `keyword("AND")` matches
/// "AND" and "and" but not the prefix of "android".
pub fn keyword<'a, E: ParseError<&'a str>>(
    kw: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = E> {
    nom::sequence::terminated(
        tag_no_case(kw),
        not(peek(satisfy(|c: char| c.is_alphanumeric() || c == '_'))),
    )
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// An unquoted identifier: letter or underscore, then letters, digits and
/// underscores. Identifiers are case-sensitive.
pub fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(is_ident_start),
        many0(satisfy(is_ident_continue)),
    ))
    .parse(input)
}

/// An identifier that is not one of the reserved clause keywords. Keeps
/// expressions like `RETURN n` from reading RETURN as a variable.
pub fn parse_non_keyword_identifier(input: &str) -> IResult<&str, &str> {
    verify(parse_identifier, |ident: &str| !is_reserved(ident)).parse(input)
}

fn is_reserved(ident: &str) -> bool {
    const RESERVED: &[&str] = &[
        "create", "match", "optional", "merge", "set", "delete", "detach", "with", "where",
        "return", "distinct", "order", "by", "asc", "desc", "skip", "limit", "unwind", "union",
        "all", "and", "or", "not", "in", "is", "null", "contains", "starts", "ends", "exists",
        "case", "when", "then", "else", "end", "as", "true", "false",
    ];
    let lower = ident.to_ascii_lowercase();
    RESERVED.contains(&lower.as_str())
}

/// Unsigned integer, e.g. a SKIP/LIMIT count or a hop bound.
pub fn parse_u32(input: &str) -> IResult<&str, u32> {
    let (input, digits) = take_while1(|c: char| c.is_ascii_digit())(input)?;
    match digits.parse::<u32>() {
        Ok(n) => Ok((input, n)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

pub fn parse_i64(input: &str) -> IResult<&str, i64> {
    let (input, text) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;
    match text.parse::<i64>() {
        Ok(n) => Ok((input, n)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

/// A quoted string literal with `\n \t \" \' \\` escapes resolved.
/// Accepts single or double quotes.
pub fn parse_string_literal(input: &str) -> IResult<&str, String> {
    alt((quoted_string('\''), quoted_string('"'))).parse(input)
}

fn quoted_string<'a>(quote: char) -> impl Parser<&'a str, Output = String, Error = nom::error::Error<&'a str>> {
    delimited(
        char(quote),
        fold_many0(
            alt((
                preceded(char('\\'), escape_char),
                verify(anychar, move |c| *c != quote && *c != '\\'),
            )),
            String::new,
            |mut acc, c| {
                acc.push(c);
                acc
            },
        ),
        char(quote),
    )
}

fn escape_char(input: &str) -> IResult<&str, char> {
    alt((
        nom::combinator::value('\n', char('n')),
        nom::combinator::value('\t', char('t')),
        nom::combinator::value('"', char('"')),
        nom::combinator::value('\'', char('\'')),
        nom::combinator::value('\\', char('\\')),
    ))
    .parse(input)
}

/// Numeric literal text: integer or float with optional exponent. The sign
/// is handled by the expression grammar, not here.
pub fn parse_numeric_text(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((
            // 123.456
            recognize((
                take_while1(|c: char| c.is_ascii_digit()),
                char('.'),
                take_while1(|c: char| c.is_ascii_digit()),
            )),
            // .456
            recognize(pair(char('.'), take_while1(|c: char| c.is_ascii_digit()))),
            // 123
            take_while1(|c: char| c.is_ascii_digit()),
        )),
        opt(recognize((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            take_while1(|c: char| c.is_ascii_digit()),
        ))),
    ))
    .parse(input)
}

/// Does this numeric text denote a float?
pub fn numeric_text_is_float(text: &str) -> bool {
    text.contains('.') || text.contains('e') || text.contains('E')
}

/// Consume a `..` range separator.
pub fn parse_range_dots(input: &str) -> IResult<&str, &str> {
    tag("..")(input)
}
