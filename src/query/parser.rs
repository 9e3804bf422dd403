//! Query Parser
//!
//! Parses roster query strings into the Query AST.
//!
//! # Supported Syntax
//!
//! ```text
//! FROM students|courses
//! [WHERE id = 'S001']
//! [WHERE field = 'text' | number]
//! [WHERE field [, field ...] CONTAINS 'fragment']
//! [WHERE field BETWEEN low AND high]
//! [TOP k BY field]
//! [LIMIT n]
//! ```
//!
//! Keywords are case-insensitive; strings are single-quoted.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, recognize},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::query::ast::*;
use crate::query::error::{QueryError, QueryResult};
use crate::roster::Collection;
use crate::storage::Value;

/// Parse a query string into a Query AST
pub fn parse_query(input: &str) -> QueryResult<Query> {
    let input = input.trim();

    match parse_full_query(input) {
        Ok((remaining, parsed)) => {
            if !remaining.trim().is_empty() {
                return Err(QueryError::Parse(format!(
                    "Unexpected input after query: '{}'",
                    remaining.trim()
                )));
            }
            let (name, selector, limit) = parsed;
            let collection: Collection = name
                .parse()
                .map_err(|_| QueryError::UnknownCollection(name.to_string()))?;
            Ok(Query {
                collection,
                selector,
                limit,
            })
        }
        Err(e) => Err(QueryError::Parse(format!("{:?}", e))),
    }
}

/// Collection name, selector and limit as written
type ParsedQuery<'a> = (&'a str, Selector, Option<usize>);

/// Parse the full query
fn parse_full_query(input: &str) -> IResult<&str, ParsedQuery<'_>> {
    let (input, _) = multispace0(input)?;
    let (input, collection) = parse_from_clause(input)?;
    let (input, selector) =
        opt(preceded(multispace1, alt((parse_where_clause, parse_top_clause))))(input)?;
    let (input, limit) = opt(preceded(multispace1, parse_limit_clause))(input)?;
    let (input, _) = multispace0(input)?;

    Ok((input, (collection, selector.unwrap_or(Selector::All), limit)))
}

/// Parse FROM clause
fn parse_from_clause(input: &str) -> IResult<&str, &str> {
    let (input, _) = tag_no_case("FROM")(input)?;
    let (input, _) = multispace1(input)?;
    parse_identifier(input)
}

/// Parse WHERE clause
fn parse_where_clause(input: &str) -> IResult<&str, Selector> {
    let (input, _) = tag_no_case("WHERE")(input)?;
    let (input, _) = multispace1(input)?;
    alt((
        parse_between_condition,
        parse_contains_condition,
        parse_equals_condition,
    ))(input)
}

/// Parse "field = value"; `id` selects by primary key
fn parse_equals_condition(input: &str) -> IResult<&str, Selector> {
    let (input, field) = parse_identifier(input)?;
    let (input, _) = delimited(multispace0, alt((tag("=="), tag("="))), multispace0)(input)?;
    let (input, literal) = parse_literal(input)?;

    let selector = if field.eq_ignore_ascii_case("id") {
        Selector::Id(literal.to_string())
    } else {
        Selector::Equals {
            field: field.to_string(),
            value: literal,
        }
    };
    Ok((input, selector))
}

/// Parse "field [, field ...] CONTAINS 'fragment'"
fn parse_contains_condition(input: &str) -> IResult<&str, Selector> {
    let (input, fields) = separated_list1(
        delimited(multispace0, char(','), multispace0),
        parse_identifier,
    )(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("CONTAINS")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, fragment) = parse_quoted_string(input)?;

    Ok((
        input,
        Selector::Contains {
            fields: fields.into_iter().map(str::to_string).collect(),
            fragment,
        },
    ))
}

/// Parse "field BETWEEN low AND high"
fn parse_between_condition(input: &str) -> IResult<&str, Selector> {
    let (input, field) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("BETWEEN")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, low) = parse_number(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("AND")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, high) = parse_number(input)?;

    Ok((
        input,
        Selector::Between {
            field: field.to_string(),
            low,
            high,
        },
    ))
}

/// Parse "TOP k BY field"
fn parse_top_clause(input: &str) -> IResult<&str, Selector> {
    let (input, _) = tag_no_case("TOP")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, k) = map_res(digit1, |s: &str| s.parse::<usize>())(input)?;
    let (input, _) = multispace1(input)?;
    let (input, _) = tag_no_case("BY")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, field) = parse_identifier(input)?;

    Ok((
        input,
        Selector::Top {
            field: field.to_string(),
            k,
        },
    ))
}

/// Parse LIMIT clause
fn parse_limit_clause(input: &str) -> IResult<&str, usize> {
    let (input, _) = tag_no_case("LIMIT")(input)?;
    let (input, _) = multispace1(input)?;
    map_res(digit1, |s: &str| s.parse::<usize>())(input)
}

/// Parse a literal: quoted text, integer or decimal
fn parse_literal(input: &str) -> IResult<&str, Value> {
    alt((
        map(parse_quoted_string, Value::Text),
        map_res(parse_numeric_text, |s: &str| {
            if s.contains('.') {
                s.parse::<f64>().map(Value::Float).map_err(|e| e.to_string())
            } else {
                s.parse::<i64>().map(Value::Integer).map_err(|e| e.to_string())
            }
        }),
    ))(input)
}

/// Parse identifier (field name)
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Parse quoted string
fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('\'')(input)?;
    let (input, content) = take_while(|c| c != '\'')(input)?;
    let (input, _) = char('\'')(input)?;
    Ok((input, content.to_string()))
}

/// Recognize a signed decimal
fn parse_numeric_text(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(alt((char('-'), char('+')))),
        digit1,
        opt(pair(char('.'), digit1)),
    )))(input)
}

/// Parse floating point number
fn parse_number(input: &str) -> IResult<&str, f64> {
    map_res(parse_numeric_text, |s: &str| s.parse::<f64>())(input)
}
