//! Selection expression parser implementation using nom.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{fold_many0, many0_count, separated_list0},
    sequence::{delimited, pair, preceded},
    IResult,
};

use super::ast::{BinaryOp, Expr};
use crate::value::Value;

/// Parses a selection expression.
///
/// Returns a human-readable message on failure.
///
/// # Examples
///
/// ```rust
/// use outline_query::selection::parse_expression;
///
/// let expr = parse_expression("concat(\"#\", upper(Title))").unwrap();
/// assert_eq!(expr.variables(), vec!["Title".to_string()]);
/// ```
pub fn parse_expression(input: &str) -> Result<Expr, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("empty expression".to_string());
    }

    match all_consuming(delimited(ws, expr, ws))(trimmed) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let position = trimmed.len() - e.input.len();
            Err(format!(
                "unexpected input at position {}: '{}'",
                position,
                truncate(e.input, 20)
            ))
        }
        Err(nom::Err::Incomplete(_)) => Err("incomplete expression".to_string()),
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ============================================================================
// Precedence levels
// ============================================================================

fn expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(delimited(ws, additive_op, ws), term),
        move || first.clone(),
        |lhs, (op, rhs)| Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(delimited(ws, multiplicative_op, ws), unary),
        move || first.clone(),
        |lhs, (op, rhs)| Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )(input)
}

fn additive_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        map(char('+'), |_| BinaryOp::Add),
        map(char('-'), |_| BinaryOp::Sub),
    ))(input)
}

fn multiplicative_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        map(char('*'), |_| BinaryOp::Mul),
        map(char('/'), |_| BinaryOp::Div),
    ))(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        negative_number,
        map(preceded(pair(char('-'), ws), unary), |inner| {
            Expr::Neg(Box::new(inner))
        }),
        atom,
    ))(input)
}

// ============================================================================
// Atoms
// ============================================================================

fn atom(input: &str) -> IResult<&str, Expr> {
    alt((
        number,
        map(string_literal, |s| Expr::Literal(Value::String(s))),
        map(quoted_variable, |name| Expr::Variable(name.to_string())),
        identifier_atom,
        delimited(pair(char('('), ws), expr, pair(ws, char(')'))),
    ))(input)
}

fn number(input: &str) -> IResult<&str, Expr> {
    map_res(number_text, number_literal)(input)
}

/// `-` directly followed by digits, read as one literal so that
/// `i64::MIN` is representable.
fn negative_number(input: &str) -> IResult<&str, Expr> {
    map_res(recognize(pair(char('-'), number_text)), number_literal)(input)
}

fn number_text(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)
}

fn number_literal(text: &str) -> Result<Expr, ()> {
    if text.contains('.') {
        text.parse::<f64>()
            .map(|x| Expr::Literal(Value::Float(x)))
            .map_err(|_| ())
    } else {
        text.parse::<i64>()
            .map(|n| Expr::Literal(Value::Integer(n)))
            .map_err(|_| ())
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = char('"')(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Char,
                )))
            }
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(c) => out.push(c),
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        rest,
                        nom::error::ErrorKind::Escaped,
                    )))
                }
            },
            Some(c) => out.push(c),
        }
        rest = chars.as_str();
    }
}

/// Backquoted variable name, for names containing spaces or dashes.
fn quoted_variable(input: &str) -> IResult<&str, &str> {
    delimited(char('`'), take_while1(|c| c != '`'), char('`'))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(input)
}

/// Identifier followed by optional call arguments; covers keywords,
/// variables and function calls.
fn identifier_atom(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(preceded(ws, call_arguments))(input)?;

    let expr = match args {
        Some(args) => Expr::Call {
            name: name.to_string(),
            args,
        },
        None => match name {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            "null" => Expr::Literal(Value::Null),
            _ => Expr::Variable(name.to_string()),
        },
    };
    Ok((input, expr))
}

fn call_arguments(input: &str) -> IResult<&str, Vec<Expr>> {
    delimited(
        pair(char('('), ws),
        separated_list0(delimited(ws, char(','), ws), expr),
        pair(ws, char(')')),
    )(input)
}

/// Optional whitespace
fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}
