//! Text front end: tokenizing source and building the [`Node`] tree.
//!
//! Tokenizing and parsing are separate passes. [`tokenize`] produces a flat
//! list of token strings, [`parse`] consumes tokens from the front of a slice
//! and returns one complete form, leaving the cursor just past it.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, opt, recognize},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded},
};

use crate::ast::{EndNode, Node};
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Parser limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseConfig {
    /// Lists nested deeper than this are rejected
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')' || c == '"'
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

fn paren(input: &str) -> IResult<&str, &str> {
    recognize(one_of("()")).parse(input)
}

/// A quoted section, quotes included. Whitespace and parens inside it are
/// part of the token.
fn quoted(input: &str) -> IResult<&str, &str> {
    recognize(delimited(char('"'), take_while(|c| c != '"'), char('"'))).parse(input)
}

fn bareword(input: &str) -> IResult<&str, &str> {
    take_while1(|c| !is_delimiter(c)).parse(input)
}

/// Any run of barewords and quoted sections with nothing between them
fn atom(input: &str) -> IResult<&str, &str> {
    recognize(many1(alt((quoted, bareword)))).parse(input)
}

fn token(input: &str) -> IResult<&str, &str> {
    preceded(whitespace, alt((paren, atom))).parse(input)
}

/// Split source text into tokens: `(`, `)`, and atoms. A string literal is
/// one token including its quotes, whatever it contains.
pub fn tokenize(input: &str) -> Result<Vec<String>, Error> {
    let (remaining, tokens) = many0(token).parse(input).map_err(|_| {
        ParseError::from_message(ParseErrorKind::MalformedToken, "Invalid token stream")
    })?;

    let remaining = remaining.trim_start();
    if !remaining.is_empty() {
        // Everything except an unclosed quote is consumed by `token`
        let offset = input.len() - remaining.len();
        return Err(ParseError::with_context(
            ParseErrorKind::UnterminatedString,
            format!("Unterminated string literal at position {offset}"),
            input,
            offset,
        )
        .into());
    }

    Ok(tokens.into_iter().map(str::to_owned).collect())
}

/// Decimal numeral: optional sign, digits with optional fraction (or a
/// leading `.`), optional exponent.
fn numeral(input: &str) -> IResult<&str, &str> {
    let mantissa = alt((
        recognize(pair(digit1, opt(pair(char('.'), digit0)))),
        recognize(pair(char('.'), digit1)),
    ));
    let exponent = recognize(pair(one_of("eE"), pair(opt(one_of("+-")), digit1)));

    recognize(pair(pair(opt(one_of("+-")), mantissa), opt(exponent))).parse(input)
}

fn parse_number(token: &str) -> Option<f64> {
    all_consuming(numeral)
        .parse(token)
        .ok()
        .and_then(|(_, numeral)| numeral.parse().ok())
}

/// Classify a single token as a number, a string literal or an identifier,
/// in that order.
pub fn create_end_node(token: &str) -> Result<EndNode, Error> {
    if token.is_empty() {
        return Err(ParseError::from_message(ParseErrorKind::MalformedToken, "Empty token").into());
    }

    if let Some(n) = parse_number(token) {
        return Ok(EndNode::Number(n));
    }

    if token.len() >= 2
        && let Some(inner) = token
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
    {
        return Ok(EndNode::String(inner.to_owned()));
    }

    Ok(EndNode::Identifier(token.to_owned()))
}

/// Parse one form from the front of `tokens`, advancing the slice past it.
/// Tokens after the form are left for the caller.
pub fn parse<S: AsRef<str>>(tokens: &mut &[S]) -> Result<Node, Error> {
    parse_with_config(tokens, &ParseConfig::default())
}

/// [`parse`] with explicit limits
pub fn parse_with_config<S: AsRef<str>>(
    tokens: &mut &[S],
    config: &ParseConfig,
) -> Result<Node, Error> {
    let Some(token) = next_token(tokens) else {
        return Err(ParseError::from_message(
            ParseErrorKind::UnexpectedEndOfInput,
            "Unexpected end of input",
        )
        .into());
    };

    match token {
        "(" => parse_list(tokens, 1, config),
        ")" => Err(ParseError::with_found(
            ParseErrorKind::UnexpectedToken,
            "Unexpected ')' with no open list",
            ")",
        )
        .into()),
        atom => Ok(Node::End(create_end_node(atom)?)),
    }
}

fn next_token<'a, S: AsRef<str>>(tokens: &mut &'a [S]) -> Option<&'a str> {
    let current: &'a [S] = *tokens;
    let (first, rest) = current.split_first()?;
    *tokens = rest;
    Some(first.as_ref())
}

/// Parse list elements after an opening paren, through the matching `)`
fn parse_list<S: AsRef<str>>(
    tokens: &mut &[S],
    depth: usize,
    config: &ParseConfig,
) -> Result<Node, Error> {
    if depth > config.max_depth {
        return Err(ParseError::from_message(
            ParseErrorKind::TooDeeplyNested,
            format!(
                "Expression too deeply nested (max depth: {})",
                config.max_depth
            ),
        )
        .into());
    }

    let mut elements = Vec::new();
    loop {
        match next_token(tokens) {
            None => {
                return Err(ParseError::from_message(
                    ParseErrorKind::UnexpectedEndOfInput,
                    "Unexpected end of input: expected ')'",
                )
                .into());
            }
            Some("(") => elements.push(parse_list(tokens, depth + 1, config)?),
            Some(")") => return Ok(Node::List(elements.into())),
            Some(atom) => elements.push(Node::End(create_end_node(atom)?)),
        }
    }
}

/// Tokenize `input` and parse its first top-level form. Anything after that
/// form is ignored.
pub fn parse_str(input: &str) -> Result<Node, Error> {
    let tokens = tokenize(input)?;
    let mut cursor = tokens.as_slice();
    let node = parse(&mut cursor)?;
    if !cursor.is_empty() {
        tracing::debug!(
            ignored = cursor.len(),
            "ignoring tokens after the first top-level form"
        );
    }
    Ok(node)
}
