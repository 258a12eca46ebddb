//! Recursive-descent parser for CIL's s-expression surface syntax
//!
//! Implements the grammar from the specification:
//!
//! ```text
//! exprs  := s_expr+
//! s_expr := '(' items* ')'
//! items  := item ws*
//! item   := s_expr | atom
//! atom   := quoted_string | symbol
//! quoted_string := '"' (not '"')* '"'
//! symbol := [A-Za-z0-9_\-/]+
//! ws     := whitespace | ';' (not newline)* newline
//! ```
//!
//! The parser is not error-recovering: the first mismatch aborts parsing.

use nom::branch::alt;
use nom::bytes::complete::{take_while, take_while1};
use nom::character::complete::{char, none_of};
use nom::combinator::{map, recognize};
use nom::multi::{many0, many0_count, many1};
use nom::sequence::delimited;
use nom::{IResult, Parser};

use crate::error::ParseError;
use crate::node::Node;

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '/'
}

fn symbol(input: &str) -> IResult<&str, Node> {
    map(take_while1(is_symbol_char), |s: &str| {
        Node::Atom(s.to_string())
    })
    .parse(input)
}

fn quoted_string(input: &str) -> IResult<&str, Node> {
    map(
        recognize((char('"'), many0_count(none_of("\"")), char('"'))),
        |s: &str| Node::Atom(s.to_string()),
    )
    .parse(input)
}

fn atom(input: &str) -> IResult<&str, Node> {
    alt((quoted_string, symbol)).parse(input)
}

/// A single `;`-to-end-of-line comment, including its trailing newline
fn comment(input: &str) -> IResult<&str, &str> {
    recognize((char(';'), take_while(|c| c != '\n' && c != '\r'))).parse(input)
}

/// Whitespace and comments between tokens
fn ws(input: &str) -> IResult<&str, ()> {
    map(
        many0_count(alt((
            take_while1(|c: char| c.is_whitespace()),
            comment,
        ))),
        |_| (),
    )
    .parse(input)
}

fn item(input: &str) -> IResult<&str, Node> {
    alt((s_expr, atom)).parse(input)
}

fn s_expr(input: &str) -> IResult<&str, Node> {
    map(
        delimited(
            (char('('), ws),
            many0(delimited(ws, item, ws)),
            char(')'),
        ),
        Node::List,
    )
    .parse(input)
}

fn exprs(input: &str) -> IResult<&str, Vec<Node>> {
    delimited(ws, many1(delimited(ws, s_expr, ws)), ws).parse(input)
}

/// Parse a full CIL source buffer into its top-level s-expressions
pub fn parse_exprs(input: &str) -> Result<Vec<Node>, ParseError> {
    match exprs(input) {
        Ok((rest, nodes)) => {
            if rest.is_empty() {
                Ok(nodes)
            } else {
                Err(ParseError::new(input.len() - rest.len(), "')' or end of input"))
            }
        }
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            let offset = input.len() - e.input.len();
            Err(ParseError::new(offset, "a valid s-expression"))
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::new(input.len(), "more input")),
    }
}
