use cil_parser::{parse_exprs, Node};
use proptest::prelude::*;

#[test]
fn parses_simple_allow_rule() {
    let exprs = parse_exprs("(allow httpd_t http_port_t (tcp_socket (name_bind)))").unwrap();
    assert_eq!(exprs.len(), 1);
    let list = exprs[0].as_list().unwrap();
    assert_eq!(list[0].as_atom(), Some("allow"));
    assert_eq!(list[1].as_atom(), Some("httpd_t"));
    assert_eq!(list[2].as_atom(), Some("http_port_t"));
    let class = list[3].as_list().unwrap();
    assert_eq!(class[0].as_atom(), Some("tcp_socket"));
}

#[test]
fn parses_multiple_top_level_expressions() {
    let exprs = parse_exprs("(a b)\n(c d)").unwrap();
    assert_eq!(exprs.len(), 2);
}

#[test]
fn skips_comments_and_whitespace() {
    let src = "; a leading comment\n(allow a b ; trailing comment\n  (c (d)))\n";
    let exprs = parse_exprs(src).unwrap();
    assert_eq!(exprs.len(), 1);
    assert_eq!(exprs[0].head(), Some("allow"));
}

#[test]
fn quoted_strings_keep_their_quotes() {
    let exprs = parse_exprs(r#"(typetransition init_t bin_t file "foo" foo_t)"#).unwrap();
    let list = exprs[0].as_list().unwrap();
    assert!(list[4].is_quoted_string());
    assert_eq!(list[4].as_atom(), Some("\"foo\""));
}

#[test]
fn symbols_allow_slashes_and_hyphens() {
    let exprs = parse_exprs("(genfscon ext4 / foo-bar/baz)").unwrap();
    let list = exprs[0].as_list().unwrap();
    assert_eq!(list[2].as_atom(), Some("/"));
    assert_eq!(list[3].as_atom(), Some("foo-bar/baz"));
}

#[test]
fn rejects_unbalanced_parens() {
    assert!(parse_exprs("(allow a b").is_err());
}

#[test]
fn rejects_empty_input() {
    assert!(parse_exprs("").is_err());
    assert!(parse_exprs("   ; only a comment\n").is_err());
}

fn render(node: &Node) -> String {
    node.to_string()
}

proptest! {
    /// Property 1: re-serializing a parsed, comment-free tree and re-parsing
    /// it yields an equal tree.
    #[test]
    fn round_trips_through_display(symbols in prop::collection::vec("[a-zA-Z][a-zA-Z0-9_-]{0,8}", 1..6)) {
        let src = format!("({})", symbols.join(" "));
        let parsed = parse_exprs(&src).unwrap();
        let rendered = render(&parsed[0]);
        let reparsed = parse_exprs(&rendered).unwrap();
        prop_assert_eq!(parsed, reparsed);
    }
}
