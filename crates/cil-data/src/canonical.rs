//! Canonical string rendering
//!
//! The canonical string of a record is `ctx1 ctx2 ... ctxN <expr-repr>`: the
//! [`Context`](crate::context::Context) display form followed by the
//! expression's own s-expression text. It is the dedup key within a file and
//! the display/diff key across the whole store.

use cil_parser::Node;

use crate::context::Context;

/// Render an s-expression node back to text, independent of any context.
///
/// This is the same rendering [`Node`]'s `Display` impl produces, exposed
/// here under the name the rest of the crate uses it by.
pub fn expr_repr(node: &Node) -> String {
    node.to_string()
}

/// Render the full canonical string: context prefix, then the bare expression.
pub fn canonical_string(ctx: &Context, node: &Node) -> String {
    let ctx_str = ctx.to_string();
    if ctx_str.is_empty() {
        expr_repr(node)
    } else {
        format!("{ctx_str} {}", expr_repr(node))
    }
}
