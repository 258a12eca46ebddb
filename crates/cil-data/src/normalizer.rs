//! Walks a parsed CIL tree, flattening `optional`/`booleanif` nesting and
//! classifying statements into TE/TAS/TT record streams.

use std::collections::HashSet;

use cil_parser::Node;

use crate::canonical::{canonical_string, expr_repr};
use crate::context::Context;
use crate::error::{NormalizerError, Result};
use crate::records::{RuleKind, TASet, TERule, Typetransition};

/// Heads that are recognized as benign, non-extracted CIL statements and
/// silently accepted and dropped.
///
/// This whitelist was drawn by enumeration against common CIL policy
/// corpora rather than the formal CIL grammar; see DESIGN.md for the
/// decision to keep it as a fixed list rather than a generated one.
const BENIGN_HEADS: &[&str] = &[
    "class",
    "classorder",
    "classcommon",
    "classmap",
    "classmapping",
    "classpermission",
    "classpermissionset",
    "role",
    "roletype",
    "roletransition",
    "roleallow",
    "userrole",
    "user",
    "userlevel",
    "userrange",
    "sid",
    "sidorder",
    "sidcontext",
    "mls",
    "mlsconstrain",
    "sensitivity",
    "sensitivityalias",
    "sensitivityorder",
    "sensitivitycategory",
    "category",
    "categoryalias",
    "categoryorder",
    "fsuse",
    "filecon",
    "genfscon",
    "nodecon",
    "netifcon",
    "portcon",
    "pirqcon",
    "iomemcon",
    "ioportcon",
    "pcidevicecon",
    "devicetreecon",
    "ibpkeycon",
    "ibendportcon",
    "policycap",
    "context",
    "constrain",
    "validatetrans",
    "mlsvalidatetrans",
    "typealias",
    "typealiasactual",
    "typebounds",
    "typepermissive",
    "type",
    "attribute",
    "roleattribute",
    "bounds",
];

/// The three record streams produced by normalizing one file.
#[derive(Debug, Default, Clone)]
pub struct Normalized {
    pub te: Vec<TERule>,
    pub tas: Vec<TASet>,
    pub tt: Vec<Typetransition>,
}

/// Normalize the top-level expressions of one parsed CIL file.
pub fn normalize(file: &str, exprs: &[Node]) -> Result<Normalized> {
    let mut out = Normalized::default();
    walk(exprs, &Context::new(), file, &mut out)?;
    Ok(out)
}

fn walk(exprs: &[Node], ctx: &Context, file: &str, out: &mut Normalized) -> Result<()> {
    let mut seen = HashSet::new();
    for e in exprs {
        process(e, ctx, file, out, &mut seen)?;
    }
    Ok(())
}

fn shape_error(file: &str, head: &str, detail: impl Into<String>) -> NormalizerError {
    NormalizerError::ShapeAssert {
        file: file.to_string(),
        head: head.to_string(),
        detail: detail.into(),
    }
}

fn process(e: &Node, ctx: &Context, file: &str, out: &mut Normalized, seen: &mut HashSet<String>) -> Result<()> {
    let Some(list) = e.as_list() else {
        return Err(shape_error(file, "<atom>", "expected a list at top level"));
    };
    let Some(head) = e.head() else {
        return Err(shape_error(file, "<empty>", "empty list has no head"));
    };

    if head == "optional" {
        let name = list
            .get(1)
            .and_then(Node::as_atom)
            .ok_or_else(|| shape_error(file, head, "missing optional name"))?;
        let new_ctx = ctx.with_optional(name);
        return walk(&list[2..], &new_ctx, file, out);
    }

    if head == "booleanif" {
        let condition = list
            .get(1)
            .ok_or_else(|| shape_error(file, head, "missing boolean condition"))?;
        let condition_repr = expr_repr(condition);
        for branch in &list[2..] {
            let branch_list = branch
                .as_list()
                .ok_or_else(|| shape_error(file, head, "branch must be a list"))?;
            let selector = branch_list
                .first()
                .and_then(Node::as_atom)
                .ok_or_else(|| shape_error(file, head, "branch missing true/false selector"))?;
            let selected = selector == "true";
            let new_ctx = ctx.with_boolean_branch(&condition_repr, selected);
            walk(&branch_list[1..], &new_ctx, file, out)?;
        }
        return Ok(());
    }

    if (head == "typeattributeset" || head == "roleattributeset")
        && list.get(1).and_then(Node::as_atom) == Some("cil_gen_require")
    {
        return Ok(());
    }

    // Only leaf statements (not optional/booleanif wrappers) participate in
    // the per-scope dedup, matching the Python reference's placement of its
    // `e_str in seen` check after the recursive-construct handling.
    if !seen.insert(expr_repr(e)) {
        return Ok(());
    }

    if let Some(kind) = RuleKind::from_head(head) {
        return classify_te(e, kind, list, ctx, file, out);
    }

    match head {
        "typeattributeset" => classify_tas(e, list, ctx, file, out),
        "typetransition" => classify_tt(e, list, ctx, file, out),
        h if BENIGN_HEADS.contains(&h) => Ok(()),
        h => Err(NormalizerError::UnknownHead {
            file: file.to_string(),
            head: h.to_string(),
        }),
    }
}

fn classify_te(
    e: &Node,
    kind: RuleKind,
    list: &[Node],
    ctx: &Context,
    file: &str,
    out: &mut Normalized,
) -> Result<()> {
    if list.len() != 4 {
        return Err(shape_error(
            file,
            &kind.to_string(),
            format!("expected (kind source target (class (perms...))), got {} tokens", list.len()),
        ));
    }
    let source = list[1]
        .as_atom()
        .ok_or_else(|| shape_error(file, &kind.to_string(), "source must be an atom"))?;
    let target = list[2]
        .as_atom()
        .ok_or_else(|| shape_error(file, &kind.to_string(), "target must be an atom"))?;
    let class_list = list[3]
        .as_list()
        .ok_or_else(|| shape_error(file, &kind.to_string(), "expected (class (perms...))"))?;
    let class = class_list
        .first()
        .and_then(Node::as_atom)
        .ok_or_else(|| shape_error(file, &kind.to_string(), "missing class symbol"))?;
    let perms_list = class_list
        .get(1)
        .and_then(Node::as_list)
        .ok_or_else(|| shape_error(file, &kind.to_string(), "missing permission list"))?;
    let perms = perms_list
        .iter()
        .map(|p| p.as_atom().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| shape_error(file, &kind.to_string(), "permissions must be atoms"))?;

    out.te.push(TERule {
        rule_kind: kind,
        source: source.to_string(),
        target: target.to_string(),
        class: class.to_string(),
        perms,
        optional_path: ctx.optional_path.clone(),
        boolean_values: ctx.boolean_values.clone(),
        file: file.to_string(),
        string: canonical_string(ctx, e),
    });
    Ok(())
}

fn classify_tas(e: &Node, list: &[Node], ctx: &Context, file: &str, out: &mut Normalized) -> Result<()> {
    if list.len() != 3 {
        return Err(shape_error(
            file,
            "typeattributeset",
            format!("expected (typeattributeset attr members-or-logic), got {} tokens", list.len()),
        ));
    }
    let attr = list[1]
        .as_atom()
        .ok_or_else(|| shape_error(file, "typeattributeset", "attr must be an atom"))?;
    let body = list[2]
        .as_list()
        .ok_or_else(|| shape_error(file, "typeattributeset", "expected a members-or-logic list"))?;

    let is_logical = matches!(body.first().and_then(Node::as_atom), Some("and" | "or" | "not"));
    let members = if is_logical {
        Vec::new()
    } else {
        body.iter()
            .map(|m| m.as_atom().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| shape_error(file, "typeattributeset", "members must be atoms"))?
    };

    out.tas.push(TASet {
        attr: attr.to_string(),
        members,
        is_logical,
        optional_path: ctx.optional_path.clone(),
        boolean_values: ctx.boolean_values.clone(),
        file: file.to_string(),
        string: canonical_string(ctx, e),
    });
    Ok(())
}

fn classify_tt(e: &Node, list: &[Node], ctx: &Context, file: &str, out: &mut Normalized) -> Result<()> {
    if list.len() != 5 && list.len() != 6 {
        return Err(shape_error(
            file,
            "typetransition",
            format!("expected 5 or 6 tokens, got {}", list.len()),
        ));
    }
    let subject = list[1]
        .as_atom()
        .ok_or_else(|| shape_error(file, "typetransition", "subject must be an atom"))?;
    let source = list[2]
        .as_atom()
        .ok_or_else(|| shape_error(file, "typetransition", "source must be an atom"))?;
    let class = list[3]
        .as_atom()
        .ok_or_else(|| shape_error(file, "typetransition", "class must be an atom"))?;

    let (target, filename) = if list.len() == 6 {
        let filename = list[4]
            .as_atom()
            .ok_or_else(|| shape_error(file, "typetransition", "filename must be an atom"))?;
        let target = list[5]
            .as_atom()
            .ok_or_else(|| shape_error(file, "typetransition", "target must be an atom"))?;
        (target, Some(filename.to_string()))
    } else {
        let target = list[4]
            .as_atom()
            .ok_or_else(|| shape_error(file, "typetransition", "target must be an atom"))?;
        (target, None)
    };

    out.tt.push(Typetransition {
        subject: subject.to_string(),
        source: source.to_string(),
        class: class.to_string(),
        target: target.to_string(),
        filename,
        optional_path: ctx.optional_path.clone(),
        boolean_values: ctx.boolean_values.clone(),
        file: file.to_string(),
        string: canonical_string(ctx, e),
    });
    Ok(())
}
