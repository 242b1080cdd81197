//! Explanation trees
//!
//! Renders why a fact is in working memory as a text tree. Each node under
//! a WME is one of its justifications; a production node's children are
//! the WMEs of its supporting token, a defuzzification node's children are
//! the component fuzzy WMEs, and axiomatic / fuzzification reasons are
//! leaves. A WME already visited on the current path is printed with a
//! `(*)` marker and not expanded further: cycles are permitted in the
//! justification graph and broken only here, at display time.

use std::rc::Rc;

use crate::tms::{Justification, JustificationStore};
use crate::wme::{wme_ptr, Wme};

/// Render the full justification tree for a WME.
pub fn explain_tree(wme: &Rc<Wme>, store: &JustificationStore) -> String {
    let mut out = String::new();
    out.push_str(&wme.to_string());
    out.push('\n');
    let mut path = vec![wme_ptr(wme)];
    render_justifications(wme, store, "", &mut path, &mut out);
    out
}

fn render_justifications(
    wme: &Rc<Wme>,
    store: &JustificationStore,
    prefix: &str,
    path: &mut Vec<usize>,
    out: &mut String,
) {
    let justifications = store.justifications_of(wme);
    if justifications.is_empty() {
        eprintln!(
            "tenet: warning: {} has no recorded justification; \
             the justification store is inconsistent",
            wme
        );
        out.push_str(prefix);
        out.push_str("└ [No justification recorded]\n");
        return;
    }

    let count = justifications.len();
    for (i, justification) in justifications.iter().enumerate() {
        let last = i == count - 1;
        let branch = if last { "└ " } else { "├ " };
        let child_prefix = format!("{}{}", prefix, if last { "  " } else { "│ " });

        match justification {
            Justification::Axiomatic => {
                out.push_str(prefix);
                out.push_str(branch);
                out.push_str("[Axiomatic]\n");
            }
            Justification::Fuzzification { source, .. } => {
                out.push_str(prefix);
                out.push_str(branch);
                out.push_str(&format!("[Fuzzification of: {}]\n", source));
            }
            Justification::Production { rule, token } => {
                out.push_str(prefix);
                out.push_str(branch);
                out.push_str(&format!("[Rule: {}]\n", rule));
                render_wmes(&token.wmes, store, &child_prefix, path, out);
            }
            Justification::Defuzzification { components } => {
                out.push_str(prefix);
                out.push_str(branch);
                out.push_str("[Defuzzification]\n");
                render_wmes(components, store, &child_prefix, path, out);
            }
        }
    }
}

fn render_wmes(
    wmes: &[Rc<Wme>],
    store: &JustificationStore,
    prefix: &str,
    path: &mut Vec<usize>,
    out: &mut String,
) {
    let count = wmes.len();
    for (i, wme) in wmes.iter().enumerate() {
        let last = i == count - 1;
        let branch = if last { "└ " } else { "├ " };
        let child_prefix = format!("{}{}", prefix, if last { "  " } else { "│ " });

        out.push_str(prefix);
        out.push_str(branch);
        if path.contains(&wme_ptr(wme)) {
            out.push_str(&format!("{} (*)\n", wme));
            continue;
        }
        out.push_str(&format!("{}\n", wme));
        path.push(wme_ptr(wme));
        render_justifications(wme, store, &child_prefix, path, out);
        path.pop();
    }
}
