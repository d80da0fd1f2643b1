use crate::error::{MatrizError, Result};
use crate::process::utils::fold_name;

/// Known alternative titles for tabs the dashboard reads.
static TAB_ALIASES: &[(&str, &[&str])] = &[
    ("Prazos SAP", &["PRAZOS SAP", "Prazos_SAP", "Prazos"]),
    ("programação", &["programacao", "Programacao", "PROGRAMAÇÃO"]),
    ("GERAL", &["Geral"]),
    ("meta", &["Meta", "META"]),
];

fn aliases_for(requested: &str) -> &'static [&'static str] {
    let folded = fold_name(requested);
    TAB_ALIASES
        .iter()
        .find(|(name, _)| fold_name(name) == folded)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

fn match_one<'a>(wanted: &str, available: &'a [String]) -> Option<&'a String> {
    available.iter().find(|t| t.as_str() == wanted).or_else(|| {
        let folded = fold_name(wanted);
        available.iter().find(|t| fold_name(t) == folded)
    })
}

/// Resolve a requested tab title against the titles that actually exist.
///
/// Tries an exact match, then an accent/case-insensitive one, then the
/// fixed alias list for that tab.
pub fn locate_tab(requested: &str, available: &[String]) -> Result<String> {
    std::iter::once(requested)
        .chain(aliases_for(requested).iter().copied())
        .find_map(|wanted| match_one(wanted, available))
        .cloned()
        .ok_or_else(|| MatrizError::TabNotFound(requested.to_string()))
}
