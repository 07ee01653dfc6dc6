//! The fixed set of GitHub URL templates the crawler understands.
//!
//! Several GitHub resource fields carry RFC 6570-style templates, e.g.
//! `https://api.github.com/orgs/acme/members{/member}`. The crawler only
//! ever meets four of them, so these helpers recognize exactly that set
//! instead of pulling in a URI-template engine.

/// Template expressions that can appear in crawled GitHub URLs.
pub const KNOWN_TEMPLATES: &[&str] = &["{/member}", "{/collaborator}", "{/number}", "{/sha}"];

/// Removes one template expression from a URL, yielding the collection
/// endpoint.
///
/// `strip_template("https://x/members{/member}", "{/member}")` yields
/// `https://x/members`. A URL that does not contain the template is
/// returned unchanged.
pub fn strip_template(url: &str, template: &str) -> String {
    debug_assert!(KNOWN_TEMPLATES.contains(&template));
    url.replacen(template, "", 1)
}

/// Substitutes a value into a template expression, yielding the element
/// endpoint.
///
/// `substitute_template("https://x/comments{/number}", "{/number}", "9")`
/// yields `https://x/comments/9`.
pub fn substitute_template(url: &str, template: &str, value: &str) -> String {
    debug_assert!(KNOWN_TEMPLATES.contains(&template));
    url.replacen(template, &format!("/{}", value), 1)
}
