//! Mention and internal-reference extraction from HTML bodies.
//!
//! Post descriptions, note bodies, and comments are stored as editor HTML.
//! Mentions are `<span data-type="mention" data-id="…">` nodes; member
//! mentions may carry `data-role="member"` while app mentions always carry
//! `data-role="app"` (older member mentions have no role attribute at all).
//! Internal references are links whose href path points at a post, note,
//! or comment (`…/posts/{id}`, `…/notes/{id}`, `…/comments/{id}`).

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::models::SubjectRef;

static MENTION_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<span\b[^>]*data-type="mention"[^>]*>"#).expect("valid regex"));

static DATA_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-id="([^"]+)""#).expect("valid regex"));

static DATA_ROLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-role="([^"]+)""#).expect("valid regex"));

static REFERENCE_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="[^"]*/(posts|notes|comments)/([0-9a-fA-F-]{36})[^"]*""#)
        .expect("valid regex")
});

/// Mentions extracted from one HTML body, deduplicated in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mentions {
    pub member_ids: Vec<Uuid>,
    pub app_ids: Vec<Uuid>,
}

/// Extract member and app mentions from an HTML body.
///
/// Duplicate mentions of the same entity collapse to one. Unparseable
/// `data-id` values are ignored rather than raised — the body is
/// user-controlled input.
pub fn parse_mentions(html: &str) -> Mentions {
    let mut mentions = Mentions::default();

    for span in MENTION_SPAN.find_iter(html) {
        let tag = span.as_str();
        let Some(id) = DATA_ID
            .captures(tag)
            .and_then(|c| c.get(1))
            .and_then(|m| Uuid::parse_str(m.as_str()).ok())
        else {
            continue;
        };

        // Mentions without a data-role predate app mentions and are always
        // member mentions.
        let is_app = DATA_ROLE
            .captures(tag)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str() == "app")
            .unwrap_or(false);

        let bucket = if is_app {
            &mut mentions.app_ids
        } else {
            &mut mentions.member_ids
        };
        if !bucket.contains(&id) {
            bucket.push(id);
        }
    }

    mentions
}

/// Member ids mentioned in `current` but not in `previous`.
///
/// Update processors notify only newly mentioned members, never renotify.
pub fn new_member_mentions(previous: Option<&str>, current: &str) -> Vec<Uuid> {
    let previous_ids = previous.map(parse_mentions).unwrap_or_default().member_ids;
    parse_mentions(current)
        .member_ids
        .into_iter()
        .filter(|id| !previous_ids.contains(id))
        .collect()
}

/// App ids mentioned in `current` but not in `previous`.
pub fn new_app_mentions(previous: Option<&str>, current: &str) -> Vec<Uuid> {
    let previous_ids = previous.map(parse_mentions).unwrap_or_default().app_ids;
    parse_mentions(current)
        .app_ids
        .into_iter()
        .filter(|id| !previous_ids.contains(id))
        .collect()
}

/// Extract internal record references from an HTML body, deduplicated in
/// document order. Matches both inline links and link-unfurl nodes since
/// both carry an `href` attribute.
pub fn parse_references(html: &str) -> Vec<SubjectRef> {
    let mut refs = Vec::new();
    for caps in REFERENCE_HREF.captures_iter(html) {
        let Ok(id) = Uuid::parse_str(&caps[2]) else {
            continue;
        };
        let subject = match &caps[1] {
            "posts" => SubjectRef::post(id),
            "notes" => SubjectRef::note(id),
            "comments" => SubjectRef::comment(id),
            _ => continue,
        };
        if !refs.contains(&subject) {
            refs.push(subject);
        }
    }
    refs
}

/// Format a member mention span the way the editor produces them.
/// Primarily useful for building test bodies.
pub fn format_member_mention(member_id: Uuid, label: &str) -> String {
    format!(
        r#"<span data-type="mention" data-id="{member_id}" data-label="{label}" data-role="member">@{label}</span>"#
    )
}

/// Format an app mention span.
pub fn format_app_mention(app_id: Uuid, label: &str) -> String {
    format!(
        r#"<span data-type="mention" data-id="{app_id}" data-label="{label}" data-role="app">@{label}</span>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubjectKind;

    #[test]
    fn test_parse_member_mentions() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let html = format!(
            "<p>{} and {}</p>",
            format_member_mention(a, "alice"),
            format_member_mention(b, "bob")
        );

        let mentions = parse_mentions(&html);
        assert_eq!(mentions.member_ids, vec![a, b]);
        assert!(mentions.app_ids.is_empty());
    }

    #[test]
    fn test_parse_mentions_without_role_are_member_mentions() {
        let id = Uuid::new_v4();
        let html = format!(r#"<span data-type="mention" data-id="{id}">@alice</span>"#);

        let mentions = parse_mentions(&html);
        assert_eq!(mentions.member_ids, vec![id]);
    }

    #[test]
    fn test_parse_app_mentions() {
        let app = Uuid::new_v4();
        let html = format!("<p>hey {}</p>", format_app_mention(app, "deploybot"));

        let mentions = parse_mentions(&html);
        assert!(mentions.member_ids.is_empty());
        assert_eq!(mentions.app_ids, vec![app]);
    }

    #[test]
    fn test_parse_mentions_deduplicates() {
        let id = Uuid::new_v4();
        let span = format_member_mention(id, "alice");
        let html = format!("<p>{span} {span} {span}</p>");

        let mentions = parse_mentions(&html);
        assert_eq!(mentions.member_ids, vec![id]);
    }

    #[test]
    fn test_parse_mentions_ignores_invalid_ids() {
        let html = r#"<span data-type="mention" data-id="not-a-uuid">@ghost</span>"#;
        assert_eq!(parse_mentions(html), Mentions::default());
    }

    #[test]
    fn test_new_member_mentions_diff() {
        let kept = Uuid::new_v4();
        let added = Uuid::new_v4();
        let previous = format!("<p>{}</p>", format_member_mention(kept, "alice"));
        let current = format!(
            "<p>{} {}</p>",
            format_member_mention(kept, "alice"),
            format_member_mention(added, "bob")
        );

        assert_eq!(new_member_mentions(Some(&previous), &current), vec![added]);
    }

    #[test]
    fn test_new_member_mentions_with_no_previous_body() {
        let id = Uuid::new_v4();
        let current = format!("<p>{}</p>", format_member_mention(id, "alice"));
        assert_eq!(new_member_mentions(None, &current), vec![id]);
    }

    #[test]
    fn test_parse_references_posts_notes_comments() {
        let post = Uuid::new_v4();
        let note = Uuid::new_v4();
        let comment = Uuid::new_v4();
        let html = format!(
            r#"<a href="https://app.example.com/acme/posts/{post}">plan</a>
               <link-unfurl href="https://app.example.com/acme/notes/{note}"></link-unfurl>
               <a href="https://app.example.com/acme/comments/{comment}">thread</a>"#
        );

        let refs = parse_references(&html);
        assert_eq!(
            refs,
            vec![
                SubjectRef::post(post),
                SubjectRef::note(note),
                SubjectRef::comment(comment),
            ]
        );
    }

    #[test]
    fn test_parse_references_deduplicates() {
        let post = Uuid::new_v4();
        let href = format!(r#"<a href="https://app.example.com/acme/posts/{post}">x</a>"#);
        let html = format!("{href}{href}");

        let refs = parse_references(&html);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, SubjectKind::Post);
    }

    #[test]
    fn test_parse_references_ignores_external_links() {
        let html = r#"<a href="https://example.com/blog/42">external</a>"#;
        assert!(parse_references(html).is_empty());
    }
}
