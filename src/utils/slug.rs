//! Slug derivation and resolution for catalog entries.
//!
//! Two encodings exist for the same catalog:
//!
//! - [`SlugPolicy::IdSuffix`]: `"{slugify(name)}-{id}"`. Always unique, the name part is cosmetic.
//! - [`SlugPolicy::NameRank`]: `slugify(name)`, with `-{rank}` appended to every duplicate
//!   after the lowest-id one. Needs the whole collection both to build and to resolve.
//!
//! A link built under one policy only resolves under the same policy.

use crate::catalog::CatalogItem;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use regex::Regex;

/// Normalize a display name into a URL-safe token.
///
/// Non-ASCII letters are stripped rather than transliterated, so
/// `"Café Müller"` becomes `"caf-mller"`.
pub fn slugify<'a>(text: impl Into<Option<&'a str>>) -> String {
    let Some(text) = text.into() else { return String::new() };

    let lowered = text.to_lowercase();
    let kept = lowered
        .trim_matches(is_js_whitespace)
        .chars()
        .filter(|&c| is_word_char(c) || is_js_whitespace(c) || c == '-');

    let mut slug = String::with_capacity(lowered.len());
    let mut in_separator = false;
    for c in kept {
        if is_js_whitespace(c) || c == '_' || c == '-' {
            in_separator = true;
            continue;
        }
        if in_separator && !slug.is_empty() {
            slug.push('-');
        }
        in_separator = false;
        slug.push(c);
    }

    slug
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// ECMAScript `\s`: includes U+FEFF, excludes U+0085, unlike `char::is_whitespace`
fn is_js_whitespace(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | ' ' | '\u{A0}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}' | '\u{3000}' | '\u{FEFF}'
    )
}

/// Policy A: `"{slugify(name)}-{id}"`.
pub fn create_slug(id: i64, name: &str) -> String {
    format!("{}-{id}", slugify(name))
}

/// Reads the id out of an id-suffixed slug.
///
/// Only the segment after the last `-` is looked at, and only its leading digits count,
/// so `"tool-12abc"` still yields `12`. Returns `None` when there are no digits to read.
pub fn extract_id_from_slug(slug: &str) -> Option<i64> {
    let tail = slug.rsplit('-').next()?.trim_start();
    let digits_end = tail
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(tail.len(), |(i, _)| i);

    tail[..digits_end].parse().ok()
}

/// Policy A resolution: look the embedded id up, ignore the name part.
pub fn resolve_slug_by_id<'a, T: CatalogItem>(slug: &str, collection: &'a [T]) -> Option<&'a T> {
    let id = extract_id_from_slug(slug)?;
    collection.iter().find(|item| item.id() == id)
}

/// Items whose slugified name equals `base`, sorted by ascending id.
fn ranked_duplicates<'a, T: CatalogItem>(base: &str, collection: &'a [T]) -> Vec<&'a T> {
    let mut duplicates: Vec<_> = collection
        .iter()
        .filter(|item| slugify(item.name()) == base)
        .collect();
    duplicates.sort_by_key(|item| item.id());
    duplicates
}

/// Policy B: name-based slug, disambiguated by rank among items sharing the same base slug.
///
/// The lowest id keeps the bare base, the item at rank `k >= 1` gets `"{base}-{k + 1}"`.
/// An `id` missing from the duplicates gets the bare base.
pub fn create_slug_by_name<T: CatalogItem>(name: &str, collection: &[T], id: i64) -> String {
    let base = slugify(name);
    let duplicates = ranked_duplicates(&base, collection);

    if duplicates.len() <= 1 {
        return base;
    }

    match duplicates.iter().position(|item| item.id() == id) {
        Some(rank) if rank > 0 => format!("{base}-{}", rank + 1),
        _ => base,
    }
}

/// Policy B resolution.
///
/// A trailing `-{n}` with `n >= 2` is first read as a duplicate rank. When fewer than `n`
/// items share the candidate base, the whole slug is matched literally instead, since
/// names can legitimately end in a number.
pub fn resolve_slug<'a, T: CatalogItem>(slug: &str, collection: &'a [T]) -> Option<&'a T> {
    static RE_RANKED: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(?P<base>.*)-(?P<rank>[0-9]+)$").unwrap());

    if let Some(caps) = RE_RANKED.captures(slug) {
        let rank = caps["rank"].parse::<usize>().ok().filter(|&n| n >= 2);
        if let Some(rank) = rank {
            let duplicates = ranked_duplicates(&caps["base"], collection);
            if duplicates.len() >= rank {
                return Some(duplicates[rank - 1]);
            }
        }
    }

    ranked_duplicates(slug, collection).into_iter().next()
}

/// How slugs are built and resolved for one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlugPolicy {
    IdSuffix,
    NameRank,
}

impl SlugPolicy {
    pub fn build<T: CatalogItem>(&self, item: &T, collection: &[T]) -> String {
        match self {
            Self::IdSuffix => create_slug(item.id(), item.name()),
            Self::NameRank => create_slug_by_name(item.name(), collection, item.id()),
        }
    }

    pub fn resolve<'a, T: CatalogItem>(&self, slug: &str, collection: &'a [T]) -> Option<&'a T> {
        match self {
            Self::IdSuffix => resolve_slug_by_id(slug, collection),
            Self::NameRank => resolve_slug(slug, collection),
        }
    }
}
