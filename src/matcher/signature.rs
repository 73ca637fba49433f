//! Signature extraction
//!
//! Product name / localized name / declared category → expected visual
//! signature. Every keyword match is kept; a name can span categories.

use super::types::Signature;
use catalog_reconcile_common::taxonomy::{
    CategoryTag, ALL_TAGS, PRIMARY_KEYWORDS, SECONDARY_KEYWORDS,
};
use catalog_reconcile_common::Product;
use regex::Regex;

/// Lowercase a text into space-separated tokens, padded with spaces
///
/// `" okara vegetable patties "` lets phrases match on token boundaries.
pub fn normalize_phrase(text: &str) -> String {
    lazy_static::lazy_static! {
        static ref TOKEN_SPLIT: Regex = Regex::new(r"[^\p{L}\p{N}]+").unwrap();
    }

    let tokens: Vec<String> = TOKEN_SPLIT
        .split(&text.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    format!(" {} ", tokens.join(" "))
}

/// Whole-token phrase containment on a normalized text
pub fn contains_phrase(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {} ", phrase))
}

/// Secondary-language tokens (no case folding, at least two characters)
fn localized_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
}

/// Derive the signature of a product
pub fn extract_signature(product: &Product) -> Signature {
    let mut signature = Signature {
        product_id: product.id.clone(),
        ..Default::default()
    };

    let mut names = vec![product.name.as_str()];
    if let Some(localized) = product.localized_name.as_deref() {
        names.push(localized);
    }

    for name in &names {
        let normalized = normalize_phrase(name);
        for (keyword, tag) in PRIMARY_KEYWORDS {
            if contains_phrase(&normalized, keyword) {
                signature.tags.insert(*tag);
                signature.required_keywords.insert(keyword.to_string());
            }
        }

        for (keyword, tag) in SECONDARY_KEYWORDS {
            if name.contains(keyword) {
                signature.tags.insert(*tag);
                signature.required_keywords.insert(keyword.to_string());
            }
        }
    }

    if signature.tags.is_empty() {
        if let Some(tag) = product.category.as_deref().and_then(CategoryTag::from_declared) {
            signature.tags.insert(tag);
            signature.from_declared_category = true;
        }
    }

    for tag in ALL_TAGS {
        if tag.variant().is_none() || signature.tags.contains(tag) {
            continue;
        }
        signature.forbidden_keywords.extend(tag.keywords().map(str::to_string));
        signature.forbidden_keywords.extend(
            SECONDARY_KEYWORDS
                .iter()
                .filter(|(_, t)| t == tag)
                .map(|(kw, _)| kw.to_string()),
        );
    }

    if let Some(localized) = product.localized_name.as_deref() {
        signature.localized_tokens.extend(localized_tokens(localized));
    }

    signature
}
