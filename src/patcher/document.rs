//! In-place catalog document
//!
//! The catalog is kept as text. Records are the `{ ... }` object spans
//! found by a string- and comment-aware brace scan; a field belongs to a
//! record only when it sits at the record's own nesting level. Edits
//! splice the bytes of one field value and leave every other byte alone.

use super::PatchFailureKind;
use catalog_reconcile_common::Product;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;

/// How records are written in the catalog file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RecordSyntax {
    /// JSON array of objects, or `{"products": [...]}`
    #[default]
    Json,
    /// Source file with object literals (`id: 'td-001', image: '...'`)
    ObjectLiteral,
}

impl RecordSyntax {
    /// `.json` files are JSON, anything else (`.ts`, `.js`) object literals
    pub fn from_path(path: &Path) -> Self {
        match path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
            Some(ext) if ext == "json" => RecordSyntax::Json,
            _ => RecordSyntax::ObjectLiteral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id = 0,
    Name,
    LocalizedName,
    Category,
    Image,
}

const ALL_FIELDS: [Field; 5] = [
    Field::Id,
    Field::Name,
    Field::LocalizedName,
    Field::Category,
    Field::Image,
];

/// Key of each product field in the catalog file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldNames {
    pub id: String,
    pub name: String,
    pub localized_name: String,
    pub category: String,
    pub image: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            name: "name".to_string(),
            localized_name: "nameHe".to_string(),
            category: "category".to_string(),
            image: "image".to_string(),
        }
    }
}

impl FieldNames {
    pub fn key(&self, field: Field) -> &str {
        match field {
            Field::Id => &self.id,
            Field::Name => &self.name,
            Field::LocalizedName => &self.localized_name,
            Field::Category => &self.category,
            Field::Image => &self.image,
        }
    }
}

/// Byte range of one located record (`{` through `}`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHandle {
    span: Range<usize>,
}

/// A string field value inside a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    /// Raw bytes between the quotes
    pub range: Range<usize>,
    /// Decoded value
    pub value: String,
    pub quote: u8,
}

/// Per-byte scan results
#[derive(Debug, Clone, Default)]
struct Layout {
    spans: Vec<Range<usize>>,
    depth: Vec<u32>,
    /// Byte is outside strings and comments
    code: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Code,
    Str(u8),
    LineComment,
    BlockComment,
}

fn scan(text: &str) -> Layout {
    let bytes = text.as_bytes();
    let n = bytes.len();
    let mut layout = Layout {
        spans: Vec::new(),
        depth: vec![0; n],
        code: vec![false; n],
    };

    let mut state = ScanState::Code;
    let mut depth: u32 = 0;
    let mut open: Vec<(usize, u8)> = Vec::new();
    let mut i = 0;

    while i < n {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        layout.depth[i] = depth;
        layout.code[i] = state == ScanState::Code;

        match state {
            ScanState::Code => match b {
                b'"' | b'\'' | b'`' => state = ScanState::Str(b),
                b'/' if next == Some(b'/') => state = ScanState::LineComment,
                b'/' if next == Some(b'*') => state = ScanState::BlockComment,
                b'{' | b'[' => {
                    open.push((i, b));
                    depth += 1;
                }
                b'}' | b']' => {
                    depth = depth.saturating_sub(1);
                    if let Some((start, opener)) = open.pop() {
                        if opener == b'{' && b == b'}' {
                            layout.spans.push(start..i + 1);
                        }
                    }
                }
                _ => {}
            },
            ScanState::Str(quote) => {
                if b == b'\\' && i + 1 < n {
                    i += 1;
                    layout.depth[i] = depth;
                } else if b == quote {
                    state = ScanState::Code;
                }
            }
            ScanState::LineComment => {
                if b == b'\n' {
                    state = ScanState::Code;
                }
            }
            ScanState::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    i += 1;
                    layout.depth[i] = depth;
                    state = ScanState::Code;
                }
            }
        }
        i += 1;
    }

    layout.spans.sort_by_key(|s| s.start);
    layout
}

fn field_pattern(syntax: RecordSyntax, key: &str) -> Regex {
    let key = regex::escape(key);
    let pattern = match syntax {
        RecordSyntax::Json => format!(r#""{key}"\s*:\s*"((?:[^"\\]|\\.)*)""#),
        RecordSyntax::ObjectLiteral => format!(
            r#"(?:\b{key}|'{key}'|"{key}")\s*:\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#
        ),
    };
    // Escaped user input cannot form an invalid pattern
    Regex::new(&pattern).unwrap()
}

fn decode(raw: &str, syntax: RecordSyntax) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    match syntax {
        RecordSyntax::Json => serde_json::from_str(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string()),
        RecordSyntax::ObjectLiteral => {
            let mut out = String::with_capacity(raw.len());
            let mut chars = raw.chars();
            while let Some(c) = chars.next() {
                if c != '\\' {
                    out.push(c);
                    continue;
                }
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => out.push('\\'),
                }
            }
            out
        }
    }
}

fn encode(value: &str, syntax: RecordSyntax, quote: u8) -> String {
    match syntax {
        RecordSyntax::Json => {
            let quoted = serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value));
            quoted[1..quoted.len() - 1].to_string()
        }
        RecordSyntax::ObjectLiteral => {
            let quote = quote as char;
            let mut out = String::with_capacity(value.len());
            for c in value.chars() {
                match c {
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    c if c == quote => {
                        out.push('\\');
                        out.push(c);
                    }
                    c => out.push(c),
                }
            }
            out
        }
    }
}

#[derive(Debug, Clone)]
pub struct CatalogDocument {
    text: String,
    syntax: RecordSyntax,
    fields: FieldNames,
    /// One pattern per field, in `ALL_FIELDS` order
    patterns: Vec<Regex>,
    layout: Layout,
}

impl CatalogDocument {
    pub fn parse(text: String, syntax: RecordSyntax, fields: FieldNames) -> Self {
        let patterns = ALL_FIELDS
            .iter()
            .map(|&f| field_pattern(syntax, fields.key(f)))
            .collect();
        let layout = scan(&text);
        Self {
            text,
            syntax,
            fields,
            patterns,
            layout,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn field_names(&self) -> &FieldNames {
        &self.fields
    }

    fn pattern(&self, field: Field) -> &Regex {
        &self.patterns[field as usize]
    }

    fn slot_in(&self, span: &Range<usize>, field: Field) -> Option<FieldSlot> {
        let record_depth = self.layout.depth[span.start] + 1;
        let body = &self.text[span.clone()];

        for caps in self.pattern(field).captures_iter(body) {
            let whole = caps.get(0)?;
            let at = span.start + whole.start();
            if !self.layout.code[at] || self.layout.depth[at] != record_depth {
                continue;
            }
            let value = caps.get(1).or_else(|| caps.get(2))?;
            let range = span.start + value.start()..span.start + value.end();
            return Some(FieldSlot {
                value: decode(value.as_str(), self.syntax),
                quote: self.text.as_bytes()[range.start - 1],
                range,
            });
        }
        None
    }

    /// Locate the record whose id is exactly `product_id`
    pub fn locate(&self, product_id: &str) -> Result<RecordHandle, PatchFailureKind> {
        let mut matches = self
            .layout
            .spans
            .iter()
            .filter(|span| {
                self.slot_in(span, Field::Id)
                    .map(|slot| slot.value == product_id)
                    .unwrap_or(false)
            });

        let first = matches.next().ok_or(PatchFailureKind::RecordNotFound)?;
        if matches.next().is_some() {
            return Err(PatchFailureKind::WriteConflict);
        }
        Ok(RecordHandle { span: first.clone() })
    }

    pub fn field_value(&self, handle: &RecordHandle, field: Field) -> Option<FieldSlot> {
        self.slot_in(&handle.span, field)
    }

    /// Replace one string field value of a record
    ///
    /// The edit is checked before it is kept: bytes before and after the
    /// value are unchanged and the record reads back the new value.
    pub fn replace_field(
        &mut self,
        handle: &RecordHandle,
        field: Field,
        new_value: &str,
    ) -> Result<(), PatchFailureKind> {
        let slot = self.field_value(handle, field).ok_or(PatchFailureKind::FieldNotFound)?;
        let record_id = match field {
            Field::Id => new_value.to_string(),
            _ => self
                .field_value(handle, Field::Id)
                .map(|s| s.value)
                .ok_or(PatchFailureKind::RecordNotFound)?,
        };

        let encoded = encode(new_value, self.syntax, slot.quote);
        let mut text = String::with_capacity(self.text.len() + encoded.len());
        text.push_str(&self.text[..slot.range.start]);
        text.push_str(&encoded);
        text.push_str(&self.text[slot.range.end..]);

        let value_end = slot.range.start + encoded.len();
        let isolated = text.as_bytes()[..slot.range.start] == self.text.as_bytes()[..slot.range.start]
            && text.as_bytes()[value_end..] == self.text.as_bytes()[slot.range.end..];
        if !isolated {
            return Err(PatchFailureKind::WriteConflict);
        }

        let candidate = CatalogDocument::parse(text, self.syntax, self.fields.clone());
        let written = candidate
            .locate(&record_id)
            .ok()
            .and_then(|h| candidate.field_value(&h, field))
            .map(|s| s.value);
        if written.as_deref() != Some(new_value) {
            return Err(PatchFailureKind::WriteConflict);
        }

        *self = candidate;
        Ok(())
    }

    /// Object records that look like products
    ///
    /// A record needs an id and a name plus a category or image field,
    /// which keeps nested helper objects and category lists out.
    pub fn products(&self) -> Vec<Product> {
        self.layout
            .spans
            .iter()
            .filter_map(|span| {
                let id = self.slot_in(span, Field::Id)?.value;
                let name = self.slot_in(span, Field::Name)?.value;
                let category = self.slot_in(span, Field::Category).map(|s| s.value);
                let image = self.slot_in(span, Field::Image).map(|s| s.value);
                if category.is_none() && image.is_none() {
                    return None;
                }
                Some(Product {
                    id,
                    name,
                    localized_name: self.slot_in(span, Field::LocalizedName).map(|s| s.value),
                    category,
                    image_ref: image.filter(|v| !v.is_empty()),
                })
            })
            .collect()
    }
}
