//! Packaging fields
//!
//! The variant flag has been reported under four names over time:
//! `packaging.is_okara`, `packaging.is_green_box`, then the flat
//! `is_okara` and `is_green_box`. The first boolean found wins.

use super::lookup;
use super::text::first_text;
use catalog_reconcile_common::{Packaging, PackagingKind};
use serde_json::{Map, Value};

const VARIANT_PATHS: &[&[&str]] = &[
    &["packaging", "is_okara"],
    &["packaging", "is_green_box"],
    &["is_okara"],
    &["is_green_box"],
];

pub fn packaging(object: &Map<String, Value>) -> Packaging {
    Packaging {
        kind: kind(object),
        dominant_color: first_text(object, &[&["packaging", "color"], &["packaging_color"]]),
        is_distinctive_variant: distinctive_variant(object),
    }
}

fn kind(object: &Map<String, Value>) -> Option<PackagingKind> {
    first_text(object, &[&["packaging", "type"], &["packaging_type"]])
        .and_then(|label| PackagingKind::from_label(&label))
}

fn distinctive_variant(object: &Map<String, Value>) -> Option<bool> {
    VARIANT_PATHS
        .iter()
        .filter_map(|path| lookup(object, path))
        .find_map(Value::as_bool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_variant_priority() {
        let o = obj(json!({"packaging": {"is_green_box": true}, "is_okara": false}));
        assert_eq!(distinctive_variant(&o), Some(true));

        let o = obj(json!({"is_green_box": false}));
        assert_eq!(distinctive_variant(&o), Some(false));

        let o = obj(json!({"packaging": {"is_okara": "yes"}}));
        assert_eq!(distinctive_variant(&o), None);
    }

    #[test]
    fn test_packaging_as_string_is_ignored() {
        let o = obj(json!({"packaging": "box", "packaging_type": "tray"}));
        let p = packaging(&o);
        assert_eq!(p.kind, Some(PackagingKind::Tray));
        assert_eq!(p.dominant_color, None);
    }

    #[test]
    fn test_kind_label_mapping() {
        let o = obj(json!({"packaging": {"type": "Vacuum sealed", "color": "red"}}));
        let p = packaging(&o);
        assert_eq!(p.kind, Some(PackagingKind::Vacuum));
        assert_eq!(p.dominant_color.as_deref(), Some("red"));
        assert_eq!(p.is_distinctive_variant, None);
    }
}
