//! Keyword taxonomy
//!
//! Fixed keyword → category tables used to derive a product's expected
//! visual signature. Primary-language keywords are matched on lowercased
//! whole tokens; secondary-language (Hebrew) keywords are matched as exact
//! substrings since the script has no case folding.

use serde::{Deserialize, Serialize};

/// Category tag of a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryTag {
    Schnitzel,
    Burger,
    Tofu,
    Seitan,
    Shawarma,
    Kebab,
    Sausage,
    Okara,
    DeliMeat,
    Specialty,
    ReadyMeal,
    MealKit,
}

/// Packaging cue that identifies one subcategory at a glance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantCue {
    pub name: &'static str,
    /// Dominant packaging color of the variant
    pub color: &'static str,
}

pub const ALL_TAGS: &[CategoryTag] = &[
    CategoryTag::Schnitzel,
    CategoryTag::Burger,
    CategoryTag::Tofu,
    CategoryTag::Seitan,
    CategoryTag::Shawarma,
    CategoryTag::Kebab,
    CategoryTag::Sausage,
    CategoryTag::Okara,
    CategoryTag::DeliMeat,
    CategoryTag::Specialty,
    CategoryTag::ReadyMeal,
    CategoryTag::MealKit,
];

/// Primary-language keywords (lowercase, whole-token phrases)
pub const PRIMARY_KEYWORDS: &[(&str, CategoryTag)] = &[
    ("schnitzel", CategoryTag::Schnitzel),
    ("schnitzels", CategoryTag::Schnitzel),
    ("schnitzeloni", CategoryTag::Schnitzel),
    ("cutlet", CategoryTag::Schnitzel),
    ("cutlets", CategoryTag::Schnitzel),
    ("burger", CategoryTag::Burger),
    ("burgers", CategoryTag::Burger),
    ("hamburger", CategoryTag::Burger),
    ("patty", CategoryTag::Burger),
    ("patties", CategoryTag::Burger),
    ("tofu", CategoryTag::Tofu),
    ("seitan", CategoryTag::Seitan),
    ("shawarma", CategoryTag::Shawarma),
    ("kebab", CategoryTag::Kebab),
    ("kebabs", CategoryTag::Kebab),
    ("skewer", CategoryTag::Kebab),
    ("skewers", CategoryTag::Kebab),
    ("sausage", CategoryTag::Sausage),
    ("sausages", CategoryTag::Sausage),
    ("hot dog", CategoryTag::Sausage),
    ("hot dogs", CategoryTag::Sausage),
    ("frankfurter", CategoryTag::Sausage),
    ("okara", CategoryTag::Okara),
    ("salami", CategoryTag::DeliMeat),
    ("pastrami", CategoryTag::DeliMeat),
    ("cold cuts", CategoryTag::DeliMeat),
    ("kubeh", CategoryTag::Specialty),
    ("kubbeh", CategoryTag::Specialty),
    ("ready meal", CategoryTag::ReadyMeal),
    ("meal kit", CategoryTag::MealKit),
];

/// Secondary-language keywords (exact substrings)
pub const SECONDARY_KEYWORDS: &[(&str, CategoryTag)] = &[
    ("שניצל", CategoryTag::Schnitzel),
    ("המבורגר", CategoryTag::Burger),
    ("בורגר", CategoryTag::Burger),
    ("טופו", CategoryTag::Tofu),
    ("סייטן", CategoryTag::Seitan),
    ("שווארמה", CategoryTag::Shawarma),
    ("שוארמה", CategoryTag::Shawarma),
    ("קבב", CategoryTag::Kebab),
    ("שיפודי", CategoryTag::Kebab),
    ("נקניק", CategoryTag::Sausage),
    ("אוקרה", CategoryTag::Okara),
    ("פסטרמה", CategoryTag::DeliMeat),
    ("סלמי", CategoryTag::DeliMeat),
    ("קובה", CategoryTag::Specialty),
];

impl CategoryTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryTag::Schnitzel => "schnitzel",
            CategoryTag::Burger => "burger",
            CategoryTag::Tofu => "tofu",
            CategoryTag::Seitan => "seitan",
            CategoryTag::Shawarma => "shawarma",
            CategoryTag::Kebab => "kebab",
            CategoryTag::Sausage => "sausage",
            CategoryTag::Okara => "okara",
            CategoryTag::DeliMeat => "deli-meat",
            CategoryTag::Specialty => "specialty",
            CategoryTag::ReadyMeal => "ready-meal",
            CategoryTag::MealKit => "meal-kit",
        }
    }

    /// Map a declared catalog category ("schnitzels", "deli-meats", ...)
    pub fn from_declared(category: &str) -> Option<Self> {
        match category.trim().to_lowercase().as_str() {
            "schnitzels" | "schnitzel" => Some(CategoryTag::Schnitzel),
            "burgers" | "burger" => Some(CategoryTag::Burger),
            "tofu" => Some(CategoryTag::Tofu),
            "seitan" => Some(CategoryTag::Seitan),
            "shawarma" => Some(CategoryTag::Shawarma),
            "kebabs" | "kebab" => Some(CategoryTag::Kebab),
            "sausages" | "sausage" => Some(CategoryTag::Sausage),
            "okara" => Some(CategoryTag::Okara),
            "deli-meats" | "deli" => Some(CategoryTag::DeliMeat),
            "specialty" => Some(CategoryTag::Specialty),
            "ready-meals" => Some(CategoryTag::ReadyMeal),
            "meal-kits" => Some(CategoryTag::MealKit),
            _ => None,
        }
    }

    /// Every primary keyword of this tag's bucket
    pub fn keywords(&self) -> impl Iterator<Item = &'static str> + '_ {
        PRIMARY_KEYWORDS
            .iter()
            .filter(move |(_, tag)| tag == self)
            .map(|(kw, _)| *kw)
    }

    /// Distinctive packaging variant of this tag, if it has one
    pub fn variant(&self) -> Option<VariantCue> {
        match self {
            CategoryTag::Okara => Some(VariantCue {
                name: "OKARA green box",
                color: "green",
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for CategoryTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
