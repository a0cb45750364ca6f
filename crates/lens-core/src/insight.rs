//! Keyword heuristics over caption text: content categories, the smart-search
//! type, and a broader contextual search query.
//!
//! Matching is per word (lowercased, split on anything but letters, digits and
//! apostrophes); a keyword also matches its plain `s` plural.

use serde::{Deserialize, Serialize};
use std::fmt;

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "fashion",
        &[
            "fashion", "style", "outfit", "clothing", "wear", "sweater", "hoodie", "pants",
            "trousers", "jeans", "shirt", "dress", "skirt", "jacket", "coat",
        ],
    ),
    ("menswear", &["man", "men", "male", "guy", "men's", "masculine", "gentleman"]),
    ("womenswear", &["woman", "women", "female", "lady", "women's", "feminine"]),
    ("footwear", &["shoe", "sneaker", "boot", "sandal", "heels", "footwear"]),
    ("accessories", &["watch", "bag", "jewelry", "hat", "sunglasses", "belt"]),
    (
        "lifestyle",
        &["casual", "professional", "formal", "street", "urban", "minimal", "elegant"],
    ),
    ("people", &["person", "people", "portrait", "face", "individual"]),
    ("animals", &["dog", "cat", "bird", "animal", "pet", "wildlife"]),
    (
        "food",
        &["food", "dish", "meal", "restaurant", "cooking", "kitchen", "cuisine", "dining"],
    ),
    (
        "nature",
        &["tree", "flower", "plant", "garden", "landscape", "outdoor", "forest", "mountain"],
    ),
    (
        "technology",
        &["phone", "computer", "device", "electronic", "screen", "laptop", "smartphone"],
    ),
    ("transportation", &["car", "bike", "bicycle", "train", "bus", "vehicle", "motorcycle"]),
    (
        "architecture",
        &["building", "house", "architecture", "structure", "interior", "room"],
    ),
    ("shopping", &["product", "item", "store", "brand", "commercial"]),
    ("documents", &["text", "document", "paper", "book", "sign", "writing"]),
    ("sports", &["sport", "fitness", "gym", "exercise", "athletic", "workout"]),
    ("art", &["art", "painting", "creative", "design", "gallery", "artistic"]),
];

/// Categories that imply `fashion`.
const FASHION_FAMILY: &[&str] = &["menswear", "womenswear", "footwear", "accessories"];

/// Lowercased caption words.
fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

fn has_any(words: &[String], keywords: &[&str]) -> bool {
    words.iter().any(|w| {
        keywords
            .iter()
            .any(|k| w == k || w.strip_suffix('s') == Some(*k))
    })
}

/// Content categories for a caption, in table order; `["general"]` when none match.
pub fn categorize(caption: &str) -> Vec<String> {
    let words = words(caption);
    let mut categories: Vec<&str> = CATEGORY_KEYWORDS
        .iter()
        .filter(|(_, keywords)| has_any(&words, keywords))
        .map(|(name, _)| *name)
        .collect();

    if !categories.contains(&"fashion") && categories.iter().any(|c| FASHION_FAMILY.contains(c)) {
        categories.push("fashion");
    }
    let dressed = categories
        .iter()
        .any(|c| matches!(*c, "fashion" | "menswear" | "womenswear"));
    if categories.contains(&"people") && dressed && !categories.contains(&"lifestyle") {
        categories.push("lifestyle");
    }

    if categories.is_empty() {
        return vec!["general".to_string()];
    }
    categories.into_iter().map(String::from).collect()
}

/// Search strategy picked for `/visual/smart-search`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Food,
    Nature,
    Landmarks,
    Shopping,
    General,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Food => "food",
            SearchType::Nature => "nature",
            SearchType::Landmarks => "landmarks",
            SearchType::Shopping => "shopping",
            SearchType::General => "general",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First matching rule wins.
pub fn search_type(caption: &str) -> SearchType {
    let words = words(caption);
    let rules: &[(&[&str], SearchType)] = &[
        (&["food", "dish", "meal", "restaurant", "cuisine"], SearchType::Food),
        (&["plant", "flower", "tree", "nature", "garden"], SearchType::Nature),
        (
            &["building", "architecture", "landmark", "monument"],
            SearchType::Landmarks,
        ),
        (
            &["clothing", "fashion", "wear", "outfit", "style", "man", "woman"],
            SearchType::Shopping,
        ),
        (&["product", "item", "device", "gadget", "tool"], SearchType::Shopping),
    ];
    rules
        .iter()
        .find(|(keywords, _)| has_any(&words, keywords))
        .map(|(_, kind)| *kind)
        .unwrap_or(SearchType::General)
}

const BRANDS: &[&str] = &[
    "nike", "adidas", "converse", "vans", "apple", "samsung", "sony", "canon",
];

/// Broader search query for a caption. Falls back to the first three words
/// longer than three characters, then to the caption itself.
pub fn contextual_query(caption: &str) -> String {
    let words = words(caption);
    let any = |keywords: &[&str]| has_any(&words, keywords);

    if any(&["sweater", "hoodie", "pullover", "jumper", "cardigan"]) {
        return if any(&["black", "dark", "minimal", "casual"]) {
            "minimalist casual menswear black sweater".to_string()
        } else {
            "casual sweater menswear fashion".to_string()
        };
    }
    if any(&["pants", "trousers", "jeans", "chinos"]) {
        return if any(&["white", "cream", "beige"]) {
            "casual white pants menswear minimalist".to_string()
        } else {
            "casual pants menswear fashion".to_string()
        };
    }
    if any(&["man", "male", "guy"]) && any(&["standing", "wearing", "outfit"]) {
        let styles: Vec<&str> = [
            (&["minimal", "simple", "clean", "basic"][..], "minimalist"),
            (&["casual", "relaxed", "comfortable"][..], "casual"),
            (&["street", "urban", "modern"][..], "streetwear"),
            (&["professional", "business", "formal"][..], "formal"),
        ]
        .iter()
        .filter(|(keywords, _)| any(keywords))
        .map(|(_, style)| *style)
        .collect();
        let prefix = if styles.is_empty() {
            "casual".to_string()
        } else {
            styles.join(" ")
        };
        return format!("{prefix} menswear fashion style");
    }
    if any(&["phone", "smartphone", "mobile"]) {
        return "smartphone mobile phone technology".to_string();
    }
    if any(&["laptop", "computer", "macbook"]) {
        return "modern laptop computer technology workspace".to_string();
    }
    if any(&["pizza", "burger", "sandwich"]) {
        return "delicious food cuisine restaurant dining".to_string();
    }
    if any(&["coffee", "latte", "cappuccino"]) {
        return "coffee cafe barista lifestyle".to_string();
    }
    if any(&["shoe", "sneaker", "boot", "sandal"]) {
        return match BRANDS[..4].iter().find(|b| words.iter().any(|w| w == *b)) {
            Some(brand) => format!("{brand} footwear sneakers style fashion"),
            None => "footwear shoes fashion style".to_string(),
        };
    }
    if any(&["room", "interior", "furniture", "decor"]) {
        return "home decor interior design lifestyle".to_string();
    }
    if any(&["landscape", "mountain", "forest", "beach"]) {
        return "nature outdoor landscape photography travel".to_string();
    }
    if any(&["gym", "workout", "fitness", "exercise"]) {
        return "fitness workout health lifestyle sports".to_string();
    }
    if any(&["painting", "art", "gallery", "museum"]) {
        return "art culture creative design inspiration".to_string();
    }
    if let Some(brand) = BRANDS.iter().find(|b| words.iter().any(|w| w == *b)) {
        let kind = if any(&["shoe", "clothing", "wear"]) {
            "fashion"
        } else {
            "product"
        };
        return format!("{brand} {kind} style lifestyle");
    }

    let meaningful: Vec<&str> = words
        .iter()
        .map(String::as_str)
        .filter(|w| w.chars().count() > 3)
        .take(3)
        .collect();
    if meaningful.is_empty() {
        caption.trim().to_string()
    } else {
        meaningful.join(" ")
    }
}
