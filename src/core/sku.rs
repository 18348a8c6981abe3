//! SKU generation - Derives short product codes from category, name and brand.
//!
//! A generated SKU looks like `ELEC-MONI-001`: up to `max_keywords` keyword
//! prefixes followed by a per-keyword sequence number. Sequences are stored in
//! `sku_sequences`, keyed by a short MD5 hash of the keyword string.
//! [`ensure_unique_sku`] guards against collisions with manually entered SKUs.

use crate::{
    config::SkuSettings,
    entities::{Category, Product, SkuSequence, product, sku_sequence},
    errors::Result,
};
use md5::{Digest, Md5};
use sea_orm::{PaginatorTrait, Set, prelude::*, sea_query::Expr};
use tracing::{debug, instrument, warn};

/// Attempts before [`ensure_unique_sku`] gives up on counters.
const MAX_UNIQUE_ATTEMPTS: u32 = 100;

/// Dictionary of words considered meaningful enough to become keywords.
const RELEVANT_WORDS: &[&[&str]] = &[
    // electronics
    &[
        "monitor", "teclado", "keyboard", "mouse", "raton", "cable", "usb", "hdmi", "led", "lcd",
        "oled", "wifi", "bluetooth",
    ],
    // office
    &[
        "papel", "paper", "lapiz", "pencil", "boligrafo", "pen", "carpeta", "folder", "archivo",
        "file", "grapadora", "stapler",
    ],
    // specs
    &[
        "24", "27", "32", "43", "55", "pulgadas", "inches", "gb", "tb", "mb", "kg", "cm", "mm",
        "metros", "meter",
    ],
    // colors
    &[
        "negro", "black", "blanco", "white", "azul", "blue", "rojo", "red", "verde", "green",
        "gris", "gray",
    ],
    // brands
    &[
        "samsung", "hp", "dell", "logitech", "canon", "epson", "microsoft", "apple", "sony", "lg",
    ],
    // materials
    &[
        "plastico", "plastic", "metal", "vidrio", "glass", "madera", "wood", "cuero", "leather",
    ],
    // types
    &[
        "inalambrico", "wireless", "mecanico", "mechanical", "optico", "optical", "laser",
        "inkjet", "ergonomico",
    ],
    // hospitality
    &[
        "toalla", "bata", "sabana", "almohada", "aceite", "crema", "shampoo", "jabon", "vino",
        "cerveza", "masaje",
    ],
];

/// Input for SKU generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkuRequest<'a> {
    /// Product name
    pub name: &'a str,
    /// Optional brand
    pub brand: Option<&'a str>,
    /// Optional category whose name provides the first keyword
    pub category_id: Option<i64>,
}

/// Lowercases, strips Spanish accents and punctuation, and collapses whitespace.
#[must_use]
pub fn clean_product_name(name: &str) -> String {
    let mapped: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            c if c.is_ascii_lowercase() || c.is_ascii_digit() => c,
            _ => ' ',
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn prefix(word: &str, len: usize) -> String {
    word.chars().take(len).collect()
}

/// True when `candidate` shares a 3-letter stem with any existing keyword.
fn overlaps(keywords: &[String], candidate: &str) -> bool {
    let candidate = candidate.to_lowercase();
    let stem = prefix(&candidate, 3);
    keywords.iter().any(|k| {
        let k = k.to_lowercase();
        k.contains(&stem) || candidate.contains(&prefix(&k, 3))
    })
}

fn is_relevant(word: &str) -> bool {
    RELEVANT_WORDS
        .iter()
        .flat_map(|group| group.iter())
        .any(|relevant| word.contains(relevant) || relevant.contains(word))
}

fn first_number(word: &str) -> Option<&str> {
    let start = word.find(|c: char| c.is_ascii_digit())?;
    let rest = &word[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn brand_keyword(brand: &str, settings: &SkuSettings) -> String {
    prefix(&clean_product_name(brand), settings.keyword_length).to_uppercase()
}

/// Picks the SKU keywords for an already-cleaned name and category.
///
/// Order of preference: the category's first word, priority words from the
/// name, the brand (when `brand_priority`), dictionary words, one number
/// (a size like "24"), any other significant word, then the brand again (when not
/// `brand_priority`). Falls back to 3-letter prefixes of the first words and
/// finally to `PROD`.
#[must_use]
pub fn extract_keywords(
    clean_name: &str,
    brand: Option<&str>,
    clean_category: &str,
    settings: &SkuSettings,
) -> Vec<String> {
    let max = settings.max_keywords.max(1);
    let len = settings.keyword_length.max(1);
    let name_words: Vec<&str> = clean_name.split_whitespace().collect();
    let category_words: Vec<&str> = clean_category.split_whitespace().collect();
    let is_stop_word = |word: &str| settings.stop_words.iter().any(|s| s == word);
    let mut keywords: Vec<String> = Vec::new();

    if let Some(first) = category_words.first() {
        keywords.push(prefix(first, len).to_uppercase());
    }

    for word in &name_words {
        let is_priority = settings
            .priority_words
            .iter()
            .any(|p| word.contains(p.as_str()) || p.contains(word));
        if is_priority && keywords.len() < max && !overlaps(&keywords, word) {
            keywords.push(prefix(word, len).to_uppercase());
        }
    }

    let brand = brand.filter(|b| !b.trim().is_empty() && settings.include_brand);

    if let Some(brand) = brand {
        if settings.brand_priority && keywords.len() < max {
            let keyword = brand_keyword(brand, settings);
            if !keyword.is_empty() && !overlaps(&keywords, &keyword) {
                keywords.push(keyword);
            }
        }
    }

    for word in &name_words {
        if keywords.len() >= max {
            break;
        }
        if word.len() >= 3 && is_relevant(word) && !is_stop_word(word) && !overlaps(&keywords, word)
        {
            keywords.push(prefix(word, len).to_uppercase());
        }
    }

    if settings.include_numbers && keywords.len() < max {
        for word in &name_words {
            let Some(number) = first_number(word) else {
                continue;
            };
            if number.trim_start_matches('0').is_empty() {
                continue;
            }
            if !keywords.iter().any(|k| k.contains(number)) {
                keywords.push(format!("{number:0>2}"));
                break;
            }
        }
    }

    if keywords.len() < max {
        let significant: Vec<&str> = name_words
            .iter()
            .copied()
            .filter(|word| {
                let stem = prefix(word, 3);
                word.len() >= 3
                    && !is_stop_word(word)
                    && !keywords.iter().any(|k| k.to_lowercase().contains(&stem))
            })
            .collect();
        for word in significant {
            if keywords.len() < max {
                keywords.push(prefix(word, len).to_uppercase());
            }
        }
    }

    if let Some(brand) = brand {
        if !settings.brand_priority && keywords.len() < max {
            let keyword = brand_keyword(brand, settings);
            if !keyword.is_empty() && !overlaps(&keywords, &keyword) {
                keywords.push(keyword);
            }
        }
    }

    if keywords.is_empty() {
        keywords.extend(
            category_words
                .iter()
                .chain(name_words.iter())
                .take(max)
                .map(|word| prefix(word, 3).to_uppercase()),
        );
    }

    if keywords.is_empty() {
        keywords.push("PROD".to_string());
    }

    keywords.truncate(max);
    keywords
}

/// First 8 hex characters of the MD5 of the lowercased keyword string.
#[must_use]
pub fn keyword_hash(keywords: &str) -> String {
    let digest = Md5::digest(keywords.to_lowercase().as_bytes());
    let mut hex = format!("{digest:x}");
    hex.truncate(8);
    hex
}

/// Formats the final SKU from its keyword part and sequence number.
#[must_use]
pub fn format_sku(keywords: &str, sequence: i32, digits: usize) -> String {
    format!("{keywords}-{sequence:0>digits$}")
}

fn timestamp_suffix(modulus: i64, width: usize) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    format!("{:0>width$}", millis.rem_euclid(modulus))
}

/// Returns the next sequence number for a keyword string, creating the counter on first use.
#[instrument(skip(db))]
pub async fn next_sequence<C>(db: &C, keywords: &str) -> Result<i32>
where
    C: ConnectionTrait,
{
    let hash = keyword_hash(keywords);

    for _ in 0..2 {
        if let Some(existing) = SkuSequence::find()
            .filter(sku_sequence::Column::KeywordHash.eq(hash.as_str()))
            .one(db)
            .await?
        {
            SkuSequence::update_many()
                .col_expr(
                    sku_sequence::Column::CurrentSequence,
                    Expr::col(sku_sequence::Column::CurrentSequence).add(1),
                )
                .col_expr(
                    sku_sequence::Column::UpdatedAt,
                    Expr::value(chrono::Utc::now()),
                )
                .filter(sku_sequence::Column::Id.eq(existing.id))
                .exec(db)
                .await?;

            let updated = SkuSequence::find_by_id(existing.id).one(db).await?;
            return Ok(updated.map_or(existing.current_sequence + 1, |s| s.current_sequence));
        }

        let sequence = sku_sequence::ActiveModel {
            keyword_hash: Set(hash.clone()),
            keywords: Set(keywords.to_string()),
            current_sequence: Set(1),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        match sequence.insert(db).await {
            Ok(created) => return Ok(created.current_sequence),
            // Lost a race with another insert for the same hash; retry as an update.
            Err(e) => debug!("Sequence insert for {keywords} failed, retrying: {e}"),
        }
    }

    Err(sea_orm::DbErr::Custom(format!("Could not allocate SKU sequence for {keywords}")).into())
}

async fn request_keywords<C>(
    db: &C,
    request: &SkuRequest<'_>,
    settings: &SkuSettings,
) -> Result<String>
where
    C: ConnectionTrait,
{
    let category_name = match request.category_id {
        Some(id) => Category::find_by_id(id)
            .one(db)
            .await?
            .map(|c| c.name)
            .unwrap_or_default(),
        None => String::new(),
    };

    let clean_name = clean_product_name(request.name);
    let clean_category = clean_product_name(&category_name);
    Ok(extract_keywords(&clean_name, request.brand, &clean_category, settings).join("-"))
}

async fn try_generate_sku<C>(
    db: &C,
    request: &SkuRequest<'_>,
    settings: &SkuSettings,
) -> Result<String>
where
    C: ConnectionTrait,
{
    let keywords = request_keywords(db, request, settings).await?;
    let sequence = next_sequence(db, &keywords).await?;

    Ok(format_sku(&keywords, sequence, settings.sequence_digits))
}

/// Generates a SKU such as `ELEC-MONI-001` for a new product.
///
/// Never fails: when the category lookup or sequence allocation errors, the
/// SKU falls back to `PROD-` followed by the last six digits of the current
/// Unix time in milliseconds.
#[instrument(skip(db, settings))]
pub async fn generate_sku<C>(db: &C, request: &SkuRequest<'_>, settings: &SkuSettings) -> String
where
    C: ConnectionTrait,
{
    match try_generate_sku(db, request, settings).await {
        Ok(sku) => {
            debug!("Generated SKU {sku} for '{}'", request.name);
            sku
        }
        Err(e) => {
            warn!("SKU generation failed for '{}': {e}", request.name);
            format!("PROD-{}", timestamp_suffix(1_000_000, 6))
        }
    }
}

/// The SKU [`generate_sku`] would produce next, without consuming a sequence number.
///
/// # Errors
/// Returns an error if the database query fails.
pub async fn preview_sku<C>(db: &C, request: &SkuRequest<'_>, settings: &SkuSettings) -> Result<String>
where
    C: ConnectionTrait,
{
    let keywords = request_keywords(db, request, settings).await?;
    let current = SkuSequence::find()
        .filter(sku_sequence::Column::KeywordHash.eq(keyword_hash(&keywords)))
        .one(db)
        .await?
        .map_or(0, |s| s.current_sequence);
    Ok(format_sku(&keywords, current + 1, settings.sequence_digits))
}

/// Checks that no product other than `exclude_id` uses `sku`.
pub async fn is_sku_unique<C>(db: &C, sku: &str, exclude_id: Option<i64>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut query = Product::find().filter(product::Column::Sku.eq(sku));
    if let Some(id) = exclude_id {
        query = query.filter(product::Column::Id.ne(id));
    }
    Ok(query.count(db).await? == 0)
}

/// Returns `base_sku` or the first free `base_sku-NN` variant.
///
/// Tries `-01` through `-100`; if all are taken, appends the last four digits
/// of the current Unix time in milliseconds instead.
#[instrument(skip(db))]
pub async fn ensure_unique_sku<C>(db: &C, base_sku: &str, exclude_id: Option<i64>) -> Result<String>
where
    C: ConnectionTrait,
{
    if is_sku_unique(db, base_sku, exclude_id).await? {
        return Ok(base_sku.to_string());
    }

    for counter in 1..=MAX_UNIQUE_ATTEMPTS {
        let candidate = format!("{base_sku}-{counter:02}");
        if is_sku_unique(db, &candidate, exclude_id).await? {
            debug!("SKU {base_sku} taken, using {candidate}");
            return Ok(candidate);
        }
    }

    let fallback = format!("{base_sku}-{}", timestamp_suffix(10_000, 4));
    warn!("Exhausted SKU suffixes for {base_sku}, using {fallback}");
    Ok(fallback)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn keywords_for(name: &str, brand: Option<&str>, category: &str) -> String {
        let settings = SkuSettings::default();
        extract_keywords(
            &clean_product_name(name),
            brand,
            &clean_product_name(category),
            &settings,
        )
        .join("-")
    }

    #[test]
    fn test_clean_product_name() {
        assert_eq!(
            clean_product_name("  Jabón   Líquido Ñandú! "),
            "jabon liquido nandu"
        );
        assert_eq!(clean_product_name("Papel A4/75g"), "papel a4 75g");
        assert_eq!(clean_product_name("¡¿?!"), "");
    }

    #[test]
    fn test_category_keyword_comes_first() {
        assert_eq!(
            keywords_for("Monitor Samsung 24 pulgadas LED", Some("Samsung"), "Electrónicos"),
            "ELEC-MONI"
        );
        assert_eq!(
            keywords_for("Papel Bond A4 75g resma", None, "Oficina"),
            "OFIC-PAPE"
        );
    }

    #[test]
    fn test_priority_words_without_category() {
        assert_eq!(
            keywords_for("Monitor Samsung 24 pulgadas LED", Some("Samsung"), ""),
            "MONI-LED"
        );
        assert_eq!(keywords_for("Cable HDMI 2 metros", None, ""), "CABL-HDMI");
    }

    #[test]
    fn test_brand_after_priority_word() {
        assert_eq!(
            keywords_for("Mouse inalámbrico Logitech", Some("Logitech"), ""),
            "MOUS-LOGI"
        );
    }

    #[test]
    fn test_numeric_spec_keyword() {
        assert_eq!(keywords_for("Toalla 70x140", None, ""), "TOAL-70");
    }

    #[test]
    fn test_fallbacks() {
        // Short words that match nothing fall back to 3-letter prefixes
        assert_eq!(keywords_for("xy zw", None, ""), "XY-ZW");
        assert_eq!(keywords_for("", None, ""), "PROD");
        // "la" is part of the priority word "teclado"
        assert_eq!(keywords_for("de la", None, ""), "LA");
    }

    #[test]
    fn test_keyword_hash_is_case_insensitive() {
        assert_eq!(keyword_hash("ELEC-MONI"), keyword_hash("elec-moni"));
        assert_eq!(keyword_hash("ELEC-MONI").len(), 8);
        assert_ne!(keyword_hash("ELEC-MONI"), keyword_hash("ELEC-TECL"));
    }

    #[test]
    fn test_format_sku() {
        assert_eq!(format_sku("ELEC-MONI", 7, 3), "ELEC-MONI-007");
        assert_eq!(format_sku("ELEC-MONI", 1234, 3), "ELEC-MONI-1234");
    }

    #[tokio::test]
    async fn test_sequences_increment_per_keyword() -> Result<()> {
        let db = setup_test_db().await?;

        assert_eq!(next_sequence(&db, "ELEC-MONI").await?, 1);
        assert_eq!(next_sequence(&db, "ELEC-MONI").await?, 2);
        assert_eq!(next_sequence(&db, "ELEC-TECL").await?, 1);
        assert_eq!(next_sequence(&db, "elec-moni").await?, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_generate_sku_uses_category_name() -> Result<()> {
        let db = setup_test_db().await?;
        let category = create_test_category(&db, "Electrónicos").await?;
        let settings = SkuSettings::default();
        let request = SkuRequest {
            name: "Teclado USB mecánico negro",
            brand: None,
            category_id: Some(category.id),
        };

        assert_eq!(generate_sku(&db, &request, &settings).await, "ELEC-TECL-001");
        assert_eq!(generate_sku(&db, &request, &settings).await, "ELEC-TECL-002");

        // Previewing does not consume the next number
        assert_eq!(preview_sku(&db, &request, &settings).await?, "ELEC-TECL-003");
        assert_eq!(preview_sku(&db, &request, &settings).await?, "ELEC-TECL-003");
        assert_eq!(generate_sku(&db, &request, &settings).await, "ELEC-TECL-003");

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_unique_sku_appends_counter() -> Result<()> {
        let db = setup_test_db().await?;
        create_product_with_sku(&db, "Monitor A", "ELEC-MONI-001").await?;
        create_product_with_sku(&db, "Monitor B", "ELEC-MONI-001-01").await?;

        let sku = ensure_unique_sku(&db, "ELEC-MONI-001", None).await?;
        assert_eq!(sku, "ELEC-MONI-001-02");

        let free = ensure_unique_sku(&db, "ELEC-MONI-002", None).await?;
        assert_eq!(free, "ELEC-MONI-002");

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_unique_sku_falls_back_to_timestamp() -> Result<()> {
        let db = setup_test_db().await?;
        let base = "SPA-TOAL-001";
        create_product_with_sku(&db, "Toalla", base).await?;
        for counter in 1..=MAX_UNIQUE_ATTEMPTS {
            create_product_with_sku(&db, &format!("Toalla {counter}"), &format!("{base}-{counter:02}"))
                .await?;
        }

        let sku = ensure_unique_sku(&db, base, None).await?;
        let suffix = sku.strip_prefix("SPA-TOAL-001-").unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_digit()));

        Ok(())
    }

    #[tokio::test]
    async fn test_is_sku_unique_excludes_own_product() -> Result<()> {
        let db = setup_test_db().await?;
        let product = create_product_with_sku(&db, "Bata", "SPA-BATA-001").await?;

        assert!(!is_sku_unique(&db, "SPA-BATA-001", None).await?);
        assert!(is_sku_unique(&db, "SPA-BATA-001", Some(product.id)).await?);

        Ok(())
    }
}
