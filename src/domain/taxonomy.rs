//! Shared product taxonomy: brand aliases, keyword detection tables and
//! per-power-type price bands.
//!
//! Both the pipeline's standardize stage and the matching engine's
//! detection logic read these tables, so the two can never drift apart.
//! Detection resolves by first matching keyword in the declared priority
//! order.

/// Known brand spellings mapped to their canonical form.
///
/// Keys are compared lowercased and trimmed. Licensed-replica brands map to
/// the licensee that actually sells the product in the covered markets
/// (e.g. VFC-made M4s retail under Elite Force).
pub const BRAND_ALIASES: &[(&str, &str)] = &[
    ("vfc", "Elite Force"),
    ("vega force company", "Elite Force"),
    ("ef", "Elite Force"),
    ("elite force", "Elite Force"),
    ("umarex", "Elite Force"),
    ("tm", "Tokyo Marui"),
    ("marui", "Tokyo Marui"),
    ("tokyo marui", "Tokyo Marui"),
    ("we", "WE Tech"),
    ("we-tech", "WE Tech"),
    ("we tech", "WE Tech"),
    ("g&g", "G&G Armament"),
    ("g&g armament", "G&G Armament"),
    ("gng", "G&G Armament"),
    ("cyma", "CYMA"),
    ("krytac", "Krytac"),
    ("kwa", "KWA"),
    ("ghk", "GHK"),
    ("asg", "ASG"),
    ("action sport games", "ASG"),
    ("lct", "LCT"),
    ("e&l", "E&L"),
    ("aw custom", "AW Custom"),
    ("awc", "AW Custom"),
];

/// Terms stripped from listing names before similarity comparison.
///
/// Multi-word phrases are removed first, then single words are dropped
/// token-wise after punctuation stripping.
pub const NAME_STOP_TERMS: &[&str] = &[
    "officially licensed",
    "fully licensed",
    "airsoft",
    "gun",
    "rifle",
    "pistol",
    "replica",
    "6mm",
    "bb",
];

/// Platform families in detection priority order.
///
/// More specific tokens come first so e.g. "hi-capa" wins before any
/// pistol-family fallback could fire.
pub const PLATFORM_KEYWORDS: &[(&str, &str)] = &[
    ("hi-capa", "hi_capa"),
    ("hi capa", "hi_capa"),
    ("hicapa", "hi_capa"),
    ("glock", "glock"),
    ("g17", "glock"),
    ("g18", "glock"),
    ("g19", "glock"),
    ("m1911", "m1911"),
    ("1911", "m1911"),
    ("mp5", "mp5"),
    ("mp7", "mp7"),
    ("p90", "p90"),
    ("kriss vector", "vector"),
    ("vector", "vector"),
    ("scar", "scar"),
    ("ak47", "ak"),
    ("ak-47", "ak"),
    ("ak74", "ak"),
    ("ak-74", "ak"),
    ("akm", "ak"),
    ("ak105", "ak"),
    ("hk416", "m4"),
    ("416", "m4"),
    ("ar-15", "m4"),
    ("ar15", "m4"),
    ("m16", "m4"),
    ("m4", "m4"),
];

/// Power types in detection priority order ("gbbr" must win before the
/// bare "gbb" token resolves to a gas pistol).
pub const POWER_TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("gbbr", "gbbr"),
    ("gas blowback rifle", "gbbr"),
    ("gbb rifle", "gbbr"),
    ("gbb pistol", "gbb_pistol"),
    ("gas pistol", "gbb_pistol"),
    ("gas blowback", "gbb_pistol"),
    ("gbb", "gbb_pistol"),
    ("hpa", "hpa"),
    ("co2", "co2"),
    ("aep", "aep"),
    ("spring", "spring"),
    ("bolt action", "spring"),
    ("aeg", "aeg"),
];

/// Categories in detection priority order; accessories and specialist
/// classes resolve before the broad rifle/pistol fallbacks.
pub const CATEGORY_KEYWORDS: &[(&str, &str)] = &[
    ("magazine", "parts"),
    ("hop-up", "parts"),
    ("hopup", "parts"),
    ("gearbox", "parts"),
    ("inner barrel", "parts"),
    ("mosfet", "parts"),
    ("holster", "gear"),
    ("vest", "gear"),
    ("plate carrier", "gear"),
    ("goggle", "gear"),
    ("sniper", "sniper"),
    ("bolt action", "sniper"),
    ("shotgun", "shotgun"),
    ("lmg", "lmg"),
    ("minimi", "lmg"),
    ("m249", "lmg"),
    ("smg", "smg"),
    ("mp5", "smg"),
    ("mp7", "smg"),
    ("p90", "smg"),
    ("vector", "smg"),
    ("pistol", "pistol"),
    ("hi-capa", "pistol"),
    ("glock", "pistol"),
    ("1911", "pistol"),
    ("rifle", "rifle"),
    ("carbine", "rifle"),
    ("m4", "rifle"),
    ("ak", "rifle"),
];

pub const DEFAULT_CATEGORY: &str = "rifle";
pub const DEFAULT_POWER_TYPE: &str = "aeg";
pub const DEFAULT_PLATFORM: &str = "other";

/// Expected price band for a power type; prices outside the band are
/// flagged as anomalies (advisory only).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub min: f64,
    pub max: f64,
}

const PRICE_BANDS: &[(&str, PriceBand)] = &[
    ("aeg", PriceBand { min: 100.0, max: 1000.0 }),
    ("gbbr", PriceBand { min: 150.0, max: 1200.0 }),
    ("gbb_pistol", PriceBand { min: 80.0, max: 500.0 }),
    ("spring", PriceBand { min: 20.0, max: 400.0 }),
    ("hpa", PriceBand { min: 300.0, max: 1800.0 }),
];

pub const DEFAULT_PRICE_BAND: PriceBand = PriceBand { min: 50.0, max: 800.0 };

/// Canonical brand for a scraped spelling, if the brand is known.
pub fn canonical_brand(raw: &str) -> Option<&'static str> {
    let needle = raw.trim().to_lowercase();
    BRAND_ALIASES
        .iter()
        .find(|(alias, _)| *alias == needle)
        .map(|(_, canonical)| *canonical)
}

/// Brand form used for similarity comparison: canonical spelling when the
/// brand is known, otherwise the trimmed lowercase input.
pub fn normalize_brand(raw: &str) -> String {
    match canonical_brand(raw) {
        Some(canonical) => canonical.to_lowercase(),
        None => raw.trim().to_lowercase(),
    }
}

/// Listing-name form used for similarity comparison: lowercased, stripped
/// of punctuation and of the fixed stop-term list, whitespace-collapsed.
pub fn normalize_name(raw: &str) -> String {
    let mut lowered = raw.to_lowercase();
    for term in NAME_STOP_TERMS.iter().filter(|t| t.contains(' ')) {
        lowered = lowered.replace(term, " ");
    }
    let depunctuated: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    depunctuated
        .split_whitespace()
        .filter(|token| !NAME_STOP_TERMS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

fn detect(table: &[(&str, &'static str)], name: &str, default: &'static str) -> &'static str {
    let haystack = name.to_lowercase();
    table
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, value)| *value)
        .unwrap_or(default)
}

pub fn detect_platform(name: &str) -> &'static str {
    detect(PLATFORM_KEYWORDS, name, DEFAULT_PLATFORM)
}

pub fn detect_power_type(name: &str) -> &'static str {
    detect(POWER_TYPE_KEYWORDS, name, DEFAULT_POWER_TYPE)
}

pub fn detect_category(name: &str) -> &'static str {
    detect(CATEGORY_KEYWORDS, name, DEFAULT_CATEGORY)
}

pub fn price_band(power_type: &str) -> PriceBand {
    PRICE_BANDS
        .iter()
        .find(|(pt, _)| *pt == power_type)
        .map(|(_, band)| *band)
        .unwrap_or(DEFAULT_PRICE_BAND)
}
