//! Parser for the text printed by the in-game `identify` command.
//!
//! A typical block looks like:
//! ```text
//! Object 'a mystical pendant', Item type: TREASURE
//! Item will give you following abilities:  NOBITS
//! Worn Location(s): TAKE NECK
//! Item is: NOBITS
//! Weight: 3, Suggested Retail Value: 1000, Rent: 20, Min. level: 0
//! Can affect you as :
//!    Affects: SPELLPOWER By 2
//!    Affects: HITROLL By 1
//! ```
//!
//! Players paste these by hand, so nothing here is allowed to fail: every
//! field is extracted independently and simply left out when its line is
//! missing or mangled.

use crate::config::ParseOptions;
use crate::error::Result;
use crate::file_utils::read_text_file;
use crate::models::{DamageInfo, ItemStats, LocationKind, ParsedItem};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"Object '(.+?)',").unwrap();
    static ref TYPE_RE: Regex = Regex::new(r"Item type: (.+)").unwrap();
    static ref ABILITIES_RE: Regex = Regex::new(r"abilities: (.+)").unwrap();
    static ref WORN_RE: Regex = Regex::new(r"Worn Location\(s\): (.+)").unwrap();
    static ref TATTOO_RE: Regex = Regex::new(r"Tattoo Location\(s\): (.+)").unwrap();
    static ref IMPLANT_RE: Regex = Regex::new(r"Implant Location\(s\): (.+)").unwrap();
    static ref PROPERTY_RE: Regex = Regex::new(r"ANTI_\w+|HUM|GLOW|MAGIC|NOBITS").unwrap();
    static ref PROPERTY_WORD_RE: Regex =
        Regex::new(r"\b(?:ANTI_\w+|HUM|GLOW|MAGIC|NOBITS)\b").unwrap();
    static ref STATS_RE: Regex = Regex::new(
        r"Weight: (\d+), Suggested Retail Value: (\d+), Rent: (\d+), Min. level: (\d+)"
    )
    .unwrap();
    static ref DAMAGE_RE: Regex = Regex::new(
        r"Damage Dice is '(\d+D\d+)' for an average per-round damage of (\d+\.\d+)."
    )
    .unwrap();
    static ref AFFECT_RE: Regex = Regex::new(r"Affects: (\w+|\w+_\w+) By (-?\d+)").unwrap();
}

/// Parse an identify block with default options.
pub fn parse_item_data(text: &str) -> ParsedItem {
    parse_item_data_with(text, &ParseOptions::default())
}

/// Parse an identify block.
pub fn parse_item_data_with(text: &str, options: &ParseOptions) -> ParsedItem {
    let mut item = ParsedItem {
        name: capture_trimmed(&NAME_RE, text),
        item_type: capture_trimmed(&TYPE_RE, text),
        abilities: capture_trimmed(&ABILITIES_RE, text),
        properties: extract_properties(text, options),
        stats: extract_stats(text),
        damage: extract_damage(text),
        ..Default::default()
    };

    let kind = detect_location_kind(text);
    let location_re: &Regex = match kind {
        LocationKind::Worn => &WORN_RE,
        LocationKind::Tattoo => &TATTOO_RE,
        LocationKind::Implant => &IMPLANT_RE,
    };
    item.set_locations(kind, capture_trimmed(location_re, text));

    for caps in AFFECT_RE.captures_iter(text) {
        let name = &caps[1];
        match caps[2].parse::<i64>() {
            // IndexMap keeps the first position and takes the last value
            Ok(delta) => {
                item.affects.insert(name.to_string(), delta);
            }
            Err(e) => tracing::trace!("Skipping affect {}: {}", name, e),
        }
    }

    tracing::debug!(
        name = item.name.as_deref().unwrap_or("<none>"),
        location = kind.field_name(),
        properties = item.properties.len(),
        affects = item.affects.len(),
        has_stats = item.stats.is_some(),
        has_damage = item.damage.is_some(),
        "Parsed identify block"
    );

    item
}

/// Read an identify dump from disk and parse it.
pub fn parse_item_file(path: &Path, options: &ParseOptions) -> Result<ParsedItem> {
    let text = read_text_file(path)?;
    Ok(parse_item_data_with(&text, options))
}

/// Decide which location label applies.
///
/// `Worn` wins over `Tattoo`; with neither label present the kind falls back
/// to `Implant` even when no implant label exists.
pub fn detect_location_kind(text: &str) -> LocationKind {
    if text.contains("Worn Location(s):") {
        LocationKind::Worn
    } else if text.contains("Tattoo Location(s):") {
        LocationKind::Tattoo
    } else {
        LocationKind::Implant
    }
}

fn capture_trimmed(re: &Regex, text: &str) -> Option<String> {
    let value = re.captures(text)?.get(1)?.as_str().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn extract_properties(text: &str, options: &ParseOptions) -> Vec<String> {
    let re: &Regex = if options.anchor_properties {
        &PROPERTY_WORD_RE
    } else {
        &PROPERTY_RE
    };
    re.find_iter(text).map(|m| m.as_str().to_string()).collect()
}

fn extract_stats(text: &str) -> Option<ItemStats> {
    let caps = STATS_RE.captures(text)?;
    let field = |idx: usize| -> Option<u32> {
        caps[idx]
            .parse()
            .map_err(|e| tracing::trace!("Summary value {:?} out of range: {}", &caps[idx], e))
            .ok()
    };
    Some(ItemStats {
        weight: field(1)?,
        value: field(2)?,
        rent: field(3)?,
        min_level: field(4)?,
    })
}

fn extract_damage(text: &str) -> Option<DamageInfo> {
    let caps = DAMAGE_RE.captures(text)?;
    Some(DamageInfo {
        damage_dice: caps[1].to_string(),
        average_damage: caps[2].parse().ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMPLANT_CAPSULE: &str = "
Object 'a tek implant capsule', Item type: IMPLANT
Item will give you following abilities:  NOBITS
Implant Location(s): TAKE IMP_FINGER IMP_NECK IMP_CHEST IMP_SKULL IMP_LEG IMP_FOOT IMP_HAND IMP_ARM
IMP_STOMACH IMP_WRIST
Item is: NOBITS
Weight: 1, Suggested Retail Value: 2000, Rent: 200, Min. level: 0
Can affect you as :
   Affects: HITROLL By 2
   Affects: MANA_REGEN By 1
   Affects: MOVE_REGEN By 1
   Affects: HIT_REGEN By 1
";

    const MYSTICAL_PENDANT: &str = "
Object 'a mystical pendant', Item type: TREASURE
Item will give you following abilities:  NOBITS 
Worn Location(s): TAKE NECK 
Item is: NOBITS 
Weight: 3, Suggested Retail Value: 1000, Rent: 20, Min. level: 0
Can affect you as :
   Affects: SPELLPOWER By 2
   Affects: HITROLL By 1
   Affects: MAXMANA By 15
   Affects: DEX By 1
   Affects: INT By 1
   Affects: WIS By 1
";

    const LONGSWORD: &str = "
Object 'a glowing longsword', Item type: WEAPON
Item will give you following abilities:  NOBITS
Worn Location(s): TAKE WIELD
Item is: GLOW MAGIC ANTI_GOOD ANTI_CLERIC
Weight: 12, Suggested Retail Value: 5400, Rent: 300, Min. level: 25
Damage Dice is '3D8' for an average per-round damage of 13.5.
Can affect you as :
   Affects: DAMROLL By 3
   Affects: AC By -10
";

    fn affect_pairs(item: &ParsedItem) -> Vec<(&str, i64)> {
        item.affects.iter().map(|(k, v)| (k.as_str(), *v)).collect()
    }

    #[test]
    fn test_parse_implant_capsule() {
        let item = parse_item_data(IMPLANT_CAPSULE);

        assert_eq!(item.name.as_deref(), Some("a tek implant capsule"));
        assert_eq!(item.item_type.as_deref(), Some("IMPLANT"));
        assert_eq!(item.abilities.as_deref(), Some("NOBITS"));
        assert_eq!(
            item.implant_locations.as_deref(),
            Some("TAKE IMP_FINGER IMP_NECK IMP_CHEST IMP_SKULL IMP_LEG IMP_FOOT IMP_HAND IMP_ARM")
        );
        assert!(item.worn_locations.is_none());
        assert!(item.tattoo_locations.is_none());
        assert_eq!(item.properties, vec!["NOBITS", "NOBITS"]);
        assert_eq!(
            item.stats,
            Some(ItemStats { weight: 1, value: 2000, rent: 200, min_level: 0 })
        );
        assert!(item.damage.is_none());
        assert_eq!(
            affect_pairs(&item),
            vec![("HITROLL", 2), ("MANA_REGEN", 1), ("MOVE_REGEN", 1), ("HIT_REGEN", 1)]
        );
    }

    #[test]
    fn test_parse_mystical_pendant() {
        let item = parse_item_data(MYSTICAL_PENDANT);

        assert_eq!(item.name.as_deref(), Some("a mystical pendant"));
        assert_eq!(item.item_type.as_deref(), Some("TREASURE"));
        assert_eq!(item.worn_locations.as_deref(), Some("TAKE NECK"));
        assert!(item.implant_locations.is_none());
        assert_eq!(item.properties, vec!["NOBITS", "NOBITS"]);
        assert_eq!(
            affect_pairs(&item),
            vec![
                ("SPELLPOWER", 2),
                ("HITROLL", 1),
                ("MAXMANA", 15),
                ("DEX", 1),
                ("INT", 1),
                ("WIS", 1),
            ]
        );
        assert_eq!(item.stats.map(|s| s.weight), Some(3));
    }

    #[test]
    fn test_parse_weapon_damage() {
        let item = parse_item_data(LONGSWORD);

        let damage = item.damage.expect("weapon should carry damage");
        assert_eq!(damage.damage_dice, "3D8");
        assert!((damage.average_damage - 13.5).abs() < f64::EPSILON);
        assert_eq!(item.properties, vec!["NOBITS", "GLOW", "MAGIC", "ANTI_GOOD", "ANTI_CLERIC"]);
        assert_eq!(item.affects.get("AC"), Some(&-10));
        assert_eq!(item.stats.map(|s| s.min_level), Some(25));
    }

    #[test]
    fn test_parse_empty_input() {
        let item = parse_item_data("");
        assert_eq!(item, ParsedItem::default());
        assert!(item.properties.is_empty());
        assert!(item.affects.is_empty());
        assert!(item.name.is_none());
        assert!(item.stats.is_none());
    }

    #[test]
    fn test_parse_garbage_input() {
        let item = parse_item_data("You are hungry.\nThe sky is clear.\n");
        assert_eq!(item, ParsedItem::default());
    }

    #[test]
    fn test_duplicate_affect_last_value_wins() {
        let text = "Affects: HITROLL By 2\nAffects: DEX By 1\nAffects: HITROLL By 5\n";
        let item = parse_item_data(text);
        assert_eq!(affect_pairs(&item), vec![("HITROLL", 5), ("DEX", 1)]);
    }

    #[test]
    fn test_no_location_label_defaults_to_implant() {
        let text = "Object 'a rock', Item type: OTHER\nWeight: 5, Suggested Retail Value: 0, Rent: 0, Min. level: 0\n";
        assert_eq!(detect_location_kind(text), LocationKind::Implant);
        let item = parse_item_data(text);
        assert!(item.locations().is_none());
    }

    #[test]
    fn test_tattoo_location() {
        let text = "Object 'a dragon tattoo', Item type: TATTOO\nTattoo Location(s): TAT_BACK \n";
        let item = parse_item_data(text);
        assert_eq!(item.tattoo_locations.as_deref(), Some("TAT_BACK"));
        assert!(item.worn_locations.is_none());
        assert!(item.implant_locations.is_none());
    }

    #[test]
    fn test_worn_label_takes_priority() {
        let text = "Tattoo Location(s): TAT_ARM\nWorn Location(s): TAKE FINGER\n";
        assert_eq!(detect_location_kind(text), LocationKind::Worn);
        let item = parse_item_data(text);
        assert_eq!(item.worn_locations.as_deref(), Some("TAKE FINGER"));
        assert!(item.tattoo_locations.is_none());
    }

    #[test]
    fn test_properties_match_inside_words() {
        let text = "Item is: GLOWING HUM\nTHUMB";
        let item = parse_item_data(text);
        assert_eq!(item.properties, vec!["GLOW", "HUM", "HUM"]);
    }

    #[test]
    fn test_anchored_properties() {
        let options = ParseOptions { anchor_properties: true };
        let item = parse_item_data_with("Item is: GLOWING HUM ANTI_EVIL\nTHUMB", &options);
        assert_eq!(item.properties, vec!["HUM", "ANTI_EVIL"]);
    }

    #[test]
    fn test_misformatted_stats_line_omits_all() {
        let text = "Weight: 3, Suggested Retail Value: lots, Rent: 20, Min. level: 0";
        assert!(parse_item_data(text).stats.is_none());
    }

    #[test]
    fn test_overflowing_stats_omits_all() {
        let text = "Weight: 99999999999, Suggested Retail Value: 1, Rent: 2, Min. level: 3";
        assert!(parse_item_data(text).stats.is_none());
    }

    #[test]
    fn test_crlf_line_endings() {
        let text = MYSTICAL_PENDANT.replace('\n', "\r\n");
        let item = parse_item_data(&text);
        assert_eq!(item.item_type.as_deref(), Some("TREASURE"));
        assert_eq!(item.worn_locations.as_deref(), Some("TAKE NECK"));
        assert_eq!(item.affects.len(), 6);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = parse_item_data(IMPLANT_CAPSULE);
        let second = parse_item_data(IMPLANT_CAPSULE);
        assert_eq!(first, second);
        assert_eq!(affect_pairs(&first), affect_pairs(&second));
        assert_eq!(first.properties, second.properties);
    }

    #[test]
    fn test_parse_item_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pendant.txt");
        std::fs::write(&path, MYSTICAL_PENDANT).unwrap();
        let item = parse_item_file(&path, &ParseOptions::default()).unwrap();
        assert_eq!(item.name.as_deref(), Some("a mystical pendant"));
    }
}
