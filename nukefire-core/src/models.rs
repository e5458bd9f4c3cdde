//! Data models for Nukefire item data.

use crate::error::EqError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which kind of location label an identify block carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    Worn,
    Tattoo,
    Implant,
}

impl LocationKind {
    /// Label as printed by the game, e.g. `Worn` in `Worn Location(s):`.
    pub fn label(self) -> &'static str {
        match self {
            LocationKind::Worn => "Worn",
            LocationKind::Tattoo => "Tattoo",
            LocationKind::Implant => "Implant",
        }
    }

    /// Name of the record field the locations are stored under.
    pub fn field_name(self) -> &'static str {
        match self {
            LocationKind::Worn => "worn_locations",
            LocationKind::Tattoo => "tattoo_locations",
            LocationKind::Implant => "implant_locations",
        }
    }
}

/// The `Weight: .., Suggested Retail Value: .., Rent: .., Min. level: ..` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStats {
    pub weight: u32,
    pub value: u32,
    pub rent: u32,
    pub min_level: u32,
}

/// Weapon damage line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageInfo {
    pub damage_dice: String,
    pub average_damage: f64,
}

/// Structured record extracted from one identify text block.
///
/// Every field is best-effort: `None` means the pattern was not found.
/// `properties` and `affects` are always present but may be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abilities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worn_locations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tattoo_locations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implant_locations: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(flatten)]
    pub stats: Option<ItemStats>,
    #[serde(flatten)]
    pub damage: Option<DamageInfo>,
    #[serde(default)]
    pub affects: IndexMap<String, i64>,
}

impl ParsedItem {
    /// The populated location field, if any, with its kind.
    pub fn locations(&self) -> Option<(LocationKind, &str)> {
        [
            (LocationKind::Worn, &self.worn_locations),
            (LocationKind::Tattoo, &self.tattoo_locations),
            (LocationKind::Implant, &self.implant_locations),
        ]
        .into_iter()
        .find_map(|(kind, value)| value.as_deref().map(|v| (kind, v)))
    }

    pub fn set_locations(&mut self, kind: LocationKind, value: Option<String>) {
        self.worn_locations = None;
        self.tattoo_locations = None;
        self.implant_locations = None;
        match kind {
            LocationKind::Worn => self.worn_locations = value,
            LocationKind::Tattoo => self.tattoo_locations = value,
            LocationKind::Implant => self.implant_locations = value,
        }
    }

    /// Affects rendered as `NAME:+N` tokens, space separated.
    pub fn affects_summary(&self) -> String {
        self.affects
            .iter()
            .map(|(name, delta)| format!("{}:{:+}", name, delta))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// An item ready to be appended to the store.
#[derive(Debug, Clone, Default)]
pub struct NewItem {
    pub item: ParsedItem,
    pub zone: String,
    pub directions: String,
    pub mob: String,
    pub raw_text: String,
}

/// Database model for the items table.
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    pub id: i64,
    #[serde(flatten)]
    pub item: ParsedItem,
    pub zone: String,
    pub directions: String,
    pub mob: String,
    pub raw_text: String,
    pub added_at: DateTime<Utc>,
}

impl ItemRecord {
    /// Cell value for a column, rendered as text; empty when absent.
    pub fn field_value(&self, column: EditableColumn) -> String {
        let item = &self.item;
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let stat = |f: fn(&ItemStats) -> u32| item.stats.as_ref().map(f).map(|v| v.to_string());
        match column {
            EditableColumn::Name => text(&item.name),
            EditableColumn::ItemType => text(&item.item_type),
            EditableColumn::Abilities => text(&item.abilities),
            EditableColumn::WornLocations => text(&item.worn_locations),
            EditableColumn::TattooLocations => text(&item.tattoo_locations),
            EditableColumn::ImplantLocations => text(&item.implant_locations),
            EditableColumn::Properties => item.properties.join(" "),
            EditableColumn::Weight => stat(|s| s.weight).unwrap_or_default(),
            EditableColumn::Value => stat(|s| s.value).unwrap_or_default(),
            EditableColumn::Rent => stat(|s| s.rent).unwrap_or_default(),
            EditableColumn::MinLevel => stat(|s| s.min_level).unwrap_or_default(),
            EditableColumn::DamageDice => {
                item.damage.as_ref().map(|d| d.damage_dice.clone()).unwrap_or_default()
            }
            EditableColumn::AverageDamage => item
                .damage
                .as_ref()
                .map(|d| d.average_damage.to_string())
                .unwrap_or_default(),
            EditableColumn::Affects => serde_json::to_string(&item.affects).unwrap_or_default(),
            EditableColumn::Zone => self.zone.clone(),
            EditableColumn::Directions => self.directions.clone(),
            EditableColumn::Mob => self.mob.clone(),
        }
    }
}

/// Free-text search filters. Every supplied filter must match.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub zone: Option<String>,
    pub mob: Option<String>,
    pub item_type: Option<String>,
    /// Matched against worn, tattoo and implant locations.
    pub location: Option<String>,
}

impl SearchQuery {
    pub fn is_empty(&self) -> bool {
        [&self.name, &self.zone, &self.mob, &self.item_type, &self.location]
            .iter()
            .all(|f| f.as_deref().is_none_or(str::is_empty))
    }
}

/// Columns that can be changed through a single-cell edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableColumn {
    Name,
    ItemType,
    Abilities,
    WornLocations,
    TattooLocations,
    ImplantLocations,
    Properties,
    Weight,
    Value,
    Rent,
    MinLevel,
    DamageDice,
    AverageDamage,
    Affects,
    Zone,
    Directions,
    Mob,
}

impl EditableColumn {
    pub const ALL: [EditableColumn; 17] = [
        EditableColumn::Name,
        EditableColumn::ItemType,
        EditableColumn::Abilities,
        EditableColumn::WornLocations,
        EditableColumn::TattooLocations,
        EditableColumn::ImplantLocations,
        EditableColumn::Properties,
        EditableColumn::Weight,
        EditableColumn::Value,
        EditableColumn::Rent,
        EditableColumn::MinLevel,
        EditableColumn::DamageDice,
        EditableColumn::AverageDamage,
        EditableColumn::Affects,
        EditableColumn::Zone,
        EditableColumn::Directions,
        EditableColumn::Mob,
    ];

    /// Field name as it appears in the flat record.
    pub fn field_name(self) -> &'static str {
        match self {
            EditableColumn::Name => "name",
            EditableColumn::ItemType => "type",
            EditableColumn::Abilities => "abilities",
            EditableColumn::WornLocations => "worn_locations",
            EditableColumn::TattooLocations => "tattoo_locations",
            EditableColumn::ImplantLocations => "implant_locations",
            EditableColumn::Properties => "properties",
            EditableColumn::Weight => "weight",
            EditableColumn::Value => "value",
            EditableColumn::Rent => "rent",
            EditableColumn::MinLevel => "min_level",
            EditableColumn::DamageDice => "damage_dice",
            EditableColumn::AverageDamage => "average_damage",
            EditableColumn::Affects => "affects",
            EditableColumn::Zone => "zone",
            EditableColumn::Directions => "directions",
            EditableColumn::Mob => "mob",
        }
    }
}

impl fmt::Display for EditableColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for EditableColumn {
    type Err = EqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EditableColumn::ALL
            .into_iter()
            .find(|c| c.field_name().eq_ignore_ascii_case(wanted))
            .or_else(|| {
                (wanted.eq_ignore_ascii_case("item_type")).then_some(EditableColumn::ItemType)
            })
            .ok_or_else(|| {
                let known: Vec<&str> = EditableColumn::ALL.iter().map(|c| c.field_name()).collect();
                EqError::Validation(format!(
                    "Unknown column '{}', expected one of: {}",
                    wanted,
                    known.join(", ")
                ))
            })
    }
}
