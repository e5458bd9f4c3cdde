use crate::error::{EqError, Result};
use crate::models::{
    DamageInfo, EditableColumn, ItemRecord, ItemStats, LocationKind, NewItem, ParsedItem,
    SearchQuery,
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

const ITEM_COLUMNS: &str = "id, name, item_type, abilities, worn_locations, tattoo_locations,
    implant_locations, properties, weight, value, rent, min_level, damage_dice, average_damage,
    affects, zone, directions, mob, raw_text, added_at";

pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn new(path: &std::path::Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(EqError::Pool)?;

        let db = Self { pool };
        db.run_migrations()?;
        Ok(db)
    }

    /// Private in-memory database. A single pooled connection keeps every
    /// caller on the same database.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(EqError::Pool)?;

        let db = Self { pool };
        db.run_migrations()?;
        Ok(db)
    }

    pub fn connection(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(EqError::Pool)
    }

    fn run_migrations(&self) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                item_type TEXT,
                abilities TEXT,
                worn_locations TEXT,
                tattoo_locations TEXT,
                implant_locations TEXT,
                properties TEXT NOT NULL DEFAULT '[]',   -- JSON array
                weight INTEGER,
                value INTEGER,
                rent INTEGER,
                min_level INTEGER,
                damage_dice TEXT,
                average_damage REAL,
                affects TEXT NOT NULL DEFAULT '{}',      -- JSON object, text order
                zone TEXT NOT NULL DEFAULT '',
                directions TEXT NOT NULL DEFAULT '',
                mob TEXT NOT NULL DEFAULT '',
                raw_text TEXT NOT NULL DEFAULT '',
                added_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_name ON items(name);
            CREATE INDEX IF NOT EXISTS idx_items_zone ON items(zone);
            "#,
        )?;

        tx.commit()?;
        Ok(())
    }

    fn insert_item(&self, conn: &Connection, new: &NewItem) -> Result<i64> {
        let item = &new.item;
        let name = item
            .name
            .as_deref()
            .ok_or_else(|| EqError::MissingField("name".to_string()))?;
        let stats = item.stats;

        conn.execute(
            "INSERT INTO items (name, item_type, abilities, worn_locations, tattoo_locations,
                                implant_locations, properties, weight, value, rent, min_level,
                                damage_dice, average_damage, affects, zone, directions, mob,
                                raw_text, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            params![
                name,
                item.item_type,
                item.abilities,
                item.worn_locations,
                item.tattoo_locations,
                item.implant_locations,
                serde_json::to_string(&item.properties)?,
                stats.map(|s| s.weight),
                stats.map(|s| s.value),
                stats.map(|s| s.rent),
                stats.map(|s| s.min_level),
                item.damage.as_ref().map(|d| d.damage_dice.as_str()),
                item.damage.as_ref().map(|d| d.average_damage),
                serde_json::to_string(&item.affects)?,
                new.zone,
                new.directions,
                new.mob,
                new.raw_text,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Append one item. Returns the new row id.
    pub fn add_item(&self, new: &NewItem) -> Result<i64> {
        let conn = self.connection()?;
        let id = self.insert_item(&conn, new)?;
        tracing::info!("Added '{}' as item {}", new.item.name.as_deref().unwrap_or_default(), id);
        Ok(id)
    }

    /// Append many items in one transaction. Items without a name are skipped.
    /// Returns number of inserted rows.
    pub fn add_items(&self, items: &[NewItem]) -> Result<usize> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let mut inserted_count = 0;
        for new in items {
            if new.item.name.is_none() {
                tracing::warn!("Skipping item without a name (zone '{}')", new.zone);
                continue;
            }
            self.insert_item(&tx, new)?;
            inserted_count += 1;
        }

        tx.commit()?;
        Ok(inserted_count)
    }

    /// All items in insertion order.
    pub fn list_items(&self) -> Result<Vec<ItemRecord>> {
        self.query_items(&format!("SELECT {} FROM items ORDER BY id", ITEM_COLUMNS), Vec::new())
    }

    pub fn count_items(&self) -> Result<usize> {
        let conn = self.connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Case-insensitive substring search. Every supplied filter must match.
    pub fn search_items(&self, query: &SearchQuery) -> Result<Vec<ItemRecord>> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();

        let simple_filters = [
            ("name", &query.name),
            ("zone", &query.zone),
            ("mob", &query.mob),
            ("item_type", &query.item_type),
        ];
        for (column, filter) in simple_filters {
            if let Some(term) = filter.as_deref().filter(|t| !t.is_empty()) {
                clauses.push(format!("{} LIKE ? ESCAPE '\\'", column));
                values.push(like_pattern(term));
            }
        }

        if let Some(term) = query.location.as_deref().filter(|t| !t.is_empty()) {
            clauses.push(
                "(worn_locations LIKE ? ESCAPE '\\' OR tattoo_locations LIKE ? ESCAPE '\\' \
                 OR implant_locations LIKE ? ESCAPE '\\')"
                    .to_string(),
            );
            let pattern = like_pattern(term);
            values.extend([pattern.clone(), pattern.clone(), pattern]);
        }

        let mut sql = format!("SELECT {} FROM items", ITEM_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let results = self.query_items(&sql, values)?;
        tracing::debug!("Search {:?} matched {} items", query, results.len());
        Ok(results)
    }

    /// First item (lowest id) with exactly this name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<ItemRecord>> {
        let conn = self.connection()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE name = ?1 ORDER BY id LIMIT 1", ITEM_COLUMNS),
                params![name],
                ItemRow::from_row,
            )
            .optional()?;
        row.map(ItemRow::into_record).transpose()
    }

    /// Distinct item names, sorted.
    pub fn item_names(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT DISTINCT name FROM items ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Change one cell on the first item with this name.
    /// Returns the record as stored after the edit.
    pub fn update_field(
        &self,
        name: &str,
        column: EditableColumn,
        value: &str,
    ) -> Result<ItemRecord> {
        let mut record = self
            .find_by_name(name)?
            .ok_or_else(|| EqError::NotFound(format!("No item named '{}'", name)))?;

        apply_edit(&mut record, column, value)?;

        let conn = self.connection()?;
        let item = &record.item;
        let stats = item.stats;
        conn.execute(
            "UPDATE items SET name = ?1, item_type = ?2, abilities = ?3, worn_locations = ?4,
                    tattoo_locations = ?5, implant_locations = ?6, properties = ?7, weight = ?8,
                    value = ?9, rent = ?10, min_level = ?11, damage_dice = ?12,
                    average_damage = ?13, affects = ?14, zone = ?15, directions = ?16, mob = ?17
             WHERE id = ?18",
            params![
                item.name,
                item.item_type,
                item.abilities,
                item.worn_locations,
                item.tattoo_locations,
                item.implant_locations,
                serde_json::to_string(&item.properties)?,
                stats.map(|s| s.weight),
                stats.map(|s| s.value),
                stats.map(|s| s.rent),
                stats.map(|s| s.min_level),
                item.damage.as_ref().map(|d| d.damage_dice.as_str()),
                item.damage.as_ref().map(|d| d.average_damage),
                serde_json::to_string(&item.affects)?,
                record.zone,
                record.directions,
                record.mob,
                record.id,
            ],
        )?;

        tracing::info!("Updated '{}' column '{}' (item {})", name, column, record.id);
        Ok(record)
    }

    fn query_items(&self, sql: &str, values: Vec<String>) -> Result<Vec<ItemRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), ItemRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(ItemRow::into_record).collect()
    }
}

/// Raw column values; JSON and timestamp decoding happens in `into_record`.
struct ItemRow {
    id: i64,
    name: String,
    item_type: Option<String>,
    abilities: Option<String>,
    worn_locations: Option<String>,
    tattoo_locations: Option<String>,
    implant_locations: Option<String>,
    properties: String,
    weight: Option<u32>,
    value: Option<u32>,
    rent: Option<u32>,
    min_level: Option<u32>,
    damage_dice: Option<String>,
    average_damage: Option<f64>,
    affects: String,
    zone: String,
    directions: String,
    mob: String,
    raw_text: String,
    added_at: String,
}

impl ItemRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            item_type: row.get(2)?,
            abilities: row.get(3)?,
            worn_locations: row.get(4)?,
            tattoo_locations: row.get(5)?,
            implant_locations: row.get(6)?,
            properties: row.get(7)?,
            weight: row.get(8)?,
            value: row.get(9)?,
            rent: row.get(10)?,
            min_level: row.get(11)?,
            damage_dice: row.get(12)?,
            average_damage: row.get(13)?,
            affects: row.get(14)?,
            zone: row.get(15)?,
            directions: row.get(16)?,
            mob: row.get(17)?,
            raw_text: row.get(18)?,
            added_at: row.get(19)?,
        })
    }

    fn into_record(self) -> Result<ItemRecord> {
        let stats = match (self.weight, self.value, self.rent, self.min_level) {
            (Some(weight), Some(value), Some(rent), Some(min_level)) => {
                Some(ItemStats { weight, value, rent, min_level })
            }
            _ => None,
        };
        let damage = match (self.damage_dice, self.average_damage) {
            (Some(damage_dice), Some(average_damage)) => {
                Some(DamageInfo { damage_dice, average_damage })
            }
            _ => None,
        };
        let added_at = DateTime::parse_from_rfc3339(&self.added_at)
            .map_err(|e| {
                EqError::Parse(format!("Invalid timestamp '{}' on item {}: {}", self.added_at, self.id, e))
            })?
            .with_timezone(&Utc);

        Ok(ItemRecord {
            id: self.id,
            item: ParsedItem {
                name: Some(self.name),
                item_type: self.item_type,
                abilities: self.abilities,
                worn_locations: self.worn_locations,
                tattoo_locations: self.tattoo_locations,
                implant_locations: self.implant_locations,
                properties: serde_json::from_str(&self.properties)?,
                stats,
                damage,
                affects: serde_json::from_str(&self.affects)?,
            },
            zone: self.zone,
            directions: self.directions,
            mob: self.mob,
            raw_text: self.raw_text,
            added_at,
        })
    }
}

/// Escape `%`, `_` and `\` and wrap the term for a substring `LIKE`.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Apply a single-cell edit to a record in memory.
///
/// Location edits move the record to that location kind. Summary numbers
/// and damage stay all-or-nothing groups.
pub fn apply_edit(record: &mut ItemRecord, column: EditableColumn, value: &str) -> Result<()> {
    let trimmed = value.trim();
    let optional = || (!trimmed.is_empty()).then(|| trimmed.to_string());
    let item = &mut record.item;

    match column {
        EditableColumn::Name => {
            if trimmed.is_empty() {
                return Err(EqError::Validation("Item name cannot be empty".to_string()));
            }
            item.name = Some(trimmed.to_string());
        }
        EditableColumn::ItemType => item.item_type = optional(),
        EditableColumn::Abilities => item.abilities = optional(),
        EditableColumn::WornLocations => item.set_locations(LocationKind::Worn, optional()),
        EditableColumn::TattooLocations => item.set_locations(LocationKind::Tattoo, optional()),
        EditableColumn::ImplantLocations => item.set_locations(LocationKind::Implant, optional()),
        EditableColumn::Properties => {
            item.properties = trimmed
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        EditableColumn::Weight
        | EditableColumn::Value
        | EditableColumn::Rent
        | EditableColumn::MinLevel => {
            let number: u32 = trimmed.parse().map_err(|_| {
                EqError::Validation(format!(
                    "{} must be a non-negative integer, got '{}'",
                    column, trimmed
                ))
            })?;
            let stats = item.stats.as_mut().ok_or_else(|| {
                EqError::Validation(format!(
                    "Item has no Weight/Value/Rent/Min. level line, cannot set {}",
                    column
                ))
            })?;
            match column {
                EditableColumn::Weight => stats.weight = number,
                EditableColumn::Value => stats.value = number,
                EditableColumn::Rent => stats.rent = number,
                _ => stats.min_level = number,
            }
        }
        EditableColumn::DamageDice => {
            if trimmed.is_empty() {
                item.damage = None;
            } else {
                let (count, sides) = parse_dice(trimmed)?;
                let dice = format!("{}D{}", count, sides);
                match item.damage.as_mut() {
                    Some(damage) => damage.damage_dice = dice,
                    None => {
                        item.damage = Some(DamageInfo {
                            damage_dice: dice,
                            average_damage: f64::from(count) * (f64::from(sides) + 1.0) / 2.0,
                        })
                    }
                }
            }
        }
        EditableColumn::AverageDamage => {
            let average: f64 = trimmed
                .parse()
                .ok()
                .filter(|v: &f64| v.is_finite() && *v >= 0.0)
                .ok_or_else(|| {
                    EqError::Validation(format!(
                        "average_damage must be a non-negative number, got '{}'",
                        trimmed
                    ))
                })?;
            let damage = item.damage.as_mut().ok_or_else(|| {
                EqError::Validation("Item has no damage dice, set damage_dice first".to_string())
            })?;
            damage.average_damage = average;
        }
        EditableColumn::Affects => {
            item.affects = if trimmed.is_empty() {
                IndexMap::new()
            } else {
                serde_json::from_str(trimmed).map_err(|e| {
                    EqError::Validation(format!(
                        "affects must be a JSON object of NAME: integer, e.g. {{\"HITROLL\": 2}}: {}",
                        e
                    ))
                })?
            };
        }
        EditableColumn::Zone => record.zone = trimmed.to_string(),
        EditableColumn::Directions => record.directions = value.to_string(),
        EditableColumn::Mob => record.mob = trimmed.to_string(),
    }
    Ok(())
}

/// Parse dice notation such as `3D8` (case-insensitive `d`).
fn parse_dice(text: &str) -> Result<(u32, u32)> {
    let invalid = || EqError::Validation(format!("damage_dice must look like 2D6, got '{}'", text));
    let (count, sides) = text.split_once(['D', 'd']).ok_or_else(invalid)?;
    let count: u32 = count.parse().map_err(|_| invalid())?;
    let sides: u32 = sides.parse().map_err(|_| invalid())?;
    Ok((count, sides))
}
