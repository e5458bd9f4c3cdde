//! CSV export of stored items.

use crate::error::Result;
use crate::models::ItemRecord;
use std::io::Write;
use std::path::Path;

const HEADER: [&str; 20] = [
    "id",
    "name",
    "type",
    "abilities",
    "worn_locations",
    "tattoo_locations",
    "implant_locations",
    "properties",
    "weight",
    "value",
    "rent",
    "min_level",
    "damage_dice",
    "average_damage",
    "affects",
    "zone",
    "directions",
    "mob",
    "added_at",
    "raw_text",
];

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write every record as one CSV row. Returns the number of rows written.
pub fn export_csv<W: Write>(records: &[ItemRecord], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    for record in records {
        let item = &record.item;
        wtr.write_record([
            record.id.to_string(),
            item.name.clone().unwrap_or_default(),
            item.item_type.clone().unwrap_or_default(),
            item.abilities.clone().unwrap_or_default(),
            item.worn_locations.clone().unwrap_or_default(),
            item.tattoo_locations.clone().unwrap_or_default(),
            item.implant_locations.clone().unwrap_or_default(),
            item.properties.join(" "),
            opt_to_string(item.stats.map(|s| s.weight)),
            opt_to_string(item.stats.map(|s| s.value)),
            opt_to_string(item.stats.map(|s| s.rent)),
            opt_to_string(item.stats.map(|s| s.min_level)),
            opt_to_string(item.damage.as_ref().map(|d| &d.damage_dice)),
            opt_to_string(item.damage.as_ref().map(|d| d.average_damage)),
            item.affects_summary(),
            record.zone.clone(),
            record.directions.clone(),
            record.mob.clone(),
            record.added_at.to_rfc3339(),
            record.raw_text.clone(),
        ])?;
    }

    wtr.flush()?;
    Ok(records.len())
}

/// Export to a file, replacing it if it exists.
pub fn export_csv_file(records: &[ItemRecord], path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    let count = export_csv(records, file)?;
    tracing::info!("Exported {} items to {}", count, path.display());
    Ok(count)
}
