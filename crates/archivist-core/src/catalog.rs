//! Locations, sub-locations, archive URLs and asset links.

use tracing::info;

use crate::error::Error;
use crate::identity::{allocate_entity_id, EntityTable};
use crate::metadata::MediaCategory;
use crate::storage::models::{ArchiveAsset, ArchiveUrl, Location, SubLocation};
use crate::storage::Database;

fn require_location(db: &Database, key: &str) -> Result<Location, Error> {
    db.find_location(key)?.ok_or_else(|| Error::NotFound {
        entity: "location",
        id: key.to_string(),
    })
}

pub fn create_location(
    db: &Database,
    name: &str,
    region: Option<&str>,
    max_id_attempts: u32,
) -> Result<Location, Error> {
    let id = allocate_entity_id(db, EntityTable::Locations, max_id_attempts)?;
    let location = Location {
        id: id.full_id,
        short_id: id.short_id,
        name: name.trim().to_string(),
        region: region.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db.insert_location(&location)?;
    info!("Created location '{}' ({})", location.name, location.short_id);
    Ok(location)
}

/// `location` may be a full id or a short id.
pub fn create_sub_location(
    db: &Database,
    location: &str,
    name: &str,
    max_id_attempts: u32,
) -> Result<SubLocation, Error> {
    let parent = require_location(db, location)?;
    let id = allocate_entity_id(db, EntityTable::SubLocations, max_id_attempts)?;
    let sub = SubLocation {
        id: id.full_id,
        short_id: id.short_id,
        location_id: parent.id,
        name: name.trim().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db.insert_sub_location(&sub)?;
    info!("Created sub-location '{}' ({})", sub.name, sub.short_id);
    Ok(sub)
}

pub fn create_archive_url(
    db: &Database,
    location: &str,
    url: &str,
    max_id_attempts: u32,
) -> Result<ArchiveUrl, Error> {
    let parent = require_location(db, location)?;
    let id = allocate_entity_id(db, EntityTable::ArchiveUrls, max_id_attempts)?;
    let archive_url = ArchiveUrl {
        id: id.full_id,
        short_id: id.short_id,
        location_id: parent.id,
        url: url.trim().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db.insert_archive_url(&archive_url)?;
    Ok(archive_url)
}

/// Resolve a location and optional sub-location, checking they belong together.
pub fn resolve_target(
    db: &Database,
    location: &str,
    sub_location: Option<&str>,
) -> Result<(Location, Option<SubLocation>), Error> {
    let location = require_location(db, location)?;
    let sub = match sub_location {
        None => None,
        Some(key) => {
            let sub = db.find_sub_location(key)?.ok_or_else(|| Error::NotFound {
                entity: "sub-location",
                id: key.to_string(),
            })?;
            if sub.location_id != location.id {
                return Err(Error::Other(format!(
                    "sub-location {} does not belong to location {}",
                    sub.short_id, location.short_id
                )));
            }
            Some(sub)
        }
    };
    Ok((location, sub))
}

fn require_asset(db: &Database, content_hash: &str) -> Result<ArchiveAsset, Error> {
    db.find_asset(content_hash)?.ok_or_else(|| Error::NotFound {
        entity: "asset",
        id: content_hash.to_string(),
    })
}

/// Link two archived assets. Returns false if they were already linked.
pub fn link_assets(db: &Database, a: &str, b: &str) -> Result<bool, Error> {
    let first = require_asset(db, a)?;
    let second = require_asset(db, b)?;
    if first.category() == second.category() && first.content_hash == second.content_hash {
        return Err(Error::Other("an asset cannot be linked to itself".to_string()));
    }
    Ok(db.insert_asset_link(
        (first.category(), &first.content_hash),
        (second.category(), &second.content_hash),
    )?)
}

pub fn unlink_assets(db: &Database, a: &str, b: &str) -> Result<bool, Error> {
    let first = require_asset(db, a)?;
    let second = require_asset(db, b)?;
    Ok(db.delete_asset_link(
        (first.category(), &first.content_hash),
        (second.category(), &second.content_hash),
    )?)
}

pub fn linked_assets(db: &Database, content_hash: &str) -> Result<Vec<(MediaCategory, String)>, Error> {
    let asset = require_asset(db, content_hash)?;
    Ok(db.linked_assets(asset.category(), &asset.content_hash)?)
}
