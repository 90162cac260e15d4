use super::models::*;
use super::sqlite::Database;
use crate::identity::{EntityTable, ShortIdLookup};
use crate::metadata::{AssetMetadata, DocumentMetadata, ImageMetadata, MediaCategory, VideoMetadata};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Result, Row};
use std::str::FromStr;
use tracing::debug;

const ASSET_COLUMNS: &str = "content_hash, location_id, sub_location_id, batch_id, archive_path, \
                             original_filename, extension, size_bytes, imported_at";

fn detail_columns(category: MediaCategory) -> &'static str {
    match category {
        MediaCategory::Image => "width, height, captured_at, camera_make, camera_model, hardware_class",
        MediaCategory::Video => {
            "duration_secs, codec, frame_rate, width, height, captured_at, camera_make, \
             camera_model, hardware_class"
        }
        MediaCategory::Document => "mime_type",
    }
}

fn parse_column<T: FromStr<Err = String>>(idx: usize, raw: String) -> Result<T> {
    raw.parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn asset_from_row(row: &Row<'_>, category: MediaCategory) -> Result<ArchiveAsset> {
    let metadata = match category {
        MediaCategory::Image => AssetMetadata::Image(ImageMetadata {
            width: row.get(9)?,
            height: row.get(10)?,
            captured_at: row.get(11)?,
            camera_make: row.get(12)?,
            camera_model: row.get(13)?,
            hardware_class: row.get(14)?,
        }),
        MediaCategory::Video => AssetMetadata::Video(VideoMetadata {
            duration_secs: row.get(9)?,
            codec: row.get(10)?,
            frame_rate: row.get(11)?,
            width: row.get(12)?,
            height: row.get(13)?,
            captured_at: row.get(14)?,
            camera_make: row.get(15)?,
            camera_model: row.get(16)?,
            hardware_class: row.get(17)?,
        }),
        MediaCategory::Document => AssetMetadata::Document(DocumentMetadata {
            mime_type: row.get(9)?,
        }),
    };
    Ok(ArchiveAsset {
        content_hash: row.get(0)?,
        location_id: row.get(1)?,
        sub_location_id: row.get(2)?,
        batch_id: row.get(3)?,
        archive_path: row.get(4)?,
        original_filename: row.get(5)?,
        extension: row.get(6)?,
        size_bytes: row.get::<_, i64>(7)? as u64,
        imported_at: row.get(8)?,
        metadata,
    })
}

fn staging_from_row(row: &Row<'_>) -> Result<StagingRecord> {
    let warnings: Option<String> = row.get(9)?;
    Ok(StagingRecord {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        content_hash: row.get(2)?,
        source_path: row.get(3)?,
        category: parse_column(4, row.get(4)?)?,
        size_bytes: row.get::<_, i64>(5)? as u64,
        discovered_at: row.get(6)?,
        status: parse_column(7, row.get(7)?)?,
        reason: row.get(8)?,
        warnings: warnings
            .and_then(|w| serde_json::from_str(&w).ok())
            .unwrap_or_default(),
    })
}

fn batch_from_row(row: &Row<'_>) -> Result<ImportBatch> {
    Ok(ImportBatch {
        id: row.get(0)?,
        location_id: row.get(1)?,
        sub_location_id: row.get(2)?,
        started_at: row.get(3)?,
        completed_at: row.get(4)?,
        status: parse_column(5, row.get(5)?)?,
        total_files: row.get(6)?,
        imported: row.get(7)?,
        duplicates: row.get(8)?,
        skipped: row.get(9)?,
        failed: row.get(10)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> Result<BackupSnapshot> {
    let for_version: Option<String> = row.get(7)?;
    Ok(BackupSnapshot {
        id: row.get(0)?,
        path: row.get(1)?,
        created_at: row.get(2)?,
        source_size: row.get::<_, i64>(3)? as u64,
        snapshot_size: row.get::<_, i64>(4)? as u64,
        verified: row.get(5)?,
        reason: row.get(6)?,
        for_version: for_version
            .map(|v| {
                v.parse()
                    .map_err(|e: crate::Error| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))
            })
            .transpose()?,
    })
}

/// Links are undirected; store each pair in one canonical order.
fn ordered_pair<'a>(
    a: (MediaCategory, &'a str),
    b: (MediaCategory, &'a str),
) -> ((MediaCategory, &'a str), (MediaCategory, &'a str)) {
    if (a.0.as_str(), a.1) <= (b.0.as_str(), b.1) {
        (a, b)
    } else {
        (b, a)
    }
}

impl ShortIdLookup for Database {
    fn short_id_exists(&self, table: EntityTable, short_id: &str) -> std::result::Result<bool, crate::Error> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
            table.table_name(),
            table.short_id_column()
        );
        Ok(self.connection().query_row(&sql, params![short_id], |row| row.get(0))?)
    }
}

impl Database {
    // ── Locations ────────────────────────────────────────────────

    pub fn insert_location(&self, location: &Location) -> Result<()> {
        self.connection().execute(
            "INSERT INTO locations (id, short_id, name, region, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                location.id,
                location.short_id,
                location.name,
                location.region,
                location.created_at
            ],
        )?;
        Ok(())
    }

    /// Look a location up by full id or short id.
    pub fn find_location(&self, key: &str) -> Result<Option<Location>> {
        self.connection()
            .query_row(
                "SELECT id, short_id, name, region, created_at FROM locations \
                 WHERE id = ?1 OR short_id = ?1",
                params![key],
                |row| {
                    Ok(Location {
                        id: row.get(0)?,
                        short_id: row.get(1)?,
                        name: row.get(2)?,
                        region: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    pub fn list_locations(&self) -> Result<Vec<Location>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, short_id, name, region, created_at FROM locations ORDER BY name, id",
        )?;
        let locations = stmt
            .query_map([], |row| {
                Ok(Location {
                    id: row.get(0)?,
                    short_id: row.get(1)?,
                    name: row.get(2)?,
                    region: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(locations)
    }

    pub fn insert_sub_location(&self, sub: &SubLocation) -> Result<()> {
        self.connection().execute(
            "INSERT INTO sub_locations (id, short_id, location_id, name, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![sub.id, sub.short_id, sub.location_id, sub.name, sub.created_at],
        )?;
        Ok(())
    }

    pub fn find_sub_location(&self, key: &str) -> Result<Option<SubLocation>> {
        self.connection()
            .query_row(
                "SELECT id, short_id, location_id, name, created_at FROM sub_locations \
                 WHERE id = ?1 OR short_id = ?1",
                params![key],
                |row| {
                    Ok(SubLocation {
                        id: row.get(0)?,
                        short_id: row.get(1)?,
                        location_id: row.get(2)?,
                        name: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
    }

    pub fn list_sub_locations(&self, location_id: &str) -> Result<Vec<SubLocation>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, short_id, location_id, name, created_at FROM sub_locations \
             WHERE location_id = ?1 ORDER BY name, id",
        )?;
        let subs = stmt
            .query_map(params![location_id], |row| {
                Ok(SubLocation {
                    id: row.get(0)?,
                    short_id: row.get(1)?,
                    location_id: row.get(2)?,
                    name: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(subs)
    }

    pub fn insert_archive_url(&self, url: &ArchiveUrl) -> Result<()> {
        self.connection().execute(
            "INSERT INTO archive_urls (id, short_id, location_id, url, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![url.id, url.short_id, url.location_id, url.url, url.created_at],
        )?;
        Ok(())
    }

    pub fn list_archive_urls(&self, location_id: &str) -> Result<Vec<ArchiveUrl>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, short_id, location_id, url, created_at FROM archive_urls \
             WHERE location_id = ?1 ORDER BY created_at, id",
        )?;
        let urls = stmt
            .query_map(params![location_id], |row| {
                Ok(ArchiveUrl {
                    id: row.get(0)?,
                    short_id: row.get(1)?,
                    location_id: row.get(2)?,
                    url: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(urls)
    }

    /// Fails with a foreign key violation while the location still has assets.
    pub fn delete_location(&self, location_id: &str) -> Result<usize> {
        self.connection()
            .execute("DELETE FROM locations WHERE id = ?1", params![location_id])
    }

    // ── Import Batches ───────────────────────────────────────────

    pub fn create_import_batch(
        &self,
        batch_id: &str,
        location_id: &str,
        sub_location_id: Option<&str>,
        total_files: usize,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO import_batches \
             (id, location_id, sub_location_id, started_at, status, total_files) \
             VALUES (?1, ?2, ?3, ?4, 'running', ?5)",
            params![batch_id, location_id, sub_location_id, now, total_files as i64],
        )?;
        debug!("Created import batch {}", batch_id);
        Ok(())
    }

    pub fn complete_import_batch(
        &self,
        batch_id: &str,
        status: BatchStatus,
        imported: usize,
        duplicates: usize,
        skipped: usize,
        failed: usize,
    ) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "UPDATE import_batches SET completed_at = ?1, status = ?2, imported = ?3, \
             duplicates = ?4, skipped = ?5, failed = ?6 WHERE id = ?7",
            params![
                now,
                status.as_str(),
                imported as i64,
                duplicates as i64,
                skipped as i64,
                failed as i64,
                batch_id
            ],
        )?;
        Ok(())
    }

    pub fn get_import_batch(&self, batch_id: &str) -> Result<Option<ImportBatch>> {
        self.connection()
            .query_row(
                "SELECT id, location_id, sub_location_id, started_at, completed_at, status, \
                        total_files, imported, duplicates, skipped, failed \
                 FROM import_batches WHERE id = ?1",
                params![batch_id],
                batch_from_row,
            )
            .optional()
    }

    /// Newest first.
    pub fn list_import_batches(&self, limit: i64) -> Result<Vec<ImportBatch>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, location_id, sub_location_id, started_at, completed_at, status, \
                    total_files, imported, duplicates, skipped, failed \
             FROM import_batches ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;
        let batches = stmt
            .query_map(params![limit], batch_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(batches)
    }

    // ── Staging Records ──────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn insert_staging_record(
        &self,
        batch_id: &str,
        content_hash: &str,
        source_path: &str,
        category: MediaCategory,
        size_bytes: u64,
        status: StagingStatus,
        reason: Option<&str>,
        warnings: &[String],
    ) -> Result<StagingRecord> {
        let now = chrono::Utc::now().to_rfc3339();
        let warnings_json = serde_json::to_string(warnings).unwrap_or_default();
        self.connection().execute(
            "INSERT INTO staging_records \
             (batch_id, content_hash, source_path, category, size_bytes, discovered_at, \
              status, reason, warnings) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                batch_id,
                content_hash,
                source_path,
                category.as_str(),
                size_bytes as i64,
                now,
                status.as_str(),
                reason,
                warnings_json
            ],
        )?;
        Ok(StagingRecord {
            id: self.connection().last_insert_rowid(),
            batch_id: batch_id.to_string(),
            content_hash: content_hash.to_string(),
            source_path: source_path.to_string(),
            category,
            size_bytes,
            discovered_at: now,
            status,
            reason: reason.map(str::to_string),
            warnings: warnings.to_vec(),
        })
    }

    pub fn update_staging_status(
        &self,
        record_id: i64,
        status: StagingStatus,
        reason: Option<&str>,
    ) -> Result<()> {
        self.connection().execute(
            "UPDATE staging_records SET status = ?1, reason = ?2 WHERE id = ?3",
            params![status.as_str(), reason, record_id],
        )?;
        Ok(())
    }

    /// Whether a live (pending or staged) record with this hash exists in the batch.
    pub fn staged_in_batch(
        &self,
        batch_id: &str,
        category: MediaCategory,
        content_hash: &str,
    ) -> Result<bool> {
        self.connection().query_row(
            "SELECT EXISTS(SELECT 1 FROM staging_records \
             WHERE batch_id = ?1 AND category = ?2 AND content_hash = ?3 \
               AND status IN ('pending', 'staged'))",
            params![batch_id, category.as_str(), content_hash],
            |row| row.get(0),
        )
    }

    /// Submission order.
    pub fn staging_records_for_batch(&self, batch_id: &str) -> Result<Vec<StagingRecord>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, batch_id, content_hash, source_path, category, size_bytes, \
                    discovered_at, status, reason, warnings \
             FROM staging_records WHERE batch_id = ?1 ORDER BY id",
        )?;
        let records = stmt
            .query_map(params![batch_id], staging_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(records)
    }

    // ── Archive Assets ───────────────────────────────────────────

    pub fn insert_asset(&self, asset: &ArchiveAsset) -> Result<()> {
        let size = asset.size_bytes as i64;
        match &asset.metadata {
            AssetMetadata::Image(m) => self.connection().execute(
                "INSERT INTO images \
                 (content_hash, location_id, sub_location_id, batch_id, archive_path, \
                  original_filename, extension, size_bytes, imported_at, \
                  width, height, captured_at, camera_make, camera_model, hardware_class) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    asset.content_hash,
                    asset.location_id,
                    asset.sub_location_id,
                    asset.batch_id,
                    asset.archive_path,
                    asset.original_filename,
                    asset.extension,
                    size,
                    asset.imported_at,
                    m.width,
                    m.height,
                    m.captured_at,
                    m.camera_make,
                    m.camera_model,
                    m.hardware_class
                ],
            )?,
            AssetMetadata::Video(m) => self.connection().execute(
                "INSERT INTO videos \
                 (content_hash, location_id, sub_location_id, batch_id, archive_path, \
                  original_filename, extension, size_bytes, imported_at, \
                  duration_secs, codec, frame_rate, width, height, captured_at, \
                  camera_make, camera_model, hardware_class) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                         ?16, ?17, ?18)",
                params![
                    asset.content_hash,
                    asset.location_id,
                    asset.sub_location_id,
                    asset.batch_id,
                    asset.archive_path,
                    asset.original_filename,
                    asset.extension,
                    size,
                    asset.imported_at,
                    m.duration_secs,
                    m.codec,
                    m.frame_rate,
                    m.width,
                    m.height,
                    m.captured_at,
                    m.camera_make,
                    m.camera_model,
                    m.hardware_class
                ],
            )?,
            AssetMetadata::Document(m) => self.connection().execute(
                "INSERT INTO documents \
                 (content_hash, location_id, sub_location_id, batch_id, archive_path, \
                  original_filename, extension, size_bytes, imported_at, mime_type) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    asset.content_hash,
                    asset.location_id,
                    asset.sub_location_id,
                    asset.batch_id,
                    asset.archive_path,
                    asset.original_filename,
                    asset.extension,
                    size,
                    asset.imported_at,
                    m.mime_type
                ],
            )?,
        };
        Ok(())
    }

    pub fn get_asset(&self, category: MediaCategory, content_hash: &str) -> Result<Option<ArchiveAsset>> {
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE content_hash = ?1",
            ASSET_COLUMNS,
            detail_columns(category),
            category.table_name()
        );
        self.connection()
            .query_row(&sql, params![content_hash], |row| asset_from_row(row, category))
            .optional()
    }

    pub fn asset_exists(&self, category: MediaCategory, content_hash: &str) -> Result<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE content_hash = ?1)",
            category.table_name()
        );
        self.connection()
            .query_row(&sql, params![content_hash], |row| row.get(0))
    }

    /// First asset with this hash in any category table.
    pub fn find_asset(&self, content_hash: &str) -> Result<Option<ArchiveAsset>> {
        for category in MediaCategory::ALL {
            if let Some(asset) = self.get_asset(category, content_hash)? {
                return Ok(Some(asset));
            }
        }
        Ok(None)
    }

    pub fn list_assets(&self, category: MediaCategory, location_id: Option<&str>) -> Result<Vec<ArchiveAsset>> {
        let sql = format!(
            "SELECT {}, {} FROM {} WHERE (?1 IS NULL OR location_id = ?1) ORDER BY archive_path",
            ASSET_COLUMNS,
            detail_columns(category),
            category.table_name()
        );
        let mut stmt = self.connection().prepare(&sql)?;
        let assets = stmt
            .query_map(params![location_id], |row| asset_from_row(row, category))?
            .collect::<Result<Vec<_>>>()?;
        Ok(assets)
    }

    /// Committed assets across all categories, optionally narrowed to a location or batch.
    pub fn list_asset_refs(
        &self,
        location_id: Option<&str>,
        batch_id: Option<&str>,
    ) -> Result<Vec<AssetRef>> {
        let mut refs = Vec::new();
        for category in MediaCategory::ALL {
            let sql = format!(
                "SELECT content_hash, archive_path FROM {} \
                 WHERE (?1 IS NULL OR location_id = ?1) AND (?2 IS NULL OR batch_id = ?2) \
                 ORDER BY archive_path",
                category.table_name()
            );
            let mut stmt = self.connection().prepare(&sql)?;
            let rows = stmt
                .query_map(params![location_id, batch_id], |row| {
                    Ok(AssetRef {
                        category,
                        content_hash: row.get(0)?,
                        archive_path: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>>>()?;
            refs.extend(rows);
        }
        Ok(refs)
    }

    pub fn count_assets(&self, category: MediaCategory, location_id: Option<&str>) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE (?1 IS NULL OR location_id = ?1)",
            category.table_name()
        );
        self.connection()
            .query_row(&sql, params![location_id], |row| row.get(0))
    }

    pub fn delete_asset(&self, category: MediaCategory, content_hash: &str) -> Result<usize> {
        let sql = format!("DELETE FROM {} WHERE content_hash = ?1", category.table_name());
        self.connection().execute(&sql, params![content_hash])
    }

    // ── Asset Links ──────────────────────────────────────────────

    /// Returns false when the link already existed.
    pub fn insert_asset_link(
        &self,
        a: (MediaCategory, &str),
        b: (MediaCategory, &str),
    ) -> Result<bool> {
        let ((cat_a, hash_a), (cat_b, hash_b)) = ordered_pair(a, b);
        let now = chrono::Utc::now().to_rfc3339();
        let changed = self.connection().execute(
            "INSERT OR IGNORE INTO asset_links \
             (category_a, hash_a, category_b, hash_b, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![cat_a.as_str(), hash_a, cat_b.as_str(), hash_b, now],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_asset_link(
        &self,
        a: (MediaCategory, &str),
        b: (MediaCategory, &str),
    ) -> Result<bool> {
        let ((cat_a, hash_a), (cat_b, hash_b)) = ordered_pair(a, b);
        let changed = self.connection().execute(
            "DELETE FROM asset_links \
             WHERE category_a = ?1 AND hash_a = ?2 AND category_b = ?3 AND hash_b = ?4",
            params![cat_a.as_str(), hash_a, cat_b.as_str(), hash_b],
        )?;
        Ok(changed > 0)
    }

    pub fn linked_assets(
        &self,
        category: MediaCategory,
        content_hash: &str,
    ) -> Result<Vec<(MediaCategory, String)>> {
        let mut stmt = self.connection().prepare(
            "SELECT category_b, hash_b FROM asset_links WHERE category_a = ?1 AND hash_a = ?2 \
             UNION \
             SELECT category_a, hash_a FROM asset_links WHERE category_b = ?1 AND hash_b = ?2 \
             ORDER BY 1, 2",
        )?;
        let links = stmt
            .query_map(params![category.as_str(), content_hash], |row| {
                let linked: MediaCategory = parse_column(0, row.get(0)?)?;
                Ok((linked, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(links)
    }

    // ── Tombstones ───────────────────────────────────────────────

    pub fn insert_tombstone(
        &self,
        asset: &ArchiveAsset,
        trash_path: Option<&str>,
    ) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO asset_tombstones \
             (category, content_hash, archive_path, location_id, trash_path, removed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                asset.category().as_str(),
                asset.content_hash,
                asset.archive_path,
                asset.location_id,
                trash_path,
                now
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn list_tombstones(&self) -> Result<Vec<AssetTombstone>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, category, content_hash, archive_path, location_id, trash_path, removed_at \
             FROM asset_tombstones ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AssetTombstone {
                    id: row.get(0)?,
                    category: parse_column(1, row.get(1)?)?,
                    content_hash: row.get(2)?,
                    archive_path: row.get(3)?,
                    location_id: row.get(4)?,
                    trash_path: row.get(5)?,
                    removed_at: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Migration Ledger ─────────────────────────────────────────

    /// Application order.
    pub fn ledger_entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self.connection().prepare(
            "SELECT version, description, applied_at, checksum FROM schema_migrations ORDER BY rowid",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(LedgerEntry {
                    version: row.get(0)?,
                    description: row.get(1)?,
                    applied_at: row.get(2)?,
                    checksum: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn insert_ledger_entry(&self, version: &str, description: &str, checksum: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO schema_migrations (version, description, applied_at, checksum) \
             VALUES (?1, ?2, ?3, ?4)",
            params![version, description, now, checksum],
        )?;
        Ok(())
    }

    // ── Backup Snapshots ─────────────────────────────────────────

    pub fn insert_snapshot(
        &self,
        path: &str,
        created_at: &str,
        source_size: u64,
        snapshot_size: u64,
        reason: &str,
        for_version: Option<&str>,
    ) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO backup_snapshots \
             (path, created_at, source_size, snapshot_size, verified, reason, for_version) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
            params![
                path,
                created_at,
                source_size as i64,
                snapshot_size as i64,
                reason,
                for_version
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Oldest first.
    pub fn list_snapshots(&self) -> Result<Vec<BackupSnapshot>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, path, created_at, source_size, snapshot_size, verified, reason, for_version \
             FROM backup_snapshots ORDER BY id",
        )?;
        let snapshots = stmt
            .query_map([], snapshot_from_row)?
            .collect::<Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    pub fn delete_snapshot_row(&self, snapshot_id: i64) -> Result<()> {
        self.connection().execute(
            "DELETE FROM backup_snapshots WHERE id = ?1",
            params![snapshot_id],
        )?;
        Ok(())
    }
}
