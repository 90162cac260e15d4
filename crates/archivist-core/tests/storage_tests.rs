use archivist_core::identity::{allocate_entity_id, EntityTable};
use archivist_core::metadata::{AssetMetadata, DocumentMetadata, ImageMetadata, VideoMetadata};
use archivist_core::storage::models::*;
use archivist_core::storage::Database;
use archivist_core::{MediaCategory, MigrationOrchestrator, SilentReporter};

fn migrated_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    MigrationOrchestrator::new(&db, "unused")
        .upgrade(None, false, &SilentReporter)
        .unwrap();
    db
}

fn make_location(db: &Database, name: &str) -> Location {
    let id = allocate_entity_id(db, EntityTable::Locations, 10).unwrap();
    let location = Location {
        id: id.full_id,
        short_id: id.short_id,
        name: name.to_string(),
        region: None,
        created_at: "2024-05-01T10:00:00+00:00".to_string(),
    };
    db.insert_location(&location).unwrap();
    location
}

fn make_asset(location: &Location, batch: &str, hash: &str, metadata: AssetMetadata) -> ArchiveAsset {
    let ext = match metadata.category() {
        MediaCategory::Image => "jpg",
        MediaCategory::Video => "mp4",
        MediaCategory::Document => "pdf",
    };
    ArchiveAsset {
        content_hash: hash.to_string(),
        location_id: location.id.clone(),
        sub_location_id: None,
        batch_id: Some(batch.to_string()),
        archive_path: format!("locations/x/{}/{}.{}", metadata.category().folder_name(), hash, ext),
        original_filename: format!("IMG_{hash}.{ext}"),
        extension: ext.to_string(),
        size_bytes: 1024,
        metadata,
        imported_at: "2024-05-01T10:05:00+00:00".to_string(),
    }
}

#[test]
fn test_location_lookup_by_either_id() {
    let db = migrated_db();
    let location = make_location(&db, "Granary");

    assert_eq!(db.find_location(&location.id).unwrap(), Some(location.clone()));
    assert_eq!(db.find_location(&location.short_id).unwrap(), Some(location.clone()));
    assert_eq!(db.find_location("nope").unwrap(), None);
    assert_eq!(db.list_locations().unwrap(), vec![location]);
}

#[test]
fn test_short_ids_are_unique_per_table() {
    let db = migrated_db();
    let mut seen = std::collections::HashSet::new();
    for i in 0..50 {
        let location = make_location(&db, &format!("Site {i}"));
        assert_eq!(location.short_id.len(), 8);
        assert!(seen.insert(location.short_id), "short id reused");
    }
}

#[test]
fn test_staging_lifecycle() {
    let db = migrated_db();
    let location = make_location(&db, "Granary");
    db.create_import_batch("b1", &location.id, None, 2).unwrap();

    let record = db
        .insert_staging_record(
            "b1",
            "aaaa",
            "/incoming/a.jpg",
            MediaCategory::Image,
            10,
            StagingStatus::Pending,
            None,
            &["exiftool not found".to_string()],
        )
        .unwrap();
    assert!(db.staged_in_batch("b1", MediaCategory::Image, "aaaa").unwrap());
    assert!(!db.staged_in_batch("b1", MediaCategory::Video, "aaaa").unwrap());

    db.update_staging_status(record.id, StagingStatus::Error, Some("disk full"))
        .unwrap();
    // Failed records no longer claim their hash.
    assert!(!db.staged_in_batch("b1", MediaCategory::Image, "aaaa").unwrap());

    let records = db.staging_records_for_batch("b1").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, StagingStatus::Error);
    assert_eq!(records[0].reason.as_deref(), Some("disk full"));
    assert_eq!(records[0].warnings, vec!["exiftool not found".to_string()]);
}

#[test]
fn test_asset_metadata_round_trips_per_category() {
    let db = migrated_db();
    let location = make_location(&db, "Granary");
    db.create_import_batch("b1", &location.id, None, 3).unwrap();

    let image = make_asset(
        &location,
        "b1",
        "img1",
        AssetMetadata::Image(ImageMetadata {
            width: Some(4000),
            height: Some(3000),
            captured_at: Some("2023-08-14T09:12:00".to_string()),
            camera_make: Some("Canon".to_string()),
            camera_model: Some("EOS R5".to_string()),
            hardware_class: Some("dslr".to_string()),
        }),
    );
    let video = make_asset(
        &location,
        "b1",
        "vid1",
        AssetMetadata::Video(VideoMetadata {
            duration_secs: Some(12.5),
            codec: Some("h264".to_string()),
            frame_rate: Some(29.97),
            width: Some(1920),
            height: Some(1080),
            ..Default::default()
        }),
    );
    let document = make_asset(
        &location,
        "b1",
        "doc1",
        AssetMetadata::Document(DocumentMetadata {
            mime_type: Some("application/pdf".to_string()),
        }),
    );
    for asset in [&image, &video, &document] {
        db.insert_asset(asset).unwrap();
    }

    assert_eq!(db.get_asset(MediaCategory::Image, "img1").unwrap(), Some(image));
    assert_eq!(db.get_asset(MediaCategory::Video, "vid1").unwrap(), Some(video.clone()));
    assert_eq!(db.find_asset("doc1").unwrap(), Some(document));
    assert_eq!(db.get_asset(MediaCategory::Image, "vid1").unwrap(), None);

    assert_eq!(db.count_assets(MediaCategory::Video, Some(&location.id)).unwrap(), 1);
    assert_eq!(
        db.list_assets(MediaCategory::Video, Some(&location.id)).unwrap(),
        vec![video.clone()]
    );
    assert_eq!(db.list_asset_refs(None, Some("b1")).unwrap().len(), 3);
    assert!(db.list_asset_refs(None, Some("b2")).unwrap().is_empty());

    // Same content twice in one category is refused by the primary key.
    assert!(db.insert_asset(&video).is_err());
}

#[test]
fn test_links_are_symmetric_and_follow_deletes() {
    let db = migrated_db();
    let location = make_location(&db, "Granary");
    db.create_import_batch("b1", &location.id, None, 2).unwrap();
    db.insert_asset(&make_asset(&location, "b1", "img1", AssetMetadata::empty(MediaCategory::Image)))
        .unwrap();
    db.insert_asset(&make_asset(&location, "b1", "doc1", AssetMetadata::empty(MediaCategory::Document)))
        .unwrap();

    let img = (MediaCategory::Image, "img1");
    let doc = (MediaCategory::Document, "doc1");
    assert!(db.insert_asset_link(img, doc).unwrap());
    assert!(!db.insert_asset_link(doc, img).unwrap());
    assert_eq!(
        db.linked_assets(MediaCategory::Image, "img1").unwrap(),
        vec![(MediaCategory::Document, "doc1".to_string())]
    );
    assert_eq!(
        db.linked_assets(MediaCategory::Document, "doc1").unwrap(),
        vec![(MediaCategory::Image, "img1".to_string())]
    );

    db.delete_asset(MediaCategory::Image, "img1").unwrap();
    assert!(db.linked_assets(MediaCategory::Document, "doc1").unwrap().is_empty());
}

#[test]
fn test_batches_newest_first() {
    let db = migrated_db();
    let location = make_location(&db, "Granary");
    db.create_import_batch("first", &location.id, None, 1).unwrap();
    db.create_import_batch("second", &location.id, None, 4).unwrap();
    db.complete_import_batch("second", BatchStatus::Completed, 3, 1, 0, 0)
        .unwrap();

    let batches = db.list_import_batches(10).unwrap();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].id, "second");
    assert_eq!(batches[0].status, BatchStatus::Completed);
    assert_eq!(batches[0].imported, 3);
    assert_eq!(batches[1].status, BatchStatus::Running);
    assert_eq!(db.list_import_batches(1).unwrap().len(), 1);
}

#[test]
fn test_tombstone_records_removed_asset() {
    let db = migrated_db();
    let location = make_location(&db, "Granary");
    db.create_import_batch("b1", &location.id, None, 1).unwrap();
    let asset = make_asset(&location, "b1", "img1", AssetMetadata::empty(MediaCategory::Image));
    db.insert_asset(&asset).unwrap();

    let id = db.insert_tombstone(&asset, Some(".trash/a.jpg")).unwrap();
    let tombstones = db.list_tombstones().unwrap();
    assert_eq!(tombstones.len(), 1);
    assert_eq!(tombstones[0].id, id);
    assert_eq!(tombstones[0].category, MediaCategory::Image);
    assert_eq!(tombstones[0].archive_path, asset.archive_path);
}
