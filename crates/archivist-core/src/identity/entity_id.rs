use std::fmt;
use tracing::{debug, warn};
use uuid::Uuid;

use super::retry::{retry_bounded, RetryError};
use crate::error::Error;

/// Length of the short id used in filenames and folder names.
pub const SHORT_ID_LEN: usize = 8;

/// Tables whose rows carry an [`EntityId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityTable {
    Locations,
    SubLocations,
    ArchiveUrls,
}

impl EntityTable {
    pub fn table_name(self) -> &'static str {
        match self {
            EntityTable::Locations => "locations",
            EntityTable::SubLocations => "sub_locations",
            EntityTable::ArchiveUrls => "archive_urls",
        }
    }

    pub fn short_id_column(self) -> &'static str {
        "short_id"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub full_id: String,
    pub short_id: String,
}

impl EntityId {
    fn from_uuid(uuid: Uuid) -> Self {
        let simple = uuid.simple().to_string();
        Self {
            full_id: uuid.to_string(),
            short_id: simple[..SHORT_ID_LEN].to_string(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_id)
    }
}

/// Existence check for short ids, implemented by the catalog and stubbed in tests.
pub trait ShortIdLookup {
    fn short_id_exists(&self, table: EntityTable, short_id: &str) -> Result<bool, Error>;
}

/// Allocate a random id whose short form is free in `table`.
pub fn allocate_entity_id(
    lookup: &dyn ShortIdLookup,
    table: EntityTable,
    max_attempts: u32,
) -> Result<EntityId, Error> {
    allocate_with(lookup, table, max_attempts, Uuid::new_v4)
}

pub(crate) fn allocate_with<G>(
    lookup: &dyn ShortIdLookup,
    table: EntityTable,
    max_attempts: u32,
    mut generate: G,
) -> Result<EntityId, Error>
where
    G: FnMut() -> Uuid,
{
    let result = retry_bounded(max_attempts, |attempt| -> Result<Option<EntityId>, Error> {
        let candidate = EntityId::from_uuid(generate());
        if lookup.short_id_exists(table, &candidate.short_id)? {
            debug!(
                "Short id {} already used in {} (attempt {})",
                candidate.short_id,
                table.table_name(),
                attempt
            );
            Ok(None)
        } else {
            Ok(Some(candidate))
        }
    });

    match result {
        Ok(id) => Ok(id),
        Err(RetryError::Failed(e)) => Err(e),
        Err(RetryError::Exhausted { attempts }) => {
            warn!(
                "Gave up allocating a short id for {} after {} attempts",
                table.table_name(),
                attempts
            );
            Err(Error::IdentifierExhausted {
                table: table.table_name(),
                attempts,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;

    /// Reports a collision for the first `collisions` lookups.
    struct CollidingLookup {
        collisions: u32,
        calls: Cell<u32>,
        seen: RefCell<HashSet<String>>,
    }

    impl ShortIdLookup for CollidingLookup {
        fn short_id_exists(&self, _table: EntityTable, short_id: &str) -> Result<bool, Error> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            self.seen.borrow_mut().insert(short_id.to_string());
            Ok(n <= self.collisions)
        }
    }

    fn colliding(collisions: u32) -> CollidingLookup {
        CollidingLookup {
            collisions,
            calls: Cell::new(0),
            seen: RefCell::new(HashSet::new()),
        }
    }

    #[test]
    fn test_short_id_is_prefix_of_uuid() {
        let id = EntityId::from_uuid(Uuid::new_v4());
        assert_eq!(id.short_id.len(), SHORT_ID_LEN);
        assert!(id.full_id.replace('-', "").starts_with(&id.short_id));
    }

    #[test]
    fn test_five_collisions_then_success() {
        let lookup = colliding(5);
        let id = allocate_entity_id(&lookup, EntityTable::Locations, 100).unwrap();
        assert_eq!(lookup.calls.get(), 6);
        assert_eq!(id.short_id.len(), SHORT_ID_LEN);
        // each attempt drew a fresh uuid
        assert_eq!(lookup.seen.borrow().len(), 6);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let lookup = colliding(u32::MAX);
        let err = allocate_entity_id(&lookup, EntityTable::SubLocations, 7).unwrap_err();
        assert!(matches!(
            err,
            Error::IdentifierExhausted {
                table: "sub_locations",
                attempts: 7
            }
        ));
        assert_eq!(lookup.calls.get(), 7);
    }

    #[test]
    fn test_deterministic_generator() {
        let lookup = colliding(0);
        let fixed = Uuid::parse_str("0123abcd-0000-4000-8000-000000000000").unwrap();
        let id = allocate_with(&lookup, EntityTable::ArchiveUrls, 3, || fixed).unwrap();
        assert_eq!(id.short_id, "0123abcd");
        assert_eq!(id.full_id, "0123abcd-0000-4000-8000-000000000000");
    }
}
