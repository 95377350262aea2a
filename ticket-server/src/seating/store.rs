//! Durable seat availability store (redb)
//!
//! 数据表结构：
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `chair_availability` | `(showtime_id, chair_id)` | `ChairAvailability` JSON |
//! | `seat_holds` | hold token | `SeatHold` JSON |
//!
//! Every record carries an explicit `version` that increases on each state
//! transition; every multi-chair operation runs inside ONE write
//! transaction and either moves all requested chairs or none of them.
//! Holds are TTL leases: an expired lease reads as `FREE` without being
//! rewritten (lazy expiry), and the sweeper reclaims it in the background.

use dashmap::DashMap;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::seating::{ChairStateView, SeatState};
use shared::util::now_millis;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// (showtime_id, chair_id) -> ChairAvailability
const AVAILABILITY_TABLE: TableDefinition<(&str, &str), &[u8]> =
    TableDefinition::new("chair_availability");

/// hold token -> SeatHold
const HOLDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("seat_holds");

/// Confirmed hold records are kept this long past expiry so a crashed
/// settlement can still re-confirm idempotently, then pruned by the sweeper.
const CONFIRMED_HOLD_RETENTION_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum SeatStoreError {
    /// At least one requested chair is taken; nothing was written.
    #[error("chairs not available: {}", chairs.join(", "))]
    SeatConflict { chairs: Vec<String> },

    #[error("hold not found")]
    HoldNotFound,

    /// The lease lapsed (or the chairs were re-assigned after it lapsed).
    #[error("hold expired")]
    HoldExpired,

    #[error("hold must cover at least one chair")]
    EmptyHold,

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Records
// ============================================================================

/// Per-(showtime, chair) availability record. Absent record == `FREE, v0`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChairAvailability {
    pub state: SeatState,
    /// Bumped on every state transition of this record
    pub version: u64,
    /// Hold token while `HELD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub held_by: Option<String>,
    /// Lease deadline (ms) while `HELD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_expires_at: Option<i64>,
    /// Order id once `SOLD`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sold_to: Option<String>,
    pub updated_at: i64,
}

impl ChairAvailability {
    fn free_v0(now: i64) -> Self {
        Self {
            state: SeatState::Free,
            version: 0,
            held_by: None,
            hold_expires_at: None,
            sold_to: None,
            updated_at: now,
        }
    }

    /// State after lazy lease expiry: an expired `HELD` reads as `FREE`.
    pub fn effective_state(&self, now: i64) -> SeatState {
        match self.state {
            SeatState::Held if self.lease_lapsed(now) => SeatState::Free,
            other => other,
        }
    }

    fn lease_lapsed(&self, now: i64) -> bool {
        self.hold_expires_at.map(|e| now > e).unwrap_or(true)
    }

    fn is_takeable(&self, now: i64) -> bool {
        self.effective_state(now) == SeatState::Free
    }
}

/// One atomic reservation over a set of chairs of a single showtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatHold {
    pub token: String,
    pub showtime_id: String,
    /// Sorted, deduplicated
    pub chair_ids: Vec<String>,
    /// Opaque; rebound to the order id once an order is assembled
    pub holder_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    /// Set once the chairs went `SOLD`; makes re-confirm idempotent
    #[serde(default)]
    pub confirmed: bool,
}

impl SeatHold {
    pub fn is_expired(&self, now: i64) -> bool {
        now > self.expires_at
    }
}

/// What one sweeper pass reclaimed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepOutcome {
    pub released_holds: usize,
    pub freed_chairs: usize,
    pub pruned_confirmed: usize,
}

// ============================================================================
// Per-showtime change counters
// ============================================================================

/// Process-local per-showtime change counter, bumped on every committed
/// seat mutation. Served with the chair map so clients can cheap-poll for
/// "did anything change" without diffing the whole map.
#[derive(Debug, Default)]
pub struct AvailabilityVersions {
    counters: DashMap<String, u64>,
}

impl AvailabilityVersions {
    pub fn bump(&self, showtime_id: &str) -> u64 {
        let mut entry = self.counters.entry(showtime_id.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn current(&self, showtime_id: &str) -> u64 {
        self.counters.get(showtime_id).map(|v| *v).unwrap_or(0)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Seat availability store. Cheap to clone; all clones share one database.
#[derive(Clone)]
pub struct SeatStore {
    db: Arc<Database>,
    versions: Arc<AvailabilityVersions>,
}

impl SeatStore {
    /// Open (or create) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SeatStoreError> {
        let db = Database::create(path)?;
        let store = Self {
            db: Arc::new(db),
            versions: Arc::new(AvailabilityVersions::default()),
        };
        store.ensure_tables()?;
        info!("seat store opened");
        Ok(store)
    }

    /// In-memory store for unit tests.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, SeatStoreError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())?;
        let store = Self {
            db: Arc::new(db),
            versions: Arc::new(AvailabilityVersions::default()),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> Result<(), SeatStoreError> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.open_table(AVAILABILITY_TABLE)?;
            write_txn.open_table(HOLDS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Per-showtime change counters (for the availability endpoint).
    pub fn versions(&self) -> Arc<AvailabilityVersions> {
        self.versions.clone()
    }

    // ========== Hold ==========

    /// Atomically hold every requested chair for `ttl`, or none of them.
    ///
    /// A chair counts as taken when `SOLD`, or `HELD` under an unexpired
    /// lease. On any taken chair the whole call fails with `SeatConflict`
    /// naming the contested chairs and the transaction is dropped
    /// unwritten.
    pub fn hold(
        &self,
        showtime_id: &str,
        chair_ids: &[String],
        holder_id: &str,
        ttl: Duration,
    ) -> Result<SeatHold, SeatStoreError> {
        let unique: BTreeSet<&str> = chair_ids.iter().map(|c| c.as_str()).collect();
        if unique.is_empty() {
            return Err(SeatStoreError::EmptyHold);
        }

        let now = now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        let hold = SeatHold {
            token: uuid::Uuid::new_v4().to_string(),
            showtime_id: showtime_id.to_string(),
            chair_ids: unique.iter().map(|c| c.to_string()).collect(),
            holder_id: holder_id.to_string(),
            created_at: now,
            expires_at,
            confirmed: false,
        };

        let write_txn = self.db.begin_write()?;
        {
            let mut availability = write_txn.open_table(AVAILABILITY_TABLE)?;

            // First pass: read every chair; collect conflicts before
            // writing anything.
            let mut current: Vec<(String, ChairAvailability)> = Vec::with_capacity(unique.len());
            let mut conflicts: Vec<String> = Vec::new();
            for chair_id in &unique {
                let record = match availability.get((showtime_id, *chair_id))? {
                    Some(guard) => serde_json::from_slice(guard.value())?,
                    None => ChairAvailability::free_v0(now),
                };
                if !record.is_takeable(now) {
                    conflicts.push((*chair_id).to_string());
                }
                current.push(((*chair_id).to_string(), record));
            }
            if !conflicts.is_empty() {
                // Dropping the transaction aborts it; nothing was written.
                return Err(SeatStoreError::SeatConflict { chairs: conflicts });
            }

            // Second pass: transition every chair together.
            for (chair_id, record) in current {
                let next = ChairAvailability {
                    state: SeatState::Held,
                    version: record.version + 1,
                    held_by: Some(hold.token.clone()),
                    hold_expires_at: Some(expires_at),
                    sold_to: None,
                    updated_at: now,
                };
                let bytes = serde_json::to_vec(&next)?;
                availability.insert((showtime_id, chair_id.as_str()), bytes.as_slice())?;
            }

            let mut holds = write_txn.open_table(HOLDS_TABLE)?;
            let bytes = serde_json::to_vec(&hold)?;
            holds.insert(hold.token.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        self.versions.bump(showtime_id);

        debug!(
            showtime_id = showtime_id,
            chairs = hold.chair_ids.len(),
            token = %hold.token,
            "chairs held"
        );
        Ok(hold)
    }

    // ========== Confirm ==========

    /// Transition every held chair `HELD -> SOLD`.
    ///
    /// Idempotent for already-confirmed holds (a settlement retry after a
    /// crash must converge instead of failing). Fails `HoldExpired` when
    /// the lease lapsed or any chair is no longer held by this token.
    pub fn confirm(&self, token: &str) -> Result<(), SeatStoreError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let showtime_id;
        {
            let mut holds = write_txn.open_table(HOLDS_TABLE)?;
            let mut hold: SeatHold = match holds.get(token)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(SeatStoreError::HoldNotFound),
            };
            if hold.confirmed {
                return Ok(());
            }
            if hold.is_expired(now) {
                return Err(SeatStoreError::HoldExpired);
            }

            let mut availability = write_txn.open_table(AVAILABILITY_TABLE)?;
            let mut current: Vec<(String, ChairAvailability)> =
                Vec::with_capacity(hold.chair_ids.len());
            for chair_id in &hold.chair_ids {
                let record: ChairAvailability =
                    match availability.get((hold.showtime_id.as_str(), chair_id.as_str()))? {
                        Some(guard) => serde_json::from_slice(guard.value())?,
                        None => return Err(SeatStoreError::HoldExpired),
                    };
                let still_ours = record.state == SeatState::Held
                    && record.held_by.as_deref() == Some(token);
                if !still_ours {
                    return Err(SeatStoreError::HoldExpired);
                }
                current.push((chair_id.clone(), record));
            }

            for (chair_id, record) in current {
                let next = ChairAvailability {
                    state: SeatState::Sold,
                    version: record.version + 1,
                    held_by: None,
                    hold_expires_at: None,
                    sold_to: Some(hold.holder_id.clone()),
                    updated_at: now,
                };
                let bytes = serde_json::to_vec(&next)?;
                availability.insert((hold.showtime_id.as_str(), chair_id.as_str()), bytes.as_slice())?;
            }

            hold.confirmed = true;
            showtime_id = hold.showtime_id.clone();
            let bytes = serde_json::to_vec(&hold)?;
            holds.insert(token, bytes.as_slice())?;
        }
        write_txn.commit()?;
        self.versions.bump(&showtime_id);
        debug!(token = token, "hold confirmed, chairs sold");
        Ok(())
    }

    // ========== Release ==========

    /// Return every chair still held by this token to `FREE`.
    ///
    /// Idempotent: a missing or already-confirmed hold is a no-op, and a
    /// double release never errors.
    pub fn release(&self, token: &str) -> Result<(), SeatStoreError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        let showtime_id;
        {
            let mut holds = write_txn.open_table(HOLDS_TABLE)?;
            let hold: SeatHold = match holds.get(token)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Ok(()),
            };
            if hold.confirmed {
                // Chairs already went SOLD; nothing to undo.
                return Ok(());
            }

            let mut availability = write_txn.open_table(AVAILABILITY_TABLE)?;
            let mut to_free: Vec<(String, ChairAvailability)> = Vec::new();
            for chair_id in &hold.chair_ids {
                let record: ChairAvailability =
                    match availability.get((hold.showtime_id.as_str(), chair_id.as_str()))? {
                        Some(guard) => serde_json::from_slice(guard.value())?,
                        None => continue,
                    };
                // Only touch chairs this token still owns; an expired and
                // re-held chair belongs to someone else now.
                if record.state == SeatState::Held && record.held_by.as_deref() == Some(token) {
                    to_free.push((chair_id.clone(), record));
                }
            }
            for (chair_id, record) in to_free {
                let next = ChairAvailability {
                    state: SeatState::Free,
                    version: record.version + 1,
                    held_by: None,
                    hold_expires_at: None,
                    sold_to: None,
                    updated_at: now,
                };
                let bytes = serde_json::to_vec(&next)?;
                availability.insert((hold.showtime_id.as_str(), chair_id.as_str()), bytes.as_slice())?;
            }

            showtime_id = hold.showtime_id.clone();
            holds.remove(token)?;
        }
        write_txn.commit()?;
        self.versions.bump(&showtime_id);
        debug!(token = token, "hold released");
        Ok(())
    }

    // ========== Rebind ==========

    /// Point the hold's opaque holder at the order that now owns it, so a
    /// later confirm stamps `sold_to` with the order id.
    pub fn rebind_holder(&self, token: &str, holder_id: &str) -> Result<(), SeatStoreError> {
        let now = now_millis();
        let write_txn = self.db.begin_write()?;
        {
            let mut holds = write_txn.open_table(HOLDS_TABLE)?;
            let mut hold: SeatHold = match holds.get(token)? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(SeatStoreError::HoldNotFound),
            };
            if hold.confirmed || hold.is_expired(now) {
                return Err(SeatStoreError::HoldExpired);
            }
            hold.holder_id = holder_id.to_string();
            let bytes = serde_json::to_vec(&hold)?;
            holds.insert(token, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // ========== Reads ==========

    pub fn get_hold(&self, token: &str) -> Result<Option<SeatHold>, SeatStoreError> {
        let read_txn = self.db.begin_read()?;
        let holds = read_txn.open_table(HOLDS_TABLE)?;
        match holds.get(token)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Effective state of the given chairs (lazy lease expiry applied,
    /// nothing rewritten).
    pub fn availability(
        &self,
        showtime_id: &str,
        chair_ids: &[String],
    ) -> Result<Vec<ChairStateView>, SeatStoreError> {
        let now = now_millis();
        let read_txn = self.db.begin_read()?;
        let availability = read_txn.open_table(AVAILABILITY_TABLE)?;
        let mut views = Vec::with_capacity(chair_ids.len());
        for chair_id in chair_ids {
            let record = match availability.get((showtime_id, chair_id.as_str()))? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => ChairAvailability::free_v0(now),
            };
            views.push(ChairStateView {
                chair_id: chair_id.clone(),
                state: record.effective_state(now),
                version: record.version,
            });
        }
        Ok(views)
    }

    /// Raw record, mostly for diagnostics and tests.
    pub fn get_record(
        &self,
        showtime_id: &str,
        chair_id: &str,
    ) -> Result<Option<ChairAvailability>, SeatStoreError> {
        let read_txn = self.db.begin_read()?;
        let availability = read_txn.open_table(AVAILABILITY_TABLE)?;
        match availability.get((showtime_id, chair_id))? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Number of hold records currently on disk (live, expired and
    /// confirmed-but-unpruned alike). Health endpoint fodder.
    pub fn hold_count(&self) -> Result<u64, SeatStoreError> {
        use redb::ReadableTableMetadata;

        let read_txn = self.db.begin_read()?;
        let holds = read_txn.open_table(HOLDS_TABLE)?;
        Ok(holds.len()?)
    }

    // ========== Sweep ==========

    /// Reclaim expired unconfirmed holds and prune confirmed hold records
    /// past their retention grace. Correctness never depends on this
    /// running (lazy expiry already hides lapsed leases); it just keeps
    /// the tables tidy.
    pub fn sweep_expired(&self, now: i64) -> Result<SweepOutcome, SeatStoreError> {
        let write_txn = self.db.begin_write()?;
        let mut outcome = SweepOutcome::default();
        let mut touched_showtimes: BTreeSet<String> = BTreeSet::new();
        {
            let mut holds = write_txn.open_table(HOLDS_TABLE)?;

            // Collect first, mutate after, to keep the iterator borrow away
            // from the writes.
            let mut expired: Vec<SeatHold> = Vec::new();
            let mut prunable: Vec<String> = Vec::new();
            for entry in holds.iter()? {
                let (_, value) = entry?;
                let hold: SeatHold = serde_json::from_slice(value.value())?;
                if hold.confirmed {
                    if now > hold.expires_at + CONFIRMED_HOLD_RETENTION_MS {
                        prunable.push(hold.token.clone());
                    }
                } else if hold.is_expired(now) {
                    expired.push(hold);
                }
            }

            let mut availability = write_txn.open_table(AVAILABILITY_TABLE)?;
            for hold in &expired {
                for chair_id in &hold.chair_ids {
                    let record: ChairAvailability =
                        match availability.get((hold.showtime_id.as_str(), chair_id.as_str()))? {
                            Some(guard) => serde_json::from_slice(guard.value())?,
                            None => continue,
                        };
                    if record.state == SeatState::Held
                        && record.held_by.as_deref() == Some(hold.token.as_str())
                    {
                        let next = ChairAvailability {
                            state: SeatState::Free,
                            version: record.version + 1,
                            held_by: None,
                            hold_expires_at: None,
                            sold_to: None,
                            updated_at: now,
                        };
                        let bytes = serde_json::to_vec(&next)?;
                        availability
                            .insert((hold.showtime_id.as_str(), chair_id.as_str()), bytes.as_slice())?;
                        outcome.freed_chairs += 1;
                    }
                }
                holds.remove(hold.token.as_str())?;
                touched_showtimes.insert(hold.showtime_id.clone());
                outcome.released_holds += 1;
            }
            for token in &prunable {
                holds.remove(token.as_str())?;
                outcome.pruned_confirmed += 1;
            }
        }
        write_txn.commit()?;
        for showtime_id in touched_showtimes {
            self.versions.bump(&showtime_id);
        }
        if outcome != SweepOutcome::default() {
            debug!(
                released = outcome.released_holds,
                freed = outcome.freed_chairs,
                pruned = outcome.pruned_confirmed,
                "sweep reclaimed expired holds"
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOWTIME: &str = "showtime:1";

    fn test_store() -> SeatStore {
        SeatStore::open_in_memory().unwrap()
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn ttl() -> Duration {
        Duration::from_secs(600)
    }

    #[test]
    fn hold_marks_all_chairs_held() {
        let store = test_store();
        let hold = store
            .hold(SHOWTIME, &ids(&["A1", "A2"]), "selection-1", ttl())
            .unwrap();
        assert_eq!(hold.chair_ids, ids(&["A1", "A2"]));
        assert!(!hold.confirmed);

        let views = store.availability(SHOWTIME, &ids(&["A1", "A2", "A3"])).unwrap();
        assert_eq!(views[0].state, SeatState::Held);
        assert_eq!(views[0].version, 1);
        assert_eq!(views[1].state, SeatState::Held);
        assert_eq!(views[2].state, SeatState::Free);
        assert_eq!(views[2].version, 0);
    }

    #[test]
    fn overlapping_hold_is_all_or_nothing() {
        let store = test_store();
        store.hold(SHOWTIME, &ids(&["A1", "A2"]), "first", ttl()).unwrap();

        let err = store
            .hold(SHOWTIME, &ids(&["A2", "A3"]), "second", ttl())
            .unwrap_err();
        match err {
            SeatStoreError::SeatConflict { chairs } => assert_eq!(chairs, ids(&["A2"])),
            other => panic!("expected SeatConflict, got {other:?}"),
        }

        // The loser wrote nothing: A3 untouched at version 0.
        let views = store.availability(SHOWTIME, &ids(&["A3"])).unwrap();
        assert_eq!(views[0].state, SeatState::Free);
        assert_eq!(views[0].version, 0);
    }

    #[test]
    fn hold_of_zero_chairs_is_rejected() {
        let store = test_store();
        assert!(matches!(
            store.hold(SHOWTIME, &[], "nobody", ttl()),
            Err(SeatStoreError::EmptyHold)
        ));
    }

    #[test]
    fn duplicate_chair_ids_collapse() {
        let store = test_store();
        let hold = store
            .hold(SHOWTIME, &ids(&["B1", "B1", "B2"]), "sel", ttl())
            .unwrap();
        assert_eq!(hold.chair_ids, ids(&["B1", "B2"]));
    }

    #[test]
    fn expired_hold_reads_free_without_release() {
        let store = test_store();
        store
            .hold(SHOWTIME, &ids(&["C1"]), "sel", Duration::from_millis(1))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let views = store.availability(SHOWTIME, &ids(&["C1"])).unwrap();
        assert_eq!(views[0].state, SeatState::Free);
        // Lazy: the record itself still says HELD until someone writes it.
        let record = store.get_record(SHOWTIME, "C1").unwrap().unwrap();
        assert_eq!(record.state, SeatState::Held);
    }

    #[test]
    fn expired_chair_can_be_reheld_with_higher_version() {
        let store = test_store();
        let first = store
            .hold(SHOWTIME, &ids(&["C2"]), "one", Duration::from_millis(1))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let second = store.hold(SHOWTIME, &ids(&["C2"]), "two", ttl()).unwrap();
        let record = store.get_record(SHOWTIME, "C2").unwrap().unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.held_by.as_deref(), Some(second.token.as_str()));

        // The stale lease can neither confirm nor free the chair.
        assert!(matches!(
            store.confirm(&first.token),
            Err(SeatStoreError::HoldExpired)
        ));
        store.release(&first.token).unwrap();
        let record = store.get_record(SHOWTIME, "C2").unwrap().unwrap();
        assert_eq!(record.state, SeatState::Held);
        assert_eq!(record.held_by.as_deref(), Some(second.token.as_str()));
    }

    #[test]
    fn confirm_marks_sold_with_holder() {
        let store = test_store();
        let hold = store.hold(SHOWTIME, &ids(&["D1", "D2"]), "sel", ttl()).unwrap();
        store.rebind_holder(&hold.token, "order-42").unwrap();
        store.confirm(&hold.token).unwrap();

        for chair in ["D1", "D2"] {
            let record = store.get_record(SHOWTIME, chair).unwrap().unwrap();
            assert_eq!(record.state, SeatState::Sold);
            assert_eq!(record.sold_to.as_deref(), Some("order-42"));
            assert_eq!(record.version, 2);
        }
    }

    #[test]
    fn confirm_is_idempotent() {
        let store = test_store();
        let hold = store.hold(SHOWTIME, &ids(&["D3"]), "sel", ttl()).unwrap();
        store.confirm(&hold.token).unwrap();
        store.confirm(&hold.token).unwrap();
        let record = store.get_record(SHOWTIME, "D3").unwrap().unwrap();
        assert_eq!(record.version, 2);
    }

    #[test]
    fn confirm_unknown_token_is_not_found() {
        let store = test_store();
        assert!(matches!(
            store.confirm("no-such-token"),
            Err(SeatStoreError::HoldNotFound)
        ));
    }

    #[test]
    fn confirm_after_expiry_fails() {
        let store = test_store();
        let hold = store
            .hold(SHOWTIME, &ids(&["D4"]), "sel", Duration::from_millis(1))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(matches!(
            store.confirm(&hold.token),
            Err(SeatStoreError::HoldExpired)
        ));
    }

    #[test]
    fn release_frees_chairs_and_is_idempotent() {
        let store = test_store();
        let hold = store.hold(SHOWTIME, &ids(&["E1"]), "sel", ttl()).unwrap();
        store.release(&hold.token).unwrap();

        let record = store.get_record(SHOWTIME, "E1").unwrap().unwrap();
        assert_eq!(record.state, SeatState::Free);
        assert_eq!(record.version, 2);

        // Second release: hold record is gone, still Ok.
        store.release(&hold.token).unwrap();
        let record = store.get_record(SHOWTIME, "E1").unwrap().unwrap();
        assert_eq!(record.version, 2);
    }

    #[test]
    fn release_after_confirm_keeps_chairs_sold() {
        let store = test_store();
        let hold = store.hold(SHOWTIME, &ids(&["E2"]), "sel", ttl()).unwrap();
        store.confirm(&hold.token).unwrap();
        store.release(&hold.token).unwrap();
        let record = store.get_record(SHOWTIME, "E2").unwrap().unwrap();
        assert_eq!(record.state, SeatState::Sold);
    }

    #[test]
    fn rebind_requires_live_hold() {
        let store = test_store();
        let hold = store
            .hold(SHOWTIME, &ids(&["F1"]), "sel", Duration::from_millis(1))
            .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(matches!(
            store.rebind_holder(&hold.token, "order-1"),
            Err(SeatStoreError::HoldExpired)
        ));
        assert!(matches!(
            store.rebind_holder("missing", "order-1"),
            Err(SeatStoreError::HoldNotFound)
        ));
    }

    #[test]
    fn sweep_reclaims_expired_unconfirmed_holds() {
        let store = test_store();
        let expired = store
            .hold(SHOWTIME, &ids(&["G1", "G2"]), "sel", Duration::from_millis(1))
            .unwrap();
        let live = store.hold(SHOWTIME, &ids(&["G3"]), "sel", ttl()).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let outcome = store.sweep_expired(now_millis()).unwrap();
        assert_eq!(outcome.released_holds, 1);
        assert_eq!(outcome.freed_chairs, 2);

        assert!(store.get_hold(&expired.token).unwrap().is_none());
        assert!(store.get_hold(&live.token).unwrap().is_some());
        let record = store.get_record(SHOWTIME, "G1").unwrap().unwrap();
        assert_eq!(record.state, SeatState::Free);
    }

    #[test]
    fn sweep_prunes_confirmed_holds_after_retention() {
        let store = test_store();
        let hold = store.hold(SHOWTIME, &ids(&["G4"]), "sel", ttl()).unwrap();
        store.confirm(&hold.token).unwrap();

        // Within retention: the confirmed record stays for crash recovery.
        let outcome = store.sweep_expired(now_millis()).unwrap();
        assert_eq!(outcome.pruned_confirmed, 0);
        assert!(store.get_hold(&hold.token).unwrap().is_some());

        // Far in the future it is pruned, chairs stay SOLD.
        let far = now_millis() + CONFIRMED_HOLD_RETENTION_MS + ttl().as_millis() as i64 + 1000;
        let outcome = store.sweep_expired(far).unwrap();
        assert_eq!(outcome.pruned_confirmed, 1);
        assert!(store.get_hold(&hold.token).unwrap().is_none());
        let record = store.get_record(SHOWTIME, "G4").unwrap().unwrap();
        assert_eq!(record.state, SeatState::Sold);
    }

    #[test]
    fn availability_version_counter_bumps_on_mutations() {
        let store = test_store();
        let versions = store.versions();
        assert_eq!(versions.current(SHOWTIME), 0);

        let hold = store.hold(SHOWTIME, &ids(&["H1"]), "sel", ttl()).unwrap();
        assert_eq!(versions.current(SHOWTIME), 1);
        store.release(&hold.token).unwrap();
        assert_eq!(versions.current(SHOWTIME), 2);
    }
}
