use crate::error::{LedgerError, Result};
use crate::metrics::{record_operation, MANNA_GRANTED_TOTAL, PURCHASES_TOTAL};
use crate::pricing::PurchasePricing;
use crate::record::{Category, PlayerId, PlayerRecord, UPGRADE_CAP};
use crate::store::PlayerStore;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Owns the player store and serialises every write to it.
///
/// Reads go straight to the store; writes take the ledger-wide lock for the
/// whole read-modify-write so no partial update is observable.
pub struct Ledger<S: PlayerStore> {
    store: S,
    write_lock: Mutex<()>,
    pricing: PurchasePricing,
}

impl<S: PlayerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self::with_pricing(store, PurchasePricing::default())
    }

    pub fn with_pricing(store: S, pricing: PurchasePricing) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            pricing,
        }
    }

    pub fn pricing(&self) -> PurchasePricing {
        self.pricing
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| LedgerError::LockPoisoned)
    }

    fn load(&self, id: PlayerId) -> Result<PlayerRecord> {
        self.store.get(id)?.ok_or(LedgerError::NotFound(id))
    }

    /// Create a record for `id`. Fails with `AlreadyExists` if one is present.
    pub fn create(
        &self,
        id: PlayerId,
        callsign: impl Into<String>,
        initial_grant: u64,
    ) -> Result<PlayerRecord> {
        let record = PlayerRecord::new(id, callsign, initial_grant);
        let result = self.insert(record);
        observe("create", &result);
        if let Ok(record) = &result {
            MANNA_GRANTED_TOTAL.inc_by(initial_grant);
            info!(%id, callsign = %record.callsign, initial_grant, "Created player record");
        }
        result
    }

    /// Look up a record. Never creates one.
    pub fn find(&self, id: PlayerId) -> Result<Option<PlayerRecord>> {
        let result = self.store.get(id).map_err(LedgerError::from);
        observe("find", &result);
        result
    }

    /// Remove the record for `id`, but only when `confirm` is set.
    /// Returns whether a record was deleted.
    pub fn delete(&self, id: PlayerId, confirm: bool) -> Result<bool> {
        if !confirm {
            debug!(%id, "Delete requested without confirmation; ignoring");
            return Ok(false);
        }
        let result = self.remove(id).map(|_| true);
        observe("delete", &result);
        if result.is_ok() {
            info!(%id, "Deleted player record");
        }
        result
    }

    pub fn rename(&self, id: PlayerId, callsign: impl Into<String>) -> Result<PlayerRecord> {
        let callsign = callsign.into();
        let result = self.update(id, |record| {
            record.callsign = callsign;
            Ok(())
        });
        observe("rename", &result);
        result
    }

    /// Award `amount` manna. `granted` only ever grows; a grant that would
    /// overflow it fails with `GrantOverflow` and credits nothing.
    pub fn grant(&self, id: PlayerId, amount: u64) -> Result<PlayerRecord> {
        let result = self.update(id, |record| {
            record.granted = record
                .granted
                .checked_add(amount)
                .ok_or(LedgerError::GrantOverflow { id, amount })?;
            Ok(())
        });
        observe("grant", &result);
        match &result {
            Ok(record) => {
                MANNA_GRANTED_TOTAL.inc_by(amount);
                debug!(%id, amount, granted = record.granted, "Granted manna");
            }
            Err(e) if e.is_rule_violation() => {
                warn!(%id, amount, reason = %e, "Grant rejected");
            }
            Err(_) => {}
        }
        result
    }

    /// Buy one unit of `category`. Returns the new count for that category.
    ///
    /// The cap is checked before funds, so a full category reports
    /// `CapReached` however much manna is available.
    pub fn purchase(&self, id: PlayerId, category: Category) -> Result<u8> {
        let pricing = self.pricing;
        let result = self
            .update(id, |record| {
                let count = record.count(category);
                if count >= UPGRADE_CAP {
                    return Err(LedgerError::CapReached { category });
                }
                let price = pricing.required_funds(category);
                let available = record.available();
                if available < price {
                    return Err(LedgerError::InsufficientFunds {
                        category,
                        price,
                        available,
                    });
                }
                *record.count_mut(category) = count + 1;
                Ok(())
            })
            .map(|record| record.count(category));
        observe("purchase", &result);
        match &result {
            Ok(count) => {
                PURCHASES_TOTAL.with_label_values(&[category.label()]).inc();
                debug!(%id, %category, count, "Purchased upgrade");
            }
            Err(e) if e.is_rule_violation() => {
                warn!(%id, %category, reason = %e, "Purchase rejected");
            }
            Err(_) => {}
        }
        result
    }

    /// The player's status line.
    pub fn summary(&self, id: PlayerId) -> Result<String> {
        let result = self.load(id).map(|record| record.to_string());
        observe("summary", &result);
        result
    }

    /// Every record, ordered by callsign and then id.
    pub fn list(&self) -> Result<Vec<PlayerRecord>> {
        let result = self.store.all().map_err(LedgerError::from).map(|mut records| {
            records.sort_by(|a, b| a.callsign.cmp(&b.callsign).then(a.id.cmp(&b.id)));
            records
        });
        observe("list", &result);
        result
    }

    /// Push pending writes to durable storage.
    pub fn flush(&self) -> Result<()> {
        let result = self.store.flush().map_err(LedgerError::from);
        observe("flush", &result);
        result
    }

    fn insert(&self, record: PlayerRecord) -> Result<PlayerRecord> {
        let _guard = self.lock()?;
        if !self.store.insert_if_absent(&record)? {
            return Err(LedgerError::AlreadyExists(record.id));
        }
        Ok(record)
    }

    fn remove(&self, id: PlayerId) -> Result<()> {
        let _guard = self.lock()?;
        if !self.store.remove(id)? {
            return Err(LedgerError::NotFound(id));
        }
        Ok(())
    }

    /// Read-modify-write under the write lock. Nothing is written if `f` fails.
    fn update<F>(&self, id: PlayerId, f: F) -> Result<PlayerRecord>
    where
        F: FnOnce(&mut PlayerRecord) -> Result<()>,
    {
        let _guard = self.lock()?;
        let mut record = self.load(id)?;
        f(&mut record)?;
        self.store.put(&record)?;
        Ok(record)
    }
}

fn observe<T>(operation: &str, result: &Result<T>) {
    match result {
        Ok(_) => record_operation(operation, "success"),
        Err(e) => record_operation(operation, e.kind()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryPlayerStore;

    fn ledger() -> Ledger<InMemoryPlayerStore> {
        Ledger::new(InMemoryPlayerStore::new())
    }

    #[test]
    fn create_then_find() {
        let ledger = ledger();
        let created = ledger.create(PlayerId(1), "Vesper", 250).unwrap();
        assert_eq!(ledger.find(PlayerId(1)).unwrap(), Some(created));
        assert_eq!(ledger.find(PlayerId(2)).unwrap(), None);
    }

    #[test]
    fn duplicate_create_keeps_original() {
        let ledger = ledger();
        ledger.create(PlayerId(1), "Vesper", 250).unwrap();
        let err = ledger.create(PlayerId(1), "Impostor", 9000).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(PlayerId(1))));

        let record = ledger.find(PlayerId(1)).unwrap().unwrap();
        assert_eq!(record.callsign, "Vesper");
        assert_eq!(record.granted, 250);
    }

    #[test]
    fn operations_on_absent_player_fail_not_found() {
        let ledger = ledger();
        let id = PlayerId(404);
        assert!(matches!(ledger.rename(id, "x"), Err(LedgerError::NotFound(_))));
        assert!(matches!(ledger.grant(id, 10), Err(LedgerError::NotFound(_))));
        assert!(matches!(
            ledger.purchase(id, Category::Talent),
            Err(LedgerError::NotFound(_))
        ));
        assert!(matches!(ledger.summary(id), Err(LedgerError::NotFound(_))));
        assert!(matches!(ledger.delete(id, true), Err(LedgerError::NotFound(_))));
    }

    #[test]
    fn unconfirmed_delete_keeps_record() {
        let ledger = ledger();
        ledger.create(PlayerId(3), "Marlin", 0).unwrap();
        assert!(!ledger.delete(PlayerId(3), false).unwrap());
        assert!(ledger.find(PlayerId(3)).unwrap().is_some());
        assert!(ledger.delete(PlayerId(3), true).unwrap());
        assert!(ledger.find(PlayerId(3)).unwrap().is_none());
    }

    #[test]
    fn rename_changes_only_callsign() {
        let ledger = ledger();
        ledger.create(PlayerId(4), "Old", 800).unwrap();
        ledger.purchase(PlayerId(4), Category::Talent).unwrap();
        let renamed = ledger.rename(PlayerId(4), "New Name").unwrap();
        assert_eq!(renamed.callsign, "New Name");
        assert_eq!(renamed.granted, 800);
        assert_eq!(renamed.talents, 1);
    }

    #[test]
    fn purchase_checks_cap_before_funds() {
        let ledger = ledger();
        let id = PlayerId(5);
        ledger.create(id, "Capped", 0).unwrap();
        ledger.grant(id, 12 * 300).unwrap();
        for expected in 1..=12 {
            assert_eq!(ledger.purchase(id, Category::Talent).unwrap(), expected);
        }
        // no funds left and at cap: cap wins
        let err = ledger.purchase(id, Category::Talent).unwrap_err();
        assert!(matches!(err, LedgerError::CapReached { category: Category::Talent }));
        assert_eq!(err.to_string(), "You may only buy 12 of each upgrade.");
    }

    #[test]
    fn failed_purchase_writes_nothing() {
        let ledger = ledger();
        let id = PlayerId(6);
        ledger.create(id, "Broke", 450).unwrap();
        let before = ledger.find(id).unwrap().unwrap();

        let err = ledger.purchase(id, Category::Licence).unwrap_err();
        match err {
            LedgerError::InsufficientFunds { price, available, .. } => {
                assert_eq!(price, 500);
                assert_eq!(available, 450);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ledger.find(id).unwrap().unwrap(), before);
    }

    #[test]
    fn flat_licence_pricing_blocks_cheap_categories() {
        let ledger = Ledger::with_pricing(InMemoryPlayerStore::new(), PurchasePricing::FlatLicence);
        let id = PlayerId(7);
        ledger.create(id, "Legacy", 400).unwrap();
        assert!(matches!(
            ledger.purchase(id, Category::Training),
            Err(LedgerError::InsufficientFunds { price: 500, .. })
        ));

        ledger.grant(id, 100).unwrap();
        assert_eq!(ledger.purchase(id, Category::Training).unwrap(), 1);
        // spent is still charged at the training price
        assert_eq!(ledger.find(id).unwrap().unwrap().available(), 300);
    }

    #[test]
    fn overflowing_grant_credits_nothing() {
        let ledger = ledger();
        let id = PlayerId(9);
        ledger.create(id, "Heron", u64::MAX - 10).unwrap();

        let err = ledger.grant(id, 500).unwrap_err();
        assert!(matches!(err, LedgerError::GrantOverflow { id: PlayerId(9), amount: 500 }));
        assert_eq!(ledger.find(id).unwrap().unwrap().granted, u64::MAX - 10);

        // the exact remaining headroom still fits
        assert_eq!(ledger.grant(id, 10).unwrap().granted, u64::MAX);
    }

    #[test]
    fn list_orders_by_callsign() {
        let ledger = ledger();
        ledger.create(PlayerId(1), "Zephyr", 0).unwrap();
        ledger.create(PlayerId(2), "Anvil", 0).unwrap();
        ledger.create(PlayerId(3), "Mistral", 0).unwrap();
        let names: Vec<_> = ledger.list().unwrap().into_iter().map(|r| r.callsign).collect();
        assert_eq!(names, vec!["Anvil", "Mistral", "Zephyr"]);
    }

    #[test]
    fn summary_renders_status_line() {
        let ledger = ledger();
        ledger.create(PlayerId(8), "Gannet", 2000).unwrap();
        ledger.purchase(PlayerId(8), Category::Licence).unwrap();
        ledger.purchase(PlayerId(8), Category::Licence).unwrap();
        assert_eq!(
            ledger.summary(PlayerId(8)).unwrap(),
            "Gannet ll 1. 1000/2000 manna. 2 licences. 0 talents. 0 training."
        );
    }
}
