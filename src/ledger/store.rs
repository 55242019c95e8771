//! The ledger store: single source of truth for creditors, customers and
//! receipt records.
//!
//! Every mutation is validated, applied to a staged copy of the snapshot,
//! persisted, and only then swapped in. A failure at any step leaves the
//! visible state untouched. `Customer::collected_amount` is only ever
//! written here.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::traits::*;
use crate::types::*;
use crate::utils::validation::DefaultEntityValidator;

/// Full contents of the ledger at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub creditors: Vec<Creditor>,
    pub customers: Vec<Customer>,
    /// Newest first
    pub records: Vec<ReceiptRecord>,
}

impl LedgerSnapshot {
    pub fn customer(&self, customer_id: &str) -> Option<&Customer> {
        self.customers.iter().find(|c| c.id == customer_id)
    }

    pub fn creditor(&self, creditor_id: &str) -> Option<&Creditor> {
        self.creditors.iter().find(|c| c.id == creditor_id)
    }

    pub fn record(&self, record_id: &str) -> Option<&ReceiptRecord> {
        self.records.iter().find(|r| r.id == record_id)
    }

    /// Records attributed to a customer, newest first
    pub fn records_for_customer(&self, customer_id: &str) -> Vec<&ReceiptRecord> {
        self.records
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .collect()
    }

    /// Records cross-referenced to a creditor, newest first
    pub fn records_for_creditor(&self, creditor_id: &str) -> Vec<&ReceiptRecord> {
        self.records
            .iter()
            .filter(|r| r.matched_creditor_id.as_deref() == Some(creditor_id))
            .collect()
    }

    /// Sum of record amounts owned by a customer
    pub fn collected_for(&self, customer_id: &str) -> BigDecimal {
        self.records
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .map(|r| &r.amount)
            .sum()
    }

    /// Sum of record amounts matched against a creditor
    pub fn matched_for(&self, creditor_id: &str) -> BigDecimal {
        self.records_for_creditor(creditor_id)
            .into_iter()
            .map(|r| &r.amount)
            .sum()
    }

    /// Recompute every customer's collected amount from the records.
    /// Returns how many customers changed.
    fn rebuild_collected(&mut self) -> usize {
        let mut repaired = 0;
        for i in 0..self.customers.len() {
            let expected = self.collected_for(&self.customers[i].id);
            let customer = &mut self.customers[i];
            if customer.collected_amount != expected {
                tracing::warn!(
                    customer_id = %customer.id,
                    stored = %customer.collected_amount,
                    expected = %expected,
                    "Repairing collected amount drift"
                );
                customer.collected_amount = expected;
                repaired += 1;
            }
        }
        repaired
    }
}

/// Notification emitted after a committed mutation
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerEvent {
    RecordAdded {
        record_id: String,
        customer_id: String,
        amount: BigDecimal,
    },
    RecordRemoved {
        record_id: String,
        customer_id: String,
        amount: BigDecimal,
    },
    CreditorUpserted {
        creditor_id: String,
        created: bool,
    },
    CreditorRemoved {
        creditor_id: String,
        cleared_records: usize,
    },
    CustomerUpserted {
        customer_id: String,
        created: bool,
    },
    CustomerRemoved {
        customer_id: String,
        orphaned_records: usize,
    },
    BalancesRebuilt {
        repaired: usize,
    },
}

/// Handle returned by [`LedgerStore::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Stored collected amount that disagrees with the records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceDrift {
    pub customer_id: String,
    pub stored: BigDecimal,
    pub expected: BigDecimal,
}

/// Report on ledger consistency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// True when every collected amount matches its records
    pub is_valid: bool,
    pub balance_drift: Vec<BalanceDrift>,
    /// Records whose customer no longer exists
    pub orphaned_records: Vec<String>,
    /// Records whose matched creditor no longer exists
    pub dangling_creditor_refs: Vec<String>,
    pub issues: Vec<String>,
}

/// Ledger store owning the three entity collections
pub struct LedgerStore<S: LedgerStorage> {
    storage: S,
    state: LedgerSnapshot,
    validator: Box<dyn EntityValidator>,
    observers: Vec<(SubscriptionId, Box<dyn LedgerObserver>)>,
    next_subscription: u64,
}

impl<S: LedgerStorage> LedgerStore<S> {
    /// Load the ledger from storage
    pub fn open(storage: S) -> LedgerResult<Self> {
        Self::with_validator(storage, Box::new(DefaultEntityValidator))
    }

    /// Load the ledger from storage with a custom validator.
    ///
    /// Collected amounts are rebuilt from the records on load; if any
    /// drift is repaired the corrected snapshot is written back.
    pub fn with_validator(storage: S, validator: Box<dyn EntityValidator>) -> LedgerResult<Self> {
        let mut state = storage.load()?;
        let repaired = state.rebuild_collected();

        let mut store = Self {
            storage,
            state: LedgerSnapshot::default(),
            validator,
            observers: Vec::new(),
            next_subscription: 0,
        };
        if repaired > 0 {
            store.storage.save(&state)?;
        }
        store.state = state;

        tracing::info!(
            creditors = store.state.creditors.len(),
            customers = store.state.customers.len(),
            records = store.state.records.len(),
            repaired,
            "Ledger loaded"
        );
        Ok(store)
    }

    // Queries

    pub fn snapshot(&self) -> &LedgerSnapshot {
        &self.state
    }

    pub fn creditors(&self) -> &[Creditor] {
        &self.state.creditors
    }

    pub fn customers(&self) -> &[Customer] {
        &self.state.customers
    }

    /// All records, newest first
    pub fn records(&self) -> &[ReceiptRecord] {
        &self.state.records
    }

    pub fn creditor(&self, creditor_id: &str) -> Option<&Creditor> {
        self.state.creditor(creditor_id)
    }

    pub fn customer(&self, customer_id: &str) -> Option<&Customer> {
        self.state.customer(customer_id)
    }

    pub fn record(&self, record_id: &str) -> Option<&ReceiptRecord> {
        self.state.record(record_id)
    }

    pub fn records_for_customer(&self, customer_id: &str) -> Vec<&ReceiptRecord> {
        self.state.records_for_customer(customer_id)
    }

    pub fn records_for_creditor(&self, creditor_id: &str) -> Vec<&ReceiptRecord> {
        self.state.records_for_creditor(creditor_id)
    }

    /// Access the underlying storage backend
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // Records

    /// Insert a record and credit its amount to the owning customer in the
    /// same step
    pub fn add_record(&mut self, record: ReceiptRecord) -> LedgerResult<ReceiptRecord> {
        self.validator.validate_record(&record)?;

        if self.state.record(&record.id).is_some() {
            return Err(LedgerError::Validation(format!(
                "Record with ID '{}' already exists",
                record.id
            )));
        }

        let mut next = self.state.clone();
        let customer = next
            .customers
            .iter_mut()
            .find(|c| c.id == record.customer_id)
            .ok_or_else(|| {
                LedgerError::Validation(format!(
                    "Customer '{}' does not exist",
                    record.customer_id
                ))
            })?;
        customer.collected_amount += &record.amount;
        next.records.insert(0, record.clone());

        self.commit(
            next,
            LedgerEvent::RecordAdded {
                record_id: record.id.clone(),
                customer_id: record.customer_id.clone(),
                amount: record.amount.clone(),
            },
        )?;
        tracing::info!(
            record_id = %record.id,
            customer_id = %record.customer_id,
            amount = %record.amount,
            "Receipt recorded"
        );
        Ok(record)
    }

    /// Delete a record and debit its amount from the owning customer.
    ///
    /// Unknown ids are a no-op and return `None`.
    pub fn remove_record(&mut self, record_id: &str) -> LedgerResult<Option<ReceiptRecord>> {
        let Some(index) = self.state.records.iter().position(|r| r.id == record_id) else {
            tracing::debug!(record_id, "Record already absent");
            return Ok(None);
        };

        let mut next = self.state.clone();
        let record = next.records.remove(index);
        if let Some(customer) = next
            .customers
            .iter_mut()
            .find(|c| c.id == record.customer_id)
        {
            let zero = BigDecimal::from(0);
            let reduced = &customer.collected_amount - &record.amount;
            customer.collected_amount = if reduced < zero { zero } else { reduced };
        }

        self.commit(
            next,
            LedgerEvent::RecordRemoved {
                record_id: record.id.clone(),
                customer_id: record.customer_id.clone(),
                amount: record.amount.clone(),
            },
        )?;
        tracing::info!(record_id, customer_id = %record.customer_id, "Receipt removed");
        Ok(Some(record))
    }

    // Creditors

    /// Insert or replace a creditor by id.
    ///
    /// Names must be unique among creditors (exact match). On replace the
    /// original creation time is kept and the advisory remaining amount is
    /// reset to the new total.
    pub fn upsert_creditor(&mut self, mut creditor: Creditor) -> LedgerResult<Creditor> {
        self.validator.validate_creditor(&creditor)?;

        if self
            .state
            .creditors
            .iter()
            .any(|c| c.id != creditor.id && c.name == creditor.name)
        {
            return Err(LedgerError::DuplicateName {
                kind: EntityKind::Creditor,
                name: creditor.name,
            });
        }

        creditor.remaining_amount = creditor.total_amount.clone();

        let mut next = self.state.clone();
        let created = match next.creditors.iter_mut().find(|c| c.id == creditor.id) {
            Some(existing) => {
                creditor.created_at = existing.created_at;
                *existing = creditor.clone();
                false
            }
            None => {
                next.creditors.insert(0, creditor.clone());
                true
            }
        };

        self.commit(
            next,
            LedgerEvent::CreditorUpserted {
                creditor_id: creditor.id.clone(),
                created,
            },
        )?;
        tracing::info!(creditor_id = %creditor.id, created, "Creditor saved");
        Ok(creditor)
    }

    /// Delete a creditor and clear every record's reference to it.
    ///
    /// Records themselves and customer balances are untouched. Returns
    /// `false` if the creditor did not exist.
    pub fn remove_creditor(&mut self, creditor_id: &str) -> LedgerResult<bool> {
        let Some(index) = self.state.creditors.iter().position(|c| c.id == creditor_id) else {
            return Ok(false);
        };

        let mut next = self.state.clone();
        next.creditors.remove(index);
        let mut cleared_records = 0;
        for record in next
            .records
            .iter_mut()
            .filter(|r| r.matched_creditor_id.as_deref() == Some(creditor_id))
        {
            record.matched_creditor_id = None;
            cleared_records += 1;
        }

        self.commit(
            next,
            LedgerEvent::CreditorRemoved {
                creditor_id: creditor_id.to_string(),
                cleared_records,
            },
        )?;
        tracing::info!(creditor_id, cleared_records, "Creditor removed");
        Ok(true)
    }

    // Customers

    /// Insert or replace a customer by id.
    ///
    /// The caller's `collected_amount` is ignored and recomputed from the
    /// records, so the balance invariant cannot be bypassed here.
    pub fn upsert_customer(&mut self, mut customer: Customer) -> LedgerResult<Customer> {
        self.validator.validate_customer(&customer)?;

        if self
            .state
            .customers
            .iter()
            .any(|c| c.id != customer.id && c.name == customer.name)
        {
            return Err(LedgerError::DuplicateName {
                kind: EntityKind::Customer,
                name: customer.name,
            });
        }

        customer.collected_amount = self.state.collected_for(&customer.id);

        let mut next = self.state.clone();
        let created = match next.customers.iter_mut().find(|c| c.id == customer.id) {
            Some(existing) => {
                customer.created_at = existing.created_at;
                *existing = customer.clone();
                false
            }
            None => {
                next.customers.insert(0, customer.clone());
                true
            }
        };

        self.commit(
            next,
            LedgerEvent::CustomerUpserted {
                customer_id: customer.id.clone(),
                created,
            },
        )?;
        tracing::info!(customer_id = %customer.id, created, "Customer saved");
        Ok(customer)
    }

    /// Delete a customer. Its records stay behind with a dangling
    /// `customer_id` and show up in [`LedgerStore::verify_integrity`].
    pub fn remove_customer(&mut self, customer_id: &str) -> LedgerResult<bool> {
        let Some(index) = self.state.customers.iter().position(|c| c.id == customer_id) else {
            return Ok(false);
        };

        let mut next = self.state.clone();
        next.customers.remove(index);
        let orphaned_records = next
            .records
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .count();

        self.commit(
            next,
            LedgerEvent::CustomerRemoved {
                customer_id: customer_id.to_string(),
                orphaned_records,
            },
        )?;
        if orphaned_records > 0 {
            tracing::warn!(customer_id, orphaned_records, "Customer removed, records orphaned");
        } else {
            tracing::info!(customer_id, "Customer removed");
        }
        Ok(true)
    }

    // Integrity

    /// Check every derived balance and reference against the records
    pub fn verify_integrity(&self) -> IntegrityReport {
        let mut issues = Vec::new();

        let balance_drift: Vec<BalanceDrift> = self
            .state
            .customers
            .iter()
            .filter_map(|c| {
                let expected = self.state.collected_for(&c.id);
                (expected != c.collected_amount).then(|| BalanceDrift {
                    customer_id: c.id.clone(),
                    stored: c.collected_amount.clone(),
                    expected,
                })
            })
            .collect();
        for drift in &balance_drift {
            issues.push(format!(
                "Customer '{}' collected amount is {} but records sum to {}",
                drift.customer_id, drift.stored, drift.expected
            ));
        }

        let orphaned_records: Vec<String> = self
            .state
            .records
            .iter()
            .filter(|r| self.state.customer(&r.customer_id).is_none())
            .map(|r| r.id.clone())
            .collect();
        if !orphaned_records.is_empty() {
            issues.push(format!(
                "{} record(s) belong to deleted customers",
                orphaned_records.len()
            ));
        }

        let dangling_creditor_refs: Vec<String> = self
            .state
            .records
            .iter()
            .filter(|r| {
                r.matched_creditor_id
                    .as_deref()
                    .is_some_and(|id| self.state.creditor(id).is_none())
            })
            .map(|r| r.id.clone())
            .collect();
        if !dangling_creditor_refs.is_empty() {
            issues.push(format!(
                "{} record(s) reference deleted creditors",
                dangling_creditor_refs.len()
            ));
        }

        IntegrityReport {
            is_valid: balance_drift.is_empty(),
            balance_drift,
            orphaned_records,
            dangling_creditor_refs,
            issues,
        }
    }

    /// Recompute all collected amounts from the records. Returns the number
    /// of customers that were corrected.
    pub fn rebuild_balances(&mut self) -> LedgerResult<usize> {
        let mut next = self.state.clone();
        let repaired = next.rebuild_collected();
        if repaired > 0 {
            self.commit(next, LedgerEvent::BalancesRebuilt { repaired })?;
        }
        Ok(repaired)
    }

    // Change notification

    /// Register an observer called after every committed mutation
    pub fn subscribe<O: LedgerObserver + 'static>(&mut self, observer: O) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    /// Persist the staged snapshot, swap it in, then notify observers
    fn commit(&mut self, next: LedgerSnapshot, event: LedgerEvent) -> LedgerResult<()> {
        if let Err(error) = self.storage.save(&next) {
            tracing::error!(%error, "Persisting ledger mutation failed, restoring previous snapshot");
            if let Err(restore_error) = self.storage.save(&self.state) {
                tracing::error!(error = %restore_error, "Restoring previous snapshot failed");
            }
            return Err(error);
        }
        self.state = next;
        tracing::debug!(?event, "Ledger mutation committed");
        for (_, observer) in &self.observers {
            observer.on_change(&event, &self.state);
        }
        Ok(())
    }
}
