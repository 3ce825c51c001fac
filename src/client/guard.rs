use std::{
    collections::BTreeSet,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    errors::{Operation, WalletError},
    types::Address,
};

/// Allows one outstanding write per (address, operation). A second submission
/// while the first is pending is rejected, never queued.
#[derive(Debug, Default)]
pub struct InFlightGuard {
    active: Mutex<BTreeSet<(Address, Operation)>>,
}

#[derive(Debug)]
pub struct InFlightTicket<'a> {
    guard: &'a InFlightGuard,
    key: (Address, Operation),
}

impl InFlightGuard {
    pub fn acquire(
        &self,
        from: &Address,
        operation: Operation,
    ) -> Result<InFlightTicket<'_>, WalletError> {
        let key = (*from, operation);
        if !self.lock().insert(key) {
            log::warn!("rejecting concurrent {} from {}", operation, from);
            return Err(WalletError::OperationInFlight(operation));
        }
        Ok(InFlightTicket { guard: self, key })
    }

    pub fn is_active(&self, from: &Address, operation: Operation) -> bool {
        self.lock().contains(&(*from, operation))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<(Address, Operation)>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for InFlightTicket<'_> {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.key);
    }
}
