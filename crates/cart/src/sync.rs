//! Guest-to-account cart migration.
//!
//! When a shopper signs in, whatever they put in a guest cart is replayed into
//! their server-side cart: one `add_to_cart` per guest line, issued
//! concurrently. Only lines the backend accepted are deducted from the guest
//! store; rejected lines stay where they were and are listed in the
//! [`SyncReport`] so the shopper can retry or drop them.
//!
//! A line the backend accepted but whose deduction could not be saved (guest
//! storage disabled or full) is remembered by the reconciler. Later syncs
//! retry the deduction instead of sending the line again.
//!
//! Each store moves through [`SyncState`]: `Anonymous` -> `Syncing` ->
//! `Synced` | `PartiallySynced`. At most one migration per store runs at a
//! time.

use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use plug_core::{AddToCartInput, ProductId, SessionStatus, StoreId, SyncState};

use crate::api::CartApi;
use crate::error::SyncError;
use crate::events::{CartEvents, Notification};
use crate::guest::GuestCartStore;
use crate::session::SessionProvider;
use crate::storage::LocalStorage;
use crate::telemetry;

/// Outcome of migrating one store's guest cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub store_id: StoreId,
    /// Guest lines the backend accepted.
    pub synced: usize,
    /// Guest lines the backend refused. These remain in the guest cart.
    pub failed: Vec<FailedSyncItem>,
    /// Accepted lines still in guest storage because the deduction could not
    /// be saved. They are not sent again.
    pub unpersisted: usize,
}

/// A guest line that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedSyncItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Shopper-facing reason, verbatim from the backend when it gave one.
    pub reason: String,
}

impl SyncReport {
    const fn empty(store_id: StoreId) -> Self {
        Self {
            store_id,
            synced: 0,
            failed: Vec::new(),
            unpersisted: 0,
        }
    }

    /// Whether every guest line was migrated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        if self.is_complete() {
            SyncState::Synced
        } else {
            SyncState::PartiallySynced {
                failed: self.failed.len(),
            }
        }
    }

    fn notification(&self) -> Option<Notification> {
        let synced = self.synced;
        let failed = self.failed.len();
        match (synced, failed) {
            (0, 0) => None,
            (n, 0) => Some(Notification::success(format!(
                "Moved {n} {} from your guest cart",
                plural(n)
            ))),
            (0, f) => Some(Notification::error(format!(
                "Could not move {f} {} from your guest cart",
                plural(f)
            ))),
            (n, f) => Some(Notification::warning(format!(
                "Moved {n} {} from your guest cart, {f} could not be added",
                plural(n)
            ))),
        }
    }
}

const fn plural(n: usize) -> &'static str {
    if n == 1 { "item" } else { "items" }
}

/// Migrates guest carts into the signed-in shopper's server carts.
#[derive(Debug)]
pub struct SyncReconciler<A, S, P> {
    guest: GuestCartStore<S>,
    api: A,
    session: P,
    events: CartEvents,
    states: Mutex<HashMap<StoreId, SyncState>>,
    /// Accepted quantities not yet removed from guest storage.
    pending: Mutex<HashMap<StoreId, HashMap<ProductId, u32>>>,
}

impl<A, S, P> SyncReconciler<A, S, P>
where
    A: CartApi,
    S: LocalStorage,
    P: SessionProvider,
{
    pub fn new(guest: GuestCartStore<S>, api: A, session: P, events: CartEvents) -> Self {
        Self {
            guest,
            api,
            session,
            events,
            states: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Current migration state for a store.
    pub fn state(&self, store_id: StoreId) -> SyncState {
        self.lock_states()
            .get(&store_id)
            .copied()
            .unwrap_or_default()
    }

    /// Migrate one store's guest cart.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` without touching anything if the session is
    /// anonymous, or `AlreadySyncing` if a migration for this store is running.
    /// Per-line failures are reported in the [`SyncReport`], not as errors.
    #[instrument(skip(self), fields(store_id = %store_id))]
    pub async fn sync(&self, store_id: StoreId) -> Result<SyncReport, SyncError> {
        if !self.session.is_authenticated() {
            return Err(SyncError::NotAuthenticated);
        }
        let guard = self.begin(store_id)?;

        let pending = self.retry_pending(store_id);
        let items: Vec<_> = self
            .guest
            .get_for_tenant(store_id)
            .map(|cart| cart.items)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|mut item| {
                let sent = pending.get(&item.product_id).copied().unwrap_or_default();
                item.quantity = item.quantity.saturating_sub(sent);
                (item.quantity > 0).then_some(item)
            })
            .collect();
        if items.is_empty() {
            let report = SyncReport::empty(store_id);
            guard.finish(report.state());
            return Ok(report);
        }

        telemetry::add_breadcrumb(
            "cart",
            "Sync guest cart",
            &[
                ("store_id", store_id.to_string()),
                ("items", items.len().to_string()),
            ],
        );

        let results = join_all(items.iter().map(|item| {
            self.api.add_to_cart(
                store_id,
                AddToCartInput {
                    product_id: item.product_id,
                    quantity: item.quantity,
                },
            )
        }))
        .await;

        let mut report = SyncReport::empty(store_id);
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(_) => {
                    report.synced += 1;
                    if !self
                        .guest
                        .try_deduct_item(store_id, item.product_id, item.quantity)
                    {
                        warn!(product_id = %item.product_id, "Migrated line left in guest storage");
                        self.remember_pending(store_id, item.product_id, item.quantity);
                        report.unpersisted += 1;
                    }
                }
                Err(e) => {
                    warn!(product_id = %item.product_id, error = %e, "Guest cart line not migrated");
                    telemetry::capture_api_error(&e);
                    report.failed.push(FailedSyncItem {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        reason: e.user_message(),
                    });
                }
            }
        }

        info!(
            synced = report.synced,
            failed = report.failed.len(),
            "Guest cart sync finished"
        );

        if report.synced > 0 {
            self.events.guest_cart_updated(store_id);
            self.events.cart_invalidated(store_id);
        }
        if let Some(notice) = report.notification() {
            self.events.notify(notice);
        }

        guard.finish(report.state());
        Ok(report)
    }

    /// Migrate every store that currently has a guest cart.
    ///
    /// Stores already mid-migration are skipped.
    ///
    /// # Errors
    ///
    /// Returns `NotAuthenticated` if the session is anonymous.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<Vec<SyncReport>, SyncError> {
        if !self.session.is_authenticated() {
            return Err(SyncError::NotAuthenticated);
        }

        let mut reports = Vec::new();
        for cart in self.guest.get_all() {
            match self.sync(cart.store_id).await {
                Ok(report) => reports.push(report),
                Err(SyncError::AlreadySyncing(store_id)) => {
                    warn!(%store_id, "Skipping store with sync in progress");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    /// Run [`SyncReconciler::sync_all`] every time `session` becomes
    /// authenticated, until the session sender is dropped.
    ///
    /// If the session is already authenticated when called, a sync runs
    /// immediately.
    pub async fn sync_on_login(&self, mut session: watch::Receiver<SessionStatus>) {
        loop {
            let signed_in = session
                .wait_for(SessionStatus::is_authenticated)
                .await
                .map(|_| ());
            if signed_in.is_err() {
                break;
            }

            match self.sync_all().await {
                Ok(reports) => {
                    let synced: usize = reports.iter().map(|r| r.synced).sum();
                    info!(stores = reports.len(), synced, "Login sync complete");
                }
                // Signed out again before the sync started
                Err(e) => warn!(error = %e, "Login sync skipped"),
            }

            let signed_out = session
                .wait_for(|status| !status.is_authenticated())
                .await
                .map(|_| ());
            if signed_out.is_err() {
                break;
            }
        }
    }

    // =========================================================================
    // State tracking
    // =========================================================================

    fn lock_pending(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<StoreId, HashMap<ProductId, u32>>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn remember_pending(&self, store_id: StoreId, product_id: ProductId, quantity: u32) {
        let mut pending = self.lock_pending();
        let sent = pending
            .entry(store_id)
            .or_default()
            .entry(product_id)
            .or_default();
        *sent = sent.saturating_add(quantity);
    }

    /// Retry deductions left over from earlier syncs of this store.
    ///
    /// Returns what is still outstanding.
    fn retry_pending(&self, store_id: StoreId) -> HashMap<ProductId, u32> {
        let Some(pending) = self.lock_pending().remove(&store_id) else {
            return HashMap::new();
        };

        let outstanding: HashMap<_, _> = pending
            .into_iter()
            .filter(|&(product_id, quantity)| {
                !self.guest.try_deduct_item(store_id, product_id, quantity)
            })
            .collect();
        if outstanding.is_empty() {
            info!("Earlier guest cart deductions saved");
        } else {
            self.lock_pending()
                .entry(store_id)
                .or_default()
                .extend(outstanding.iter().map(|(&k, &v)| (k, v)));
        }
        outstanding
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, HashMap<StoreId, SyncState>> {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn begin(&self, store_id: StoreId) -> Result<SyncGuard<'_>, SyncError> {
        let mut states = self.lock_states();
        let previous = states.get(&store_id).copied().unwrap_or_default();
        if previous == SyncState::Syncing {
            return Err(SyncError::AlreadySyncing(store_id));
        }
        states.insert(store_id, SyncState::Syncing);
        Ok(SyncGuard {
            states: &self.states,
            store_id,
            previous: Some(previous),
        })
    }
}

/// Marks a store as `Syncing` for its lifetime.
///
/// Dropped without [`SyncGuard::finish`] (the sync future was cancelled), it
/// restores the state the store had before.
struct SyncGuard<'a> {
    states: &'a Mutex<HashMap<StoreId, SyncState>>,
    store_id: StoreId,
    previous: Option<SyncState>,
}

impl SyncGuard<'_> {
    fn finish(mut self, state: SyncState) {
        self.previous = None;
        self.set(state);
    }

    fn set(&self, state: SyncState) {
        self.states
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(self.store_id, state);
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.set(previous);
        }
    }
}
