//! Guest cart migration commands.

use tracing::{info, warn};

use plug_cart::{CartSubsystem, SyncReport};
use plug_core::StoreId;

use crate::error::CliError;

/// Migrate one store's guest cart.
///
/// # Errors
///
/// Returns an error if not signed in or a migration for the store is running.
pub async fn one(cart: &CartSubsystem, store: StoreId) -> Result<(), CliError> {
    let report = cart.reconciler().sync(store).await?;
    print_report(&report);
    Ok(())
}

/// Migrate every guest cart.
///
/// # Errors
///
/// Returns an error if not signed in.
#[allow(clippy::print_stdout)]
pub async fn all(cart: &CartSubsystem) -> Result<(), CliError> {
    let reports = cart.reconciler().sync_all().await?;
    if reports.is_empty() {
        println!("No guest carts to sync");
    }
    for report in &reports {
        print_report(report);
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_report(report: &SyncReport) {
    info!(
        store_id = %report.store_id,
        synced = report.synced,
        failed = report.failed.len(),
        "Sync finished"
    );
    println!(
        "Store {}: {} synced, {} failed",
        report.store_id,
        report.synced,
        report.failed.len()
    );
    if report.unpersisted > 0 {
        warn!(unpersisted = report.unpersisted, "Guest cart not updated after sync");
        println!(
            "  {} synced {} still listed in the guest cart; the next sync will not resend them",
            report.unpersisted,
            if report.unpersisted == 1 { "line is" } else { "lines are" }
        );
    }
    for failed in &report.failed {
        warn!(product_id = %failed.product_id, reason = %failed.reason, "Not synced");
        println!(
            "  product {} x{}: {}",
            failed.product_id, failed.quantity, failed.reason
        );
    }
}
