//! Shopper notices raised while a command ran.

use tokio::sync::broadcast::{self, error::TryRecvError};

use plug_cart::{CartEvent, Notification, NotificationLevel};

/// Collect every queued notice worth showing.
///
/// Error notices are left out; the failing command already reports them.
pub fn drain(events: &mut broadcast::Receiver<CartEvent>) -> Vec<Notification> {
    let mut notices = Vec::new();
    loop {
        match events.try_recv() {
            Ok(CartEvent::Notice(notice)) if notice.level != NotificationLevel::Error => {
                notices.push(notice);
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    notices
}

/// Print queued notices to stdout.
#[allow(clippy::print_stdout)]
pub fn print(events: &mut broadcast::Receiver<CartEvent>) {
    for notice in drain(events) {
        println!("{}", notice.message);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use plug_cart::CartEvents;
    use plug_core::StoreId;

    use super::*;

    #[test]
    fn test_drain_keeps_success_and_warning_notices() {
        let events = CartEvents::new();
        let mut rx = events.subscribe();

        events.cart_invalidated(StoreId::new(7));
        events.notify(Notification::success("Moved 2 items from your guest cart"));
        events.notify(Notification::error("This store is closed"));
        events.notify(Notification::warning(
            "Moved 1 item from your guest cart, 1 could not be added",
        ));

        let notices = drain(&mut rx);

        assert_eq!(
            notices,
            vec![
                Notification::success("Moved 2 items from your guest cart"),
                Notification::warning(
                    "Moved 1 item from your guest cart, 1 could not be added"
                ),
            ]
        );
        assert!(drain(&mut rx).is_empty());
    }
}
