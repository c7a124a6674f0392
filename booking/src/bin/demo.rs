//! Seatflow booking walkthrough
//!
//! Two customers race for seat C9 of the same performance. The first books
//! it; the second gets a conflict, returns to seat selection with C9 removed
//! and books what is left of the selection.
//!
//! Run with:
//! ```bash
//! RUST_LOG=seatflow_booking=debug cargo run --bin demo
//! ```

use futures::StreamExt;
use seatflow_booking::prelude::*;
use seatflow_core::environment::SystemClock;
use seatflow_runtime::Store;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WAIT: Duration = Duration::from_secs(5);

type Session = Store<WizardState, WizardAction, WizardEnvironment, WizardReducer>;

fn is_snapshot(action: &WizardAction) -> bool {
    matches!(
        action,
        WizardAction::SnapshotLoaded { .. } | WizardAction::SnapshotFailed { .. }
    )
}

fn is_resolution(action: &WizardAction) -> bool {
    matches!(action, WizardAction::SubmissionResolved { .. })
}

/// Opens a session and walks it to the selection step
async fn open_session(
    event: &EventDescriptor,
    environment: &WizardEnvironment,
) -> Result<Session, Box<dyn std::error::Error>> {
    let session = WizardState::start(event.clone(), SessionContext::customer(CustomerId::new()))?;
    let store = Store::new(session, WizardReducer::new(), environment.clone());
    store.send(WizardAction::Advance).await?;
    store
        .send_and_wait_for(WizardAction::Advance, is_snapshot, WAIT)
        .await?;
    Ok(store)
}

async fn pick_and_submit(
    store: &Session,
    seats: &[&str],
) -> Result<WizardAction, Box<dyn std::error::Error>> {
    for code in seats {
        store
            .send(WizardAction::ToggleSeat {
                code: SeatCode::from(*code),
            })
            .await?;
    }
    store.send(WizardAction::Advance).await?;
    Ok(store
        .send_and_wait_for(WizardAction::Submit, is_resolution, WAIT)
        .await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "demo=info,seatflow_booking=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BookingConfig::from_env();
    let bus = in_process_bus(config.event_bus_capacity);
    let mut notifications = bus.subscribe();

    let service = InMemoryBookingService::shared();
    let event = EventDescriptor::new("Evening Recital", Money::from_major(100), chrono::Utc::now())
        .with_layout(
            r#"{"rows": ["A", "B", "C"], "columns": 10,
                "categories": [{"label": "Gold Circle", "rows": ["A"], "multiplier": 1.5}]}"#,
        )
        .with_blocked_seats(["A1"])
        .with_location("Concert Hall");
    service.register_event(&event).await;

    let environment = WizardEnvironment::new(
        service.clone(),
        bus.clone(),
        Arc::new(SystemClock),
        config,
    );

    let first = open_session(&event, &environment).await?;
    let second = open_session(&event, &environment).await?;

    let remaining = second.state(|s| s.selection().remaining()).await;
    info!(remaining, "Both customers are choosing seats");
    for entry in second.state(WizardState::legend).await {
        info!(category = %entry.category.name, price = %entry.price, "Legend");
    }

    // Second customer picks B5 and C9 but is slower to submit.
    for code in ["B5", "C9"] {
        second
            .send(WizardAction::ToggleSeat {
                code: SeatCode::from(code),
            })
            .await?;
    }

    let outcome = pick_and_submit(&first, &["C9", "C10"]).await?;
    info!(?outcome, "First customer submitted");

    // A conflict triggers a refresh; subscribe first so it cannot be missed.
    let mut actions = second.subscribe_actions();
    second.send(WizardAction::Advance).await?;
    let outcome = second
        .send_and_wait_for(WizardAction::Submit, is_resolution, WAIT)
        .await?;
    info!(?outcome, "Second customer submitted");

    tokio::time::timeout(WAIT, async {
        while let Ok(action) = actions.recv().await {
            if is_snapshot(&action) {
                break;
            }
        }
    })
    .await?;

    let (step, notice, kept) = second
        .state(|s| {
            (
                s.step(),
                s.conflict_notice.clone(),
                s.selection().seat_codes(),
            )
        })
        .await;
    info!(%step, ?notice, ?kept, "Second customer is back on seat selection");

    second.send(WizardAction::Advance).await?;
    let outcome = second
        .send_and_wait_for(WizardAction::Submit, is_resolution, WAIT)
        .await?;
    info!(?outcome, "Second customer resubmitted");

    if let Some(summary) = second.state(|s| s.summary().cloned()).await {
        info!(
            booking_id = %summary.booking_id,
            seats = ?summary.seats,
            subtotal = %summary.breakdown.subtotal,
            fee = %summary.breakdown.booking_fee,
            total = %summary.breakdown.grand_total,
            "Booking summary"
        );
    }

    first.shutdown(WAIT).await?;
    second.shutdown(WAIT).await?;

    while let Ok(Some(notification)) =
        tokio::time::timeout(Duration::from_millis(50), notifications.next()).await
    {
        match notification {
            Ok(published) => info!(?published, "Notification"),
            Err(error) => info!(%error, "Notification stream lagged"),
        }
    }

    info!(
        remaining = ?service.remaining(event.id).await,
        submissions = service.submission_count(),
        "Done"
    );
    Ok(())
}
