//! Staydesk console
//!
//! Opens one booking against the configured backend and prints what the
//! booking view shows. Optionally captures a payment and follows the
//! reconciliation until it settles.
//!
//! # Usage
//!
//! ```bash
//! export STAYDESK_API_URL=https://staydesk.example.com/api
//! export STAYDESK_API_TOKEN=...
//!
//! cargo run --bin staydesk-console -- bk_42
//! cargo run --bin staydesk-console -- bk_42 capture 45.00
//! ```

use anyhow::{bail, Context};
use staydesk_booking::api::HttpBookingApi;
use staydesk_booking::config::ConsoleConfig;
use staydesk_booking::payment::PaymentAction;
use staydesk_booking::view::{BookingEnvironment, BookingViewController, BookingViewState};
use staydesk_booking::BookingId;
use staydesk_core::environment::SystemClock;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staydesk_booking=info,staydesk_runtime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(booking_id) = args.next() else {
        bail!("usage: staydesk-console <booking-id> [capture <amount>]");
    };
    let command: Vec<String> = args.collect();

    let config = ConsoleConfig::from_env();
    tracing::info!(base_url = %config.api.base_url, "Starting console");
    let api = HttpBookingApi::new(&config.api).context("building API client")?;
    let environment = BookingEnvironment::from_config(&config, Arc::new(SystemClock), Arc::new(api));
    let controller = BookingViewController::new(environment);

    controller
        .open(BookingId::new(booking_id))
        .await
        .context("opening booking")?
        .wait()
        .await;
    print_view(&controller.snapshot().await);

    if let [verb, amount] = command.as_slice() {
        if verb != "capture" {
            bail!("unknown command {verb:?}");
        }
        capture(&controller, &config, amount).await?;
        print_view(&controller.snapshot().await);
    }

    controller.dispose(None).await.context("shutting down")?;
    Ok(())
}

async fn capture(
    controller: &BookingViewController,
    config: &ConsoleConfig,
    amount: &str,
) -> anyhow::Result<()> {
    controller
        .send(PaymentAction::Capture {
            amount: amount.to_string(),
            currency: String::new(),
        })
        .await?
        .wait()
        .await;

    if let Some(error) = controller.state(|s| s.payment.error.clone()).await {
        bail!("capture failed: {}", error.user_message());
    }

    let deadline = tokio::time::Instant::now()
        + config.reconciliation.timeout
        + config.reconciliation.poll_interval;
    while controller
        .state(|s| s.payment.reconciliation.is_polling())
        .await
    {
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(config.reconciliation.poll_interval).await;
    }
    Ok(())
}

fn print_view(view: &BookingViewState) {
    match &view.booking {
        Some(booking) => println!(
            "{} [{}] {} -> {} ({} nights), total {}",
            booking.id,
            booking.status,
            booking.check_in,
            booking.check_out,
            booking.stay().nights(),
            booking.total()
        ),
        None => println!("booking not loaded"),
    }

    if let Some(aggregate) = &view.payment.aggregate {
        println!(
            "payment: {:?}, paid {} of {} {}",
            aggregate.status,
            aggregate.paid_minor,
            aggregate.total_minor,
            aggregate.currency
        );
    }
    if let Some(ledger) = &view.ledger {
        println!("ledger balance: {} {}", ledger.balance_minor, ledger.currency);
    }

    println!("timeline ({} events):", view.timeline.events.len());
    for event in &view.timeline.events {
        let at = event
            .occurred_at
            .map_or_else(|| "-".to_string(), |at| at.to_rfc3339());
        println!("  {at}  {}", event.event_type);
    }

    for (kind, error) in &view.load_errors {
        println!("{} failed: {}", kind.as_str(), error.user_message());
    }
    if let Some(notice) = &view.notice {
        println!("notice: {}", notice.message());
    }
}
