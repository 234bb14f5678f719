//! OpenSASE BizOps - loads a console snapshot and prints the work queues.

use anyhow::{Context, Result};
use opensase_bizops::domain::aggregates::{Order, OrderStatus, Rfq, RfqStatus, Ticket, TicketStatus};
use opensase_bizops::store::StoreSnapshot;
use opensase_bizops::{Console, ConsoleConfig, ViewQuery};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = ConsoleConfig::from_env();
    tracing::info!(currency = %config.currency, tax_rate = %config.tax_rate, "starting bizops console");

    let mut console = Console::new(config.clone());
    if let Some(path) = &config.seed_path {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading seed {}", path.display()))?;
        let snapshot: StoreSnapshot = serde_json::from_str(&raw).with_context(|| format!("parsing seed {}", path.display()))?;
        console.load(snapshot).with_context(|| format!("loading seed {}", path.display()))?;
    } else {
        tracing::warn!("BIZOPS_SEED not set, starting with an empty store");
    }

    let pending_rfqs = console.view::<Rfq>(&ViewQuery::new().status(RfqStatus::Pending.as_str())).len();
    let open_tickets = console.view::<Ticket>(&ViewQuery::new().status(TicketStatus::Open.as_str())).len()
        + console.view::<Ticket>(&ViewQuery::new().status(TicketStatus::InProgress.as_str())).len();
    let to_ship = console.view::<Order>(&ViewQuery::new().status(OrderStatus::Fulfilled.as_str())).len();

    let summary = json!({
        "rfqs_pending": pending_rfqs,
        "tickets_open": open_tickets,
        "orders_awaiting_shipment": to_ship,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
