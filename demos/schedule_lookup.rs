//! Look up a schedule without the agent
//!
//! Run with: cargo run --example schedule_lookup -- group 4236

use anyhow::bail;
use campus_agent::schedule::{EntityKind, ScheduleService, ScheduleSource, DEFAULT_BASE_URL};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (kind, query) = match args.as_slice() {
        [kind, rest @ ..] if !rest.is_empty() => (kind.as_str(), rest.join(" ")),
        _ => bail!("usage: schedule_lookup <group|teacher|department|room> <name>"),
    };
    let kind = match kind {
        "group" => EntityKind::Group,
        "teacher" => EntityKind::Teacher,
        "department" => EntityKind::Department,
        "room" => EntityKind::Room,
        other => bail!("unknown schedule kind: {}", other),
    };

    let base_url = std::env::var("SCHEDULE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let service = ScheduleService::new(base_url)?;

    let Some(entity) = service.find(kind, &query).await? else {
        println!("No {} matching '{}' found.", kind, query);
        return Ok(());
    };

    let schedule = service.schedule(kind, &entity).await?;
    println!("{}", schedule.format_for_llm());

    Ok(())
}
