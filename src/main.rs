use anyhow::{Context, Result, anyhow};
use clap::Parser;
use memberdb::{
    ConnectionConfig, ConnectionPool, Database, Member, MemberRepository, MemberService,
    PoolStats, TransactionCoordinator, TransactionOutcome,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Seed two members, move money between them and print the balances.
#[derive(Parser, Debug)]
#[command(name = "memberdb", version, about)]
struct Cli {
    /// Sender id
    #[arg(long, default_value = "A")]
    from: String,

    /// Recipient id ("ex" is refused and rolls the transfer back)
    #[arg(long, default_value = "B")]
    to: String,

    /// Amount to move
    #[arg(long, default_value_t = 2000)]
    amount: i64,

    /// Starting balance of both members
    #[arg(long, default_value_t = 10_000)]
    initial: i64,

    /// Connection URL, e.g. memberdb://sa:@localhost/bank
    #[arg(long)]
    url: Option<String>,

    /// Pool size
    #[arg(long, default_value_t = 4)]
    max_connections: usize,

    /// Row lock wait in milliseconds
    #[arg(long, default_value_t = 1000)]
    lock_timeout_ms: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report {
    outcome: TransactionOutcome,
    error: Option<String>,
    members: Vec<Member>,
    pool: PoolStats,
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = match &cli.url {
        Some(url) => ConnectionConfig::from_url(url).map_err(|err| anyhow!(err))?,
        None => ConnectionConfig::default(),
    }
    .max_connections(cli.max_connections)
    .lock_timeout(Duration::from_millis(cli.lock_timeout_ms));

    let db = Database::with_credentials(&config.username, &config.password);
    let repository = MemberRepository::default();
    repository.migrate(&db).context("creating member table")?;

    let pool = Arc::new(ConnectionPool::new(db, config).context("building connection pool")?);
    let service = MemberService::new(TransactionCoordinator::new(Arc::clone(&pool)), repository);

    for id in [&cli.from, &cli.to] {
        service
            .create(id, cli.initial)
            .await
            .with_context(|| format!("seeding member {}", id))?;
    }

    let (outcome, error) = match service.transfer(&cli.from, &cli.to, cli.amount).await {
        Ok(outcome) => (outcome, None),
        Err(err) => {
            tracing::warn!(error = %err, "transfer failed");
            (TransactionOutcome::RolledBack, Some(err.to_string()))
        }
    };

    let report = Report {
        outcome,
        error,
        members: service.members().await.context("reading balances")?,
        pool: pool.stats(),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Transfer {} -> {} of {}: {:?}", cli.from, cli.to, cli.amount, report.outcome);
        if let Some(error) = &report.error {
            println!("  reason: {}", error);
        }
        for member in &report.members {
            println!("  {:<8} {:>10}", member.id, member.amount);
        }
        println!("{}", report.pool);
    }

    Ok(())
}
