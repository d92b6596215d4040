use clap::Parser;
use karmapi_engine::cli::{Cli, Commands, Session};
use karmapi_engine::config::Config;
use karmapi_engine::engine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    let _telemetry = karmapi_engine::telemetry::init_telemetry(&config.telemetry)?;
    tracing::info!(
        cluster = %config.network.cluster(),
        mode = ?config.execution.mode,
        "karmapi starting"
    );

    let session = Session::new(config, cli.json)?;
    match &cli.command {
        Commands::Markets(args) => args.execute(&session).await?,
        Commands::Market(args) => args.execute(&session).await?,
        Commands::Position(args) => args.execute(&session).await?,
        Commands::Quote(args) => args.execute(&session).await?,
        Commands::Derive(args) => args.execute(&session)?,
        Commands::Status => {
            let report = engine::probe(session.ledger.as_ref(), session.config.network.cluster()).await;
            session.emit(&report, |r| {
                println!("karmapi status");
                println!("  Cluster:  {}", r.cluster);
                println!("  Healthy:  {}", r.healthy);
                println!("  Latency:  {} ms", r.latency_ms);
                if let Some(error) = &r.error {
                    println!("  Error:    {error}");
                }
            })?;
        }
        Commands::Config => {
            let c = &session.config;
            println!("Current configuration:");
            println!("  Cluster:   {}", c.network.cluster());
            println!("  RPC:       {}", c.network.rpc_url());
            println!("  Program:   {}", c.network.program_id);
            println!("  Execution: {:?}", c.execution.mode);
            println!(
                "  Retry:     {} attempts, {}-{} ms",
                c.retry.max_attempts, c.retry.initial_delay_ms, c.retry.max_delay_ms
            );
            println!("  Cache:     {} s stale time", c.cache.stale_time_secs);
        }
    }

    Ok(())
}
