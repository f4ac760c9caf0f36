use cluster_cache::ClusterCache;
use cluster_cache::config::{CacheConfig, Command};
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} --app <name> --coordinator", args[0]);
        eprintln!("       {} --app <name> [--name <participant>] set <key> <value>", args[0]);
        eprintln!("       {} --app <name> [--name <participant>] get <key>", args[0]);
        eprintln!("Options: --socket-root <dir> --timeout-ms <ms> --silent");
        std::process::exit(1);
    }

    let (config, command) = CacheConfig::from_args(&args[1..])?;

    tracing_subscriber::fmt()
        .with_max_level(if config.silent {
            tracing::Level::WARN
        } else {
            tracing::Level::INFO
        })
        .init();

    let cache = ClusterCache::start(config).await?;

    match command {
        Command::Serve => serve(cache).await?,
        Command::Set { key, value } => {
            cache.set(&key, value).await?;
            println!("OK");
        }
        Command::Get { key } => match cache.get(&key).await {
            Ok(value) => println!("{}", value),
            Err(e) if e.is_no_such_key() => println!("(nil)"),
            Err(e) => return Err(e.into()),
        },
    }

    Ok(())
}

async fn serve(cache: ClusterCache) -> anyhow::Result<()> {
    if let (Some(store), Some(server)) = (cache.store().cloned(), cache.server().cloned()) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));

            loop {
                interval.tick().await;
                tracing::info!(
                    "Cache stats: {} entries in {} buckets, {} participant(s) connected",
                    store.len(),
                    store.occupied_buckets(),
                    server.connection_count()
                );
            }
        });
    }

    tracing::info!("Press Ctrl+C to shutdown");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    Ok(())
}
