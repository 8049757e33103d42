use std::{
    net::SocketAddr,
    sync::Arc,
    thread,
    time::{Duration, Instant, SystemTime},
};

use providers::{
    address_book::MemoryAddressBook,
    codec::{encode_timestamp, record_key},
    datastore::{Datastore, MemoryDatastore},
    Bytes, Config, PeerId, ProviderInfo, ProviderManager,
};

use clap::Parser;

use tracing::Level;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Content key to provide
    key: String,
    /// Number of providers to add
    #[arg(short, long, default_value_t = 5)]
    providers: u16,
    /// Number of already expired providers to seed the datastore with
    #[arg(short, long, default_value_t = 3)]
    expired: u16,
    /// Milliseconds between garbage collection rounds
    #[arg(short, long, default_value_t = 500)]
    cleanup_interval: u64,
}

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    let cli = Cli::parse();
    let key = cli.key.as_bytes();

    let store = Arc::new(MemoryDatastore::new());

    let expired_at = SystemTime::now() - Duration::from_secs(49 * 60 * 60);
    for _ in 0..cli.expired {
        store
            .put(
                &record_key(key, &PeerId::random()),
                Bytes::from(encode_timestamp(expired_at)),
            )
            .expect("seeding the datastore failed");
    }

    let manager = ProviderManager::new(
        PeerId::random(),
        Arc::new(MemoryAddressBook::new()),
        store.clone(),
        Config::default().with_cleanup_interval(Duration::from_millis(cli.cleanup_interval)),
    )
    .expect("failed to start the provider manager");

    println!("\nAdding {} providers for {:?} ...\n", cli.providers, cli.key);

    let start = Instant::now();
    for port in 0..cli.providers {
        let address = SocketAddr::from(([127, 0, 0, 1], 4000 + port));

        manager
            .add_provider(key, ProviderInfo::new(PeerId::random(), vec![address]))
            .expect("add_provider failed");
    }
    println!("Added providers in {:?}", start.elapsed());

    let start = Instant::now();
    let providers = manager.get_providers(key).expect("get_providers failed");
    println!("Got {} providers in {:?}", providers.len(), start.elapsed());

    for provider in &providers {
        println!("  {} {:?}", provider.peer_id, provider.addrs);
    }

    // Let at least one garbage collection round go by.
    thread::sleep(Duration::from_millis(cli.cleanup_interval * 3));

    manager.close().expect("close failed");

    println!("\n{} records left in the datastore", store.len());
}
