use causal_kvs::config::{NodeConfig, LISTEN_PORT};
use causal_kvs::{gossip, http, observability, Node};
use tokio::net::TcpListener;
use tracing::info;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::init_tracing();

    let config = NodeConfig::from_env()?;
    let node = Node::new(&config);
    info!(address = %config.address, view = %config.view, repl_factor = config.repl_factor, "node starting");

    gossip::spawn(node.clone(), config.gossip_interval);

    let app = http::router(node);
    let listener = TcpListener::bind(("0.0.0.0", LISTEN_PORT)).await?;
    info!(port = LISTEN_PORT, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
