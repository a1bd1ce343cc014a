use crate::node::Node;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Spawns the background anti-entropy task. One task per node, ticking on a
/// fixed interval, exactly mirroring the teacher's `TtlManagerActor`:
/// a lone loop over `tokio::time::interval` with no external signalling.
pub fn spawn(node: Node, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            debug!("gossip tick");
            node.gossip_round().await;
        }
    })
}
