//! Structured logging setup and span helpers, in the teacher's style
//! (`observability_noop::init_tracing`) but honoring `RUST_LOG` via
//! `EnvFilter` rather than a hardcoded level, since this node has no
//! Datadog-gated variant to fall back from.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub mod spans {
    use tracing::Span;

    pub fn handler_span(method: &str, key: &str) -> Span {
        tracing::info_span!("handler", method, key)
    }

    pub fn gossip_span(peer: &str) -> Span {
        tracing::debug_span!("gossip", peer)
    }

    pub fn reshard_span(phase: &str) -> Span {
        tracing::info_span!("reshard", phase)
    }
}
