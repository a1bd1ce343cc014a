use causal_kvs::config::NodeConfig;
use causal_kvs::wire::{GetRequest, PutRequest};
use causal_kvs::{context::CausalContext, Node};

fn single_node(addr: &str) -> Node {
    let config = NodeConfig::new(addr, 1, addr);
    Node::new(&config)
}

fn two_node_shard(addr_a: &str, addr_b: &str) -> (Node, Node) {
    let view = format!("{addr_a},{addr_b}");
    let cfg_a = NodeConfig::new(&view, 2, addr_a);
    let cfg_b = NodeConfig::new(&view, 2, addr_b);
    (Node::new(&cfg_a), Node::new(&cfg_b))
}

#[tokio::test]
async fn read_your_writes_on_a_single_node() {
    let node = single_node("n1:8000");

    let put_req = PutRequest { value: Some("1".to_string()), causal_context: CausalContext::default() };
    let (_, put_resp) = node.put("alpha", put_req).await.unwrap();
    assert!(!put_resp.replaced);

    let get_req = GetRequest { causal_context: put_resp.causal_context };
    let (_, get_resp) = node.get("alpha", get_req).await.unwrap();
    assert!(get_resp.does_exist);
    assert_eq!(get_resp.value.as_deref(), Some("1"));
}

#[tokio::test]
async fn second_put_reports_replaced() {
    let node = single_node("n1:8000");
    let ctx = CausalContext::default();
    let (_, first) = node
        .put("alpha", PutRequest { value: Some("1".to_string()), causal_context: ctx })
        .await
        .unwrap();
    let (_, second) = node
        .put("alpha", PutRequest { value: Some("2".to_string()), causal_context: first.causal_context })
        .await
        .unwrap();
    assert!(second.replaced);
}

#[tokio::test]
async fn key_too_long_is_rejected() {
    let node = single_node("n1:8000");
    let key = "x".repeat(51);
    let result = node
        .put(&key, PutRequest { value: Some("1".to_string()), causal_context: CausalContext::default() })
        .await;
    assert!(matches!(result, Err(causal_kvs::error::NodeError::KeyTooLong(_))));
}

#[tokio::test]
async fn missing_value_is_rejected() {
    let node = single_node("n1:8000");
    let result = node
        .put("alpha", PutRequest { value: None, causal_context: CausalContext::default() })
        .await;
    assert!(matches!(result, Err(causal_kvs::error::NodeError::MissingValue(_))));
}

#[tokio::test]
async fn get_with_unsatisfiable_context_is_nacked() {
    let (a, b) = two_node_shard("n1:8000", "n2:8001");

    let (_, put_resp) = a
        .put("alpha", PutRequest { value: Some("1".to_string()), causal_context: CausalContext::default() })
        .await
        .unwrap();

    // b hasn't gossiped with a yet, so it cannot satisfy a's context.
    let result = b.get("alpha", GetRequest { causal_context: put_resp.causal_context }).await;
    assert!(matches!(result, Err(causal_kvs::error::NodeError::Nack)));
}

#[tokio::test]
async fn gossip_converges_writes_across_replicas() {
    let (a, b) = two_node_shard("n1:8000", "n2:8001");

    let (_, put_resp) = a
        .put("alpha", PutRequest { value: Some("1".to_string()), causal_context: CausalContext::default() })
        .await
        .unwrap();

    // Simulate one gossip round without going over HTTP: a pushes its
    // delta to b, b replies with its own (empty) delta.
    let delta = a.outbound_delta();
    let ack = b.gossip_ack(delta).expect("b is in a's shard");
    a.merge_gossip(&ack);

    let (_, get_resp) = b
        .get("alpha", GetRequest { causal_context: put_resp.causal_context })
        .await
        .unwrap();
    assert!(get_resp.does_exist);
    assert_eq!(get_resp.value.as_deref(), Some("1"));
}

#[tokio::test]
async fn get_on_nonexistent_key_reports_not_found() {
    let node = single_node("n1:8000");
    let (_, resp) = node.get("missing", GetRequest::default()).await.unwrap();
    assert!(!resp.does_exist);
}

#[tokio::test]
async fn view_change_invalidates_stale_client_context() {
    let node = single_node("n1:8000");
    let (_, put_resp) = node
        .put("alpha", PutRequest { value: Some("1".to_string()), causal_context: CausalContext::default() })
        .await
        .unwrap();
    assert_eq!(put_resp.causal_context.current_view, Some(0));

    // A reshard onto the same single-node view still bumps current_view.
    node.set_new_view("n1:8000".to_string(), 1, 1);

    let (_, get_resp) = node
        .get("alpha", GetRequest { causal_context: put_resp.causal_context })
        .await
        .unwrap();
    assert_eq!(get_resp.causal_context.current_view, Some(1));
}

#[tokio::test]
async fn reshard_fragments_keys_by_new_shard_count() {
    let node = single_node("n1:8000");
    node.put("a", PutRequest { value: Some("1".to_string()), causal_context: CausalContext::default() })
        .await
        .unwrap();
    node.put("b", PutRequest { value: Some("2".to_string()), causal_context: CausalContext::default() })
        .await
        .unwrap();
    assert_eq!(node.key_count(), 2);

    node.set_new_view("n1:8000,n2:8001".to_string(), 1, 1);
    node.rehash();
    // All keys were drained into per-shard fragments; none remain local
    // until the fragment destined for this node's own new shard is merged
    // back in by `distribute_fragments`.
    assert_eq!(node.key_count(), 0);
}
