//! End-to-end scenarios against an in-memory engine.

use std::sync::Arc;

use shirokuma::config::EngineConfig;
use shirokuma::engine::{CreateItemParams, Engine, UpdateItemParams};
use shirokuma::enrich::LocalEnricher;
use shirokuma::error::Error;
use shirokuma::model::BaseType;
use shirokuma::storage::ListFilter;
use shirokuma::tools;

fn engine() -> Engine {
    Engine::open_memory(EngineConfig::default(), Arc::new(LocalEnricher::new())).unwrap()
}

fn create(engine: &Engine, item_type: &str, title: &str, content: Option<&str>) -> i64 {
    engine
        .create_item(&CreateItemParams {
            item_type: item_type.to_string(),
            title: title.to_string(),
            content: content.map(ToString::to_string),
            ..Default::default()
        })
        .unwrap()
        .item
        .id
}

// ── S1: create-then-get ───────────────────────────────────────

#[test]
fn s1_create_then_get() {
    let engine = engine();
    let created = engine
        .create_item(&CreateItemParams {
            item_type: "issues".to_string(),
            title: "Login broken".to_string(),
            content: Some("POST /login 500".to_string()),
            tags: vec!["bug".to_string(), "auth".to_string()],
            priority: Some("HIGH".to_string()),
            ..Default::default()
        })
        .unwrap();

    assert!(created.item.id > 0);
    assert_eq!(created.status, "Open");
    assert_eq!(created.item.priority.as_str(), "HIGH");

    let tag_set: std::collections::BTreeSet<&str> =
        created.tags.iter().map(String::as_str).collect();
    assert_eq!(tag_set, ["auth", "bug"].into_iter().collect());

    // content has >= 3 tokens, so keywords are non-empty
    assert!(!created.keywords.is_empty());

    // Property 1: get returns the written fields
    let fetched = engine.get_item(created.item.id).unwrap();
    assert_eq!(fetched.item.title, created.item.title);
    assert_eq!(fetched.item.content, created.item.content);
    assert_eq!(fetched.item.priority, created.item.priority);
    assert_eq!(fetched.tags, created.tags);
}

// ── S2: structured search ─────────────────────────────────────

#[test]
fn s2_structured_search() {
    let engine = engine();
    let issue = engine
        .create_item(&CreateItemParams {
            item_type: "issues".to_string(),
            title: "Login broken".to_string(),
            content: Some("POST /login 500".to_string()),
            tags: vec!["bug".to_string(), "auth".to_string()],
            priority: Some("HIGH".to_string()),
            ..Default::default()
        })
        .unwrap()
        .item
        .id;
    create(&engine, "docs", "API guide", Some("auth flow"));

    let results = engine
        .search_items("status:Open type:issues bug", None, None, None)
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, issue);
}

// ── S3: is:open vs is:closed ──────────────────────────────────

#[test]
fn s3_is_open_vs_closed() {
    let engine = engine();
    let id = create(&engine, "issues", "Login broken", Some("POST /login 500"));

    assert!(
        engine
            .search_items("is:closed", None, None, None)
            .unwrap()
            .is_empty()
    );

    engine
        .update_item(
            id,
            &UpdateItemParams {
                status: Some("Closed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    let closed = engine.search_items("is:closed", None, None, None).unwrap();
    assert_eq!(closed.iter().map(|r| r.id).collect::<Vec<_>>(), vec![id]);
}

// ── S4: bidirectional relations ───────────────────────────────

#[test]
fn s4_bidirectional_relations() {
    let engine = engine();
    let a = create(&engine, "issues", "A", None);
    let b = create(&engine, "issues", "B", None);
    let c = create(&engine, "issues", "C", None);

    engine.add_relations(a, &[b, c]).unwrap();

    // Property 3: both directions visible
    assert!(engine.get_item(b).unwrap().related.contains(&a));
    assert!(engine.get_item(c).unwrap().related.contains(&a));

    engine.delete_item(a).unwrap();

    // Property 4: nothing still points at the deleted item
    assert!(!engine.get_item(b).unwrap().related.contains(&a));
    assert!(matches!(engine.get_item(a), Err(Error::NotFound { .. })));
    assert!(
        engine
            .search_items("status:Open A", None, None, None)
            .unwrap()
            .iter()
            .all(|r| r.id != a)
    );
}

// ── S5: type change preserves id and relations ────────────────

#[test]
fn s5_change_item_type_preserves_id_and_relations() {
    let engine = engine();
    let id = create(&engine, "issues", "Movable", None);
    let other = create(&engine, "issues", "Other", None);
    engine.add_relations(id, &[other]).unwrap();

    engine.create_type("bugs", BaseType::Tasks, None).unwrap();
    let moved = engine.change_item_type(id, "bugs", false).unwrap();

    assert_eq!(moved.item.id, id);
    assert_eq!(moved.item.item_type, "bugs");
    assert_eq!(moved.related, vec![other]);

    // Property 8: cross-base moves are rejected
    assert!(matches!(
        engine.change_item_type(id, "docs", false),
        Err(Error::Validation(_))
    ));
}

// ── S6: current-state singleton ───────────────────────────────

#[test]
fn s6_current_state_singleton() {
    let engine = engine();

    let fresh = engine.get_current_state().unwrap();
    assert!(fresh.content.is_empty());
    assert!(fresh.related.is_empty());

    engine
        .update_current_state("phase A", None, None, None)
        .unwrap();
    assert_eq!(engine.get_current_state().unwrap().content, "phase A");

    engine
        .update_current_state("phase B", None, None, None)
        .unwrap();
    let state = engine.get_current_state().unwrap();
    assert_eq!(state.content, "phase B");
    assert!(state.updated_at > 0);
}

// ── Universal properties ──────────────────────────────────────

#[test]
fn derived_fields_are_deterministic() {
    let engine = engine();
    let params = CreateItemParams {
        item_type: "issues".to_string(),
        title: "Login broken".to_string(),
        content: Some("POST /login returns 500 when the token expires".to_string()),
        tags: vec!["bug".to_string()],
        ..Default::default()
    };

    let a = engine.create_item(&params).unwrap();
    let b = engine.create_item(&params).unwrap();

    // Property 2: same inputs, same enricher version, same outputs
    assert_eq!(a.item.search_index, b.item.search_index);
    assert_eq!(a.item.ai_summary, b.item.ai_summary);
    assert_eq!(a.keywords, b.keywords);
    assert_eq!(a.concepts, b.concepts);
}

#[test]
fn list_items_excludes_closable_statuses_by_default() {
    let engine = engine();
    create(&engine, "issues", "stays open", None);
    let done = create(&engine, "issues", "gets closed", None);
    engine
        .update_item(
            done,
            &UpdateItemParams {
                status: Some("Completed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    // Property 5: no closable status in the default listing
    let rows = engine.list_items(&ListFilter::default()).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "stays open");

    let all = engine
        .list_items(&ListFilter {
            include_closed_statuses: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn search_and_list_agree_on_status_filter() {
    let engine = engine();
    create(&engine, "issues", "first", None);
    create(&engine, "issues", "second", None);
    let closed = create(&engine, "issues", "third", None);
    engine
        .update_item(
            closed,
            &UpdateItemParams {
                status: Some("Closed".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    // Property 7: the two paths return the same id set
    let searched: std::collections::BTreeSet<i64> = engine
        .search_items("status:Open", None, None, None)
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    let listed: std::collections::BTreeSet<i64> = engine
        .list_items(&ListFilter {
            status: Some("Open".to_string()),
            ..Default::default()
        })
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();

    assert_eq!(searched, listed);
    assert_eq!(searched.len(), 2);
}

#[test]
fn deleted_item_text_disappears_from_search() {
    let engine = engine();
    let id = create(
        &engine,
        "issues",
        "Xylophone tuning",
        Some("very distinctive xylophone text"),
    );

    let hits = engine.search_items("xylophone", None, None, None).unwrap();
    assert_eq!(hits.len(), 1);

    engine.delete_item(id).unwrap();
    assert!(
        engine
            .search_items("xylophone", None, None, None)
            .unwrap()
            .is_empty()
    );
}

#[test]
fn integrity_holds_through_a_workout() {
    let engine = engine();
    let a = create(&engine, "issues", "alpha", Some("auth token expired"));
    let b = create(&engine, "issues", "beta", Some("auth timeout"));
    let c = create(&engine, "docs", "gamma", Some("auth guide"));

    engine.add_relations(a, &[b, c]).unwrap();
    engine.remove_relations(a, &[b]).unwrap();
    engine
        .update_item(
            b,
            &UpdateItemParams {
                tags: Some(vec!["auth".to_string()]),
                ..Default::default()
            },
        )
        .unwrap();
    engine.delete_item(c).unwrap();

    assert!(engine.check_integrity().unwrap().is_empty());
}

// ── Tool-surface smoke ────────────────────────────────────────

#[test]
fn tool_surface_matches_engine_behavior() {
    let engine = engine();
    let created = tools::dispatch(
        &engine,
        "create_item",
        serde_json::json!({
            "type": "issues",
            "title": "Login broken",
            "content": "POST /login 500",
            "tags": ["bug", "auth"],
            "priority": "HIGH"
        }),
    )
    .unwrap();
    let id = created["id"].as_i64().unwrap();

    let results = tools::dispatch(
        &engine,
        "search_items",
        serde_json::json!({ "query": "status:Open type:issues bug" }),
    )
    .unwrap();
    assert_eq!(results.as_array().unwrap().len(), 1);
    assert_eq!(results[0]["id"].as_i64().unwrap(), id);

    let stats = tools::dispatch(&engine, "get_stats", serde_json::json!({})).unwrap();
    assert_eq!(stats["itemsByType"]["issues"], 1);
}

#[test]
fn busy_shedding_and_queue_depth() {
    let config = EngineConfig {
        enricher_queue_depth: 0,
        ..Default::default()
    };
    let engine = Engine::open_memory(config, Arc::new(LocalEnricher::new())).unwrap();

    let err = engine
        .create_item(&CreateItemParams {
            item_type: "issues".to_string(),
            title: "x".to_string(),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, Error::Busy));

    // Reads are unaffected by the enricher gate
    assert!(engine.list_items(&ListFilter::default()).unwrap().is_empty());
}
