use postforge_core::{
    Event, HistoryQuery, ModelPricing, RelationalBackend, StorageConfig, Trace, UniversalState,
};
use serde_json::json;

fn open_state() -> (tempfile::TempDir, UniversalState) {
    let dir = tempfile::tempdir().unwrap();
    let state = UniversalState::open(&StorageConfig::under(dir.path())).unwrap();
    (dir, state)
}

#[test]
fn trace_details_preserve_parent_child_linkage() {
    let (_dir, state) = open_state();
    state.log_trace(&Trace::with_id("T1", "linkedin_post")).unwrap();

    let mut first = Event::with_id("E1", "T1", "span");
    first.name = Some("generate_brief".to_string());
    first.created_at = 1_000;
    state.log_event(&first).unwrap();

    let mut second = Event::with_id("E2", "T1", "generation");
    second.name = Some("draft_caption".to_string());
    second.parent_id = Some("E1".to_string());
    second.created_at = 2_000;
    state.log_event(&second).unwrap();

    let details = state.get_trace_details("T1").unwrap().unwrap();
    assert_eq!(details.trace.id, "T1");
    assert_eq!(details.events.len(), 2);
    assert_eq!(details.events[0].id, "E1");
    assert_eq!(details.events[1].parent_id.as_deref(), Some("E1"));
    let children: Vec<&str> = details.children_of("E1").map(|e| e.id.as_str()).collect();
    assert_eq!(children, vec!["E2"]);

    assert!(state.get_trace_details("missing").unwrap().is_none());
}

#[test]
fn event_cost_uses_model_pricing_per_thousand_tokens() {
    let (_dir, state) = open_state();
    state
        .upsert_model_pricing(&ModelPricing::usd("gpt-4o-mini", 0.0002, 0.0004))
        .unwrap();
    state.log_trace(&Trace::with_id("T1", "pricing")).unwrap();

    let mut event = Event::with_id("E1", "T1", "generation");
    event.model = Some("gpt-4o-mini".to_string());
    event.tokens_input = Some(1000);
    event.tokens_output = Some(500);
    let logged = state.log_event(&event).unwrap();

    let expected = 0.0002 * 1.0 + 0.0004 * 0.5;
    assert!((logged.cost_total.unwrap() - expected).abs() < 1e-12);
    assert!((logged.cost_total.unwrap() - 0.0004).abs() < 1e-12);
    assert_eq!(logged.tokens_total, Some(1500));

    let trace = state.get_trace_details("T1").unwrap().unwrap().trace;
    assert_eq!(trace.tokens_input_total, 1000);
    assert_eq!(trace.tokens_output_total, 500);
    assert_eq!(trace.tokens_total, 1500);
    assert!((trace.cost_total.unwrap() - 0.0004).abs() < 1e-12);
}

#[test]
fn unknown_model_yields_null_cost() {
    let (_dir, state) = open_state();
    state.log_trace(&Trace::with_id("T1", "unpriced")).unwrap();

    let mut event = Event::with_id("E1", "T1", "generation");
    event.model = Some("mystery-model".to_string());
    event.tokens_input = Some(10);
    let logged = state.log_event(&event).unwrap();

    assert_eq!(logged.cost_input, None);
    assert_eq!(logged.cost_output, None);
    assert_eq!(logged.cost_total, None);
    let trace = state.get_trace_details("T1").unwrap().unwrap().trace;
    assert_eq!(trace.cost_total, None);
    assert_eq!(trace.tokens_input_total, 10);
}

#[test]
fn history_is_newest_first_and_filterable() {
    let (_dir, state) = open_state();
    for (id, created_at, user) in [("T1", 10, "u1"), ("T2", 20, "u2"), ("T3", 30, "u1")] {
        let mut trace = Trace::with_id(id, "post");
        trace.created_at = created_at;
        trace.user_id = Some(user.to_string());
        trace.tags = vec!["linkedin".to_string()];
        trace.metadata = Some(json!({"campaign": "launch"}));
        state.log_trace(&trace).unwrap();
    }

    let recent = state.query_history(&HistoryQuery::recent(2)).unwrap();
    let ids: Vec<&str> = recent.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["T3", "T2"]);
    assert_eq!(recent[0].tags, vec!["linkedin".to_string()]);
    assert_eq!(recent[0].metadata, Some(json!({"campaign": "launch"})));

    let for_user = state
        .query_history(&HistoryQuery {
            user_id: Some("u1".to_string()),
            ..HistoryQuery::default()
        })
        .unwrap();
    assert_eq!(for_user.len(), 2);
}

#[test]
fn prompt_history_returns_named_events_newest_first() {
    let (_dir, state) = open_state();
    state.log_trace(&Trace::with_id("T1", "post")).unwrap();
    for (id, created_at) in [("E1", 1), ("E2", 2), ("E3", 3)] {
        let mut event = Event::with_id(id, "T1", "generation");
        event.name = Some("caption_prompt".to_string());
        event.input_text = Some(format!("prompt {id}"));
        event.created_at = created_at;
        state.log_event(&event).unwrap();
    }
    let mut other = Event::with_id("E4", "T1", "generation");
    other.name = Some("hashtag_prompt".to_string());
    state.log_event(&other).unwrap();

    let history = state.get_prompt_history("caption_prompt", 2).unwrap();
    let ids: Vec<&str> = history.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["E3", "E2"]);
    assert_eq!(history[0].input_text.as_deref(), Some("prompt E3"));
}

#[test]
fn deleting_trace_cascades_to_events() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RelationalBackend::open(dir.path().join("state.sqlite3")).unwrap();
    backend.log_trace(&Trace::with_id("T1", "post")).unwrap();
    let mut event = Event::with_id("E1", "T1", "span");
    event.name = Some("caption_prompt".to_string());
    backend.log_event(&event).unwrap();
    assert_eq!(backend.get_prompt_history("caption_prompt", 10).unwrap().len(), 1);

    assert!(backend.delete_trace("T1").unwrap());
    assert!(backend.get_trace_details("T1").unwrap().is_none());
    assert!(backend.get_prompt_history("caption_prompt", 10).unwrap().is_empty());
    assert!(!backend.delete_trace("T1").unwrap());
}

#[test]
fn event_for_unknown_trace_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let backend = RelationalBackend::open(dir.path().join("state.sqlite3")).unwrap();
    assert!(backend.log_event(&Event::with_id("E1", "missing", "span")).is_err());
}

#[test]
fn deleting_parent_event_orphans_children_and_refreshes_totals() {
    let (_dir, state) = open_state();
    state.log_trace(&Trace::with_id("T1", "post")).unwrap();

    let mut parent = Event::with_id("E1", "T1", "span");
    parent.created_at = 1;
    parent.tokens_input = Some(100);
    state.log_event(&parent).unwrap();

    let mut child = Event::with_id("E2", "T1", "generation");
    child.created_at = 2;
    child.parent_id = Some("E1".to_string());
    child.tokens_input = Some(40);
    state.log_event(&child).unwrap();

    assert!(state.delete_event("E1").unwrap());
    assert!(!state.delete_event("E1").unwrap());

    let details = state.get_trace_details("T1").unwrap().unwrap();
    assert_eq!(details.events.len(), 1);
    assert_eq!(details.events[0].id, "E2");
    assert_eq!(details.events[0].parent_id, None);
    assert_eq!(details.trace.tokens_input_total, 40);
}
