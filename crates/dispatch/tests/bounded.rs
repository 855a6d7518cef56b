// ABOUTME: Integration tests for BoundedDispatcher ordered fallback.
// ABOUTME: Covers timeouts with cooperative cancel, fault isolation, exhaustion, inline mode and by-id dispatch.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use strata_dispatch::{
    AttemptOutcome, AttemptRecord, BoundedDispatcher, CancelToken, DispatchResult, Document,
    EmptyReason, Extraction, FnStrategy, Job, ParseTimeout, PoolOptions, PreferenceModel,
    PreferenceSource, Strategy, StrategyDecl, StrategyRegistry, WorkerPool,
};

fn pool() -> WorkerPool {
    WorkerPool::new(PoolOptions {
        min_workers: 2,
        max_workers: 4,
        queue_capacity: 16,
        keep_alive: Duration::from_secs(1),
        thread_prefix: "Bounded-Test".to_string(),
        daemon: true,
    })
    .unwrap()
}

fn prefs(content_type: &str, ids: &[&str]) -> Arc<PreferenceModel> {
    let mut source = PreferenceSource::default();
    source.push(
        content_type,
        ids.iter().map(|id| StrategyDecl::new(*id)).collect(),
    );
    Arc::new(PreferenceModel::build(&source))
}

fn doc() -> Document {
    Document::new("https://example.com/item/1", "text/html", "<html></html>")
}

fn text(id: &'static str, body: &'static str) -> FnStrategy {
    FnStrategy::new(id, move |d, _| {
        Ok(Some(Extraction::new(d.url.clone()).with_text(body)))
    })
}

fn empty(id: &'static str) -> FnStrategy {
    FnStrategy::new(id, |_, _| Ok(None))
}

fn dispatcher(
    prefs: Arc<PreferenceModel>,
    registry: StrategyRegistry,
    timeout: ParseTimeout,
) -> BoundedDispatcher {
    BoundedDispatcher::new(prefs, Arc::new(registry), pool(), timeout)
}

#[test]
fn first_non_empty_result_wins() {
    let mut registry = StrategyRegistry::new();
    registry.register(empty("a"));
    registry.register(text("b", "from b"));
    registry.register(text("c", "from c"));

    let d = dispatcher(
        prefs("text/html", &["a", "b", "c"]),
        registry,
        ParseTimeout::default(),
    );
    let result = d.dispatch(&doc(), "text/html");

    assert_eq!(result.strategy(), Some("b"));
    assert_eq!(result.payload().unwrap().text, "from b");
}

#[test]
fn slow_strategy_times_out_and_is_cancelled_once() {
    let seen: Arc<Mutex<Option<CancelToken>>> = Arc::new(Mutex::new(None));
    let seen_in_strategy = Arc::clone(&seen);

    let mut registry = StrategyRegistry::new();
    registry.register(FnStrategy::new("s1", move |d, cancel| {
        *seen_in_strategy.lock() = Some(cancel.clone());
        for _ in 0..200 {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            thread::sleep(Duration::from_millis(10));
        }
        Ok(Some(Extraction::new(d.url.clone()).with_text("too late")))
    }));
    registry.register(text("s2", "fast"));

    let d = dispatcher(
        prefs("text/html", &["s1", "s2"]),
        registry,
        ParseTimeout::Bounded(Duration::from_millis(200)),
    );
    let result = d.dispatch(&doc(), "text/html");

    assert_eq!(result.strategy(), Some("s2"));
    assert_eq!(result.payload().unwrap().text, "fast");

    let token = seen.lock().clone().expect("s1 never ran");
    assert!(token.is_cancelled());
    assert_eq!(token.cancel_requests(), 1);
}

#[test]
fn exhaustion_reports_every_attempt_in_order() {
    let mut registry = StrategyRegistry::new();
    registry.register(empty("a"));
    registry.register(FnStrategy::new("boom", |_, _| anyhow::bail!("bad markup")));
    registry.register(FnStrategy::new("panics", |_, _| panic!("index out of range")));
    registry.register(FnStrategy::new("blank", |d, _| {
        Ok(Some(Extraction::new(d.url.clone())))
    }));

    let d = dispatcher(
        prefs("text/html", &["a", "missing", "boom", "panics", "blank"]),
        registry,
        ParseTimeout::default(),
    );
    let result = d.dispatch(&doc(), "text/html");

    let DispatchResult::EmptyFailure { reason, attempts } = result else {
        panic!("expected empty failure, got {:?}", result);
    };
    assert_eq!(reason, EmptyReason::AllStrategiesExhausted);
    assert_eq!(reason.to_string(), "no strategy succeeded");

    let ids: Vec<&str> = attempts.iter().map(|a| a.strategy.as_str()).collect();
    assert_eq!(ids, vec!["a", "missing", "boom", "panics", "blank"]);
    assert_eq!(attempts[0].outcome, AttemptOutcome::Empty);
    assert_eq!(attempts[1].outcome, AttemptOutcome::Unregistered);
    assert!(matches!(&attempts[2].outcome, AttemptOutcome::Fault(msg) if msg.contains("bad markup")));
    assert!(matches!(&attempts[3].outcome, AttemptOutcome::Fault(msg) if msg.contains("index out of range")));
    assert_eq!(attempts[4].outcome, AttemptOutcome::Empty);
}

#[test]
fn fault_does_not_stop_later_strategies() {
    let mut registry = StrategyRegistry::new();
    registry.register(FnStrategy::new("broken", |_, _| panic!("kaboom")));
    registry.register(text("ok", "survived"));

    let d = dispatcher(
        prefs("text/html", &["broken", "ok"]),
        registry,
        ParseTimeout::default(),
    );
    let result = d.dispatch(&doc(), "text/html");
    assert_eq!(result.strategy(), Some("ok"));
    assert_eq!(d.pool().stats().live_workers, 2);
}

#[test]
fn unknown_content_type_has_no_strategy() {
    let mut registry = StrategyRegistry::new();
    registry.register(text("a", "x"));

    let d = dispatcher(prefs("text/html", &["a"]), registry, ParseTimeout::default());
    let result = d.dispatch(&doc(), "application/pdf");

    assert_eq!(
        result,
        DispatchResult::empty(EmptyReason::NoStrategyConfigured, Vec::new())
    );
    let err = result.into_result("https://example.com/item/1").unwrap_err();
    assert!(err.is_empty_failure());
}

#[test]
fn document_content_type_is_normalized() {
    let mut registry = StrategyRegistry::new();
    registry.register(text("a", "hit"));

    let d = dispatcher(prefs("text/html", &["a"]), registry, ParseTimeout::default());
    let document = Document::new("https://example.com/", "Text/HTML; charset=utf-8", "x");
    let result = d.dispatch_document(&document);
    assert_eq!(result.strategy(), Some("a"));
}

#[test]
fn disabled_timeout_runs_inline_on_caller_thread() {
    let mut registry = StrategyRegistry::new();
    registry.register(FnStrategy::new("where", |d, _| {
        let name = thread::current().name().unwrap_or_default().to_string();
        Ok(Some(Extraction::new(d.url.clone()).with_text(name)))
    }));
    registry.register(FnStrategy::new("panics", |_, _| panic!("inline panic")));

    let d = dispatcher(
        prefs("text/html", &["panics", "where"]),
        registry,
        ParseTimeout::from_secs(-1),
    );
    let result = d.dispatch(&doc(), "text/html");

    let payload = result.payload().unwrap();
    assert!(!payload.text.starts_with("Bounded-Test-Thread-"));
    assert_eq!(d.pool().stats().completed, 0);
}

#[test]
fn dispatch_by_id_reports_timeout_and_unknown_id() {
    let mut registry = StrategyRegistry::new();
    registry.register(FnStrategy::new("slow", |_, cancel| {
        while !cancel.is_cancelled() {
            thread::sleep(Duration::from_millis(5));
        }
        Ok(None)
    }));
    registry.register(text("fast", "quick"));

    let d = dispatcher(
        prefs("text/html", &["fast"]),
        registry,
        ParseTimeout::Bounded(Duration::from_millis(50)),
    );

    assert_eq!(
        d.dispatch_by_id("slow", &doc()),
        DispatchResult::Timeout {
            strategy: "slow".to_string()
        }
    );
    assert_eq!(d.dispatch_by_id("fast", &doc()).strategy(), Some("fast"));
    assert_eq!(
        d.dispatch_by_id("nope", &doc()),
        DispatchResult::empty(EmptyReason::NoStrategyConfigured, Vec::new())
    );
}

#[test]
fn dispatch_by_id_reports_rejection_when_saturated() {
    let pool = WorkerPool::new(PoolOptions {
        min_workers: 1,
        max_workers: 1,
        queue_capacity: 1,
        keep_alive: Duration::from_secs(1),
        thread_prefix: "Saturated-Test".to_string(),
        daemon: true,
    })
    .unwrap();

    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
    let blocker: Arc<dyn Strategy> =
        Arc::new(FnStrategy::new("blocker", move |_, _| {
            let _ = started_tx.send(());
            let _ = release_rx.recv();
            Ok(None)
        }));

    let document = Arc::new(doc());
    let running = pool
        .submit(Job::new(Arc::clone(&document), Arc::clone(&blocker)))
        .unwrap();
    started_rx.recv().unwrap();
    let queued = pool
        .submit(Job::new(Arc::clone(&document), Arc::new(empty("filler"))))
        .unwrap();

    let mut registry = StrategyRegistry::new();
    registry.register(text("a", "x"));
    let d = BoundedDispatcher::new(
        prefs("text/html", &["a"]),
        Arc::new(registry),
        pool.clone(),
        ParseTimeout::default(),
    );

    assert_eq!(
        d.dispatch_by_id("a", &doc()),
        DispatchResult::Rejected {
            strategy: "a".to_string()
        }
    );
    let fallback = d.dispatch(&doc(), "text/html");
    assert_eq!(
        fallback.attempts(),
        &[AttemptRecord {
            strategy: "a".to_string(),
            outcome: AttemptOutcome::Rejected,
        }]
    );

    release_tx.send(()).unwrap();
    assert!(running.wait().unwrap().is_none());
    assert!(queued.wait().unwrap().is_none());
    assert_eq!(pool.stats().rejected, 2);
}

#[test]
fn dispatch_by_id_on_shut_down_pool_is_rejected() {
    let mut registry = StrategyRegistry::new();
    registry.register(text("a", "x"));
    let d = dispatcher(prefs("text/html", &["a"]), registry, ParseTimeout::default());
    d.pool().shutdown();

    assert_eq!(
        d.dispatch_by_id("a", &doc()),
        DispatchResult::Rejected {
            strategy: "a".to_string()
        }
    );
}

#[test]
fn result_serializes_with_status_tag() {
    let result = DispatchResult::Success {
        strategy: "a".to_string(),
        payload: Extraction::new("u").with_title("T"),
    };
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["strategy"], "a");
    assert_eq!(json["payload"]["title"], "T");
}
