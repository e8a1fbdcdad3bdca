use bson::{doc, oid::ObjectId};
use medsum_db::models::{CorrectionEvent, CorrectionExplanation, SentenceMovement, WordCorrection};
use medsum_services::dao::{CorrectionEventRequest, CorrectionEventUpdate, DaoError};
use serde_json::{Value, json};

use crate::fixtures::test_app::TestApp;

fn event_body(prompt_id: &str) -> Value {
    json!({
        "jobId": "job-1",
        "modelId": "model-a",
        "promptId": prompt_id,
        "source": "editor",
        "explanations": [
            { "explanation": "drug name misheard", "explanationVersion": 1 }
        ],
        "words": [
            { "before": "asprin", "after": "aspirin", "position": 4, "confidence": 0.92 },
            { "before": "mg", "after": "milligrams" }
        ],
        "sentences": [
            { "originalLocation": "p1s3", "newLocation": "p1s1", "transformation": "moved" }
        ]
    })
}

fn request(prompt_id: &str) -> CorrectionEventRequest {
    serde_json::from_value(event_body(prompt_id)).unwrap()
}

async fn post_event(app: &TestApp, body: &Value) -> (u16, Value) {
    let resp = app.post("/corrections/events").json(body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn children(app: &TestApp, event_id: ObjectId) -> (u64, u64, u64) {
    let filter = doc! { "event_id": event_id };
    (
        app.count(CorrectionExplanation::COLLECTION, filter.clone()).await,
        app.count(WordCorrection::COLLECTION, filter.clone()).await,
        app.count(SentenceMovement::COLLECTION, filter).await,
    )
}

// ─── Ingestion ──────────────────────────────────────────────────

#[tokio::test]
async fn test_ingest_creates_event_and_children() {
    let app = TestApp::spawn().await;

    let (status, body) = post_event(&app, &event_body("p-create")).await;

    assert_eq!(status, 201);
    assert_eq!(body["created"].as_bool(), Some(true));
    let event_id = ObjectId::parse_str(body["eventId"].as_str().unwrap()).unwrap();
    assert_eq!(children(&app, event_id).await, (1, 2, 1));

    app.teardown().await;
}

#[tokio::test]
async fn test_ingest_twice_returns_same_id_and_dedups_words_only() {
    let app = TestApp::spawn().await;

    let (_, first) = post_event(&app, &event_body("p-twice")).await;
    let (status, second) = post_event(&app, &event_body("p-twice")).await;

    assert_eq!(status, 200);
    assert_eq!(first["eventId"], second["eventId"]);
    assert_eq!(second["created"].as_bool(), Some(false));
    assert_eq!(second["dedupedWords"].as_u64(), Some(2));

    let event_id = ObjectId::parse_str(first["eventId"].as_str().unwrap()).unwrap();
    assert_eq!(
        app.count(CorrectionEvent::COLLECTION, doc! { "prompt_id": "p-twice" }).await,
        1
    );
    // explanations and sentences append, word pairs do not
    assert_eq!(children(&app, event_id).await, (2, 2, 2));

    let snap = app.state.corrections.counters().snapshot();
    assert_eq!(snap.ingest_total, 1);
    assert_eq!(snap.dedup_events, 1);
    assert_eq!(snap.dedup_words, 2);
    assert_eq!(snap.failures_total, 0);

    app.teardown().await;
}

#[tokio::test]
async fn test_duplicate_word_pair_within_one_event() {
    let app = TestApp::spawn().await;
    let mut body = event_body("p-dupe-words");
    body["words"] = json!([
        { "before": "a", "after": "b" },
        { "before": "a", "after": "b" },
        { "before": "a", "after": "c" }
    ]);

    let (_, resp) = post_event(&app, &body).await;

    assert_eq!(resp["dedupedWords"].as_u64(), Some(1));
    let event_id = ObjectId::parse_str(resp["eventId"].as_str().unwrap()).unwrap();
    assert_eq!(children(&app, event_id).await.1, 2);

    app.teardown().await;
}

#[tokio::test]
async fn test_invalid_body_is_422_and_counted() {
    let app = TestApp::spawn().await;

    let (status, body) = post_event(&app, &json!({ "jobId": "j", "modelId": "m" })).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"].as_str(), Some("validation"));

    let mut blank = event_body("ignored");
    blank["promptId"] = json!("   ");
    let (status, _) = post_event(&app, &blank).await;
    assert_eq!(status, 422);

    assert_eq!(app.count(CorrectionEvent::COLLECTION, doc! {}).await, 0);
    assert_eq!(app.state.corrections.counters().snapshot().failures_total, 1);

    app.teardown().await;
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = TestApp::spawn().await;

    let resp = app
        .post("/corrections/events")
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    app.teardown().await;
}

// ─── Concurrency ────────────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_distinct_prompt_ids() {
    let app = TestApp::spawn().await;
    const N: usize = 8;

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let dao = app.state.corrections.clone();
            tokio::spawn(async move { dao.ingest(&request(&format!("p-distinct-{i}"))).await })
        })
        .collect();
    let mut ids = Vec::new();
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert!(outcome.created);
        ids.push(outcome.event_id);
    }
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), N);
    assert_eq!(app.count(CorrectionEvent::COLLECTION, doc! {}).await, N as u64);
    assert_eq!(app.state.corrections.counters().snapshot().ingest_total, N as u64);

    app.teardown().await;
}

#[tokio::test]
async fn test_concurrent_shared_prompt_id() {
    let app = TestApp::spawn().await;
    const N: usize = 8;

    let tasks: Vec<_> = (0..N)
        .map(|_| {
            let dao = app.state.corrections.clone();
            tokio::spawn(async move { dao.ingest(&request("p-shared")).await })
        })
        .collect();
    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap().unwrap());
    }

    let event_id = outcomes[0].event_id;
    assert!(outcomes.iter().all(|o| o.event_id == event_id));
    assert_eq!(outcomes.iter().filter(|o| o.created).count(), 1);
    assert_eq!(app.count(CorrectionEvent::COLLECTION, doc! {}).await, 1);

    let snap = app.state.corrections.counters().snapshot();
    assert_eq!(snap.ingest_total, 1);
    assert_eq!(snap.dedup_events, (N - 1) as u64);
    assert_eq!(snap.failures_total, 0);
    // every call carried both word pairs; only the first writer inserted them
    assert_eq!(children(&app, event_id).await, (N as u64, 2, N as u64));

    app.teardown().await;
}

// ─── Retrieval ──────────────────────────────────────────────────

#[tokio::test]
async fn test_get_event_with_children() {
    let app = TestApp::spawn().await;
    post_event(&app, &event_body("p-get")).await;

    let resp = app.get("/corrections/events/p-get").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["event"]["promptId"].as_str(), Some("p-get"));
    assert_eq!(body["event"]["source"].as_str(), Some("editor"));
    assert_eq!(body["event"]["version"].as_i64(), Some(1));
    assert_eq!(body["explanations"].as_array().unwrap().len(), 1);
    let words = body["words"].as_array().unwrap();
    assert_eq!(words[0]["before"].as_str(), Some("asprin"));
    assert_eq!(words[1]["after"].as_str(), Some("milligrams"));
    assert_eq!(body["sentences"][0]["newLocation"].as_str(), Some("p1s1"));

    let resp = app.get("/corrections/events/missing").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    app.teardown().await;
}

#[tokio::test]
async fn test_list_filters_and_orders() {
    let app = TestApp::spawn().await;
    for (prompt, job, model, at) in [
        ("l-1", "job-x", "m1", "2024-01-01T00:00:00Z"),
        ("l-2", "job-x", "m2", "2024-01-03T00:00:00Z"),
        ("l-3", "job-y", "m1", "2024-01-02T00:00:00Z"),
    ] {
        let body = json!({
            "jobId": job,
            "modelId": model,
            "promptId": prompt,
            "occurredAt": at,
        });
        let (status, _) = post_event(&app, &body).await;
        assert_eq!(status, 201);
    }

    let all: Vec<Value> = app
        .get("/corrections/events")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let order: Vec<_> = all.iter().filter_map(|e| e["promptId"].as_str()).collect();
    assert_eq!(order, vec!["l-2", "l-3", "l-1"]);

    let by_job: Vec<Value> = app
        .get("/corrections/events?jobId=job-x")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_job.len(), 2);

    let by_both: Vec<Value> = app
        .get("/corrections/events?jobId=job-x&modelId=m1")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_both.len(), 1);
    assert_eq!(by_both[0]["promptId"].as_str(), Some("l-1"));

    app.teardown().await;
}

#[tokio::test]
async fn test_list_is_capped() {
    let app = TestApp::spawn().await;
    let docs: Vec<_> = (0..205)
        .map(|i| {
            doc! {
                "job_id": "bulk",
                "model_id": "m",
                "prompt_id": format!("bulk-{i}"),
                "source": null,
                "version": 1,
                "occurred_at": bson::DateTime::now(),
            }
        })
        .collect();
    app.state
        .db
        .db
        .collection::<bson::Document>(CorrectionEvent::COLLECTION)
        .insert_many(docs)
        .await
        .unwrap();

    let list: Vec<Value> = app
        .get("/corrections/events?jobId=bulk")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 200);

    app.teardown().await;
}

// ─── Immutability ───────────────────────────────────────────────

#[tokio::test]
async fn test_prompt_id_change_is_rejected() {
    let app = TestApp::spawn().await;
    post_event(&app, &event_body("p-immutable")).await;

    let resp = app
        .patch("/corrections/events/p-immutable")
        .json(&json!({ "promptId": "p-other", "source": "sneaky" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let stored = app
        .state
        .corrections
        .find_by_prompt_id("p-immutable")
        .await
        .unwrap();
    assert_eq!(stored.event.source.as_deref(), Some("editor"));
    assert!(matches!(
        app.state.corrections.find_by_prompt_id("p-other").await,
        Err(DaoError::NotFound)
    ));

    // the rejected transaction was aborted and holds no lock on the row
    let resp = app
        .patch("/corrections/events/p-immutable")
        .json(&json!({ "source": "reviewer" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    app.teardown().await;
}

#[tokio::test]
async fn test_update_of_mutable_fields() {
    let app = TestApp::spawn().await;
    post_event(&app, &event_body("p-mutable")).await;

    let resp = app
        .patch("/corrections/events/p-mutable")
        .json(&json!({ "promptId": "p-mutable", "source": "review", "version": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["promptId"].as_str(), Some("p-mutable"));
    assert_eq!(body["source"].as_str(), Some("review"));
    assert_eq!(body["version"].as_i64(), Some(2));

    let resp = app
        .patch("/corrections/events/unknown")
        .json(&json!({ "source": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    app.teardown().await;
}

#[tokio::test]
async fn test_concurrent_prompt_id_changes_all_fail() {
    let app = TestApp::spawn().await;
    app.state.corrections.ingest(&request("p-race")).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let dao = app.state.corrections.clone();
            tokio::spawn(async move {
                let patch = CorrectionEventUpdate {
                    prompt_id: Some(format!("p-race-{i}")),
                    ..Default::default()
                };
                dao.update_event("p-race", &patch).await
            })
        })
        .collect();
    for task in tasks {
        assert!(matches!(
            task.await.unwrap(),
            Err(DaoError::ImmutableField("prompt_id"))
        ));
    }

    assert_eq!(
        app.count(CorrectionEvent::COLLECTION, doc! { "prompt_id": "p-race" }).await,
        1
    );

    app.teardown().await;
}

// ─── Channel + status ───────────────────────────────────────────

#[tokio::test]
async fn test_corrections_channel_ingests() {
    use medsum_services::pubsub::MessagePublisher;

    let app = TestApp::spawn().await;
    app.subscribers_ready().await;

    app.broker
        .publish("corrections_complete", &event_body("p-channel").to_string())
        .await
        .unwrap();

    let body = app.eventually_ok("/corrections/events/p-channel").await;
    assert_eq!(body["event"]["jobId"].as_str(), Some("job-1"));

    app.teardown().await;
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::spawn().await;
    post_event(&app, &event_body("p-metrics")).await;
    post_event(&app, &event_body("p-metrics")).await;

    let body: Value = app
        .get("/corrections/metrics")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ingest_total"].as_u64(), Some(1));
    assert_eq!(body["dedup_events"].as_u64(), Some(1));
    assert_eq!(body["dedup_words"].as_u64(), Some(2));
    assert_eq!(body["failures_total"].as_u64(), Some(0));

    app.teardown().await;
}
