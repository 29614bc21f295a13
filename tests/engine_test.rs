// tests/engine_test.rs — Integration test: full turns over scripted byte streams

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use pretty_assertions::assert_eq;

use tradecoach::api::{AnalysisRequest, CoachApi};
use tradecoach::coach::Coach;
use tradecoach::engine::turn::{TurnEnd, TurnEngine, TRANSPORT_FAILURE_MESSAGE, TIMEOUT_MESSAGE};
use tradecoach::engine::{Message, OperationStatus, Role, Transcript, TurnPhase};
use tradecoach::infra::errors::CoachError;
use tradecoach::infra::session::{ActiveSessionStore, MemorySessionStore, Session};
use tradecoach::stream::{ByteStream, FrameDecoder};

/// How the scripted server answers `open_analysis`.
#[derive(Clone)]
enum Script {
    /// Body delivered in these chunks, then end of stream.
    Chunks(Vec<Vec<u8>>),
    /// Chunks, then a transport error.
    ChunksThenError(Vec<Vec<u8>>),
    /// Chunks, then silence forever.
    ChunksThenHang(Vec<Vec<u8>>),
    /// The request never starts streaming.
    Refused,
}

struct ScriptedApi {
    script: Script,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl ScriptedApi {
    fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }
}

fn to_items(chunks: Vec<Vec<u8>>) -> Vec<Result<Bytes, CoachError>> {
    chunks.into_iter().map(|c| Ok(Bytes::from(c))).collect()
}

#[async_trait]
impl CoachApi for ScriptedApi {
    async fn open_analysis(&self, request: &AnalysisRequest) -> Result<ByteStream, CoachError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.script.clone() {
            Script::Chunks(chunks) => Ok(Box::pin(futures::stream::iter(to_items(chunks)))),
            Script::ChunksThenError(chunks) => {
                let mut items = to_items(chunks);
                items.push(Err(CoachError::Transport {
                    message: "connection reset by peer".into(),
                    retriable: false,
                }));
                Ok(Box::pin(futures::stream::iter(items)))
            }
            Script::ChunksThenHang(chunks) => Ok(Box::pin(
                futures::stream::iter(to_items(chunks)).chain(futures::stream::pending()),
            )),
            Script::Refused => Err(CoachError::Transport {
                message: "connection refused".into(),
                retriable: true,
            }),
        }
    }

    async fn list_conversations(&self) -> Result<Vec<Session>, CoachError> {
        Ok(Vec::new())
    }

    async fn fetch_messages(&self, _session_id: &str) -> Result<Vec<Message>, CoachError> {
        Ok(Vec::new())
    }

    async fn delete_conversation(&self, _session_id: &str) -> Result<(), CoachError> {
        Ok(())
    }
}

fn frame(json: &str) -> String {
    format!("data: {}\n\n", json)
}

const RUNNING: &str =
    r#"{"type":"operation","data":{"name":"fetch_trades","type":"data_fetch","status":"running"}}"#;
const COMPLETED: &str =
    r#"{"type":"operation","data":{"name":"fetch_trades","type":"data_fetch","status":"completed"}}"#;
const FINAL: &str = r#"{"type":"final_message","data":{"message":"Here are your losses...","session_id":"s-123"}}"#;
const DONE: &str = r#"{"type":"done"}"#;

fn forensic_body() -> String {
    [RUNNING, COMPLETED, FINAL, DONE]
        .iter()
        .map(|e| frame(e))
        .collect()
}

fn coach_with(script: Script) -> (Coach, Arc<ScriptedApi>) {
    let api = Arc::new(ScriptedApi::new(script));
    let coach = Coach::new(api.clone(), Box::new(MemorySessionStore::with_id("local-1"))).unwrap();
    (coach, api)
}

// ─── Scenarios ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_forensic_analysis_scenario() {
    let (mut coach, api) = coach_with(Script::Chunks(vec![forensic_body().into_bytes()]));

    let outcome = coach.send("Run forensic analysis on my losses").await.unwrap();

    assert_eq!(outcome.end, TurnEnd::Completed);
    let assistants: Vec<_> = coach
        .transcript()
        .messages()
        .iter()
        .filter(|m| m.role == Role::Assistant && m.id != "welcome")
        .collect();
    assert_eq!(assistants.len(), 1);
    assert_eq!(assistants[0].content, "Here are your losses...");

    let ops = assistants[0].operations.as_ref().unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].name, "fetch_trades");
    assert_eq!(ops[0].status, OperationStatus::Completed);

    assert_eq!(coach.active_session_id(), "s-123");
    assert!(!coach.is_input_locked());

    let requests = api.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].message, "Run forensic analysis on my losses");
    assert_eq!(requests[0].session_id, "local-1");
}

#[tokio::test]
async fn test_transport_error_before_any_event() {
    let (mut coach, _api) = coach_with(Script::ChunksThenError(Vec::new()));

    let outcome = coach.send("Run forensic analysis on my losses").await.unwrap();

    assert!(matches!(outcome.end, TurnEnd::TransportFailed { .. }));
    assert_eq!(
        coach.transcript().last().unwrap().content,
        TRANSPORT_FAILURE_MESSAGE
    );
    assert!(!coach.is_input_locked());
    assert_eq!(coach.active_session_id(), "local-1");
}

#[tokio::test]
async fn test_request_refused() {
    let (mut coach, _api) = coach_with(Script::Refused);
    let outcome = coach.send("hello").await.unwrap();
    assert_eq!(outcome.message.content, TRANSPORT_FAILURE_MESSAGE);
    assert!(!coach.is_input_locked());
}

#[tokio::test]
async fn test_connection_drops_mid_analysis() {
    let body = frame(RUNNING);
    let (mut coach, _api) = coach_with(Script::ChunksThenError(vec![body.into_bytes()]));

    let outcome = coach.send("q").await.unwrap();

    assert_eq!(outcome.message.content, TRANSPORT_FAILURE_MESSAGE);
    assert_eq!(outcome.message.operations.as_ref().unwrap().len(), 1);
}

#[tokio::test]
async fn test_error_event_surfaces_message_and_stops() {
    let body: String = [
        RUNNING,
        r#"{"type":"error","data":{"error":"No closed trades in range"}}"#,
        COMPLETED,
        FINAL,
        DONE,
    ]
    .iter()
    .map(|e| frame(e))
    .collect();
    let (mut coach, _api) = coach_with(Script::Chunks(vec![body.into_bytes()]));

    let outcome = coach.send("q").await.unwrap();

    assert_eq!(
        outcome.end,
        TurnEnd::Rejected {
            reason: "No closed trades in range".into()
        }
    );
    let last = coach.transcript().last().unwrap();
    assert_eq!(last.content, "No closed trades in range");
    assert_eq!(
        last.operations.as_ref().unwrap()[0].status,
        OperationStatus::Running
    );
    // The final_message after the error never assigned a session.
    assert_eq!(coach.active_session_id(), "local-1");
}

#[tokio::test]
async fn test_malformed_and_unknown_frames_do_not_abort() {
    let body = format!(
        "{}data: {{not json\n\n: comment line\n\n{}{}{}{}",
        frame(RUNNING),
        frame(r#"{"type":"progress","data":{"pct":50}}"#),
        frame(COMPLETED),
        frame(FINAL),
        frame(DONE),
    );
    let (mut coach, _api) = coach_with(Script::Chunks(vec![body.into_bytes()]));

    let outcome = coach.send("q").await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(outcome.message.content, "Here are your losses...");
}

#[tokio::test]
async fn test_done_with_running_operations_still_idle() {
    let body: String = [RUNNING, DONE].iter().map(|e| frame(e)).collect();
    let (mut coach, _api) = coach_with(Script::Chunks(vec![body.into_bytes()]));

    let outcome = coach.send("q").await.unwrap();

    assert!(outcome.is_completed());
    assert_eq!(coach.engine().phase(), TurnPhase::Idle);
    assert!(coach.engine().activity().is_none());
    assert!(coach.engine().ledger().is_empty());
}

#[tokio::test]
async fn test_idle_timeout_synthesizes_error() {
    let (coach, _api) = coach_with(Script::ChunksThenHang(vec![frame(RUNNING).into_bytes()]));
    let mut coach = coach.with_idle_timeout(Some(Duration::from_millis(50)));

    let outcome = coach.send("q").await.unwrap();

    assert_eq!(
        outcome.end,
        TurnEnd::Rejected {
            reason: TIMEOUT_MESSAGE.into()
        }
    );
    assert!(!coach.is_input_locked());
}

// ─── Cancellation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_after_final_message_keeps_answer_and_session() {
    let body = frame(RUNNING) + &frame(COMPLETED) + &frame(FINAL);
    let (mut coach, _api) = coach_with(Script::ChunksThenHang(vec![body.into_bytes()]));

    let cancelled = tokio::time::timeout(
        Duration::from_millis(100),
        coach.send("Run forensic analysis on my losses"),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(coach.is_input_locked());

    let outcome = coach.abort_turn().unwrap();
    assert!(outcome.is_completed());
    assert_eq!(outcome.message.content, "Here are your losses...");
    assert_eq!(coach.transcript().last().unwrap().content, "Here are your losses...");
    assert_eq!(coach.active_session_id(), "s-123");
    assert!(!coach.is_input_locked());
}

#[tokio::test]
async fn test_cancel_mid_analysis_reports_failure() {
    let (mut coach, _api) = coach_with(Script::ChunksThenHang(vec![frame(RUNNING).into_bytes()]));

    let cancelled = tokio::time::timeout(Duration::from_millis(100), coach.send("q")).await;
    assert!(cancelled.is_err());

    let outcome = coach.abort_turn().unwrap();
    assert!(matches!(outcome.end, TurnEnd::TransportFailed { .. }));
    assert_eq!(outcome.message.content, TRANSPORT_FAILURE_MESSAGE);
    assert_eq!(coach.active_session_id(), "local-1");
    assert!(coach.abort_turn().is_none());
}

// ─── Session id persistence ─────────────────────────────────────────────────

/// Store whose writes always fail, e.g. a read-only state directory.
struct ReadOnlyStore;

impl ActiveSessionStore for ReadOnlyStore {
    fn load(&self) -> Option<String> {
        Some("local-1".into())
    }

    fn save(&self, _id: &str) -> Result<(), CoachError> {
        Err(CoachError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only file system",
        )))
    }
}

#[tokio::test]
async fn test_assigned_session_used_even_when_not_persisted() {
    let api = Arc::new(ScriptedApi::new(Script::Chunks(vec![forensic_body().into_bytes()])));
    let mut coach = Coach::new(api.clone(), Box::new(ReadOnlyStore)).unwrap();

    let outcome = coach.send("first").await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(coach.active_session_id(), "s-123");

    coach.send("second").await.unwrap();
    let requests = api.requests.lock().unwrap();
    assert_eq!(requests[0].session_id, "local-1");
    assert_eq!(requests[1].session_id, "s-123");
}

#[tokio::test]
async fn test_consecutive_turns_reuse_engine() {
    let (mut coach, api) = coach_with(Script::Chunks(vec![forensic_body().into_bytes()]));

    coach.send("first").await.unwrap();
    coach.send("second").await.unwrap();

    // welcome + 2 × (user, assistant)
    assert_eq!(coach.transcript().len(), 5);
    let requests = api.requests.lock().unwrap();
    assert_eq!(requests[0].session_id, "local-1");
    assert_eq!(requests[1].session_id, "s-123");
}

// ─── Chunking invariance ────────────────────────────────────────────────────

fn chunked(body: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut rest = body;
    let mut i = 0;
    while !rest.is_empty() {
        let n = sizes[i % sizes.len()].min(rest.len()).max(1);
        out.push(rest[..n].to_vec());
        rest = &rest[n..];
        i += 1;
    }
    out
}

#[tokio::test]
async fn test_transcript_independent_of_chunking() {
    let body = forensic_body().into_bytes();
    let mut results = Vec::new();

    for sizes in [vec![body.len()], vec![1], vec![2, 7], vec![13, 1, 5], vec![64]] {
        let api = ScriptedApi::new(Script::Chunks(chunked(&body, &sizes)));
        let mut engine = TurnEngine::new(Transcript::fresh());
        let outcome = engine.run(&api, "s", "q", None).await.unwrap();
        results.push((outcome.message.content, outcome.message.operations, outcome.session_id));
    }

    for r in &results[1..] {
        assert_eq!(r, &results[0]);
    }
}

#[test]
fn test_decoder_frames_identical_for_all_two_way_splits() {
    let body = forensic_body().into_bytes();
    let decode = |chunks: &[&[u8]]| {
        let mut d = FrameDecoder::new();
        let frames: Vec<_> = chunks.iter().flat_map(|c| d.push(c)).collect();
        d.finish();
        frames
    };
    let whole = decode(&[body.as_slice()]);
    assert_eq!(whole.len(), 4);
    for split in 0..body.len() {
        let (a, b) = body.split_at(split);
        assert_eq!(decode(&[a, b]), whole);
    }
}
