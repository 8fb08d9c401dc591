//! End-to-end session tests against an in-process device emulator
//!
//! The emulator speaks the firmware's wire formats (status JSON, bare
//! playlist array, form bodies) and records every mutation it receives,
//! so the tests can assert what actually went over the wire.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use papclient::{DeviceClient, Error, PlaybackState};
use pappanel::{PanelOptions, PanelSession, UploadFile};

/// Scriptable device double
#[derive(Debug, Default)]
struct DeviceSim {
    playing: bool,
    looping: bool,
    volume: u8,
    track: String,
    playlist: Vec<String>,
    timers: Vec<(String, String, String)>,
    next_timer_id: u32,

    // Failure injection
    fail_play: bool,
    fail_stop: bool,
    fail_loop: bool,
    fail_uploads_named: Vec<String>,

    // Recorded traffic
    volume_posts: Vec<u8>,
    upload_names: Vec<String>,
}

type Sim = Arc<Mutex<DeviceSim>>;

#[derive(Deserialize)]
struct VolumeForm {
    value: String,
}

#[derive(Deserialize)]
struct LoopForm {
    enabled: String,
}

#[derive(Deserialize)]
struct FileForm {
    file: String,
}

#[derive(Deserialize)]
struct IdForm {
    id: String,
}

#[derive(Deserialize)]
struct AddTimerBody {
    datetime: String,
    action: String,
}

async fn status(State(sim): State<Sim>) -> Json<serde_json::Value> {
    let sim = sim.lock().unwrap();
    Json(json!({
        "wifi": "Connected",
        "volume": sim.volume,
        "track": sim.track,
        "playing": sim.playing,
        "looping": sim.looping,
        "time": {"hour": 12, "minute": 0, "second": 0}
    }))
}

async fn playlist(State(sim): State<Sim>) -> Json<Vec<String>> {
    Json(sim.lock().unwrap().playlist.clone())
}

async fn play(State(sim): State<Sim>, body: String) -> StatusCode {
    let mut sim = sim.lock().unwrap();
    if sim.fail_play {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    if let Some(file) = body.strip_prefix("file=") {
        sim.track = file.to_string();
    }
    sim.playing = true;
    StatusCode::OK
}

async fn stop(State(sim): State<Sim>) -> StatusCode {
    let mut sim = sim.lock().unwrap();
    if sim.fail_stop {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    sim.playing = false;
    StatusCode::OK
}

async fn volume(State(sim): State<Sim>, Form(form): Form<VolumeForm>) -> StatusCode {
    let Ok(value) = form.value.parse::<u8>() else {
        return StatusCode::BAD_REQUEST;
    };
    let mut sim = sim.lock().unwrap();
    sim.volume = value.min(100);
    sim.volume_posts.push(value);
    StatusCode::OK
}

async fn set_loop(State(sim): State<Sim>, Form(form): Form<LoopForm>) -> StatusCode {
    let mut sim = sim.lock().unwrap();
    if sim.fail_loop {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    sim.looping = form.enabled == "true";
    StatusCode::OK
}

async fn delete(State(sim): State<Sim>, Form(form): Form<FileForm>) -> StatusCode {
    let mut sim = sim.lock().unwrap();
    sim.playlist.retain(|f| f != &form.file);
    StatusCode::OK
}

async fn timers(State(sim): State<Sim>) -> Json<serde_json::Value> {
    let sim = sim.lock().unwrap();
    let timers: Vec<_> = sim
        .timers
        .iter()
        .map(|(id, datetime, action)| json!({"id": id, "datetime": datetime, "action": action}))
        .collect();
    Json(json!({ "timers": timers }))
}

async fn add_timer(State(sim): State<Sim>, Json(body): Json<AddTimerBody>) -> StatusCode {
    let mut sim = sim.lock().unwrap();
    sim.next_timer_id += 1;
    let id = format!("t{}", sim.next_timer_id);
    sim.timers.push((id, body.datetime, body.action));
    StatusCode::OK
}

async fn remove_timer(State(sim): State<Sim>, Form(form): Form<IdForm>) -> StatusCode {
    let mut sim = sim.lock().unwrap();
    sim.timers.retain(|(id, _, _)| id != &form.id);
    StatusCode::OK
}

async fn sync_time() -> Json<serde_json::Value> {
    Json(json!({"success": true}))
}

async fn upload(State(sim): State<Sim>, mut multipart: Multipart) -> impl IntoResponse {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.file_name().unwrap_or_default().to_string();
        let _ = field.bytes().await;
        let mut sim = sim.lock().unwrap();
        sim.upload_names.push(name.clone());
        if sim.fail_uploads_named.contains(&name) {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        sim.playlist.push(name);
    }
    StatusCode::OK
}

/// Start the emulator, returning its base URL and the shared sim handle
async fn start_device() -> (String, Sim) {
    let sim: Sim = Arc::new(Mutex::new(DeviceSim::default()));

    let app = Router::new()
        .route("/api/status", get(status))
        .route("/api/playlist", get(playlist))
        .route("/api/play", post(play))
        .route("/api/stop", post(stop))
        .route("/api/volume", post(volume))
        .route("/api/loop", post(set_loop))
        .route("/api/delete", post(delete))
        .route("/api/timers", get(timers))
        .route("/api/add-timer", post(add_timer))
        .route("/api/remove-timer", post(remove_timer))
        .route("/api/sync-time", post(sync_time))
        .route("/api/upload", post(upload))
        .with_state(sim.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), sim)
}

fn test_options() -> PanelOptions {
    PanelOptions {
        volume_debounce: Duration::from_millis(100),
        ..PanelOptions::default()
    }
}

async fn start_session() -> (PanelSession, Sim) {
    let (base_url, sim) = start_device().await;
    let client = DeviceClient::builder().base_url(base_url).build().unwrap();
    (PanelSession::new(client, test_options()), sim)
}

#[tokio::test]
async fn play_failure_rolls_back_optimistic_state() {
    let (session, sim) = start_session().await;
    sim.lock().unwrap().fail_play = true;

    assert_eq!(session.playback(), PlaybackState::Stopped);
    let err = session.toggle_play_stop().await.unwrap_err();
    assert!(matches!(err, Error::Status { status: 500, .. }));

    // Displayed state is back to its pre-click value
    assert_eq!(session.playback(), PlaybackState::Stopped);

    // And the same click succeeds once the device behaves
    sim.lock().unwrap().fail_play = false;
    assert_eq!(
        session.toggle_play_stop().await.unwrap(),
        PlaybackState::Playing
    );
    assert!(sim.lock().unwrap().playing);
}

#[tokio::test]
async fn loop_failure_rolls_back_optimistic_state() {
    let (session, sim) = start_session().await;
    sim.lock().unwrap().fail_loop = true;

    assert!(!session.looping());
    assert!(session.toggle_loop().await.is_err());
    assert!(!session.looping());

    sim.lock().unwrap().fail_loop = false;
    assert!(session.toggle_loop().await.unwrap());
    assert!(session.looping());
    assert!(sim.lock().unwrap().looping);
}

#[tokio::test]
async fn volume_burst_sends_only_last_value() {
    let (session, sim) = start_session().await;

    // Rapid slider drag inside one debounce window
    assert!(session.set_volume(10));
    assert!(session.set_volume(30));
    assert!(session.set_volume(50));

    tokio::time::sleep(Duration::from_millis(400)).await;

    let posts = sim.lock().unwrap().volume_posts.clone();
    assert_eq!(posts, vec![50]);
    assert_eq!(session.last_volume(), 50);
}

#[tokio::test]
async fn reconciled_volume_does_not_retrigger_a_post() {
    let (session, sim) = start_session().await;

    sim.lock().unwrap().volume = 42;
    assert!(session.poll_status().await.unwrap());
    assert_eq!(session.last_volume(), 42);

    // Slider sits exactly where the device already is: delta 0, no request
    assert!(!session.set_volume(42));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(sim.lock().unwrap().volume_posts.is_empty());
}

#[tokio::test]
async fn poll_overrides_optimistic_playing() {
    let (session, sim) = start_session().await;

    session.play_file("song.mp3").await.unwrap();
    assert_eq!(session.playback(), PlaybackState::Playing);

    // Device stopped on its own (e.g. track ended, loop off)
    sim.lock().unwrap().playing = false;
    assert!(session.poll_status().await.unwrap());
    assert_eq!(session.playback(), PlaybackState::Stopped);
}

#[tokio::test]
async fn playlist_refetch_is_idempotent() {
    let (session, sim) = start_session().await;
    sim.lock().unwrap().playlist = vec!["a.mp3".into(), "b.wav".into(), "notes.txt".into()];

    let first = session.refresh_playlist().await.unwrap();
    let second = session.refresh_playlist().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
    assert_eq!(first[0].kind.label(), "MP3");
    assert_eq!(first[2].kind.label(), "???");
}

#[tokio::test]
async fn delete_refreshes_playlist() {
    let (session, sim) = start_session().await;
    sim.lock().unwrap().playlist = vec!["a.mp3".into(), "b.mp3".into()];

    let after = session.delete_file("a.mp3").await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].filename, "b.mp3");
    assert_eq!(session.playlist(), after);
}

#[tokio::test]
async fn upload_batch_rejects_bad_extension_before_any_network_call() {
    let (session, sim) = start_session().await;

    let files = vec![
        UploadFile::new("ok.mp3", vec![0; 8]),
        UploadFile::new("song.txt", vec![0; 8]),
    ];
    let err = session.upload_files(files).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedFile(_)));
    assert!(sim.lock().unwrap().upload_names.is_empty());
}

#[tokio::test]
async fn upload_batch_continues_past_a_failed_file() {
    let (session, sim) = start_session().await;
    sim.lock().unwrap().fail_uploads_named = vec!["bad.mp3".into()];

    let files = vec![
        UploadFile::new("bad.mp3", vec![0; 8]),
        UploadFile::new("good.wav", vec![0; 8]),
    ];
    let report = session.upload_files(files).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(!report.outcomes[0].succeeded());
    assert!(report.outcomes[1].succeeded());
    assert_eq!(report.outcomes[0].progress_pct, 50);
    assert_eq!(report.outcomes[1].progress_pct, 100);

    // Both files reached the device; the playlist refresh picked up the good one
    assert_eq!(sim.lock().unwrap().upload_names.len(), 2);
    assert!(session.playlist().iter().any(|e| e.filename == "good.wav"));
}

#[tokio::test]
async fn timer_mutations_refresh_the_list_wholesale() {
    let (session, _sim) = start_session().await;

    let timers = session.add_timer("2025-07-03T08:00", "play").await.unwrap();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0].action, "play");

    let id = timers[0].id.clone();
    let timers = session.remove_timer(&id).await.unwrap();
    assert!(timers.is_empty());
    assert!(session.timers().is_empty());
}

#[tokio::test]
async fn full_resync_repopulates_all_caches() {
    let (session, sim) = start_session().await;
    {
        let mut sim = sim.lock().unwrap();
        sim.playlist = vec!["a.mp3".into()];
        sim.playing = true;
        sim.volume = 33;
    }

    session.full_resync().await;

    assert_eq!(session.playback(), PlaybackState::Playing);
    assert_eq!(session.last_volume(), 33);
    assert_eq!(session.playlist().len(), 1);
    assert!(session.status_snapshot().is_some());
}

#[tokio::test]
async fn sync_time_reports_device_outcome() {
    let (session, _sim) = start_session().await;
    assert!(session.sync_time().await.unwrap());
}
