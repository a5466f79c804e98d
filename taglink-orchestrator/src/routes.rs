use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use taglink_core::{DeviceDescriptor, DeviceKind, Fingerprint, ScanMode, Track, UploadStatus};

use crate::orchestrator::Orchestrator;
use crate::types::{ControlAction, ScanRequest};

/// Builds the full §6 HTTP surface as a standalone [`Router`], merged onto the ambient server by
/// the application crate (mirrors the teacher's `pmoapp` extension-trait route composition,
/// adapted here to a router-builder function since this crate, not the server crate, owns the
/// domain routes).
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/tonie", post(scan))
        .route("/control", post(control))
        .route("/readers/{ip}/heartbeat", post(heartbeat))
        .route("/readers/{ip}/position", post(report_position))
        .route("/streams", get(streams))
        .route("/devices/{kind}/{id}/override", post(set_override))
        .route("/uploads", get(uploads_status).delete(wipe_uploads))
        .route("/uploads/pending", get(uploads_pending).delete(wipe_uploads))
        .route("/uploads/wipe", post(wipe_uploads))
        .route("/uploads/retry", post(retry_all_uploads))
        .route("/uploads/{device_id}/cancel", post(cancel_upload))
        .route("/uploads/{device_id}/retry", post(retry_upload))
        .route("/tracks/{fp}/{file}", get(track_file))
        .route("/playlist/{fp}", get(playlist))
        .route("/transcode.mp3", get(transcode_single))
        .route("/proxy/image", get(proxy_image))
        .route("/cache", delete(wipe_cache))
        .route("/devices", get(list_devices))
        .route("/diagnostics/port/{port}", get(diagnose_port))
        .with_state(orchestrator)
}

#[derive(Debug, Deserialize)]
struct ScanBody {
    reader_ip: String,
    #[serde(default)]
    reader_is_sd_player: bool,
    uid: Option<String>,
    #[serde(default)]
    mode: Option<ScanMode>,
    target_kind: Option<DeviceKind>,
    target_id: Option<String>,
    title: Option<String>,
    series: Option<String>,
    episode: Option<String>,
    picture: Option<String>,
    tracks: Option<Vec<Track>>,
    audio_url: Option<String>,
}

async fn scan(State(orchestrator): State<Arc<Orchestrator>>, Json(body): Json<ScanBody>) -> impl IntoResponse {
    let target_device = match (body.target_kind, body.target_id) {
        (Some(kind), Some(id)) => Some(DeviceDescriptor::new(kind, id)),
        _ => None,
    };
    let request = ScanRequest {
        reader_ip: body.reader_ip,
        reader_is_sd_player: body.reader_is_sd_player,
        uid: body.uid,
        mode: body.mode.unwrap_or(ScanMode::Stream),
        target_device,
        title: body.title,
        series: body.series,
        episode: body.episode,
        picture: body.picture,
        tracks: body.tracks,
        audio_url: body.audio_url,
    };
    Json(orchestrator.scan(request).await)
}

#[derive(Debug, Deserialize)]
struct ControlBody {
    reader_ip: String,
    action: ControlActionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ControlActionBody {
    Play,
    Pause,
    Stop,
    Skip,
    Prev,
    VolumeUp,
    VolumeDown,
}

impl From<ControlActionBody> for ControlAction {
    fn from(action: ControlActionBody) -> Self {
        match action {
            ControlActionBody::Play => ControlAction::Play,
            ControlActionBody::Pause => ControlAction::Pause,
            ControlActionBody::Stop => ControlAction::Stop,
            ControlActionBody::Skip => ControlAction::Skip,
            ControlActionBody::Prev => ControlAction::Prev,
            ControlActionBody::VolumeUp => ControlAction::VolumeUp,
            ControlActionBody::VolumeDown => ControlAction::VolumeDown,
        }
    }
}

#[derive(Debug, Serialize)]
struct ControlResponse {
    ok: bool,
}

async fn control(State(orchestrator): State<Arc<Orchestrator>>, Json(body): Json<ControlBody>) -> impl IntoResponse {
    let ok = orchestrator.control(&body.reader_ip, body.action.into()).await;
    Json(ControlResponse { ok })
}

#[derive(Debug, Deserialize, Default)]
struct HeartbeatBody {
    name: Option<String>,
}

async fn heartbeat(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(ip): Path<String>,
    body: Option<Json<HeartbeatBody>>,
) -> impl IntoResponse {
    let name = body.map(|Json(b)| b.name).unwrap_or(None);
    orchestrator.heartbeat(&ip, name).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct PositionBody {
    position_seconds: f64,
}

async fn report_position(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(ip): Path<String>,
    Json(body): Json<PositionBody>,
) -> impl IntoResponse {
    orchestrator.report_browser_position(&ip, body.position_seconds).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
struct StreamsResponse {
    recent_scans: Vec<RecentScanView>,
    active_streams: usize,
}

#[derive(Debug, Serialize)]
struct RecentScanView {
    reader_ip: String,
    uid: Option<String>,
    target: Option<DeviceDescriptor>,
    at: chrono::DateTime<chrono::Utc>,
}

/// `GET /streams` (§6): diagnostics view over the bounded recent-scan log and the liveness
/// supervisor's active-stream count.
async fn streams(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    let recent = orchestrator.recent_scans().await;
    let active_streams = orchestrator.liveness().streams().lock().await.active().len();
    Json(StreamsResponse {
        recent_scans: recent
            .into_iter()
            .map(|r| RecentScanView { reader_ip: r.reader_ip, uid: r.uid, target: r.target, at: r.at })
            .collect(),
        active_streams,
    })
}

#[derive(Debug, Deserialize)]
struct OverrideBody {
    reader_ip: String,
    persist: bool,
}

/// `POST /devices/{kind}/{id}/override` (§6): sets a reader's temporary or persisted device
/// override, the highest/second-highest entries in the §4.6 device-resolution order.
async fn set_override(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path((kind, id)): Path<(String, String)>,
    Json(body): Json<OverrideBody>,
) -> impl IntoResponse {
    let Some(kind) = parse_kind(&kind) else { return StatusCode::BAD_REQUEST };
    let device = DeviceDescriptor::new(kind, id);
    if body.persist {
        orchestrator.readers().set_persisted_override(&body.reader_ip, Some(device)).await;
    } else {
        orchestrator.readers().set_temporary_override(&body.reader_ip, Some(device)).await;
    }
    StatusCode::NO_CONTENT
}

fn parse_kind(raw: &str) -> Option<DeviceKind> {
    match raw {
        "sd-player" => Some(DeviceKind::SdPlayer),
        "multiroom" => Some(DeviceKind::Multiroom),
        "cast" => Some(DeviceKind::Cast),
        "airplay-like" => Some(DeviceKind::AirplayLike),
        "browser" => Some(DeviceKind::Browser),
        _ => None,
    }
}

async fn uploads_status(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    let snapshot: std::collections::HashMap<String, UploadStatus> = orchestrator.mirror().status_snapshot().await;
    Json(snapshot)
}

#[derive(Debug, Serialize)]
struct PendingUpload {
    device_id: String,
    intent: taglink_core::UploadIntent,
}

/// `GET /uploads/pending` (§6): every intent still sitting in the persistent queue.
async fn uploads_pending(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    let pending: Vec<PendingUpload> = orchestrator
        .mirror()
        .pending_intents()
        .await
        .into_iter()
        .map(|(device_id, intent)| PendingUpload { device_id, intent })
        .collect();
    Json(pending)
}

/// `DELETE /uploads`, `DELETE /uploads/pending`, `POST /uploads/wipe` (§6): cancels every
/// device's in-flight transfer and clears the persistent queue entirely.
async fn wipe_uploads(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    orchestrator.mirror().cancel_all().await;
    StatusCode::NO_CONTENT
}

/// `POST /uploads/retry` (§6): re-drives every device with a pending intent.
async fn retry_all_uploads(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    orchestrator.mirror().resume_all().await;
    StatusCode::NO_CONTENT
}

async fn cancel_upload(State(orchestrator): State<Arc<Orchestrator>>, Path(device_id): Path<String>) -> impl IntoResponse {
    orchestrator.mirror().cancel(&device_id).await;
    StatusCode::NO_CONTENT
}

async fn retry_upload(State(orchestrator): State<Arc<Orchestrator>>, Path(device_id): Path<String>) -> impl IntoResponse {
    orchestrator.mirror().resume(&device_id).await;
    StatusCode::NO_CONTENT
}

/// `GET /devices` (§6 "device discovery & selection"): the persisted device cache, refreshed by
/// discovery and heartbeats (§4.9).
async fn list_devices(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    let doc = orchestrator.persist().devices().await;
    let devices: Vec<_> = doc.devices.into_values().collect();
    Json(devices)
}

/// `GET /diagnostics/port/{port}` (§6): identifies whatever process is currently bound to a TCP
/// port, for diagnosing a failed-to-bind startup (e.g. a stale instance still holding 8765).
async fn diagnose_port(Path(port): Path<u16>) -> impl IntoResponse {
    match taglink_utils::find_process_using_port(port, taglink_utils::TransportProtocol::Tcp) {
        Some(info) => Json(serde_json::json!({
            "port": info.port,
            "pid": info.pid,
            "process_name": info.process_name,
            "owner": info.owner,
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `GET /tracks/{fp}/{file}` (§6): serves an encoded track or that fingerprint's
/// `metadata.json`, whichever `file` names.
async fn track_file(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path((fp, file)): Path<(String, String)>,
) -> Response {
    let fingerprint = Fingerprint::from_existing(fp);
    let path = if file == "metadata.json" {
        orchestrator.cache().metadata_path(&fingerprint)
    } else {
        let Some(index) = file.strip_suffix(".mp3").and_then(|n| n.parse::<u32>().ok()) else {
            return StatusCode::BAD_REQUEST.into_response();
        };
        orchestrator.cache().track_path(&fingerprint, index.saturating_sub(1))
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = if file.ends_with(".json") { "application/json" } else { "audio/mpeg" };
            ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "track file not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// `GET /playlist/{fp}.m3u` (§6): `#EXTM3U` with one `#EXTINF:duration,name` + URL pair per
/// cached track, read back from that fingerprint's `metadata.json`.
async fn playlist(State(orchestrator): State<Arc<Orchestrator>>, Path(fp): Path<String>) -> Response {
    let fp = fp.trim_end_matches(".m3u").to_string();
    let fingerprint = Fingerprint::from_existing(fp);
    let metadata_path = orchestrator.cache().metadata_path(&fingerprint);
    let metadata: taglink_core::AlbumMetadata = match tokio::fs::read(&metadata_path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!(%error, "corrupt metadata.json for playlist");
                return StatusCode::NOT_FOUND.into_response();
            }
        },
        Err(error) => {
            warn!(%error, "metadata.json not found for playlist");
            return StatusCode::NOT_FOUND.into_response();
        }
    };
    if metadata.tracks.is_empty() {
        return StatusCode::NOT_FOUND.into_response();
    }
    let mut body = String::from("#EXTM3U\n");
    for track in &metadata.tracks {
        body.push_str(&format!("#EXTINF:{},{}\n", track.duration_seconds as i64, track.name));
        body.push_str(&orchestrator.track_url(&fingerprint, track.index));
        body.push('\n');
    }
    ([(header::CONTENT_TYPE, "audio/x-mpegurl")], body).into_response()
}

#[derive(Debug, Deserialize)]
struct TranscodeQuery {
    url: String,
}

/// `GET /transcode.mp3?url=` (§6): legacy single-file transcode path for callers that don't go
/// through a tag scan at all, e.g. the browser "stream anything" mode or an AirPlay-like target.
/// On a cache hit serves the cached multi-track concatenation; on a miss, encodes (bounded by
/// the coordinator's own per-track/global timeouts, which stand in for the ≈5 min poll budget)
/// before serving. Supports byte ranges and a 1-hour public cache header either way.
async fn transcode_single(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(query): Query<TranscodeQuery>,
    headers: axum::http::HeaderMap,
) -> Response {
    let fingerprint = Fingerprint::of_url(&query.url);

    if !orchestrator.cache().has_metadata(&fingerprint).await {
        let tracks = vec![Track { index: 0, name: "stream".to_string(), start_seconds: 0.0, duration_seconds: 7200.0 }];
        let album = taglink_encoding::AlbumTags {
            title: "stream".to_string(),
            artist: String::new(),
            album: String::new(),
            year: None,
            source_url: query.url.clone(),
        };
        if let Err(error) = orchestrator
            .encoding()
            .get_or_encode_all(&fingerprint, &tracks, &album, None, &taglink_encoding::NullProgressSink)
            .await
        {
            warn!(%error, "legacy transcode failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let full_path = match orchestrator.cache().concat(&fingerprint).await {
        Ok(path) => path,
        Err(error) => {
            warn!(%error, "legacy transcode concat failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Ok(bytes) = tokio::fs::read(&full_path).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    serve_mp3_bytes(bytes, headers.get(header::RANGE))
}

/// Range-aware MP3 response shared by the legacy transcode path; the rest of the crate's audio
/// routes (`/tracks/{fp}/{file}`) serve whole files since they're consumed by players that don't
/// send range requests.
fn serve_mp3_bytes(bytes: Vec<u8>, range: Option<&axum::http::HeaderValue>) -> Response {
    let total = bytes.len() as u64;
    let cache_control = (header::CACHE_CONTROL, "public, max-age=3600");

    let Some(range) = range.and_then(|v| v.to_str().ok()).and_then(|v| parse_byte_range(v, total)) else {
        return ([(header::CONTENT_TYPE, "audio/mpeg"), cache_control], bytes).into_response();
    };
    let (start, end) = range;
    let slice = bytes[start as usize..=end as usize].to_vec();
    let content_range = format!("bytes {start}-{end}/{total}");
    (
        StatusCode::PARTIAL_CONTENT,
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
            (header::CONTENT_RANGE, content_range),
            (header::ACCEPT_RANGES, "bytes".to_string()),
        ],
        slice,
    )
        .into_response()
}

/// Parses a single-range `Range: bytes=start-end` header, clamping `end` to the content length.
/// Multi-range and suffix (`bytes=-N`) forms aren't produced by the clients this endpoint serves
/// (players doing a simple seek), so only the common case is handled; anything else is ignored
/// and the full body is served instead.
fn parse_byte_range(value: &str, total: u64) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = if end.is_empty() { total.saturating_sub(1) } else { end.parse().ok()? };
    if start > end || end >= total {
        return None;
    }
    Some((start, end.min(total.saturating_sub(1))))
}

#[derive(Debug, Deserialize)]
struct ImageProxyQuery {
    path: String,
}

/// `GET /proxy/image?path=` (§6): fetches an upstream cover image so a browser client never has
/// to talk to the content service directly (mixed-content/CORS avoidance), passing through the
/// upstream content-type with a 24-hour cache header.
async fn proxy_image(Query(query): Query<ImageProxyQuery>) -> Response {
    let client = reqwest::Client::new();
    match client.get(&query.path).send().await {
        Ok(response) if response.status().is_success() => {
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("image/jpeg")
                .to_string();
            match response.bytes().await {
                Ok(bytes) => (
                    [(header::CONTENT_TYPE, content_type), (header::CACHE_CONTROL, "public, max-age=86400".to_string())],
                    bytes,
                )
                    .into_response(),
                Err(_) => StatusCode::BAD_GATEWAY.into_response(),
            }
        }
        _ => StatusCode::BAD_GATEWAY.into_response(),
    }
}

async fn wipe_cache(State(orchestrator): State<Arc<Orchestrator>>) -> impl IntoResponse {
    match orchestrator.cache().clear_all().await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(error) => {
            warn!(%error, "failed to wipe cache");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
