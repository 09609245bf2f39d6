//! HTTP ingest: turns POST bodies into frames on the collector queue.

use std::sync::Arc;

use actix_web::{HttpResponse, web};
use bytes::Bytes;
use tracing::{debug, warn};

use framecast_core::{BatchReader, Frame, FrameQueue, FramecastError};

use crate::config::PayloadKind;

/// Body returned for every accepted request.
pub const OK: &str = "OK";

/// Shared state for the ingest route.
pub struct IngestState {
    pub queue: Arc<FrameQueue>,
    pub payload: PayloadKind,
}

/// Split a batch body into frames.
///
/// Frames preceding a truncation are kept; only a body too short to
/// hold the count header is an error.
pub fn unbatch(body: Bytes) -> Result<Vec<Frame>, FramecastError> {
    let mut reader = BatchReader::new(body)?;
    let declared = reader.declared_count();
    let mut frames = Vec::with_capacity(declared.min(1024) as usize);

    for frame in reader.by_ref() {
        match frame {
            Ok(frame) => frames.push(frame),
            Err(e) => {
                warn!(declared, salvaged = frames.len(), "partial batch: {e}");
                break;
            }
        }
    }
    if reader.remaining_bytes() > 0 {
        debug!(bytes = reader.remaining_bytes(), "ignoring bytes after last frame");
    }
    Ok(frames)
}

/// Register the ingest route on `cfg`.
pub fn configure(
    cfg: &mut web::ServiceConfig,
    state: web::Data<IngestState>,
    path: &str,
    max_body_bytes: usize,
) {
    cfg.app_data(state)
        .app_data(web::PayloadConfig::new(max_body_bytes))
        .service(web::resource(path).route(web::post().to(ingest_handler)));
}

async fn ingest_handler(body: web::Bytes, state: web::Data<IngestState>) -> HttpResponse {
    debug!(bytes = body.len(), "payload received");

    let frames = match state.payload {
        PayloadKind::Batch => match unbatch(body) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("rejecting payload: {e}");
                return HttpResponse::BadRequest().body(e.to_string());
            }
        },
        PayloadKind::Single if body.is_empty() => Vec::new(),
        PayloadKind::Single => vec![Frame::new(body)],
    };

    debug!(frames = frames.len(), "queueing frames");
    for frame in frames {
        state.queue.enqueue(frame);
    }
    HttpResponse::Ok().content_type("text/plain").body(OK)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};
    use framecast_core::Batch;

    fn state(payload: PayloadKind, capacity: usize) -> web::Data<IngestState> {
        web::Data::new(IngestState {
            queue: Arc::new(FrameQueue::new(capacity)),
            payload,
        })
    }

    #[::core::prelude::v1::test]
    fn unbatch_salvages_complete_frames() {
        let batch = Batch::assemble(&[Frame::new(vec![1; 10]), Frame::new(vec![2; 10])]).unwrap();
        let bytes = batch.into_bytes();
        let truncated = bytes.slice(..bytes.len() - 3);

        let frames = unbatch(truncated).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &[1; 10]);
    }

    #[::core::prelude::v1::test]
    fn unbatch_rejects_missing_header() {
        assert!(unbatch(Bytes::from_static(&[0, 0])).is_err());
    }

    #[actix_web::test]
    async fn batch_post_queues_every_frame() {
        let state = state(PayloadKind::Batch, 100);
        let app = test::init_service(
            App::new().configure(|cfg| configure(cfg, state.clone(), "/", 1024 * 1024)),
        )
        .await;

        let frames: Vec<Frame> = (0..5u8).map(|i| Frame::new(vec![i; 32])).collect();
        let batch = Batch::assemble(&frames).unwrap();
        let req = test::TestRequest::post()
            .uri("/")
            .set_payload(batch.into_bytes())
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, OK.as_bytes());
        assert_eq!(state.queue.len(), 5);
        let queued = state.queue.try_dequeue_batch(5).unwrap();
        assert_eq!(queued, frames);
    }

    #[actix_web::test]
    async fn short_body_is_bad_request() {
        let state = state(PayloadKind::Batch, 100);
        let app = test::init_service(
            App::new().configure(|cfg| configure(cfg, state.clone(), "/", 1024)),
        )
        .await;

        let req = test::TestRequest::post().uri("/").set_payload("ab").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.queue.is_empty());
    }

    #[actix_web::test]
    async fn single_mode_queues_body_as_one_frame() {
        let state = state(PayloadKind::Single, 2);
        let app = test::init_service(
            App::new().configure(|cfg| configure(cfg, state.clone(), "/frames", 1024)),
        )
        .await;

        for body in ["one", "two", "three"] {
            let req = test::TestRequest::post().uri("/frames").set_payload(body).to_request();
            assert!(test::call_service(&app, req).await.status().is_success());
        }

        // Capacity 2: the oldest frame was dropped.
        let queued = state.queue.try_dequeue_batch(2).unwrap();
        assert_eq!(queued[0].as_bytes(), b"two");
        assert_eq!(queued[1].as_bytes(), b"three");
    }
}
