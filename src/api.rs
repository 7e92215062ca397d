//! Operator API: transport-agnostic request routing and JSON rendering.
//!
//! | Method | Path               | Success                      |
//! |--------|--------------------|------------------------------|
//! | GET    | `/snapshot`        | 200 bins, events, link       |
//! | POST   | `/command`         | 202 `{accepted: kind}`       |
//! | POST   | `/bins/<id>/reset` | 200 `{reset: id}`            |
//! | GET    | `/health`          | 200 link, pending, log size  |
//!
//! The HTTP adapter only moves bytes; status codes and bodies are decided
//! here so they can be tested without a server.

use serde::Serialize;

use crate::app::commands::{CommandKind, CommandRequest};
use crate::app::view::Snapshot;
use crate::error::{Error, Result, ValidationError};
use crate::event_log::LogEntryView;
use crate::fleet::{BinId, BinState, BinStatus, Fleet};
use crate::runtime::GatewayHandle;

/// The operations the API needs from a running gateway.
pub trait GatewayApi {
    fn fleet(&self) -> Fleet;
    fn snapshot(&self) -> Snapshot;
    fn submit(&self, request: &CommandRequest) -> Result<CommandKind>;
    fn reset_bin(&self, bin: BinId) -> bool;
}

impl GatewayApi for GatewayHandle {
    fn fleet(&self) -> Fleet {
        GatewayHandle::fleet(self)
    }

    fn snapshot(&self) -> Snapshot {
        GatewayHandle::snapshot(self)
    }

    fn submit(&self, request: &CommandRequest) -> Result<CommandKind> {
        self.submit_request(request)
    }

    fn reset_bin(&self, bin: BinId) -> bool {
        GatewayHandle::reset_bin(self, bin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status, body },
            Err(_) => Self::error(500, "serialization failed"),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        let body = serde_json::to_string(&ErrorBody { error: message })
            .unwrap_or_else(|_| String::from("{}"));
        Self { status, body }
    }
}

// ── Wire shapes ──────────────────────────────────────────────

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BinView {
    id: BinId,
    status: BinStatus,
    label: &'static str,
    last_updated: Option<u64>,
}

impl From<&BinState> for BinView {
    fn from(b: &BinState) -> Self {
        Self {
            id: b.id,
            status: b.status,
            label: b.status.label(),
            last_updated: b.last_updated,
        }
    }
}

#[derive(Serialize)]
struct SnapshotView {
    bins: Vec<BinView>,
    events: Vec<LogEntryView>,
    link: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthView {
    link: &'static str,
    pending_collects: usize,
    log_len: usize,
}

#[derive(Serialize)]
struct Accepted {
    accepted: CommandKind,
}

#[derive(Serialize)]
struct ResetDone {
    reset: BinId,
}

// ── Routing ──────────────────────────────────────────────────

/// Route one request.
pub fn handle(api: &impl GatewayApi, method: Method, path: &str, body: &[u8]) -> Response {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        (Method::Get, "/snapshot") => snapshot(api),
        (Method::Get, "/health") => health(api),
        (Method::Post, "/command") => command(api, body),
        (Method::Post, p) if reset_route(p).is_some() => reset(api, p),
        (_, "/snapshot" | "/health" | "/command") => Response::error(405, "method not allowed"),
        (_, p) if reset_route(p).is_some() => Response::error(405, "method not allowed"),
        _ => Response::error(404, "not found"),
    }
}

fn snapshot(api: &impl GatewayApi) -> Response {
    let s = api.snapshot();
    Response::json(
        200,
        &SnapshotView {
            bins: s.bins.iter().map(BinView::from).collect(),
            events: s.events.iter().map(|e| e.view()).collect(),
            link: s.link.as_str(),
        },
    )
}

fn health(api: &impl GatewayApi) -> Response {
    let s = api.snapshot();
    Response::json(
        200,
        &HealthView {
            link: s.link.as_str(),
            pending_collects: s.pending_collects,
            log_len: s.log_len,
        },
    )
}

fn command(api: &impl GatewayApi, body: &[u8]) -> Response {
    let request: CommandRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(_) => return Response::error(400, "malformed command body"),
    };
    match api.submit(&request) {
        Ok(accepted) => Response::json(202, &Accepted { accepted }),
        Err(e) => Response::error(status_for(e), &e.to_string()),
    }
}

/// The `<id>` segment of `/bins/<id>/reset`.
fn reset_route(path: &str) -> Option<&str> {
    path.strip_prefix("/bins/")
        .and_then(|rest| rest.strip_suffix("/reset"))
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

fn reset(api: &impl GatewayApi, path: &str) -> Response {
    let id = reset_route(path).and_then(|id| id.parse::<u32>().ok());
    let Some(bin) = id.and_then(|id| api.fleet().bin(id)) else {
        return Response::error(404, "unknown bin");
    };
    if api.reset_bin(bin) {
        Response::json(200, &ResetDone { reset: bin })
    } else {
        Response::error(503, "gateway unavailable")
    }
}

/// HTTP status for a rejected command.
pub fn status_for(e: Error) -> u16 {
    match e {
        Error::Validation(ValidationError::AlreadyPending) => 409,
        Error::Validation(ValidationError::RateLimited) => 429,
        Error::Validation(_) => 422,
        Error::Transport(_) | Error::Unavailable => 503,
        Error::Decode(_) | Error::Config(_) => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use std::collections::VecDeque;

    use crate::app::commands::Command;
    use crate::error::TransportError;
    use crate::link::LinkState;

    struct FakeApi {
        snapshot: Snapshot,
        result: Result<CommandKind>,
        submitted: RefCell<Vec<CommandRequest>>,
    }

    impl FakeApi {
        fn new(result: Result<CommandKind>) -> Self {
            let fleet = Fleet::new(5);
            Self {
                snapshot: Snapshot {
                    bins: fleet.iter().map(BinState::new).collect(),
                    events: VecDeque::new(),
                    link: LinkState::Subscribed,
                    pending_collects: 1,
                    log_len: 7,
                },
                result,
                submitted: RefCell::new(Vec::new()),
            }
        }
    }

    impl GatewayApi for FakeApi {
        fn fleet(&self) -> Fleet {
            Fleet::new(5)
        }
        fn snapshot(&self) -> Snapshot {
            self.snapshot.clone()
        }
        fn submit(&self, request: &CommandRequest) -> Result<CommandKind> {
            self.submitted.borrow_mut().push(request.clone());
            Command::from_request(request, self.fleet())?;
            self.result
        }
        fn reset_bin(&self, _bin: BinId) -> bool {
            true
        }
    }

    fn post(api: &FakeApi, body: &str) -> Response {
        handle(api, Method::Post, "/command", body.as_bytes())
    }

    #[test]
    fn snapshot_renders_bins_with_labels() {
        let api = FakeApi::new(Ok(CommandKind::Dock));
        let r = handle(&api, Method::Get, "/snapshot", b"");
        assert_eq!(r.status, 200);
        assert!(r.body.contains(r#"{"id":1,"status":"unknown","label":"Unknown","lastUpdated":null}"#));
        assert!(r.body.contains(r#""link":"subscribed""#));
    }

    #[test]
    fn health_reports_counters() {
        let api = FakeApi::new(Ok(CommandKind::Dock));
        let r = handle(&api, Method::Get, "/health", b"");
        assert_eq!(r.status, 200);
        assert_eq!(r.body, r#"{"link":"subscribed","pendingCollects":1,"logLen":7}"#);
    }

    #[test]
    fn accepted_command_is_202() {
        let api = FakeApi::new(Ok(CommandKind::Collect));
        let r = post(&api, r#"{"kind":"collect","binId":2}"#);
        assert_eq!(r.status, 202);
        assert_eq!(r.body, r#"{"accepted":"collect"}"#);
        assert_eq!(api.submitted.borrow()[0], CommandRequest::collect(2));
    }

    #[test]
    fn malformed_body_is_400() {
        let api = FakeApi::new(Ok(CommandKind::Dock));
        assert_eq!(post(&api, "not json").status, 400);
        assert_eq!(post(&api, r#"{"kind":"fly"}"#).status, 400);
        assert!(api.submitted.borrow().is_empty());
    }

    #[test]
    fn rejections_map_to_status_codes() {
        let api = FakeApi::new(Ok(CommandKind::Collect));
        assert_eq!(post(&api, r#"{"kind":"collect","binId":9}"#).status, 422);
        assert_eq!(post(&api, r#"{"kind":"collect"}"#).status, 422);

        let api = FakeApi::new(Err(ValidationError::AlreadyPending.into()));
        assert_eq!(post(&api, r#"{"kind":"collect","binId":2}"#).status, 409);

        let api = FakeApi::new(Err(ValidationError::RateLimited.into()));
        assert_eq!(post(&api, r#"{"kind":"dock"}"#).status, 429);

        let api = FakeApi::new(Err(Error::Unavailable));
        let r = post(&api, r#"{"kind":"dock"}"#);
        assert_eq!(r.status, 503);
        assert_eq!(r.body, r#"{"error":"gateway unavailable"}"#);

        assert_eq!(status_for(TransportError::PublishFailed.into()), 503);
    }

    #[test]
    fn reset_route_validates_bin() {
        let api = FakeApi::new(Ok(CommandKind::Dock));
        let r = handle(&api, Method::Post, "/bins/3/reset", b"");
        assert_eq!(r.status, 200);
        assert_eq!(r.body, r#"{"reset":3}"#);
        assert_eq!(handle(&api, Method::Post, "/bins/6/reset", b"").status, 404);
        assert_eq!(handle(&api, Method::Post, "/bins/x/reset", b"").status, 404);
    }

    #[test]
    fn unknown_routes_and_methods() {
        let api = FakeApi::new(Ok(CommandKind::Dock));
        assert_eq!(handle(&api, Method::Get, "/nope", b"").status, 404);
        assert_eq!(handle(&api, Method::Get, "/command", b"").status, 405);
        assert_eq!(handle(&api, Method::Post, "/snapshot", b"").status, 405);
        assert_eq!(handle(&api, Method::Get, "/bins/3/reset", b"").status, 405);
        assert_eq!(handle(&api, Method::Get, "/bins/3", b"").status, 404);
        assert_eq!(handle(&api, Method::Post, "/bins//reset", b"").status, 404);
        assert_eq!(handle(&api, Method::Get, "/health?verbose=1", b"").status, 200);
    }
}
