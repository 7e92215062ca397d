//! HTTP front end for the operator API (ESP-IDF only).
//!
//! Every request is handed to [`api::handle`]; this module only moves
//! bytes between `EspHttpServer` and the router.

use std::sync::Arc;

use esp_idf_svc::http::Method as HttpMethod;
use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::io::{EspIOError, Read, Write};
use log::{info, warn};

use crate::api::{self, GatewayApi, Method, Response};

/// Largest accepted request body.  A raw command is well under this.
const MAX_BODY_LEN: usize = 512;

const JSON_HEADERS: &[(&str, &str)] = &[("Content-Type", "application/json")];

/// Start the server.  Dropping the returned value stops it.
pub fn serve<A>(api: Arc<A>, port: u16) -> anyhow::Result<EspHttpServer<'static>>
where
    A: GatewayApi + Send + Sync + 'static,
{
    let mut server = EspHttpServer::new(&Configuration {
        http_port: port,
        uri_match_wildcard: true,
        ..Default::default()
    })?;

    for (http, method) in [(HttpMethod::Get, Method::Get), (HttpMethod::Post, Method::Post)] {
        let api = api.clone();
        server.fn_handler("/*", http, move |req| respond(&*api, method, req))?;
    }

    info!("HTTP: operator API on port {}", port);
    Ok(server)
}

fn respond<A: GatewayApi>(
    api: &A,
    method: Method,
    mut req: Request<&mut EspHttpConnection<'_>>,
) -> Result<(), EspIOError> {
    let uri = req.uri().to_owned();
    let response = match read_body(&mut req)? {
        Some(body) => api::handle(api, method, &uri, &body),
        None => {
            warn!("HTTP: {} body over {} bytes", uri, MAX_BODY_LEN);
            Response {
                status: 413,
                body: String::from(r#"{"error":"body too large"}"#),
            }
        }
    };
    let mut resp = req.into_response(response.status, None, JSON_HEADERS)?;
    resp.write_all(response.body.as_bytes())?;
    Ok(())
}

/// Whole body, or `None` if it exceeds [`MAX_BODY_LEN`].
fn read_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> Result<Option<Vec<u8>>, EspIOError> {
    let mut body = Vec::new();
    let mut chunk = [0u8; 128];
    loop {
        let n = req.read(&mut chunk)?;
        if n == 0 {
            return Ok(Some(body));
        }
        if body.len() + n > MAX_BODY_LEN {
            return Ok(None);
        }
        body.extend_from_slice(&chunk[..n]);
    }
}
