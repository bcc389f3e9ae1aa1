//! Unix-socket control transport.
//!
//! Each request is one fixed-size [`WireRequestHeader`] followed by a
//! kind-specific payload; each response is a [`WireResponseHeader`] plus
//! an array of fixed-size records (or a status string). Decoded requests
//! are forwarded to the control handler over its channel, so the socket
//! layer never touches the engine directly.

use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use application::control::{ControlMessage, Request, Response};
use domain::common::entity::Action;
use domain::filter::entity::FilterRule;
use domain::nat::entity::NatRule;
use wire::filter::WireFilterRule;
use wire::nat::WireNatRule;
use wire::request::WireRequestHeader;
use wire::response::WireResponseHeader;

/// Accept loop. Binds the socket (replacing any stale file), serves
/// connections until cancellation, then removes the socket file.
pub async fn serve(
    path: PathBuf,
    tx: mpsc::Sender<ControlMessage>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)?;
    info!(socket = %path.display(), "control socket listening");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    tokio::spawn(handle_conn(stream, tx.clone()));
                }
                Err(e) => warn!(error = %e, "control accept failed"),
            }
        }
    }

    let _ = std::fs::remove_file(&path);
    info!("control socket closed");
    Ok(())
}

async fn handle_conn(mut stream: UnixStream, tx: mpsc::Sender<ControlMessage>) {
    loop {
        let mut hdr_buf = [0u8; WireRequestHeader::SIZE];
        match stream.read_exact(&mut hdr_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => {
                debug!(error = %e, "control connection read failed");
                break;
            }
        }
        let header = WireRequestHeader::from_bytes(&hdr_buf);

        let mut payload = vec![0u8; header.payload_len()];
        if !payload.is_empty() && stream.read_exact(&mut payload).await.is_err() {
            break;
        }

        let response = match decode_request(&header, &payload) {
            Ok(request) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if tx
                    .send(ControlMessage {
                        request,
                        reply: reply_tx,
                    })
                    .await
                    .is_err()
                {
                    break; // handler gone, daemon is shutting down
                }
                match reply_rx.await {
                    Ok(response) => response,
                    Err(_) => break,
                }
            }
            Err(message) => Response::Message(message),
        };

        if stream.write_all(&encode_response(&response)).await.is_err() {
            break;
        }
    }
}

/// Turn one wire frame into a typed request. Malformed payloads come
/// back as the status string to send, with no engine involvement.
fn decode_request(header: &WireRequestHeader, payload: &[u8]) -> Result<Request, String> {
    match header.kind {
        wire::REQ_GET_ALL_IP_RULES => Ok(Request::ListFilterRules),

        wire::REQ_ADD_IP_RULE => {
            let Ok(bytes) = <[u8; WireFilterRule::SIZE]>::try_from(payload) else {
                return Err("Fail: truncated rule payload.".to_string());
            };
            let entry = WireFilterRule::from_bytes(&bytes);
            let rule = FilterRule::from_wire(&entry).map_err(|e| format!("Fail: {e}."))?;
            Ok(Request::AddFilterRule {
                anchor: wire::decode_rule_name(&header.rule_name),
                rule,
            })
        }

        wire::REQ_DEL_IP_RULE => Ok(Request::DeleteFilterRule {
            name: wire::decode_rule_name(&header.rule_name),
        }),

        wire::REQ_SET_ACTION => {
            let code = read_u32(payload)?;
            Ok(Request::SetDefaultAction {
                action: Action::from_wire(code),
            })
        }

        wire::REQ_GET_ALL_IP_LOGS => Ok(Request::ListLogs {
            newest: read_u32(payload)?,
        }),

        wire::REQ_GET_ALL_CONNS => Ok(Request::ListConnections),

        wire::REQ_ADD_NAT_RULE => {
            let Ok(bytes) = <[u8; WireNatRule::SIZE]>::try_from(payload) else {
                return Err("Fail: truncated NAT rule payload.".to_string());
            };
            let entry = WireNatRule::from_bytes(&bytes);
            let rule = NatRule::from_wire(&entry).map_err(|e| format!("Fail: {e}."))?;
            Ok(Request::AddNatRule { rule })
        }

        wire::REQ_DEL_NAT_RULE => {
            let code = read_u32(payload)?;
            Ok(Request::DeleteNatRule {
                index: i64::from(code as i32),
            })
        }

        wire::REQ_GET_NAT_RULES => Ok(Request::ListNatRules),

        other => {
            debug!(kind = other, "unknown control request kind");
            Err("No such req.".to_string())
        }
    }
}

fn read_u32(payload: &[u8]) -> Result<u32, String> {
    let Ok(bytes) = <[u8; 4]>::try_from(payload) else {
        return Err("Fail: truncated payload.".to_string());
    };
    Ok(u32::from_ne_bytes(bytes))
}

/// Serialize a response as header + record array, capped at
/// [`wire::MAX_PAYLOAD`] body bytes.
fn encode_response(response: &Response) -> Vec<u8> {
    let mut body = Vec::new();
    let array_len: u32;

    match response {
        Response::FilterRules(rules) => {
            let take = rules.len().min(body_cap(WireFilterRule::SIZE));
            for rule in &rules[..take] {
                body.extend_from_slice(&rule.to_wire().to_bytes());
            }
            array_len = take as u32;
        }
        Response::NatRules(rules) => {
            let take = rules.len().min(body_cap(WireNatRule::SIZE));
            for rule in &rules[..take] {
                body.extend_from_slice(&rule.to_wire().to_bytes());
            }
            array_len = take as u32;
        }
        Response::Logs(records) => {
            let take = records.len().min(body_cap(wire::log::WireLogRecord::SIZE));
            for record in &records[..take] {
                body.extend_from_slice(&record.to_wire().to_bytes());
            }
            array_len = take as u32;
        }
        Response::Connections(records) => {
            let take = records.len().min(body_cap(wire::conn::WireConnRecord::SIZE));
            for record in &records[..take] {
                body.extend_from_slice(&record.to_wire().to_bytes());
            }
            array_len = take as u32;
        }
        Response::Message(text) => {
            let take = text.len().min(wire::MAX_PAYLOAD - WireResponseHeader::SIZE);
            body.extend_from_slice(&text.as_bytes()[..take]);
            array_len = take as u32;
        }
        Response::HeadOnly { count } => {
            array_len = *count;
        }
    }

    let header = WireResponseHeader {
        body_type: response.body_type(),
        array_len,
    };
    let mut out = Vec::with_capacity(WireResponseHeader::SIZE + body.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&body);
    out
}

fn body_cap(record_size: usize) -> usize {
    (wire::MAX_PAYLOAD - WireResponseHeader::SIZE) / record_size
}
