// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Cursor;

fn decode(json: &str) -> Result<Request, ProtocolError> {
    let request: Request = serde_json::from_str(json)?;
    request.validate()?;
    Ok(request)
}

#[test]
fn decodes_ping() {
    assert!(matches!(decode(r#"{"command":"ping"}"#).unwrap(), Request::Ping));
}

#[test]
fn status_defaults_event_count_to_ten() {
    match decode(r#"{"command":"status"}"#).unwrap() {
        Request::Status { event_count } => assert_eq!(event_count, 10),
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn rejects_unknown_command() {
    assert!(decode(r#"{"command":"nonsense"}"#).is_err());
}

#[test]
fn rejects_unknown_field_in_known_command() {
    assert!(decode(r#"{"command":"ping","bogus":1}"#).is_err());
}

#[test]
fn rejects_empty_worker_id() {
    let err = decode(r#"{"command":"task_claim","worker_id":"   "}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::Validation(_)));
}

#[test]
fn rejects_empty_task_or_worker_id_on_complete() {
    assert!(decode(r#"{"command":"task_complete","task_id":"","worker_id":"w1"}"#).is_err());
    assert!(decode(r#"{"command":"task_complete","task_id":"A","worker_id":""}"#).is_err());
}

#[test]
fn rejects_negative_exec_timeout() {
    let err =
        decode(r#"{"command":"exec","args":["echo","hi"],"timeout":-1}"#).unwrap_err();
    assert!(matches!(err, ProtocolError::Validation(_)));
}

#[test]
fn rejects_empty_update_state() {
    assert!(decode(r#"{"command":"update_state","updates":{}}"#).is_err());
}

#[test]
fn accepts_non_empty_update_state() {
    assert!(decode(r#"{"command":"update_state","updates":{"tasks":{}}}"#).is_ok());
}

#[test]
fn rejects_empty_plan_import_content() {
    assert!(decode(r#"{"command":"plan_import","content":""}"#).is_err());
}

#[tokio::test]
async fn read_request_reads_one_line() {
    let mut cursor = Cursor::new(b"{\"command\":\"ping\"}\n{\"command\":\"shutdown\"}\n".to_vec());
    let first = read_request(&mut cursor).await.unwrap();
    assert!(matches!(first, Request::Ping));
    let second = read_request(&mut cursor).await.unwrap();
    assert!(matches!(second, Request::Shutdown));
}

#[tokio::test]
async fn read_request_reports_connection_closed_on_eof() {
    let mut cursor = Cursor::new(Vec::new());
    let err = read_request(&mut cursor).await.unwrap_err();
    assert!(matches!(err, ProtocolError::ConnectionClosed));
}

#[tokio::test]
async fn write_response_is_newline_terminated_json() {
    let mut buf = Vec::new();
    write_response(&mut buf, &Response::ok(serde_json::json!({"running": true}))).await.unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert!(text.ends_with('\n'));
    let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
    assert_eq!(value["status"], "ok");
    assert_eq!(value["data"]["running"], true);
}

#[tokio::test]
async fn error_response_shape() {
    let mut buf = Vec::new();
    write_response(&mut buf, &Response::error("boom")).await.unwrap();
    let text = String::from_utf8(buf).unwrap();
    let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
    assert_eq!(value["status"], "error");
    assert_eq!(value["message"], "boom");
}
