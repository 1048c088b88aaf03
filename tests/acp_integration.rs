//! Integration tests for the ACP agent.
//!
//! These drive the serve loop over in-memory pipes and check the frames a
//! client would see: id correlation, error codes, notification ordering and
//! tolerance of bad input.

use std::collections::{HashMap, HashSet};
use std::io;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};

use koog_reviewer::acp::protocol::{parse_message, IncomingMessage, RequestId};
use koog_reviewer::acp::{AcpServer, FrameReader, FrameWriter, ServerInfo};
use koog_reviewer::error::ServerError;
use koog_reviewer::tools::ToolRegistry;

fn make_server() -> AcpServer {
    AcpServer::new(
        ToolRegistry::new(None).expect("registry"),
        ServerInfo::default(),
    )
}

/// Feeds `input` to the server and returns every frame it wrote.
async fn exchange(server: &AcpServer, input: &str) -> Vec<Value> {
    exchange_bytes(server, input.as_bytes()).await
}

/// Like [`exchange`], for input that is not necessarily UTF-8.
async fn exchange_bytes(server: &AcpServer, input: &[u8]) -> Vec<Value> {
    let (server_out, mut client_out) = tokio::io::duplex(1 << 20);
    let reader = FrameReader::new(input);
    let writer = FrameWriter::new(server_out);

    let (result, output) = tokio::join!(server.serve(reader, writer), async {
        let mut output = String::new();
        client_out
            .read_to_string(&mut output)
            .await
            .expect("read output");
        output
    });
    result.expect("serve");

    output
        .lines()
        .map(|line| serde_json::from_str(line).expect("every frame is JSON"))
        .collect()
}

fn line(value: &Value) -> String {
    format!("{value}\n")
}

fn responses_for<'a>(frames: &'a [Value], id: &Value) -> Vec<&'a Value> {
    frames.iter().filter(|f| f.get("id") == Some(id)).collect()
}

async fn next_frame(lines: &mut Lines<BufReader<DuplexStream>>) -> Value {
    let raw = lines.next_line().await.expect("read").expect("frame");
    serde_json::from_str(&raw).expect("json")
}

fn is_update(frame: &Value) -> bool {
    frame["method"] == "session/update"
}

async fn create_session(server: &AcpServer) -> String {
    let frames = exchange(
        server,
        &line(&json!({"jsonrpc": "2.0", "id": 1, "method": "session/new"})),
    )
    .await;
    frames[0]["result"]["sessionId"]
        .as_str()
        .expect("sessionId")
        .to_string()
}

// =============================================================================
// Protocol Parsing Tests
// =============================================================================

#[test]
fn test_parse_initialize_request() {
    let json = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": 1,
            "clientCapabilities": { "fs": { "readTextFile": true } }
        }
    }"#;

    let IncomingMessage::Request(req) = parse_message(json).expect("parse") else {
        panic!("Expected Request");
    };
    assert_eq!(req.method, "initialize");
    assert_eq!(req.id, RequestId::from(1));
}

#[test]
fn test_parse_prompt_request_with_string_id() {
    let json = r#"{"jsonrpc":"2.0","id":"p-1","method":"session/prompt","params":{"sessionId":"s","prompt":[]}}"#;

    let IncomingMessage::Request(req) = parse_message(json).expect("parse") else {
        panic!("Expected Request");
    };
    assert_eq!(req.id, RequestId::String("p-1".to_string()));
    assert!(req.params.is_some());
}

#[test]
fn test_parse_notification() {
    let json = r#"{"jsonrpc": "2.0", "method": "session/cancel", "params": {"sessionId": "s"}}"#;
    assert!(matches!(
        parse_message(json),
        Ok(IncomingMessage::Notification(_))
    ));
}

#[test]
fn test_parse_invalid_json() {
    assert!(parse_message("not valid json").is_err());
}

// =============================================================================
// Dispatch Over the Serve Loop
// =============================================================================

#[tokio::test]
async fn session_new_then_prompt_scenario() {
    let server = make_server();

    let frames = exchange(
        &server,
        &line(&json!({"jsonrpc": "2.0", "id": 1, "method": "session/new"})),
    )
    .await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["jsonrpc"], "2.0");
    assert_eq!(frames[0]["id"], 1);
    let session_id = frames[0]["result"]["sessionId"]
        .as_str()
        .expect("sessionId")
        .to_string();
    assert_eq!(session_id.len(), 36, "hyphenated UUID");

    let frames = exchange(
        &server,
        &line(&json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "session/prompt",
            "params": {
                "sessionId": session_id,
                "prompt": [{"type": "text", "text": "review X"}]
            }
        })),
    )
    .await;

    assert_eq!(frames.len(), 2);
    assert!(is_update(&frames[0]));
    assert!(frames[0].get("id").is_none());
    assert_eq!(frames[0]["params"]["sessionId"], session_id.as_str());
    assert_eq!(frames[0]["params"]["update"]["content"][0]["type"], "text");

    assert_eq!(frames[1]["id"], 2);
    assert_eq!(frames[1]["result"]["stopReason"], "end_turn");
    assert_eq!(
        frames[1]["result"]["content"],
        frames[0]["params"]["update"]["content"]
    );
}

#[tokio::test]
async fn interactive_client_over_pipes() {
    let server = make_server();
    let (mut client_in, server_in) = tokio::io::duplex(4096);
    let (server_out, client_out) = tokio::io::duplex(1 << 16);

    let serve = {
        let server = server.clone();
        tokio::spawn(async move {
            server
                .serve(FrameReader::new(server_in), FrameWriter::new(server_out))
                .await
        })
    };

    let mut lines = BufReader::new(client_out).lines();

    client_in
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\"}\n")
        .await
        .expect("write");
    let init = next_frame(&mut lines).await;
    assert_eq!(init["result"]["protocolVersion"], 1);

    client_in
        .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"session/new\"}\n")
        .await
        .expect("write");
    let created = next_frame(&mut lines).await;
    let session_id = created["result"]["sessionId"].as_str().expect("id").to_string();

    let prompt = json!({
        "jsonrpc": "2.0",
        "id": 3,
        "method": "session/prompt",
        "params": {"sessionId": session_id, "prompt": [{"type": "text", "text": "hi what can you do"}]}
    });
    client_in
        .write_all(line(&prompt).as_bytes())
        .await
        .expect("write");

    let update = next_frame(&mut lines).await;
    let response = next_frame(&mut lines).await;
    assert!(is_update(&update));
    assert_eq!(response["id"], 3);
    assert_eq!(response["result"]["stopReason"], "end_turn");

    drop(client_in);
    serve.await.expect("join").expect("serve");
}

#[tokio::test]
async fn response_ids_match_request_ids_exactly() {
    let server = make_server();
    let input = [
        json!({"jsonrpc": "2.0", "id": 10, "method": "initialize"}),
        json!({"jsonrpc": "2.0", "id": "ten", "method": "initialize"}),
        json!({"jsonrpc": "2.0", "id": -3, "method": "session/new"}),
        json!({"jsonrpc": "2.0", "id": "x-1", "method": "nope"}),
        json!({"jsonrpc": "2.0", "id": 0, "method": "session/prompt"}),
    ]
    .iter()
    .map(line)
    .collect::<String>();

    let frames = exchange(&server, &input).await;
    assert_eq!(frames.len(), 5);

    for id in [json!(10), json!("ten"), json!(-3), json!("x-1"), json!(0)] {
        assert_eq!(responses_for(&frames, &id).len(), 1, "id {id}");
    }
    assert!(responses_for(&frames, &json!("10")).is_empty());
    assert!(responses_for(&frames, &json!(-3))[0]["result"].is_object());
}

#[tokio::test]
async fn every_request_gets_exactly_one_response() {
    let server = make_server();
    let session_id = create_session(&server).await;

    let mut input = String::new();
    for i in 0..30 {
        let request = match i % 4 {
            0 => json!({"jsonrpc": "2.0", "id": i, "method": "initialize"}),
            1 => json!({"jsonrpc": "2.0", "id": i, "method": "session/new"}),
            2 => json!({
                "jsonrpc": "2.0", "id": i, "method": "session/prompt",
                "params": {"sessionId": session_id, "prompt": [{"type": "text", "text": "go"}]}
            }),
            _ => json!({"jsonrpc": "2.0", "id": i, "method": "unknown/thing"}),
        };
        input.push_str(&line(&request));
    }

    let frames = exchange(&server, &input).await;
    let mut counts: HashMap<i64, usize> = HashMap::new();
    for frame in frames.iter().filter(|f| !is_update(f)) {
        *counts.entry(frame["id"].as_i64().expect("numeric id")).or_default() += 1;
    }

    assert_eq!(counts.len(), 30);
    assert!(counts.values().all(|&n| n == 1));
}

#[tokio::test]
async fn update_precedes_response_for_each_prompt() {
    let server = make_server();
    let mut sessions = Vec::new();
    for _ in 0..5 {
        sessions.push(create_session(&server).await);
    }

    let mut input = String::new();
    let mut session_for_id = HashMap::new();
    for (i, session_id) in sessions.iter().cycle().take(20).enumerate() {
        let id = i as i64 + 100;
        session_for_id.insert(id, session_id.clone());
        input.push_str(&line(&json!({
            "jsonrpc": "2.0", "id": id, "method": "session/prompt",
            "params": {"sessionId": session_id, "prompt": [{"type": "text", "text": format!("turn {i}")}]}
        })));
    }

    let frames = exchange(&server, &input).await;
    assert_eq!(frames.len(), 40);

    for (index, frame) in frames.iter().enumerate() {
        if is_update(frame) {
            continue;
        }
        let id = frame["id"].as_i64().expect("id");
        assert!(index > 0, "response cannot be first");
        let update = &frames[index - 1];
        assert!(is_update(update), "frame before response {id} must be its update");
        assert_eq!(
            update["params"]["sessionId"],
            session_for_id[&id].as_str(),
            "update for response {id} belongs to its session"
        );
    }
}

#[tokio::test]
async fn session_new_mints_distinct_resolvable_ids() {
    let server = make_server();
    let input = (0..25)
        .map(|i| line(&json!({"jsonrpc": "2.0", "id": i, "method": "session/new"})))
        .collect::<String>();

    let frames = exchange(&server, &input).await;
    let ids: HashSet<String> = frames
        .iter()
        .map(|f| f["result"]["sessionId"].as_str().expect("id").to_string())
        .collect();
    assert_eq!(ids.len(), 25);
    assert_eq!(server.sessions().len().expect("len"), 25);

    let prompts = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            line(&json!({
                "jsonrpc": "2.0", "id": i, "method": "session/prompt",
                "params": {"sessionId": id, "prompt": []}
            }))
        })
        .collect::<String>();
    let frames = exchange(&server, &prompts).await;
    assert!(frames.iter().all(|f| f.get("error").is_none()));
    assert_eq!(frames.iter().filter(|f| is_update(f)).count(), 25);
}

#[tokio::test]
async fn prompt_for_unknown_session_never_notifies() {
    let server = make_server();
    let input = line(&json!({
        "jsonrpc": "2.0", "id": 7, "method": "session/prompt",
        "params": {"sessionId": "no-such-session", "prompt": [{"type": "text", "text": "hi"}]}
    }));

    let frames = exchange(&server, &input).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], 7);
    assert_eq!(frames[0]["error"]["code"], -32603);
    assert_eq!(
        frames[0]["error"]["message"],
        "Session not found: no-such-session"
    );
    assert!(frames[0].get("result").is_none());
}

#[tokio::test]
async fn prompt_without_params_reports_missing_params() {
    let frames = exchange(
        &make_server(),
        "{\"jsonrpc\":\"2.0\",\"id\":8,\"method\":\"session/prompt\"}\n",
    )
    .await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["error"]["code"], -32603);
    assert_eq!(frames[0]["error"]["message"], "Missing params");
}

#[tokio::test]
async fn initialize_never_fails() {
    let input = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "id": 3, "method": "initialize", "params": [1, 2, 3]}),
        json!({"jsonrpc": "2.0", "id": 4, "method": "initialize", "params": {"clientInfo": "bad"}}),
        json!({"jsonrpc": "2.0", "id": 5, "method": "initialize", "params": null}),
    ]
    .iter()
    .map(line)
    .collect::<String>();

    let frames = exchange(&make_server(), &input).await;
    assert_eq!(frames.len(), 5);
    for frame in &frames {
        assert!(frame.get("error").is_none(), "unexpected error: {frame}");
        let tools = frame["result"]["capabilities"]["tools"]
            .as_array()
            .expect("tools");
        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().expect("name")).collect();
        assert_eq!(names, vec!["readFile", "scanCode"]);
        assert_eq!(frame["result"]["protocolVersion"], 1);
        assert!(frame["result"]["serverInfo"]["name"].is_string());
    }
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let frames = exchange(
        &make_server(),
        "{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"foo\"}\n",
    )
    .await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["jsonrpc"], "2.0");
    assert_eq!(frames[0]["id"], 3);
    assert_eq!(frames[0]["error"]["code"], -32601);
    assert!(frames[0]["error"]["message"]
        .as_str()
        .expect("message")
        .contains("foo"));
}

// =============================================================================
// Bad Input Tolerance
// =============================================================================

#[tokio::test]
async fn malformed_lines_are_skipped_silently() {
    let input = concat!(
        "not json at all\n",
        "{\"jsonrpc\":\"2.0\",\"id\":99,\"method\":}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":98}\n",
        "{\"jsonrpc\":\"1.0\",\"id\":97,\"method\":\"initialize\"}\n",
        "[1,2,3]\n",
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\"}\n",
    );

    let frames = exchange(&make_server(), input).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], 1);
    for id in [99, 98, 97] {
        assert!(responses_for(&frames, &json!(id)).is_empty());
    }
}

#[tokio::test]
async fn invalid_utf8_line_does_not_stop_the_loop() {
    let mut input = b"\xff\xfe\n".to_vec();
    input.extend_from_slice(b"{\"id\":\"\xc3\x28\",\"method\":");
    input.extend_from_slice(b"\n");
    input.extend_from_slice(br#"{"jsonrpc":"2.0","id":2,"method":"session/new"}"#);
    input.push(b'\n');

    let frames = exchange_bytes(&make_server(), &input).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], 2);
    assert!(frames[0]["result"]["sessionId"].is_string());
}

#[tokio::test]
async fn invalid_utf8_inside_a_request_is_still_answered() {
    let mut input = br#"{"jsonrpc":"2.0","id":5,"method":"session/prompt","params":{"sessionId":"#.to_vec();
    input.extend_from_slice(b"\"bad\xff\",\"prompt\":[]}}\n");

    let frames = exchange_bytes(&make_server(), &input).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], 5);
    assert_eq!(frames[0]["error"]["code"], -32603);
    assert_eq!(
        frames[0]["error"]["message"],
        "Session not found: bad\u{fffd}"
    );
}

#[tokio::test]
async fn non_integer_numeric_ids_are_answered() {
    let input = concat!(
        "{\"jsonrpc\":\"2.0\",\"id\":1.5,\"method\":\"session/new\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":18446744073709551615,\"method\":\"session/new\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":1e3,\"method\":\"nope\"}\n",
        "{\"jsonrpc\":\"2.0\",\"id\":-7,\"method\":\"initialize\"}\n",
    );

    let frames = exchange(&make_server(), input).await;
    assert_eq!(frames.len(), 4);

    assert_eq!(responses_for(&frames, &json!(1.5)).len(), 1);
    assert_eq!(responses_for(&frames, &json!(u64::MAX)).len(), 1);
    assert_eq!(responses_for(&frames, &json!(-7)).len(), 1);

    let exponent: Vec<&Value> = frames
        .iter()
        .filter(|f| f["id"].as_f64() == Some(1000.0))
        .collect();
    assert_eq!(exponent.len(), 1);
    assert_eq!(exponent[0]["error"]["code"], -32601);
}

#[tokio::test]
async fn blank_lines_and_notifications_produce_no_output() {
    let input = concat!(
        "\n",
        "   \n",
        "\r\n",
        "{\"jsonrpc\":\"2.0\",\"method\":\"session/cancel\",\"params\":{\"sessionId\":\"s\"}}\n",
        "\t\n",
    );

    let frames = exchange(&make_server(), input).await;
    assert!(frames.is_empty());
}

#[tokio::test]
async fn empty_input_shuts_down_cleanly() {
    let frames = exchange(&make_server(), "").await;
    assert!(frames.is_empty());
}

#[tokio::test]
async fn final_line_without_newline_is_processed() {
    let frames = exchange(
        &make_server(),
        "{\"jsonrpc\":\"2.0\",\"id\":\"last\",\"method\":\"session/new\"}",
    )
    .await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["id"], "last");
}

// =============================================================================
// Transport Failures
// =============================================================================

#[tokio::test]
async fn write_failure_is_fatal() {
    let output = tokio_test::io::Builder::new()
        .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        .build();
    let input = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"initialize\"}\n";

    let result = make_server()
        .serve(FrameReader::new(input.as_bytes()), FrameWriter::new(output))
        .await;
    assert!(matches!(result, Err(ServerError::Write(_))));
}

#[tokio::test]
async fn read_failure_is_fatal() {
    let input = tokio_test::io::Builder::new()
        .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        .build();
    let (server_out, _client_out) = tokio::io::duplex(64);

    let result = make_server()
        .serve(FrameReader::new(input), FrameWriter::new(server_out))
        .await;
    assert!(matches!(result, Err(ServerError::Read(_))));
}

#[tokio::test]
async fn shutdown_future_stops_the_loop() {
    let (_client_in, server_in) = tokio::io::duplex(64);
    let (server_out, _client_out) = tokio::io::duplex(64);

    let result = make_server()
        .serve_until(
            FrameReader::new(server_in),
            FrameWriter::new(server_out),
            std::future::ready(()),
        )
        .await;
    assert!(result.is_ok());
}
