use promptdo_core::{AssistError, AssistProvider, GeminiClient, GeminiSettings};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

const API_KEY: &str = "test-key";

/// One request as seen by the local server.
struct Captured {
    request_line: String,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Serves exactly one HTTP response and returns the base URL plus the captured request.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let base_url = format!("http://{}/v1beta", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream);

        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();

        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                headers.push((key.trim().to_string(), value.trim().to_string()));
            }
        }

        let length = headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| value.parse::<usize>().unwrap())
            .unwrap_or(0);
        let mut raw_body = vec![0; length];
        reader.read_exact(&mut raw_body).unwrap();

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let mut stream = reader.into_inner();
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();

        Captured {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: String::from_utf8(raw_body).unwrap(),
        }
    });

    (base_url, handle)
}

fn client(base_url: String) -> GeminiClient {
    GeminiClient::new(GeminiSettings {
        api_key: Some(API_KEY.to_string()),
        base_url,
        subtask_model: "subtask-model".to_string(),
        research_model: "research-model".to_string(),
        speech_model: "speech-model".to_string(),
        timeout_secs: 10,
        ..GeminiSettings::default()
    })
    .unwrap()
}

#[test]
fn break_down_posts_to_model_endpoint_with_key_header() {
    let (base_url, server) = serve_once(
        "200 OK",
        include_str!("fixtures/break_down_response.json"),
    );

    let drafts = client(base_url).break_down("throw a party").unwrap();
    let captured = server.join().unwrap();

    assert_eq!(drafts.len(), 3);
    assert_eq!(drafts[0].text, "Pick a date");
    assert_eq!(
        captured.request_line,
        "POST /v1beta/models/subtask-model:generateContent HTTP/1.1"
    );
    assert_eq!(captured.header("x-goog-api-key"), Some(API_KEY));
    assert!(captured
        .header("content-type")
        .unwrap()
        .starts_with("application/json"));

    let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent["generationConfig"]["responseSchema"]["type"], "ARRAY");
    assert!(!captured.body.contains(API_KEY));
}

#[test]
fn research_decodes_grounded_sources() {
    let (base_url, server) = serve_once("200 OK", include_str!("fixtures/research_response.json"));

    let research = client(base_url).research("sourdough").unwrap();
    let captured = server.join().unwrap();

    assert_eq!(research.sources.len(), 2);
    assert!(research.summary.starts_with("Sourdough relies"));
    assert_eq!(
        captured.request_line,
        "POST /v1beta/models/research-model:generateContent HTTP/1.1"
    );
}

#[test]
fn speak_decodes_inline_audio() {
    let (base_url, server) = serve_once("200 OK", include_str!("fixtures/speech_response.json"));

    let audio = client(base_url).speak("buy bread. feed cat").unwrap();
    let captured = server.join().unwrap();

    assert_eq!(audio.data, vec![0, 0, 1, 0, 2, 0, 3, 0]);
    assert_eq!(
        captured.request_line,
        "POST /v1beta/models/speech-model:generateContent HTTP/1.1"
    );
    let sent: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    assert_eq!(sent["generationConfig"]["responseModalities"][0], "AUDIO");
}

#[test]
fn error_status_maps_to_status_error_with_envelope_message() {
    let (base_url, server) = serve_once(
        "503 Service Unavailable",
        r#"{"error":{"code":503,"message":"overloaded","status":"UNAVAILABLE"}}"#,
    );

    let err = client(base_url).break_down("anything").unwrap_err();
    server.join().unwrap();

    match err {
        AssistError::Status { code, message } => {
            assert_eq!(code, 503);
            assert_eq!(message, "UNAVAILABLE: overloaded");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_success_body_is_a_decode_error() {
    let (base_url, server) = serve_once("200 OK", "not json");

    let err = client(base_url).research("anything").unwrap_err();
    server.join().unwrap();

    assert!(matches!(err, AssistError::Decode(_)));
}
