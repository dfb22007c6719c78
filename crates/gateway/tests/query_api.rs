//! End-to-end tests of the HTTP query surface over a scripted transport.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use {
    async_trait::async_trait,
    axum::{
        body::Body,
        http::{Request, StatusCode, header},
    },
    chrono::Utc,
    tower::ServiceExt,
};

use {
    botline_channels::Transport,
    botline_common::types::EndpointId,
    botline_config::schema::{CommandConfig, CommandPolicy},
    botline_gateway::{AppState, CommandCatalog, build_router},
    botline_relay::{
        Aggregator, CorrelationRegistry, DispatchTiming, Dispatcher, EndpointHealthTracker,
        InboundReply, MarkerSet,
    },
};

#[derive(Clone)]
enum Behavior {
    /// Accept the send and answer with this text, echoing the subject.
    Reply(&'static str),
    /// Accept the send, never reply.
    Silent,
}

/// Transport double that feeds replies straight back into the registry.
struct ScriptedTransport {
    registry: CorrelationRegistry,
    behaviors: HashMap<EndpointId, Behavior>,
    sends: Mutex<Vec<(EndpointId, String)>>,
}

impl ScriptedTransport {
    fn sent(&self) -> Vec<(EndpointId, String)> {
        self.sends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, endpoint: &EndpointId, text: &str) -> botline_channels::Result<()> {
        self.sends
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint.clone(), text.to_string()));

        if let Some(Behavior::Reply(reply_text)) = self.behaviors.get(endpoint) {
            // A real responder echoes the queried subject in its answer.
            let subject = text.split_whitespace().nth(1).map(str::to_string);
            let mut fields = BTreeMap::new();
            if let Some(subject) = &subject {
                fields.insert("dni".to_string(), subject.clone());
            }
            let reply = InboundReply {
                endpoint: endpoint.clone(),
                subject,
                text: reply_text.to_string(),
                fields,
                attachments: Vec::new(),
                received_at: Utc::now(),
            };
            let registry = self.registry.clone();
            tokio::spawn(async move {
                registry.route(reply);
            });
        }
        Ok(())
    }
}

fn test_state(behaviors: Vec<(&str, Behavior)>) -> (AppState, Arc<ScriptedTransport>) {
    let endpoints = vec![EndpointId::from("primary"), EndpointId::from("backup")];
    let health = EndpointHealthTracker::new(Duration::from_secs(6 * 3600));
    let markers = MarkerSet::new(vec!["usa el formato correcto".into()], Vec::new());
    let registry = CorrelationRegistry::new(markers, 100, health.clone());

    let transport = Arc::new(ScriptedTransport {
        registry: registry.clone(),
        behaviors: behaviors
            .into_iter()
            .map(|(endpoint, behavior)| (EndpointId::from(endpoint), behavior))
            .collect(),
        sends: Mutex::new(Vec::new()),
    });

    let commands = vec![CommandConfig {
        name: "dni".into(),
        policy: CommandPolicy::Single,
        requires_subject: true,
        subject_pattern: Some(r"\d{8}".into()),
        candidates: Vec::new(),
        kind: "persona".into(),
    }];
    let catalog = Arc::new(CommandCatalog::from_config(&commands, &endpoints).unwrap());

    let dispatcher = Arc::new(Dispatcher::new(
        transport.clone(),
        registry.clone(),
        health.clone(),
        DispatchTiming::default(),
    ));

    let state = AppState {
        dispatcher,
        registry,
        health,
        transport: transport.clone(),
        catalog,
        aggregator: Arc::new(Aggregator::new("\n---\n", vec!["dni".into()])),
        archive: None,
        endpoints: Arc::new(endpoints),
        files_dir: std::env::temp_dir(),
        started_at: Instant::now(),
    };
    (state, transport)
}

async fn get_json(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn successful_query_returns_aggregated_result() {
    let (state, transport) = test_state(vec![(
        "primary",
        Behavior::Reply("[BOTLINE] DNI : 12345678\nNombre : ANA MARIA"),
    )]);

    let (status, json) = get_json(state, "/api/query/dni?subject=12345678").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["dni"], "12345678");
    assert_eq!(json["endpoint"], "primary");
    assert_eq!(json["complete"], true);
    assert!(json["message"].as_str().unwrap().contains("ANA MARIA"));

    let sends = transport.sent();
    assert_eq!(sends.len(), 1);
    assert_eq!(sends[0].1, "/dni 12345678");
}

#[tokio::test]
async fn unknown_command_is_404() {
    let (state, _) = test_state(Vec::new());
    let (status, json) = get_json(state, "/api/query/nope?subject=12345678").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn missing_subject_is_400() {
    let (state, transport) = test_state(Vec::new());
    let (status, _) = get_json(state, "/api/query/dni").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn malformed_subject_is_400() {
    let (state, transport) = test_state(Vec::new());
    let (status, _) = get_json(state, "/api/query/dni?subject=123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn blocked_endpoints_exhaust_without_sending() {
    let (state, transport) = test_state(Vec::new());
    state.health.record_failure(&EndpointId::from("primary"));
    state.health.record_failure(&EndpointId::from("backup"));

    let (status, json) = get_json(state, "/api/query/dni?subject=12345678").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["status"], "error");
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn remote_format_rejection_is_422() {
    let (state, _) = test_state(vec![(
        "primary",
        Behavior::Reply("Por favor, usa el formato correcto: /dni 12345678"),
    )]);

    let (status, json) = get_json(state, "/api/query/dni?subject=12345678").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["status"], "error");
}

#[tokio::test]
async fn status_reports_endpoints_and_transport() {
    let (state, _) = test_state(vec![("primary", Behavior::Silent)]);
    let (status, json) = get_json(state, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["transport"]["name"], "scripted");
    assert_eq!(json["transport"]["health"]["connected"], true);
    assert_eq!(json["endpoints"].as_array().unwrap().len(), 2);
    assert_eq!(json["pending_calls"], 0);
}

#[tokio::test]
async fn unclaimed_replies_show_up_in_the_inbox() {
    let (state, _) = test_state(Vec::new());
    state.registry.route(InboundReply {
        endpoint: EndpointId::from("primary"),
        subject: None,
        text: "mensaje suelto".into(),
        fields: BTreeMap::new(),
        attachments: Vec::new(),
        received_at: Utc::now(),
    });

    let (status, json) = get_json(state, "/api/inbox").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 1);
    assert_eq!(json["replies"][0]["text"], "mensaje suelto");
}

#[tokio::test]
async fn raw_send_bypasses_the_catalog() {
    let (state, transport) = test_state(vec![("primary", Behavior::Silent)]);

    let body = serde_json::json!({ "endpoint": "primary", "text": "hola" });
    let response = build_router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/send")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sends = transport.sent();
    assert_eq!(sends, vec![(EndpointId::from("primary"), "hola".to_string())]);
}
