//! Integration tests for the messaging endpoint.
//!
//! Each test spins up a stub webhook server and the bot on random ports and
//! exercises the real HTTP contract: activities in, replies out, webhook
//! calls in between.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{Json, Router, extract::State, routing::post};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use vitae_bot::channels::{ConnectorClient, bot_routes};
use vitae_bot::config::WebhookConfig;
use vitae_bot::delegate::{APOLOGY_MESSAGE, MAINTENANCE_MESSAGE, WORKING_MESSAGE, WebhookDelegate};
use vitae_bot::dialogs::build_dialogs;
use vitae_bot::router::{DialogRouter, MENU_TITLE, RouterConfig, TURN_ERROR_MESSAGE};
use vitae_bot::store::MemoryStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline the bot applies to webhook calls in these tests.
const DELEGATE_TIMEOUT: Duration = Duration::from_secs(1);

/// Everything the stub server received, in order.
#[derive(Clone, Default)]
struct Received {
    webhooks: Arc<Mutex<Vec<(String, Value)>>>,
    connector: Arc<Mutex<Vec<Value>>>,
    /// Connector texts delivered while each candidate-search call was open.
    delivered_before_call: Arc<Mutex<Vec<Vec<String>>>>,
}

impl Received {
    fn webhooks(&self) -> Vec<(String, Value)> {
        self.webhooks.lock().unwrap().clone()
    }

    fn connector(&self) -> Vec<Value> {
        self.connector.lock().unwrap().clone()
    }
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Stub automation backend plus a stub connector endpoint.
async fn start_stub() -> (String, Received) {
    let received = Received::default();

    async fn candidatos(State(rx): State<Received>, Json(body): Json<Value>) -> Json<Value> {
        // Give a streamed working notice up to 200ms to land while the call is open.
        let mut delivered = Vec::new();
        for _ in 0..20 {
            delivered = rx
                .connector()
                .iter()
                .filter_map(|a| a["text"].as_str().map(str::to_string))
                .collect();
            if delivered.iter().any(|t| t == WORKING_MESSAGE) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        rx.delivered_before_call.lock().unwrap().push(delivered);
        rx.webhooks.lock().unwrap().push(("candidato".into(), body));
        Json(json!([{ "text": "3 candidatos encontrados" }]))
    }

    async fn vitae(State(rx): State<Received>, Json(body): Json<Value>) -> Json<Value> {
        rx.webhooks.lock().unwrap().push(("vitae".into(), body));
        Json(json!({ "estado": "recibido" }))
    }

    async fn slow(State(rx): State<Received>, Json(body): Json<Value>) -> Json<Value> {
        rx.webhooks.lock().unwrap().push(("validacion".into(), body));
        tokio::time::sleep(Duration::from_secs(2)).await;
        Json(json!([{ "text": "demasiado tarde" }]))
    }

    async fn connector(State(rx): State<Received>, Json(body): Json<Value>) -> Json<Value> {
        rx.connector.lock().unwrap().push(body);
        Json(json!({ "id": "sent" }))
    }

    let app = Router::new()
        .route("/webhook/candidatos", post(candidatos))
        .route("/webhook/vitae", post(vitae))
        .route("/webhook/validacion", post(slow))
        .route(
            "/connector/v3/conversations/{conversation}/activities/{reply_to}",
            post(connector),
        )
        .with_state(received.clone());

    (spawn(app).await, received)
}

/// Start the bot wired to the stub; returns (bot url, stub url, received).
async fn start_bot() -> (String, String, Received) {
    let (stub, received) = start_stub().await;
    let webhooks = WebhookConfig {
        solicitud: None,
        candidato: Some(format!("{stub}/webhook/candidatos")),
        validacion: Some(format!("{stub}/webhook/validacion")),
        vitae: Some(format!("{stub}/webhook/vitae")),
    };
    let delegate = Arc::new(WebhookDelegate::new(webhooks, DELEGATE_TIMEOUT));
    let dialogs = build_dialogs(delegate, None).unwrap();
    let router = Arc::new(DialogRouter::new(
        Arc::new(MemoryStore::new()),
        dialogs,
        RouterConfig::default(),
    ));
    let app = bot_routes(router, ConnectorClient::new(Duration::from_secs(2)));

    // Give the servers a moment to start accepting connections.
    let bot = spawn(app).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    (bot, stub, received)
}

fn message(text: &str) -> Value {
    json!({
        "type": "message",
        "id": "act-1",
        "channelId": "msteams",
        "deliveryMode": "expectReplies",
        "from": { "id": "29:user", "name": "Ana Gómez", "aadObjectId": "aad-1" },
        "conversation": { "id": "conv-1" },
        "recipient": { "id": "28:bot" },
        "text": text
    })
}

/// POST an expectReplies activity and return the reply texts plus card titles.
async fn say(bot: &str, activity: Value) -> Vec<String> {
    let response = reqwest::Client::new()
        .post(format!("{bot}/api/messages"))
        .json(&activity)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    body["activities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| match a["text"].as_str() {
            Some(text) => text.to_string(),
            None => a["attachments"][0]["content"]["title"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
        })
        .collect()
}

#[tokio::test]
async fn status_routes() {
    timeout(TEST_TIMEOUT, async {
        let (bot, _, _) = start_bot().await;

        let root = reqwest::get(format!("{bot}/")).await.unwrap();
        assert_eq!(root.text().await.unwrap(), "Bot is running ✅");

        let health: Value = reqwest::get(format!("{bot}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn first_message_gets_welcome_and_menu() {
    timeout(TEST_TIMEOUT, async {
        let (bot, _, _) = start_bot().await;

        let replies = say(&bot, message("hola")).await;
        assert_eq!(
            replies,
            vec![
                "Me alegro que estés aquí, Ana Gómez".to_string(),
                "Bienvenido a nuestro chat de Automatizacion de Recursos Humanos en Softgic."
                    .to_string(),
                MENU_TITLE.to_string(),
            ]
        );

        let replies = say(&bot, message("no sé")).await;
        assert_eq!(replies, vec![MENU_TITLE.to_string()]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn candidate_search_relays_webhook_text() {
    timeout(TEST_TIMEOUT, async {
        let (bot, _, received) = start_bot().await;

        say(&bot, message("hola")).await;
        let replies = say(&bot, message("busqueda")).await;
        assert_eq!(replies.last().map(String::as_str), Some("Escribe la busqueda"));

        let replies = say(&bot, message("Backend Rust, 5 años, Medellín")).await;
        assert_eq!(replies[0], WORKING_MESSAGE);
        assert_eq!(replies[1], "3 candidatos encontrados");
        assert_eq!(replies[2], MENU_TITLE);

        let calls = received.webhooks();
        assert_eq!(calls.len(), 1);
        let (target, payload) = &calls[0];
        assert_eq!(target, "candidato");
        assert_eq!(payload["message"], "Backend Rust, 5 años, Medellín");
        assert_eq!(payload["userId"], "29:user");
        assert_eq!(payload["userName"], "Ana Gómez");
        assert_eq!(payload["userObject"], "aad-1");
        assert_eq!(payload["conversationId"], "conv-1");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unrecognized_reply_shape_yields_maintenance_message() {
    timeout(TEST_TIMEOUT, async {
        let (bot, _, received) = start_bot().await;

        say(&bot, message("vitae")).await;
        let replies = say(&bot, message("1")).await;
        assert!(replies[0].contains("adjunte la hoja de vida"));

        let mut upload = message("");
        upload["attachments"] = json!([{
            "contentType": "application/pdf",
            "contentUrl": "https://files.test/cv.pdf",
            "name": "cv.pdf"
        }]);
        let replies = say(&bot, upload).await;
        assert_eq!(
            replies,
            vec![
                WORKING_MESSAGE.to_string(),
                MAINTENANCE_MESSAGE.to_string(),
                MENU_TITLE.to_string(),
            ]
        );

        let calls = received.webhooks();
        assert_eq!(calls[0].1["message"], "Español");
        assert_eq!(calls[0].1["attachments"][0]["name"], "cv.pdf");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn webhook_timeout_apologizes_and_ends_dialog() {
    timeout(TEST_TIMEOUT, async {
        let (bot, _, _) = start_bot().await;

        say(&bot, message("hola")).await;
        say(&bot, message("consultar")).await;
        let replies = say(&bot, message("1")).await;
        assert!(replies[0].contains("escriba su pregunta"));

        let replies = say(&bot, message("¿Cuáles son las últimas vacantes?")).await;
        // The finished dialog falls through to routing, which shows the menu.
        assert_eq!(
            replies,
            vec![
                WORKING_MESSAGE.to_string(),
                APOLOGY_MESSAGE.to_string(),
                MENU_TITLE.to_string(),
            ]
        );
        assert!(!replies.contains(&TURN_ERROR_MESSAGE.to_string()));

        let replies = say(&bot, message("hola")).await;
        assert_eq!(replies, vec![MENU_TITLE.to_string()]);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn replies_go_through_connector_without_expect_replies() {
    timeout(TEST_TIMEOUT, async {
        let (bot, stub, received) = start_bot().await;

        let mut activity = message("hola");
        activity.as_object_mut().unwrap().remove("deliveryMode");
        activity["serviceUrl"] = json!(format!("{stub}/connector/"));

        let response = reqwest::Client::new()
            .post(format!("{bot}/api/messages"))
            .json(&activity)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert!(response.text().await.unwrap().is_empty());

        let sent = received.connector();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0]["text"], "Me alegro que estés aquí, Ana Gómez");
        assert_eq!(sent[0]["recipient"]["id"], "29:user");
        assert_eq!(sent[0]["replyToId"], "act-1");
        assert_eq!(sent[2]["attachments"][0]["content"]["buttons"][0]["value"], "solicitud");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_activity_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (bot, _, _) = start_bot().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{bot}/api/messages"))
            .header("content-type", "application/json")
            .body("{ not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        // Without expectReplies the bot needs a serviceUrl to answer.
        let mut activity = message("hola");
        activity.as_object_mut().unwrap().remove("deliveryMode");
        let response = client
            .post(format!("{bot}/api/messages"))
            .json(&activity)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn working_notice_is_delivered_while_webhook_runs() {
    timeout(TEST_TIMEOUT, async {
        let (bot, stub, received) = start_bot().await;
        let client = reqwest::Client::new();

        for text in ["busqueda", "Backend Rust, Medellín"] {
            let mut activity = message(text);
            activity.as_object_mut().unwrap().remove("deliveryMode");
            activity["serviceUrl"] = json!(format!("{stub}/connector/"));
            let response = client
                .post(format!("{bot}/api/messages"))
                .json(&activity)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 200);
        }

        let delivered = received.delivered_before_call.lock().unwrap().clone();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].last().map(String::as_str), Some(WORKING_MESSAGE));

        let sent = received.connector();
        let texts: Vec<&str> = sent.iter().filter_map(|a| a["text"].as_str()).collect();
        assert_eq!(texts.last(), Some(&"3 candidatos encontrados"));
        assert_eq!(sent.last().unwrap()["attachments"][0]["content"]["title"], MENU_TITLE);
    })
    .await
    .expect("test timed out");
}
