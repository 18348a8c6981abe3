//! WhatsApp transport - Sends and receives messages through the WhatsApp Cloud API.
//!
//! The router only depends on the [`MessageTransport`] trait. In production
//! that is [`WhatsAppCloudTransport`]; without credentials the app runs with
//! [`DisconnectedTransport`] and outbound sends fail with
//! [`Error::TransportUnavailable`]. Inbound messages arrive as webhook
//! payloads and are turned into [`ChatMessage`]s by [`parse_webhook`].

use crate::{
    config::secrets::WhatsAppCredentials,
    core::router::{
        BUSINESS_CLOSE_HOUR, BUSINESS_OPEN_HOUR, ChatMessage, Health, RouterStatus,
        extract_command, is_business_hours,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info};

/// Graph API root used when no override is configured.
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com/v20.0";

/// Outbound side of a messaging channel.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Whether the transport can send right now.
    fn is_connected(&self) -> bool;

    /// Sends a text message and returns the provider's message ID.
    async fn send_text(&self, to: &str, body: &str) -> Result<String>;
}

/// Transport used when WhatsApp is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedTransport;

#[async_trait]
impl MessageTransport for DisconnectedTransport {
    fn is_connected(&self) -> bool {
        false
    }

    async fn send_text(&self, _to: &str, _body: &str) -> Result<String> {
        Err(Error::TransportUnavailable {
            message: "WhatsApp credentials are not configured".to_string(),
        })
    }
}

/// WhatsApp Cloud API client.
#[derive(Debug, Clone)]
pub struct WhatsAppCloudTransport {
    client: Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

#[derive(Debug, Serialize)]
struct OutboundText<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: OutboundBody<'a>,
}

#[derive(Debug, Serialize)]
struct OutboundBody<'a> {
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl WhatsAppCloudTransport {
    /// Creates a client for the given sender number.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(credentials: WhatsAppCredentials, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: DEFAULT_GRAPH_URL.to_string(),
            access_token: credentials.access_token,
            phone_number_id: credentials.phone_number_id,
        })
    }

    /// Points the client at another Graph API root (used by tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MessageTransport for WhatsAppCloudTransport {
    fn is_connected(&self) -> bool {
        !self.access_token.is_empty() && !self.phone_number_id.is_empty()
    }

    async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        let url = format!("{}/{}/messages", self.base_url, self.phone_number_id);
        let payload = OutboundText {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: OutboundBody { body },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!("WhatsApp send to {to} failed with {status}: {detail}");
            return Err(Error::TransportUnavailable {
                message: format!("WhatsApp API returned {status}"),
            });
        }

        let sent: SendResponse = response.json().await?;
        let id = sent
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .unwrap_or_default();
        debug!("Sent WhatsApp message {id} to {to}");
        Ok(id)
    }
}

/// Answers the Graph API subscription handshake.
///
/// Returns the challenge to echo back when `mode` is `subscribe` and the
/// token matches, `None` otherwise.
#[must_use]
pub fn verify_webhook(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: Option<&str>,
) -> Option<String> {
    match (mode, token, challenge, expected_token) {
        (Some("subscribe"), Some(token), Some(challenge), Some(expected)) if token == expected => {
            info!("WhatsApp webhook verified");
            Some(challenge.to_string())
        }
        _ => None,
    }
}

/// Automatic reply for a client whose conversation is waiting for an agent.
///
/// Outside business hours the reply states when staff are available.
#[must_use]
pub fn waiting_reply(hour: u32) -> String {
    if is_business_hours(hour) {
        "Gracias por escribirnos. Todos nuestros ejecutivos están ocupados; \
te atenderemos en unos minutos."
            .to_string()
    } else {
        format!(
            "Gracias por contactarnos. Nuestro horario de atención es de \
{BUSINESS_OPEN_HOUR:02}:00 a {BUSINESS_CLOSE_HOUR:02}:00 hrs. \
Responderemos tu mensaje apenas abramos."
        )
    }
}

/// Commands clients can send, with the description shown in the menu.
pub const HOTEL_COMMANDS: [(&str, &str); 9] = [
    ("/inicio", "Menú principal"),
    ("/habitaciones", "Tipos de habitación y tarifas"),
    ("/spa", "Servicios de spa y piscinas termales"),
    ("/restaurante", "Horarios y carta del restaurante"),
    ("/reserva", "Datos necesarios para reservar"),
    ("/precios", "Tarifas vigentes"),
    ("/ubicacion", "Dirección y cómo llegar"),
    ("/contacto", "Teléfonos y correo de recepción"),
    ("/estado", "Estado del servicio de mensajería"),
];

fn command_menu() -> String {
    HOTEL_COMMANDS
        .iter()
        .map(|(command, description)| format!("• {command} - {description}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fixed answer for a client command such as `/spa`.
///
/// Unknown commands get the list of available ones.
#[must_use]
pub fn command_reply(command: &str, status: &RouterStatus, hour: u32) -> String {
    match command {
        "/inicio" => format!(
            "¡Hola! 👋 Bienvenido a *Termas Hotel & Spa*.\n\n\
¿En qué podemos ayudarte?\n{}\n\n\
También puedes escribir tu consulta y un ejecutivo te responderá.",
            command_menu()
        ),
        "/habitaciones" => "🏨 *Habitaciones*\n\
• Estándar: baño privado, WiFi y TV. Desde $50.000/noche\n\
• Superior: cama king y vista al jardín. Desde $65.000/noche\n\
• Suite Premium: jacuzzi privado y sala de estar. Desde $120.000/noche\n\n\
Para reservar escribe \"Quiero reservar\" y el tipo de habitación."
            .to_string(),
        "/spa" => "🧘 *Spa*\n\
• Masajes: $45.000 a $65.000\n\
• Tratamientos corporales: $30.000 a $40.000\n\
• Faciales: $25.000 a $35.000\n\
• Piscinas termales: $15.000 por día\n\n\
Horario: todos los días de 09:00 a 20:00."
            .to_string(),
        "/restaurante" => "🍽️ *Restaurante*\n\
• Desayuno buffet 07:00 a 10:30 ($18.000)\n\
• Almuerzo 12:30 a 15:30\n\
• Cena 19:00 a 22:00\n\n\
Escribe \"Menú del día\" para conocer la carta de hoy."
            .to_string(),
        "/reserva" => "📅 *Reservas*\n\
Envíanos en un mensaje:\n\
1. Servicio (habitación, spa o restaurante)\n\
2. Fechas de llegada y salida\n\
3. Número de adultos y niños\n\
4. Nombre completo y correo"
            .to_string(),
        "/precios" => "💰 *Tarifas*\n\
• Habitaciones: $50.000 a $150.000 por noche\n\
• Spa: $25.000 a $65.000 por sesión\n\
• Piscinas termales: $15.000 por día\n\
• Restaurante: $18.000 a $45.000 por persona\n\n\
Los precios varían según temporada."
            .to_string(),
        "/ubicacion" => "📍 *Ubicación*\n\
A 3 horas de Santiago en auto. Coordinamos traslados desde el aeropuerto \
y el terminal de buses."
            .to_string(),
        "/contacto" => format!(
            "📞 *Contacto*\n\
WhatsApp: este mismo número\n\
Atención personalizada: {BUSINESS_OPEN_HOUR:02}:00 a {BUSINESS_CLOSE_HOUR:02}:00 hrs\n\
Recepción: 24 horas"
        ),
        "/estado" => {
            let health = match status.health {
                Health::Operational => "Operativo",
                Health::Degraded => "Con demora",
                Health::Down => "Desconectado",
            };
            format!(
                "🤖 *Estado del servicio*\n\
Estado: {health}\n\
Ejecutivos en línea: {}\n\
Clientes en espera: {}\n\
Horario de atención: {}",
                status.online_agents,
                status.queued,
                if is_business_hours(hour) { "SÍ" } else { "NO" }
            )
        }
        other => format!(
            "❓ Comando no reconocido: {other}\n\nComandos disponibles:\n{}",
            command_menu()
        ),
    }
}

/// The automatic reply for one inbound message, if any.
///
/// Commands always get their fixed answer. Other messages only get the
/// waiting notice when they were just put in the queue.
#[must_use]
pub fn auto_reply(body: &str, queued: bool, status: &RouterStatus, hour: u32) -> Option<String> {
    match extract_command(body) {
        Some(command) => Some(command_reply(&command, status, hour)),
        None if queued => Some(waiting_reply(hour)),
        None => None,
    }
}

/// Inbound webhook notification.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookChange {
    #[serde(default)]
    value: WebhookValue,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookValue {
    #[serde(default)]
    contacts: Vec<WebhookContact>,
    #[serde(default)]
    messages: Vec<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
struct WebhookContact {
    wa_id: String,
    #[serde(default)]
    profile: Option<WebhookProfile>,
}

#[derive(Debug, Deserialize)]
struct WebhookProfile {
    name: String,
}

#[derive(Debug, Deserialize)]
struct WebhookMessage {
    id: String,
    from: String,
    timestamp: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<WebhookText>,
}

#[derive(Debug, Deserialize)]
struct WebhookText {
    body: String,
}

/// Extracts the text messages from a webhook notification.
///
/// Status updates and non-text messages (images, reactions, ...) are skipped.
#[must_use]
pub fn parse_webhook(payload: WebhookPayload) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    for change in payload.entry.into_iter().flat_map(|e| e.changes) {
        let value = change.value;
        for message in value.messages {
            if message.kind != "text" {
                debug!("Skipping {} message {}", message.kind, message.id);
                continue;
            }
            let Some(text) = message.text else {
                continue;
            };
            let contact_name = value
                .contacts
                .iter()
                .find(|c| c.wa_id == message.from)
                .and_then(|c| c.profile.as_ref())
                .map(|p| p.name.clone());
            let timestamp = message
                .timestamp
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .unwrap_or_else(Utc::now);

            messages.push(ChatMessage {
                id: message.id,
                from: message.from,
                contact_name,
                body: text.body,
                timestamp,
                is_group: false,
                from_me: false,
            });
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{config::RouterSettings, core::router::AgentRouter};

    const WEBHOOK: &str = r#"{
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "1234",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "contacts": [{"wa_id": "56911111111", "profile": {"name": "Ana"}}],
                    "messages": [
                        {"id": "wamid.1", "from": "56911111111", "timestamp": "1717000000",
                         "type": "text", "text": {"body": "Hola, ¿tienen disponibilidad?"}},
                        {"id": "wamid.2", "from": "56911111111", "timestamp": "1717000005",
                         "type": "image", "image": {"id": "media"}}
                    ]
                }
            }]
        }]
    }"#;

    fn credentials() -> WhatsAppCredentials {
        WhatsAppCredentials {
            access_token: "token".to_string(),
            phone_number_id: "10101".to_string(),
        }
    }

    #[test]
    fn test_parse_webhook_keeps_text_messages() {
        let payload: WebhookPayload = serde_json::from_str(WEBHOOK).unwrap();
        let messages = parse_webhook(payload);

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "wamid.1");
        assert_eq!(messages[0].contact_name.as_deref(), Some("Ana"));
        assert_eq!(messages[0].body, "Hola, ¿tienen disponibilidad?");
        assert_eq!(messages[0].timestamp.timestamp(), 1_717_000_000);
    }

    #[test]
    fn test_parse_status_only_webhook() {
        let payload: WebhookPayload =
            serde_json::from_str(r#"{"entry":[{"changes":[{"value":{"statuses":[]}}]}]}"#)
                .unwrap();
        assert!(parse_webhook(payload).is_empty());
    }

    #[test]
    fn test_verify_webhook() {
        assert_eq!(
            verify_webhook(Some("subscribe"), Some("abc"), Some("42"), Some("abc")),
            Some("42".to_string())
        );
        assert_eq!(
            verify_webhook(Some("subscribe"), Some("wrong"), Some("42"), Some("abc")),
            None
        );
        assert_eq!(
            verify_webhook(Some("subscribe"), Some("abc"), Some("42"), None),
            None
        );
    }

    #[test]
    fn test_waiting_reply_mentions_hours_when_closed() {
        assert!(waiting_reply(23).contains("08:00 a 22:00"));
        assert!(!waiting_reply(10).contains("horario"));
    }

    #[test]
    fn test_auto_reply_answers_commands() {
        let router = AgentRouter::new(RouterSettings::default());
        let status = router.status(true);

        let spa = auto_reply("/SPA por favor", false, &status, 10).unwrap();
        assert!(spa.contains("Masajes"));

        let state = auto_reply("/estado", true, &status, 23).unwrap();
        assert!(state.contains("Ejecutivos en línea: 0"));
        assert!(state.contains("NO"));

        let unknown = auto_reply("/piscina", false, &status, 10).unwrap();
        assert!(unknown.contains("/piscina"));
        assert!(unknown.contains("/habitaciones"));
    }

    #[test]
    fn test_auto_reply_for_plain_messages() {
        let status = AgentRouter::new(RouterSettings::default()).status(true);

        assert_eq!(
            auto_reply("Hola", true, &status, 10),
            Some(waiting_reply(10))
        );
        assert_eq!(auto_reply("Hola", false, &status, 10), None);
    }

    #[tokio::test]
    async fn test_disconnected_transport() {
        let transport = DisconnectedTransport;
        assert!(!transport.is_connected());
        let result = transport.send_text("56911111111", "Hola").await;
        assert!(matches!(result, Err(Error::TransportUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_cloud_transport_sends_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/10101/messages")
            .match_header("authorization", "Bearer token")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"to":"56911111111","type":"text","text":{"body":"Hola"}}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"messaging_product":"whatsapp","messages":[{"id":"wamid.out"}]}"#)
            .create_async()
            .await;

        let transport = WhatsAppCloudTransport::new(credentials(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url());

        let id = transport.send_text("56911111111", "Hola").await.unwrap();
        assert_eq!(id, "wamid.out");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_cloud_transport_reports_api_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/10101/messages")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid OAuth access token"}}"#)
            .create_async()
            .await;

        let transport = WhatsAppCloudTransport::new(credentials(), Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.url());

        let result = transport.send_text("56911111111", "Hola").await;
        assert!(matches!(result, Err(Error::TransportUnavailable { .. })));
    }
}
