use async_trait::async_trait;
use serde::Serialize;

use super::{EmailMessage, EmailTransport};
use crate::error::EmailError;

/// Production transport: posts messages to an HTTP mail API
#[derive(Clone)]
pub struct HttpEmailTransport {
    http_client: reqwest::Client,
    base_url: String,
    authorization_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
}

impl HttpEmailTransport {
    pub fn new(
        base_url: String,
        authorization_token: Option<String>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            http_client,
            base_url,
            authorization_token,
        }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request = SendEmailRequest {
            from: &message.from,
            to: &message.to,
            subject: &message.subject,
            text_body: &message.text,
        };

        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(token) = &self.authorization_token {
            builder = builder.header("X-Postmark-Server-Token", token);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send email: {}", e);
            EmailError::ServiceUnavailable(e.to_string())
        })?;

        let status = response.status();
        if status.is_client_error() {
            tracing::error!(status = status.as_u16(), "Email service refused message");
            return Err(EmailError::SendFailed(format!("email service returned {}", status)));
        }
        response.error_for_status().map_err(|e| {
            tracing::error!("Email service returned error: {}", e);
            EmailError::ServiceUnavailable(e.to_string())
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn accept(
        req: HttpRequest,
        body: web::Json<serde_json::Value>,
        received: web::Data<Received>,
    ) -> HttpResponse {
        if req.headers().get("X-Postmark-Server-Token").is_none() {
            return HttpResponse::Unauthorized().finish();
        }
        received.lock().unwrap().push(body.into_inner());
        HttpResponse::Ok().finish()
    }

    fn spawn_mail_api() -> (String, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let data = web::Data::new(received.clone());
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let server = HttpServer::new(move || {
            App::new()
                .app_data(data.clone())
                .route("/email", web::post().to(accept))
        })
        .listen(listener)
        .expect("Failed to listen")
        .run();
        tokio::spawn(server);
        (format!("http://127.0.0.1:{}", port), received)
    }

    fn message() -> EmailMessage {
        EmailMessage {
            from: "contact@example.com".to_string(),
            to: "alice@example.com".to_string(),
            subject: "Password reset".to_string(),
            text: "click here".to_string(),
        }
    }

    #[tokio::test]
    async fn test_posts_message_as_json() {
        let (base_url, received) = spawn_mail_api();
        let transport = HttpEmailTransport::new(
            base_url,
            Some("server-token".to_string()),
            reqwest::Client::new(),
        );

        transport.send(&message()).await.expect("Failed to send");

        let bodies = received.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["To"], "alice@example.com");
        assert_eq!(bodies[0]["Subject"], "Password reset");
        assert_eq!(bodies[0]["TextBody"], "click here");
    }

    #[tokio::test]
    async fn test_client_error_is_send_failure() {
        let (base_url, _) = spawn_mail_api();
        let transport = HttpEmailTransport::new(base_url, None, reqwest::Client::new());

        assert!(matches!(
            transport.send(&message()).await,
            Err(EmailError::SendFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service() {
        let transport = HttpEmailTransport::new(
            "http://127.0.0.1:1".to_string(),
            None,
            reqwest::Client::new(),
        );

        assert!(matches!(
            transport.send(&message()).await,
            Err(EmailError::ServiceUnavailable(_))
        ));
    }
}
