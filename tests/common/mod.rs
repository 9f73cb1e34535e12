#![allow(dead_code)]

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

use actix_web::cookie::Cookie;
use async_trait::async_trait;
use texas_auth::auth::{hash_password, AuthServices};
use texas_auth::configuration::{
    ApplicationSettings, CookieSettings, EmailSettings, Environment, HashingSettings,
    JwtSettings, SecretSettings, Settings, TransportKind,
};
use texas_auth::email::{EmailMessage, EmailTransport};
use texas_auth::error::EmailError;
use texas_auth::secrets::SecretResolver;
use texas_auth::startup::run;
use texas_auth::store::{InMemoryUserStore, NewUser, UserRecord, UserStore};

pub const COST: u32 = 4;

#[derive(Default)]
pub struct RecordingTransport {
    messages: Mutex<Vec<EmailMessage>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryUserStore>,
    pub mail: Arc<RecordingTransport>,
    pub client: reqwest::Client,
}

fn test_settings() -> Settings {
    let local: HashMap<String, String> = [
        ("JWT_SECRET", "integration-access-secret-0123456789"),
        ("JWT_REFRESH_SECRET", "integration-refresh-secret-0123456789"),
        ("JWT_EMAIL_SECRET", "integration-email-secret-0123456789"),
        ("JWT_EXPIRATION_TIME", "900"),
        ("JWT_REFRESH_EXPIRATION_TIME", "604800"),
        ("JWT_EMAIL_EXPIRATION_TIME", "900"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            ui_url: "http://ui.test".to_string(),
        },
        database: None,
        jwt: JwtSettings {
            issuer: "texas-auth-test".to_string(),
            revoke_on_reuse: false,
        },
        cookies: CookieSettings {
            domain: None,
            secure: false,
        },
        hashing: HashingSettings { cost: COST },
        secrets: SecretSettings {
            environment: Environment::Test,
            local,
            vault: None,
            retry_attempts: 1,
            retry_base_delay_ms: 0,
        },
        email: EmailSettings {
            transport: TransportKind::Log,
            sender: "contact@texas.test".to_string(),
            base_url: None,
            authorization_token: None,
            timeout_ms: 1000,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let settings = test_settings();
    let store = Arc::new(InMemoryUserStore::new());
    let mail = Arc::new(RecordingTransport::default());
    let secrets = Arc::new(
        SecretResolver::from_settings(&settings.secrets).expect("Failed to build resolver"),
    );
    let services = AuthServices::new(store.clone(), secrets, mail.clone(), &settings)
        .expect("Failed to build auth services");

    let server = run(listener, services).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        store,
        mail,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    /// Insert a user directly into the store
    pub async fn seed_user(&self, username: &str, email: &str, password: &str) -> UserRecord {
        self.store
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password, COST).unwrap(),
            })
            .await
            .expect("Failed to seed user")
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/login", self.address))
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}/auth/refresh", self.address))
            .header("Cookie", format!("Refresh={}", refresh_token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn logout(&self, access_token: &str) -> reqwest::Response {
        self.client
            .post(&format!("{}/auth/logout", self.address))
            .header("Cookie", format!("Authentication={}", access_token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Token carried by the most recent mail
    pub fn last_link_token(&self) -> String {
        let sent = self.mail.sent();
        let message = sent.last().expect("No mail was sent");
        let encoded = message
            .text
            .split("token=")
            .nth(1)
            .expect("Mail does not contain a link");
        urlencoding::decode(encoded.trim()).unwrap().into_owned()
    }
}

/// `Set-Cookie` headers of a response, by cookie name
pub fn response_cookies(response: &reqwest::Response) -> HashMap<String, Cookie<'static>> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| Cookie::parse(value.to_string()).expect("Invalid Set-Cookie header"))
        .map(|cookie| (cookie.name().to_string(), cookie))
        .collect()
}
