mod common;

use common::{response_cookies, spawn_app};
use serde_json::Value;

// --- Login Tests ---

#[tokio::test]
async fn login_sets_three_session_cookies() {
    let app = spawn_app().await;
    app.seed_user("alice", "alice@example.com", "Secret#1").await;

    let response = app.login("alice", "Secret#1").await;
    assert_eq!(200, response.status().as_u16());

    let cookies = response_cookies(&response);
    let access = &cookies["Authentication"];
    let refresh = &cookies["Refresh"];
    let exist = &cookies["RefreshExist"];

    assert_eq!(access.http_only(), Some(true));
    assert_eq!(refresh.http_only(), Some(true));
    assert_ne!(exist.http_only(), Some(true));
    assert_eq!(exist.value(), "true");

    assert_eq!(access.max_age().unwrap().whole_seconds(), 900);
    assert_eq!(refresh.max_age().unwrap().whole_seconds(), 604800);
    assert_eq!(exist.max_age().unwrap().whole_seconds(), 604800);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["username"], "alice");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("refresh_token_hash").is_none());
}

#[tokio::test]
async fn login_failures_look_the_same() {
    let app = spawn_app().await;
    app.seed_user("alice", "alice@example.com", "Secret#1").await;

    let wrong_password = app.login("alice", "Secret#2").await;
    let unknown_user = app.login("nobody", "Secret#1").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_user.status().as_u16());
    assert!(response_cookies(&wrong_password).is_empty());

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_user.json().await.unwrap();
    assert_eq!(a["message"], "Login failed");
    assert_eq!(a["message"], b["message"]);
    assert_eq!(a["code"], b["code"]);
}

#[tokio::test]
async fn inactive_user_can_log_in() {
    let app = spawn_app().await;
    let alice = app.seed_user("alice", "alice@example.com", "Secret#1").await;
    assert!(!alice.active);

    assert_eq!(200, app.login("alice", "Secret#1").await.status().as_u16());
}

// --- Session lifecycle ---

#[tokio::test]
async fn login_refresh_logout_scenario() {
    let app = spawn_app().await;
    app.seed_user("alice", "alice@example.com", "Secret#1").await;

    let login = app.login("alice", "Secret#1").await;
    assert_eq!(200, login.status().as_u16());
    let first_refresh = response_cookies(&login)["Refresh"].value().to_string();

    let refreshed = app.refresh(&first_refresh).await;
    assert_eq!(200, refreshed.status().as_u16());
    let cookies = response_cookies(&refreshed);
    let second_refresh = cookies["Refresh"].value().to_string();
    let second_access = cookies["Authentication"].value().to_string();
    assert_ne!(first_refresh, second_refresh);

    // the rotated-out token is dead
    let replay = app.refresh(&first_refresh).await;
    assert_eq!(401, replay.status().as_u16());

    let logout = app.logout(&second_access).await;
    assert_eq!(200, logout.status().as_u16());
    let cleared = response_cookies(&logout);
    assert_eq!(cleared.len(), 3);
    for cookie in cleared.values() {
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age().unwrap().whole_seconds(), 0);
    }

    let after_logout = app.refresh(&second_refresh).await;
    assert_eq!(401, after_logout.status().as_u16());
}

#[tokio::test]
async fn refresh_without_cookie_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/auth/refresh", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = spawn_app().await;
    app.seed_user("alice", "alice@example.com", "Secret#1").await;

    let login = app.login("alice", "Secret#1").await;
    let access = response_cookies(&login)["Authentication"].value().to_string();

    assert_eq!(401, app.refresh(&access).await.status().as_u16());
}

#[tokio::test]
async fn concurrent_refreshes_have_one_winner() {
    let app = spawn_app().await;
    app.seed_user("alice", "alice@example.com", "Secret#1").await;

    let login = app.login("alice", "Secret#1").await;
    let token = response_cookies(&login)["Refresh"].value().to_string();

    let (a, b) = tokio::join!(app.refresh(&token), app.refresh(&token));
    let mut statuses = vec![a.status().as_u16(), b.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 401]);
}

// --- Current user ---

#[tokio::test]
async fn me_requires_access_cookie() {
    let app = spawn_app().await;
    app.seed_user("alice", "alice@example.com", "Secret#1").await;

    let anonymous = app
        .client
        .get(&format!("{}/users/me", app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(401, anonymous.status().as_u16());

    let login = app.login("alice", "Secret#1").await;
    let access = response_cookies(&login)["Authentication"].value().to_string();

    let response = app
        .client
        .get(&format!("{}/users/me", app.address))
        .header("Cookie", format!("Authentication={}", access))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "alice@example.com");
}

#[tokio::test]
async fn me_accepts_bearer_header() {
    let app = spawn_app().await;
    app.seed_user("alice", "alice@example.com", "Secret#1").await;

    let login = app.login("alice", "Secret#1").await;
    let access = response_cookies(&login)["Authentication"].value().to_string();

    let response = app
        .client
        .get(&format!("{}/users/me", app.address))
        .bearer_auth(access)
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn forged_access_token_is_rejected() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/users/me", app.address))
        .header("Cookie", "Authentication=not.a.token")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "TOKEN_INVALID");
}
