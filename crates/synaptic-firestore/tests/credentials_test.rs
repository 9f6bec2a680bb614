#![cfg(feature = "rest")]

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use serde_json::json;
use synaptic_core::SynapticError;
use synaptic_firestore::auth::{Credentials, FirebaseApp};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/test_key.pem");

fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "sa-project",
        "private_key_id": "kid-1",
        "private_key": TEST_KEY,
        "client_email": "loader@sa-project.iam.gserviceaccount.com",
        "token_uri": token_uri
    })
    .to_string()
}

fn temp_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ---------------------------------------------------------------------------
// Credential files
// ---------------------------------------------------------------------------

#[test]
fn reads_service_account_file() {
    let file = temp_file(&service_account_json("https://oauth2.googleapis.com/token"));
    let creds = Credentials::from_file(file.path()).unwrap();
    assert!(matches!(
        &creds,
        Credentials::ServiceAccount(key) if key.client_email.starts_with("loader@")
    ));
    assert_eq!(creds.project_id(), Some("sa-project"));
    assert!(creds.emulator_base_url().is_none());
}

#[test]
fn debug_output_hides_private_key() {
    let creds =
        Credentials::from_json(&service_account_json("https://oauth2.googleapis.com/token"))
            .unwrap();
    let debug = format!("{creds:?}");
    assert!(debug.contains("sa-project"));
    assert!(!debug.contains("PRIVATE KEY"));
}

#[test]
fn authorized_user_defaults_token_uri() {
    let creds = Credentials::from_json(
        r#"{"type":"authorized_user","client_id":"c","client_secret":"s","refresh_token":"r"}"#,
    )
    .unwrap();
    match creds {
        Credentials::AuthorizedUser(user) => {
            assert_eq!(user.token_uri, "https://oauth2.googleapis.com/token");
            assert!(user.quota_project_id.is_none());
        }
        other => panic!("unexpected credentials: {other:?}"),
    }
}

#[test]
fn unsupported_credential_type_is_config_error() {
    let err = Credentials::from_json(r#"{"type":"external_account"}"#).unwrap_err();
    assert!(matches!(err, SynapticError::Config(_)));
}

#[test]
fn missing_credentials_file_is_config_error() {
    let err = Credentials::from_file(std::path::Path::new("/nonexistent/key.json")).unwrap_err();
    assert!(matches!(err, SynapticError::Config(msg) if msg.contains("/nonexistent/key.json")));
}

// ---------------------------------------------------------------------------
// Application Default Credentials
// ---------------------------------------------------------------------------

fn env_of(pairs: &[(&str, String)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn adc_prefers_emulator_host() {
    let file = temp_file(&service_account_json("https://oauth2.googleapis.com/token"));
    let env = env_of(&[
        ("FIRESTORE_EMULATOR_HOST", "localhost:8080".to_string()),
        (
            "GOOGLE_APPLICATION_CREDENTIALS",
            file.path().display().to_string(),
        ),
    ]);
    let creds = Credentials::application_default_from(env, None).unwrap();
    assert_eq!(
        creds.emulator_base_url().as_deref(),
        Some("http://localhost:8080/v1")
    );
}

#[test]
fn adc_reads_google_application_credentials() {
    let file = temp_file(&service_account_json("https://oauth2.googleapis.com/token"));
    let env = env_of(&[(
        "GOOGLE_APPLICATION_CREDENTIALS",
        file.path().display().to_string(),
    )]);
    let creds = Credentials::application_default_from(env, None).unwrap();
    assert!(matches!(creds, Credentials::ServiceAccount(_)));
}

#[test]
fn adc_reads_gcloud_well_known_file() {
    let dir = tempfile::tempdir().unwrap();
    let gcloud = dir.path().join("gcloud");
    std::fs::create_dir_all(&gcloud).unwrap();
    std::fs::write(
        gcloud.join("application_default_credentials.json"),
        json!({
            "type": "authorized_user",
            "client_id": "c",
            "client_secret": "s",
            "refresh_token": "r",
            "quota_project_id": "gcloud-project"
        })
        .to_string(),
    )
    .unwrap();

    let creds =
        Credentials::application_default_from(env_of(&[]), Some(dir.path().to_path_buf())).unwrap();
    assert_eq!(creds.project_id(), Some("gcloud-project"));
}

#[test]
fn adc_falls_back_to_metadata_server() {
    let empty_dir: Option<PathBuf> = Some(tempfile::tempdir().unwrap().path().to_path_buf());
    let creds = Credentials::application_default_from(env_of(&[]), empty_dir).unwrap();
    assert!(matches!(creds, Credentials::MetadataServer { .. }));
    assert!(creds.project_id().is_none());
}

// ---------------------------------------------------------------------------
// Access tokens
// ---------------------------------------------------------------------------

#[tokio::test]
async fn service_account_token_is_exchanged_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "sa-token", "expires_in": 3600})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let token_uri = format!("{}/token", server.uri());
    let creds = Credentials::from_json(&service_account_json(&token_uri)).unwrap();
    let app = FirebaseApp::new(creds).unwrap();

    assert_eq!(app.access_token().await.unwrap(), "sa-token");
    assert_eq!(app.access_token().await.unwrap(), "sa-token");
}

#[tokio::test]
async fn short_lived_token_is_refreshed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r%2F1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "user-token", "expires_in": 30})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let creds = Credentials::from_json(
        &json!({
            "type": "authorized_user",
            "client_id": "c",
            "client_secret": "s",
            "refresh_token": "r/1",
            "token_uri": format!("{}/token", server.uri())
        })
        .to_string(),
    )
    .unwrap();
    let app = FirebaseApp::new(creds).unwrap();

    // expires inside the refresh margin, so every call goes back to the server
    app.access_token().await.unwrap();
    assert_eq!(app.access_token().await.unwrap(), "user-token");
}

#[tokio::test]
async fn metadata_server_token_sends_flavor_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/computeMetadata/v1/instance/service-accounts/default/token"))
        .and(header("Metadata-Flavor", "Google"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "gce-token"})),
        )
        .mount(&server)
        .await;

    let app = FirebaseApp::new(Credentials::MetadataServer {
        token_url: format!(
            "{}/computeMetadata/v1/instance/service-accounts/default/token",
            server.uri()
        ),
    })
    .unwrap();
    assert_eq!(app.access_token().await.unwrap(), "gce-token");
}

#[tokio::test]
async fn failed_token_exchange_is_loader_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let token_uri = format!("{}/token", server.uri());
    let creds = Credentials::from_json(&service_account_json(&token_uri)).unwrap();
    let app = FirebaseApp::new(creds).unwrap();
    let err = app.access_token().await.unwrap_err();
    assert!(matches!(err, SynapticError::Loader(msg) if msg.contains("invalid_grant")));
}

#[tokio::test]
async fn emulator_uses_owner_token_without_network() {
    let app = FirebaseApp::new(Credentials::Emulator {
        host: "localhost:1".to_string(),
    })
    .unwrap();
    assert_eq!(app.access_token().await.unwrap(), "owner");
}
