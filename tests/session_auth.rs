//! Authentication-path tests against a mock token endpoint.

mod common;

use common::{availability_json, base_options, credential_options, driver_for};
use pnap_driver::{MachineDriver, PnapDriverError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn zero_capacity_prevents_create_from_submitting() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"access_token": "fetched-token"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/billing/v1/product-availability"))
        .and(header("authorization", "Bearer fetched-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let mut driver = driver_for(&server);
    driver.configure_from_options(&credential_options());

    let error = driver.create().await.expect_err("no capacity available");
    assert!(matches!(error, PnapDriverError::NoAvailability { .. }));

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(
        !requests
            .iter()
            .any(|request| request.method.to_string() == "POST"
                && request.url.path() == "/bmc/v1/servers"),
        "a failed precheck must never submit a create request"
    );

    let token_request = requests
        .iter()
        .find(|request| request.url.path() == "/token")
        .expect("access token fetched from the token endpoint");
    let form = String::from_utf8_lossy(&token_request.body);
    assert!(form.contains("grant_type=client_credentials"));
    assert!(form.contains("client_id=test-client"));
}

#[tokio::test]
async fn bearer_token_skips_the_token_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/billing/v1/product-availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(availability_json(3)))
        .mount(&server)
        .await;

    let mut driver = driver_for(&server);
    driver.configure_from_options(&base_options());

    driver
        .precreate_check()
        .await
        .expect("capacity is available");

    let requests = server.received_requests().await.expect("recording enabled");
    assert!(
        !requests.iter().any(|request| request.url.path() == "/token"),
        "token auth must not touch the token endpoint"
    );

    let availability_request = requests
        .iter()
        .find(|request| request.url.path() == "/billing/v1/product-availability")
        .expect("availability queried");
    let authorization = availability_request
        .headers
        .get("authorization")
        .expect("authorization header present")
        .to_str()
        .expect("header is ascii");
    assert!(authorization.starts_with("Bearer "));
}

#[tokio::test]
async fn remote_command_failures_propagate_with_context() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/billing/v1/product-availability"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired credentials"))
        .mount(&server)
        .await;

    let mut driver = driver_for(&server);
    driver.configure_from_options(&base_options());

    let error = driver
        .precreate_check()
        .await
        .expect_err("availability query fails");
    let PnapDriverError::RemoteCommand { operation, source } = error else {
        panic!("expected a remote command error, got {error:?}");
    };
    assert_eq!(operation, "product-availability");
    assert!(source.to_string().contains("401"));
}
