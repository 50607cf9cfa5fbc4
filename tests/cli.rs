use assert_cmd::Command;
use httpmock::{Method::POST, MockServer};
use predicates::prelude::*;
use serde_json::Value;

const PATH: &str = "/api/v2/alerts";

fn alert_sender() -> Command {
    Command::cargo_bin("alert-sender").unwrap()
}

#[test]
fn send_alerts_prints_payload_and_posts_it() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(PATH)
            .header("content-type", "application/json");
        then.status(200);
    });

    let url = server.url(PATH);
    let output = alert_sender()
        .args([
            "send-alerts",
            "--url",
            url.as_str(),
            "--num",
            "3",
            "--vary-labels",
            "pod",
            "--static-labels",
            "env=prod",
            "--status",
            "firing",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    mock.assert();

    let alerts: Value = serde_json::from_slice(&output.stdout).unwrap();
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 3);
    for (i, alert) in alerts.iter().enumerate() {
        assert_eq!(alert["labels"]["env"], "prod");
        assert_eq!(alert["labels"]["pod"], format!("label-{}", i));
        assert!(alert["startsAt"].is_string());
        assert!(alert.get("endsAt").is_none());
    }
}

#[test]
fn send_alert_alias_dispatches() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200);
    });

    let url = server.url(PATH);
    alert_sender()
        .args(["send-alert", "--url", url.as_str()])
        .assert()
        .success();

    mock.assert();
}

#[test]
fn extra_headers_are_sent() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(PATH)
            .header("x-scope-orgid", "tenant-1")
            .header("authorization", "Bearer secret");
        then.status(200);
    });

    let url = server.url(PATH);
    alert_sender()
        .args([
            "send-alerts",
            "--url",
            url.as_str(),
            "--headers",
            "X-Scope-OrgID=tenant-1;Authorization=Bearer secret",
        ])
        .assert()
        .success();

    mock.assert();
}

#[test]
fn rejected_alerts_exit_non_zero() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(500).body("storage unavailable");
    });

    let url = server.url(PATH);
    alert_sender()
        .args(["send-alerts", "--url", url.as_str()])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("startsAt"))
        .stderr(predicate::str::contains("500"))
        .stderr(predicate::str::contains("storage unavailable"));
}

#[test]
fn failure_is_reported_once() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(500).body("storage unavailable");
    });

    let url = server.url(PATH);
    let output = alert_sender()
        .args(["send-alerts", "--url", url.as_str()])
        .output()
        .unwrap();

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert_eq!(stderr.matches("storage unavailable").count(), 1, "{}", stderr);
}

#[test]
fn debug_log_hides_header_values() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(PATH)
            .header("authorization", "Bearer hunter2");
        then.status(200);
    });

    let url = server.url(PATH);
    alert_sender()
        .args([
            "--log",
            "debug",
            "send-alerts",
            "--url",
            url.as_str(),
            "--headers",
            "Authorization=Bearer hunter2",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("settings loaded"))
        .stderr(predicate::str::contains("Authorization"))
        .stderr(predicate::str::contains("hunter2").not());

    mock.assert();
}

#[test]
fn unreachable_endpoint_exits_non_zero() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{}{}", port, PATH);

    alert_sender()
        .args(["send-alerts", "--url", url.as_str()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to send alerts"));
}

#[test]
fn invalid_status_is_a_usage_error() {
    alert_sender()
        .args(["send-alerts", "--status", "pending"])
        .assert()
        .code(2);
}

#[test]
fn invalid_url_exits_non_zero() {
    alert_sender()
        .args(["send-alerts", "--url", "not a url"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse URL"));
}

#[test]
fn missing_command_fails() {
    alert_sender().assert().failure();
}
