mod common;

use common::fixtures::ROUTING_YAML;
use common::temp_files::create_temp_yaml;
use procdispatch::cli::{run_cli, Cli, Outcome};
use clap::Parser;
use serde_json::{json, Value};
use std::process::Command;

fn run(args: &[&str]) -> (Outcome, String) {
    let cli = Cli::try_parse_from(args).unwrap();
    let mut out = Vec::new();
    let outcome = run_cli(&cli, &mut out).unwrap();
    (outcome, String::from_utf8(out).unwrap())
}

#[test]
fn test_routes_lists_triggers_and_listen_set() {
    let config = create_temp_yaml(ROUTING_YAML);
    let path = config.path().to_str().unwrap();
    let (outcome, out) = run(&["procdispatch", "routes", "--config", path]);

    assert_eq!(outcome, Outcome::Ok);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(
        lines,
        vec![
            "[rest]  POST /api/echo -> echo",
            "[queue] echo.requests -> echo",
            "[rest]  GET /api/orders/[0-9]+ -> orders",
            "[queue] orders.requests -> orders (reply: orders.replies)",
            "listen: [echo.requests, orders.requests]",
        ]
    );
}

#[test]
fn test_match_and_no_match() {
    let config = create_temp_yaml(ROUTING_YAML);
    let path = config.path().to_str().unwrap();

    let (outcome, out) = run(&[
        "procdispatch", "match", "-c", path, "-m", "get", "-p", "/api/orders/7",
    ]);
    assert_eq!(outcome, Outcome::Ok);
    assert_eq!(out.trim(), "orders");

    let (outcome, out) = run(&[
        "procdispatch", "match", "-c", path, "-m", "get", "-p", "/api/orders/7/lines",
    ]);
    assert_eq!(outcome, Outcome::NoMatch);
    assert_eq!(out.trim(), "no route for GET /api/orders/7/lines");
}

#[test]
fn test_queue_lookup() {
    let config = create_temp_yaml(ROUTING_YAML);
    let path = config.path().to_str().unwrap();

    let (_, out) = run(&["procdispatch", "queue", "-c", path, "-q", "orders.requests"]);
    assert_eq!(out.trim(), "orders (reply: orders.replies)");

    let (outcome, _) = run(&["procdispatch", "queue", "-c", path, "-q", "unknown"]);
    assert_eq!(outcome, Outcome::NoMatch);
}

#[test]
fn test_dispatch_echoes_body() {
    let config = create_temp_yaml(ROUTING_YAML);
    let path = config.path().to_str().unwrap();

    let (outcome, out) = run(&[
        "procdispatch", "dispatch", "-c", path, "-m", "POST", "-p", "/api/echo", "-b", r#"{"a":1}"#,
    ]);
    assert_eq!(outcome, Outcome::Ok);
    let response: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(response, json!({"status": 200, "body": {"a": 1}}));
}

#[test]
fn test_dispatch_rejects_invalid_body() {
    let config = create_temp_yaml(ROUTING_YAML);
    let cli = Cli::try_parse_from([
        "procdispatch",
        "dispatch",
        "-c",
        config.path().to_str().unwrap(),
        "-m",
        "POST",
        "-p",
        "/api/echo",
        "-b",
        "{not json",
    ])
    .unwrap();
    let err = run_cli(&cli, &mut Vec::new()).unwrap_err();
    assert!(err.to_string().contains("--body"));
}

#[test]
fn test_binary_exit_codes() {
    let config = create_temp_yaml(ROUTING_YAML);
    let exe = env!("CARGO_BIN_EXE_procdispatch");

    let output = Command::new(exe)
        .env("PROCDISPATCH_LOG_LEVEL", "error")
        .env("PROCDISPATCH_LOG_ASYNC", "false")
        .args(["match", "--config"])
        .arg(config.path())
        .args(["--method", "POST", "--path", "/api/echo"])
        .output()
        .expect("run cli");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "echo");

    let status = Command::new(exe)
        .env("PROCDISPATCH_LOG_LEVEL", "error")
        .args(["match", "--config"])
        .arg(config.path())
        .args(["--method", "DELETE", "--path", "/api/echo"])
        .status()
        .expect("run cli");
    assert_eq!(status.code(), Some(1));

    let status = Command::new(exe)
        .args(["routes", "--config", "/definitely/not/here.yaml"])
        .status()
        .expect("run cli");
    assert!(!status.success());
}
