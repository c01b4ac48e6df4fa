use std::env;
use std::sync::{Mutex, OnceLock};

use paydesk_cli::commands::{config, payouts};
use paydesk_core::config::LoadOptions;
use paydesk_core::domain::{Decision, PayoutRequestId, StatusFilter};
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn list_returns_config_failure_for_unsupported_backend_scheme() {
    with_env(&[("PAYDESK_BACKEND_URL", "ftp://files.example.com")], || {
        let result = payouts::list(LoadOptions::default(), StatusFilter::All);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "list");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn approve_without_session_token_reports_not_authenticated() {
    with_env(&[("PAYDESK_SESSION_ROLE", "manager")], || {
        let result = payouts::transition(
            LoadOptions::default(),
            PayoutRequestId::new("42"),
            Decision::Accept,
        );
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "approve");
        assert_eq!(payload["error_class"], "unauthenticated");
        assert_eq!(payload["message"], "Not authenticated");
    });
}

#[test]
fn delete_without_confirm_only_asks_for_confirmation() {
    with_env(&[("PAYDESK_SESSION_TOKEN", "tok-abc")], || {
        let result = payouts::delete(LoadOptions::default(), PayoutRequestId::new("42"), false);
        assert_eq!(result.exit_code, 5);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "delete");
        assert_eq!(payload["error_class"], "confirmation_required");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("Are you sure you want to delete this payout request?"));
    });
}

#[test]
fn list_sends_status_filter_and_returns_rendered_rows() {
    let runtime = Runtime::new().expect("test runtime");
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(
        Mock::given(method("GET"))
            .and(path("/api/payout-requests"))
            .and(query_param("status", "pending"))
            .and(header("authorization", "Bearer tok-abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "payoutRequests": [record_json("pending")] })),
            )
            .expect(1)
            .mount(&server),
    );

    let uri = server.uri();
    with_env(
        &[("PAYDESK_BACKEND_URL", uri.as_str()), ("PAYDESK_SESSION_TOKEN", "tok-abc")],
        || {
            let result = payouts::list(LoadOptions::default(), StatusFilter::Pending);
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["message"], "1 payout request(s) (pending review)");
            let row = &payload["data"]["requests"][0];
            assert_eq!(row["id"], "42");
            assert_eq!(row["amount"], "₹1,23,457");
            assert_eq!(row["created_at"], "01-03-26 10:00am");
            assert_eq!(row["attachment_url"], format!("{}/uploads/proof1.jpg", server.uri()));
            assert_eq!(row["actions"]["can_approve"], false, "staff cannot approve");
        },
    );
}

#[test]
fn manager_approve_patches_status_and_reports_reloaded_list() {
    let runtime = Runtime::new().expect("test runtime");
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(async {
        Mock::given(method("GET"))
            .and(path("/api/payout-requests"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "payoutRequests": [record_json("pending")] })),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/payout-requests"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "payoutRequests": [record_json("accepted")] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/payout-requests/42/status"))
            .and(body_json(json!({ "status": "accepted", "notes": "Approved by manager" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(record_json("accepted")))
            .expect(1)
            .mount(&server)
            .await;
    });

    let uri = server.uri();
    with_env(
        &[
            ("PAYDESK_BACKEND_URL", uri.as_str()),
            ("PAYDESK_SESSION_TOKEN", "tok-abc"),
            ("PAYDESK_SESSION_ROLE", "manager"),
        ],
        || {
            let result = payouts::transition(
                LoadOptions::default(),
                PayoutRequestId::new("42"),
                Decision::Accept,
            );
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "approve");
            assert_eq!(payload["message"], "payout request 42 accepted");
            assert_eq!(payload["data"]["requests"][0]["status"], "accepted");
            assert_eq!(payload["data"]["processing_id"], Value::Null);
        },
    );
}

#[test]
fn staff_approve_is_refused_before_patching() {
    let runtime = Runtime::new().expect("test runtime");
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(async {
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "payoutRequests": [record_json("pending")] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
    });

    let uri = server.uri();
    with_env(
        &[("PAYDESK_BACKEND_URL", uri.as_str()), ("PAYDESK_SESSION_TOKEN", "tok-abc")],
        || {
            let result = payouts::transition(
                LoadOptions::default(),
                PayoutRequestId::new("42"),
                Decision::Reject,
            );
            assert_eq!(result.exit_code, 4);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "reject");
            assert_eq!(payload["error_class"], "illegal_transition");
            assert_eq!(payload["message"], "Only managers can approve or reject payout requests");
        },
    );
}

#[test]
fn confirmed_delete_reaches_backend_once() {
    let runtime = Runtime::new().expect("test runtime");
    let server = runtime.block_on(MockServer::start());
    runtime.block_on(async {
        Mock::given(method("DELETE"))
            .and(path("/api/payout-requests/42"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "payoutRequests": [] })))
            .mount(&server)
            .await;
    });

    let uri = server.uri();
    with_env(
        &[("PAYDESK_BACKEND_URL", uri.as_str()), ("PAYDESK_SESSION_TOKEN", "tok-abc")],
        || {
            let result = payouts::delete(LoadOptions::default(), PayoutRequestId::new("42"), true);
            assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["message"], "payout request 42 deleted");
            assert_eq!(payload["data"]["requests"], json!([]));
        },
    );
}

#[test]
fn config_reports_sources_and_redacts_token() {
    with_env(
        &[
            ("PAYDESK_SESSION_TOKEN", "tok-very-secret"),
            ("PAYDESK_LOG_LEVEL", "debug"),
        ],
        || {
            let result = config::run(LoadOptions::default());
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            let message = payload["message"].as_str().unwrap_or_default();
            assert!(message.contains("- session.token = tok-*** (source: env (PAYDESK_SESSION_TOKEN))"));
            assert!(message.contains("- logging.level = debug (source: env (PAYDESK_LOG_LEVEL))"));
            assert!(message.contains("- backend.base_url = http://localhost:5000 (source: default)"));
            assert!(!message.contains("very-secret"));
        },
    );
}

fn record_json(status: &str) -> Value {
    json!({
        "id": 42,
        "reference": "PR-0042",
        "submittedBy": "Asha",
        "userEmail": "asha@example.com",
        "amount": 123456.5,
        "status": status,
        "createdAt": "2026-03-01T04:30:00Z",
        "updatedAt": "2026-03-01T04:30:00Z",
        "proofFilename": "/backend/uploads/proof1.jpg"
    })
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "PAYDESK_BACKEND_URL",
        "PAYDESK_BACKEND_TIMEOUT_SECS",
        "PAYDESK_SESSION_TOKEN",
        "PAYDESK_SESSION_USER",
        "PAYDESK_SESSION_ROLE",
        "PAYDESK_DISPLAY_UTC_OFFSET_MINUTES",
        "PAYDESK_LOGGING_LEVEL",
        "PAYDESK_LOGGING_FORMAT",
        "PAYDESK_LOG_LEVEL",
        "PAYDESK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
