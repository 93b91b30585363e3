//! Verify request building and response parsing against JSON vectors in
//! `test-vectors/`.
//!
//! Comparing parsed JSON (not raw strings) avoids false negatives from
//! field-ordering differences.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rental_core::{
    ApiError, HttpMethod, HttpRequest, HttpResponse, MemoryTokenStore, Rental, RentalClient, Session, SessionEvent,
    SigninRequest,
};

const BASE_URL: &str = "http://localhost:3000";

fn client(token: Option<&str>) -> RentalClient {
    let store = match token {
        Some(token) => MemoryTokenStore::with_token(token),
        None => MemoryTokenStore::new(),
    };
    RentalClient::new(BASE_URL, Session::new(Arc::new(store))).unwrap()
}

fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn arg<'a>(args: &'a serde_json::Value, key: &str) -> &'a str {
    args[key].as_str().unwrap_or_else(|| panic!("missing arg {key}"))
}

/// Dispatch a vector's `op` to the matching builder.
fn build(c: &RentalClient, op: &str, args: &serde_json::Value) -> HttpRequest {
    match op {
        "update_rental_status" => c.build_update_rental_status(arg(args, "id"), arg(args, "status")).unwrap(),
        "update_invoice_status" => c.build_update_invoice_status(arg(args, "id"), arg(args, "status")).unwrap(),
        "update_payment_status" => c.build_update_payment_status(arg(args, "id"), arg(args, "status")).unwrap(),
        "my_rentals" => c.build_my_rentals(),
        "delete_invoice" => c.build_delete_invoice(arg(args, "id")),
        "complete_pickup" => c.build_complete_pickup(arg(args, "id")),
        "accept_quotation" => c.build_accept_quotation(arg(args, "id")),
        "check_user" => c.build_check_user(arg(args, "email")),
        "signin" => c
            .build_signin(&SigninRequest {
                email: arg(args, "email").to_string(),
                password: arg(args, "password").to_string(),
            })
            .unwrap(),
        other => panic!("unknown op: {other}"),
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let c = client(case["token"].as_str());
        let req = build(&c, case["op"].as_str().unwrap(), &case["args"]);
        let expected = &case["expected_request"];

        assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
        assert_eq!(req.path, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: path");

        let expected_headers: Vec<(String, String)> = expected["headers"]
            .as_array()
            .unwrap()
            .iter()
            .map(|h| {
                let pair = h.as_array().unwrap();
                (pair[0].as_str().unwrap().to_string(), pair[1].as_str().unwrap().to_string())
            })
            .collect();
        assert_eq!(req.headers, expected_headers, "{name}: headers");

        match req.body.as_deref() {
            Some(body) => {
                let body: serde_json::Value = serde_json::from_str(body).unwrap();
                assert_eq!(body, expected["body"], "{name}: body");
            }
            None => assert!(expected["body"].is_null(), "{name}: body should be None"),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let c = client(Some("tok"));
        let logouts = Arc::new(AtomicUsize::new(0));
        let counter = logouts.clone();
        c.session().events().subscribe(move |event| {
            if let SessionEvent::ForceLogout { .. } = event {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let sim = &case["simulated_response"];
        let response = HttpResponse::new(
            sim["status"].as_u64().unwrap() as u16,
            sim["body"].as_str().unwrap(),
        );
        let result = c.parse::<Rental>(response);

        let expect_logout = case["expect_logout"].as_bool().unwrap_or(false);
        assert_eq!(logouts.load(Ordering::SeqCst), usize::from(expect_logout), "{name}: logout count");
        assert_eq!(c.session().token().is_none(), expect_logout, "{name}: token cleared");

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match expected_error.as_str().unwrap() {
                "SessionExpired" => assert!(err.is_auth_failure(), "{name}: expected SessionExpired"),
                "Api" => assert!(matches!(err, ApiError::Api { .. }), "{name}: expected Api"),
                "InvalidResponse" => assert!(matches!(err, ApiError::InvalidResponse(_)), "{name}: expected InvalidResponse"),
                other => panic!("{name}: unknown expected_error: {other}"),
            }
            if let Some(message) = case["expected_message"].as_str() {
                assert_eq!(err.to_string(), message, "{name}: message");
            }
        } else {
            let rental = result.unwrap();
            let expected = &case["expected_result"];
            assert_eq!(rental.id, expected["id"].as_str().unwrap(), "{name}: id");
            assert_eq!(rental.status.as_str(), expected["status"].as_str().unwrap(), "{name}: status");
        }
    }
}
