//! End-to-end session test against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `RentalApi` over
//! real HTTP with the ureq transport. Checks that tokens flow from signin
//! into later requests and that 401/403 responses tear the session down.

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use rental_core::reports::{LiveReports, ReportSource};
use rental_core::{
    ApiError, CreateNotification, CreateProduct, CreateRental, ProductFilters, RentalApi, RentalClient, RentalStatus,
    Role, Session, SessionEvent, SigninRequest, SignupRequest,
};

fn start_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn signup(name: &str, email: &str) -> SignupRequest {
    SignupRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: "secret".to_string(),
        phone: None,
    }
}

#[test]
fn rental_session_lifecycle() {
    let base = start_server();
    let session = Session::in_memory();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    session.events().subscribe(move |event| sink.lock().unwrap().push(event));

    let api = RentalApi::new(RentalClient::new(&base, session.clone()).unwrap());

    // Step 1: anonymous `me` is rejected and reported as a forced logout.
    let err = api.me().unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired { status: 401 }));
    assert_eq!(*events.lock().unwrap(), vec![SessionEvent::ForceLogout { status: 401 }]);
    events.lock().unwrap().clear();

    // Step 2: admin signs up; the token is stored and used from here on.
    let admin = api.signup(&signup("Root", "admin@rentals.test")).unwrap();
    assert_eq!(admin.user.role, Role::Admin);
    assert_eq!(session.token().as_deref(), Some(admin.token.as_str()));
    assert_eq!(api.me().unwrap().email, "admin@rentals.test");

    let product = api
        .create_product(&CreateProduct {
            name: "Hammer Drill".to_string(),
            description: Some("18V cordless".to_string()),
            category: Some("Power Tools".to_string()),
            price_per_day: 15.0,
            quantity: 4,
            is_rentable: true,
            images: Vec::new(),
        })
        .unwrap();
    assert_eq!(product.category.as_deref(), Some("Power Tools"));

    // Step 3: switch to a regular user.
    api.signout().unwrap();
    assert!(!session.is_signed_in());
    let user = api.signup(&signup("Ana", "ana@example.com")).unwrap();
    assert_eq!(user.user.role, Role::User);

    let filters = ProductFilters {
        category: Some("Power Tools".to_string()),
        ..Default::default()
    };
    let listed = api.list_products(&filters).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, product.id);

    let rental = api
        .create_rental(&CreateRental {
            product_id: product.id.clone(),
            quantity: 2,
            start_date: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap(),
        })
        .unwrap();
    assert_eq!(rental.status, RentalStatus::Pending);
    assert_eq!(rental.total_amount, 30.0);
    assert_eq!(rental.product.as_ref().map(|p| p.name.as_str()), Some("Hammer Drill"));
    assert_eq!(api.my_rentals().unwrap().len(), 1);

    // Step 4: a non-admin status change is forbidden and ends the session.
    let err = api
        .update_rental_status(&rental.id, RentalStatus::Confirmed.as_str())
        .unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired { status: 403 }));
    assert!(!session.is_signed_in());
    assert_eq!(
        *events.lock().unwrap(),
        vec![
            SessionEvent::SignedIn,
            SessionEvent::SignedOut,
            SessionEvent::SignedIn,
            SessionEvent::ForceLogout { status: 403 },
        ]
    );

    // Step 5: admin signs back in and confirms the rental.
    api.signin(&SigninRequest {
        email: "admin@rentals.test".to_string(),
        password: "secret".to_string(),
    })
    .unwrap();
    let confirmed = api
        .update_rental_status(&rental.id, RentalStatus::Confirmed.as_str())
        .unwrap();
    assert_eq!(confirmed.status, RentalStatus::Confirmed);

    // Step 6: backend messages surface verbatim.
    let err = api.get_product("missing").unwrap_err();
    assert!(matches!(&err, ApiError::Api { status: 404, message } if message == "Product not found"));

    // Step 7: live reports aggregate what the backend returned.
    let reports = LiveReports::new(api.list_rentals().unwrap(), Vec::new());
    let top = reports.top_products(3).unwrap();
    assert_eq!(top[0].product_id, product.id);
    assert_eq!(top[0].name, "Hammer Drill");
    let confirmed_count = reports
        .rental_status()
        .unwrap()
        .into_iter()
        .find(|c| c.status == RentalStatus::Confirmed)
        .unwrap()
        .count;
    assert_eq!(confirmed_count, 1);

    // Step 8: delete the rental; a second delete is a 404.
    let ack = api.delete_rental(&rental.id).unwrap();
    assert_eq!(ack.message.as_deref(), Some("Rental deleted"));
    let err = api.delete_rental(&rental.id).unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn unknown_rental_status_round_trips() {
    let base = start_server();
    let api = RentalApi::new(RentalClient::new(&base, Session::in_memory()).unwrap());
    api.signup(&signup("Root", "admin@rentals.test")).unwrap();

    let product = api
        .create_product(&CreateProduct {
            name: "Tile Saw".to_string(),
            description: None,
            category: None,
            price_per_day: 30.0,
            quantity: 1,
            is_rentable: true,
            images: Vec::new(),
        })
        .unwrap();
    let rental = api
        .create_rental(&CreateRental {
            product_id: product.id,
            quantity: 1,
            start_date: Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap(),
        })
        .unwrap();

    // The backend accepts any status string; the client keeps it as-is.
    let held = api.update_rental_status(&rental.id, "ON_HOLD").unwrap();
    assert_eq!(held.status, RentalStatus::Other("ON_HOLD".to_string()));

    let listed = api.list_rentals().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status.as_str(), "ON_HOLD");
    assert_eq!(api.my_rentals().unwrap()[0].status.as_str(), "ON_HOLD");
}

#[test]
fn product_filters_narrow_the_listing() {
    let base = start_server();
    let api = RentalApi::new(RentalClient::new(&base, Session::in_memory()).unwrap());
    api.signup(&signup("Root", "admin@rentals.test")).unwrap();

    for (name, price, quantity, is_rentable) in [
        ("Hammer Drill", 15.0, 4, true),
        ("Tile Saw", 45.0, 2, true),
        ("Ladder", 10.0, 0, true),
        ("Display Stand", 12.0, 3, false),
    ] {
        api.create_product(&CreateProduct {
            name: name.to_string(),
            description: None,
            category: Some("Tools".to_string()),
            price_per_day: price,
            quantity,
            is_rentable,
            images: Vec::new(),
        })
        .unwrap();
    }

    let names = |filters: ProductFilters| {
        let mut names: Vec<String> = api.list_products(&filters).unwrap().into_iter().map(|p| p.name).collect();
        names.sort();
        names
    };

    assert_eq!(names(ProductFilters::default()).len(), 4);
    assert_eq!(
        names(ProductFilters {
            available: Some(true),
            ..Default::default()
        }),
        vec!["Hammer Drill", "Tile Saw"]
    );
    assert_eq!(
        names(ProductFilters {
            min_price: Some(12.0),
            max_price: Some(20.0),
            ..Default::default()
        }),
        vec!["Display Stand", "Hammer Drill"]
    );
    assert_eq!(
        names(ProductFilters {
            available: Some(true),
            max_price: Some(20.0),
            search: Some("drill".to_string()),
            ..Default::default()
        }),
        vec!["Hammer Drill"]
    );
}

#[test]
fn notification_round_trip() {
    let base = start_server();
    let api = RentalApi::new(RentalClient::new(&base, Session::in_memory()).unwrap());
    let auth = api.signup(&signup("Ana", "ana@example.com")).unwrap();

    let created = api
        .create_notification(&CreateNotification {
            user_id: auth.user.id.clone(),
            title: "Pickup ready".to_string(),
            message: "Your drill is ready for pickup".to_string(),
            kind: Some("PICKUP".to_string()),
        })
        .unwrap();
    assert!(!created.read);
    assert_eq!(created.kind.as_deref(), Some("PICKUP"));

    let read = api.mark_notification_read(&created.id).unwrap();
    assert!(read.read);
    assert_eq!(api.my_notifications().unwrap().len(), 1);

    // 204 No Content parses as an empty acknowledgement.
    let ack = api.delete_notification(&created.id).unwrap();
    assert!(ack.message.is_none());
    assert!(api.my_notifications().unwrap().is_empty());
}

#[test]
fn unknown_route_is_invalid_response() {
    let base = start_server();
    let api = RentalApi::new(RentalClient::new(&base, Session::in_memory()).unwrap());
    api.signup(&signup("Ana", "ana@example.com")).unwrap();

    // The mock server has no payment routes; axum's fallback 404 has an empty body.
    let err = api.my_payments().unwrap_err();
    assert!(matches!(err, ApiError::InvalidResponse(_)));
    assert_eq!(err.to_string(), "Invalid response format");
}
