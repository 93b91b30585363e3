//! Stateless HTTP request builder and response parser for the rental API.
//!
//! # Design
//! `RentalClient` holds the base URL and a `Session` handle and nothing
//! else. Every backend endpoint has a `build_*` method producing an
//! `HttpRequest`; responses go back through `parse` (or `parse_ack` /
//! `parse_auth`), which normalize errors the same way for every endpoint:
//!
//! 1. 401/403 tears the session down and yields `SessionExpired`.
//! 2. A body that is not JSON yields `InvalidResponse`, whatever the status.
//! 3. Any other non-2xx yields `Api` with the backend's `message` or a fallback.
//!
//! The caller executes the HTTP round-trip in between, so the client itself
//! never blocks and never retries.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult, FALLBACK_MESSAGE};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::session::Session;
use crate::types::{
    AuthResponse, AvailabilityInput, CreateInvoice, CreateNotification, CreatePayment, CreatePickup,
    CreateProduct, CreateQuotation, CreateRental, CreateRentalReturn, DurationRequest, MessageResponse,
    OtpRequest, ProductFilters, SigninRequest, SignupRequest, StatusUpdate, UpdateProduct, UpdateProfile,
    UpdateRentalReturn, VerifyOtpRequest,
};

const JSON_CONTENT_TYPE: (&str, &str) = ("content-type", "application/json");

/// Request builder and response normalizer for the rental backend.
#[derive(Debug, Clone)]
pub struct RentalClient {
    base: Url,
    session: Session,
}

impl RentalClient {
    /// `base_url` must be an absolute `http`/`https` URL; a trailing slash
    /// is ignored.
    pub fn new(base_url: &str, session: Session) -> ApiResult<Self> {
        let base = Url::parse(base_url).map_err(|e| ApiError::config(format!("invalid base URL {base_url:?}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::config(format!("unsupported scheme in {base_url:?}")));
        }
        Ok(Self { base, session })
    }

    pub fn from_config(config: &ClientConfig, session: Session) -> ApiResult<Self> {
        config.validate()?;
        Self::new(&config.base_url, session)
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    // -----------------------------------------------------------------------
    // auth
    // -----------------------------------------------------------------------

    pub fn build_generate_otp(&self, email: &str) -> ApiResult<HttpRequest> {
        let body = OtpRequest {
            email: email.to_string(),
        };
        self.json(HttpMethod::Post, &["auth", "generate-otp"], &body)
    }

    /// Parse with `parse_auth` so the returned token is stored.
    pub fn build_verify_otp(&self, email: &str, otp: &str) -> ApiResult<HttpRequest> {
        let body = VerifyOtpRequest {
            email: email.to_string(),
            otp: otp.to_string(),
        };
        self.json(HttpMethod::Post, &["auth", "verify-otp"], &body)
    }

    pub fn build_signup(&self, input: &SignupRequest) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["auth", "signup"], input)
    }

    pub fn build_signin(&self, input: &SigninRequest) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["auth", "signin"], input)
    }

    pub fn build_me(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["auth", "me"])
    }

    pub fn build_update_profile(&self, input: &UpdateProfile) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Put, &["auth", "update-profile"], input)
    }

    pub fn build_check_admin(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["auth", "check-admin"])
    }

    pub fn build_check_user(&self, email: &str) -> HttpRequest {
        self.bare_with_query(HttpMethod::Get, &["auth", "check-user"], &[("email", email.to_string())])
    }

    pub fn build_list_users(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["auth", "users"])
    }

    pub fn build_delete_user(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["auth", "users", id])
    }

    // -----------------------------------------------------------------------
    // admin
    // -----------------------------------------------------------------------

    pub fn build_admin_dashboard(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["admin", "dashboard"])
    }

    /// Parse with `parse_auth`: the impersonated user's token replaces ours.
    pub fn build_impersonate(&self, user_id: &str) -> HttpRequest {
        self.bare(HttpMethod::Post, &["admin", "impersonate", user_id])
    }

    // -----------------------------------------------------------------------
    // product
    // -----------------------------------------------------------------------

    pub fn build_create_product(&self, input: &CreateProduct) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["product"], input)
    }

    pub fn build_list_products(&self, filters: &ProductFilters) -> HttpRequest {
        self.bare_with_query(HttpMethod::Get, &["product"], &filters.query_pairs())
    }

    pub fn build_get_product(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Get, &["product", id])
    }

    pub fn build_update_product(&self, id: &str, input: &UpdateProduct) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Put, &["product", id], input)
    }

    pub fn build_delete_product(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["product", id])
    }

    /// Price quote for renting `id` over the requested period.
    pub fn build_product_duration(&self, id: &str, input: &DurationRequest) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["product", id, "duration"], input)
    }

    pub fn build_add_availability(&self, product_id: &str, input: &AvailabilityInput) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["product", product_id, "availability"], input)
    }

    pub fn build_update_availability(
        &self,
        product_id: &str,
        availability_id: &str,
        input: &AvailabilityInput,
    ) -> ApiResult<HttpRequest> {
        self.json(
            HttpMethod::Put,
            &["product", product_id, "availability", availability_id],
            input,
        )
    }

    pub fn build_delete_availability(&self, product_id: &str, availability_id: &str) -> HttpRequest {
        self.bare(
            HttpMethod::Delete,
            &["product", product_id, "availability", availability_id],
        )
    }

    // -----------------------------------------------------------------------
    // rental
    // -----------------------------------------------------------------------

    pub fn build_create_rental(&self, input: &CreateRental) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["rental"], input)
    }

    pub fn build_list_rentals(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["rental"])
    }

    pub fn build_my_rentals(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["rental", "my"])
    }

    /// `status` is forwarded verbatim; see `RentalStatus::as_str`.
    pub fn build_update_rental_status(&self, id: &str, status: &str) -> ApiResult<HttpRequest> {
        self.status_update(&["rental", id, "status"], status)
    }

    pub fn build_delete_rental(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["rental", id])
    }

    // -----------------------------------------------------------------------
    // quotation
    // -----------------------------------------------------------------------

    pub fn build_create_quotation(&self, input: &CreateQuotation) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["quotation"], input)
    }

    pub fn build_accept_quotation(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Post, &["quotation", id, "accept"])
    }

    pub fn build_list_quotations(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["quotation"])
    }

    pub fn build_my_quotations(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["quotation", "my"])
    }

    pub fn build_delete_quotation(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["quotation", id])
    }

    // -----------------------------------------------------------------------
    // invoice
    // -----------------------------------------------------------------------

    pub fn build_create_invoice(&self, input: &CreateInvoice) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["invoice"], input)
    }

    pub fn build_list_invoices(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["invoice"])
    }

    pub fn build_get_invoice(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Get, &["invoice", id])
    }

    pub fn build_update_invoice_status(&self, id: &str, status: &str) -> ApiResult<HttpRequest> {
        self.status_update(&["invoice", id, "status"], status)
    }

    pub fn build_delete_invoice(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["invoice", id])
    }

    // -----------------------------------------------------------------------
    // payment
    // -----------------------------------------------------------------------

    pub fn build_create_payment(&self, input: &CreatePayment) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["payment"], input)
    }

    pub fn build_my_payments(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["payment", "my"])
    }

    pub fn build_list_payments(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["payment"])
    }

    pub fn build_update_payment_status(&self, id: &str, status: &str) -> ApiResult<HttpRequest> {
        self.status_update(&["payment", id, "status"], status)
    }

    pub fn build_delete_payment(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["payment", id])
    }

    // -----------------------------------------------------------------------
    // notification
    // -----------------------------------------------------------------------

    pub fn build_create_notification(&self, input: &CreateNotification) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["notification"], input)
    }

    pub fn build_my_notifications(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["notification", "my"])
    }

    pub fn build_mark_notification_read(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Put, &["notification", id, "read"])
    }

    pub fn build_delete_notification(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["notification", id])
    }

    // -----------------------------------------------------------------------
    // pickup
    // -----------------------------------------------------------------------

    pub fn build_create_pickup(&self, input: &CreatePickup) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["pickup"], input)
    }

    pub fn build_complete_pickup(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Put, &["pickup", id, "complete"])
    }

    pub fn build_list_pickups(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["pickup"])
    }

    pub fn build_my_pickups(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["pickup", "my"])
    }

    pub fn build_delete_pickup(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["pickup", id])
    }

    // -----------------------------------------------------------------------
    // rental-return
    // -----------------------------------------------------------------------

    pub fn build_create_return(&self, input: &CreateRentalReturn) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Post, &["rental-return"], input)
    }

    pub fn build_complete_return(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Put, &["rental-return", id, "complete"])
    }

    pub fn build_list_returns(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["rental-return"])
    }

    pub fn build_my_returns(&self) -> HttpRequest {
        self.bare(HttpMethod::Get, &["rental-return", "my"])
    }

    pub fn build_update_return(&self, id: &str, input: &UpdateRentalReturn) -> ApiResult<HttpRequest> {
        self.json(HttpMethod::Put, &["rental-return", id], input)
    }

    pub fn build_delete_return(&self, id: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, &["rental-return", id])
    }

    // -----------------------------------------------------------------------
    // Response parsing
    // -----------------------------------------------------------------------

    /// Normalize `response` and deserialize its body into `T`.
    pub fn parse<T: DeserializeOwned>(&self, response: HttpResponse) -> ApiResult<T> {
        let value = self.check(response)?;
        serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "response did not match expected shape");
            ApiError::InvalidResponse(e)
        })
    }

    /// Like `parse`, but a 2xx with an empty body is an empty acknowledgement.
    /// Used for deletes and other endpoints whose body callers ignore.
    pub fn parse_ack(&self, response: HttpResponse) -> ApiResult<MessageResponse> {
        if response.is_success() && response.body.trim().is_empty() {
            return Ok(MessageResponse::default());
        }
        self.parse(response)
    }

    /// Parse an `AuthResponse` and store its token in the session.
    pub fn parse_auth(&self, response: HttpResponse) -> ApiResult<AuthResponse> {
        let auth: AuthResponse = self.parse(response)?;
        self.session.sign_in(&auth.token)?;
        debug!(user_id = %auth.user.id, "session token stored");
        Ok(auth)
    }

    fn check(&self, response: HttpResponse) -> ApiResult<Value> {
        let status = response.status;
        if matches!(status, 401 | 403) {
            self.session.force_logout(status);
            return Err(ApiError::SessionExpired { status });
        }

        let value: Value = serde_json::from_str(&response.body).map_err(|e| {
            warn!(status, error = %e, "response body is not JSON");
            ApiError::InvalidResponse(e)
        })?;

        if response.is_success() {
            debug!(status, "response ok");
            return Ok(value);
        }

        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(FALLBACK_MESSAGE)
            .to_string();
        warn!(status, %message, "request failed");
        Err(ApiError::Api { status, message })
    }

    // -----------------------------------------------------------------------
    // Request assembly
    // -----------------------------------------------------------------------

    fn bare(&self, method: HttpMethod, segments: &[&str]) -> HttpRequest {
        self.bare_with_query(method, segments, &[])
    }

    fn bare_with_query(&self, method: HttpMethod, segments: &[&str], query: &[(&str, String)]) -> HttpRequest {
        let request = HttpRequest {
            method,
            path: self.endpoint(segments, query),
            headers: self.auth_headers(),
            body: None,
        };
        debug!(method = %request.method, path = %request.path, "built request");
        request
    }

    fn json<B: Serialize + ?Sized>(&self, method: HttpMethod, segments: &[&str], input: &B) -> ApiResult<HttpRequest> {
        let body = serde_json::to_string(input).map_err(ApiError::Serialization)?;
        let mut headers = vec![(JSON_CONTENT_TYPE.0.to_string(), JSON_CONTENT_TYPE.1.to_string())];
        headers.extend(self.auth_headers());
        let request = HttpRequest {
            method,
            path: self.endpoint(segments, &[]),
            headers,
            body: Some(body),
        };
        debug!(method = %request.method, path = %request.path, "built request");
        Ok(request)
    }

    fn status_update(&self, segments: &[&str], status: &str) -> ApiResult<HttpRequest> {
        let body = StatusUpdate {
            status: status.to_string(),
        };
        self.json(HttpMethod::Put, segments, &body)
    }

    /// `Authorization: Bearer <token>` when a token is stored, nothing otherwise.
    fn auth_headers(&self) -> Vec<(String, String)> {
        match self.session.token() {
            Some(token) => vec![("authorization".to_string(), format!("Bearer {token}"))],
            None => Vec::new(),
        }
    }

    /// Append percent-encoded `segments` to the base path, then `query`.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryTokenStore, SessionEvent};
    use crate::types::{Product, Rental, RentalStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn client() -> RentalClient {
        RentalClient::new("http://localhost:3000", Session::in_memory()).unwrap()
    }

    fn signed_in(token: &str) -> RentalClient {
        let session = Session::new(Arc::new(MemoryTokenStore::with_token(token)));
        RentalClient::new("http://localhost:3000", session).unwrap()
    }

    const RENTAL_JSON: &str = r#"{"id":"r1","userId":"u1","productId":"p1","quantity":1,
        "startDate":"2024-05-01T00:00:00Z","endDate":"2024-05-02T00:00:00Z",
        "totalAmount":50,"status":"CONFIRMED"}"#;

    #[test]
    fn update_rental_status_matches_contract_example() {
        let req = signed_in("tok")
            .build_update_rental_status("r1", RentalStatus::Confirmed.as_str())
            .unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "http://localhost:3000/rental/r1/status");
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({"status": "CONFIRMED"}));
    }

    #[test]
    fn status_is_forwarded_verbatim() {
        let req = client().build_update_payment_status("p9", "SOMETHING_NEW").unwrap();
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["status"], "SOMETHING_NEW");
    }

    #[test]
    fn no_token_means_no_authorization_header() {
        let req = client().build_my_rentals();
        assert!(req.headers.is_empty());
        assert_eq!(req.path, "http://localhost:3000/rental/my");
    }

    #[test]
    fn token_is_read_at_build_time() {
        let c = client();
        assert!(c.build_list_rentals().header("authorization").is_none());
        c.session().sign_in("fresh").unwrap();
        assert_eq!(c.build_list_rentals().header("authorization"), Some("Bearer fresh"));
    }

    #[test]
    fn base_path_and_trailing_slash_are_kept_straight() {
        let c = RentalClient::new("http://localhost:5000/api/", Session::in_memory()).unwrap();
        assert_eq!(c.base_url(), "http://localhost:5000/api");
        assert_eq!(c.build_get_invoice("i1").path, "http://localhost:5000/api/invoice/i1");
    }

    #[test]
    fn path_segments_are_percent_encoded() {
        let req = client().build_get_product("a b/c");
        assert_eq!(req.path, "http://localhost:3000/product/a%20b%2Fc");
    }

    #[test]
    fn check_user_encodes_email_query() {
        let req = client().build_check_user("jo+admin@example.com");
        assert_eq!(
            req.path,
            "http://localhost:3000/auth/check-user?email=jo%2Badmin%40example.com"
        );
    }

    #[test]
    fn list_products_without_filters_has_no_query() {
        let req = client().build_list_products(&ProductFilters::default());
        assert_eq!(req.path, "http://localhost:3000/product");
    }

    #[test]
    fn list_products_with_filters() {
        let filters = ProductFilters {
            category: Some("Power Tools".to_string()),
            max_price: Some(25.0),
            ..Default::default()
        };
        let req = client().build_list_products(&filters);
        assert_eq!(req.path, "http://localhost:3000/product?category=Power+Tools&maxPrice=25");
    }

    #[test]
    fn resource_paths() {
        let c = client();
        assert_eq!(c.build_accept_quotation("q1").path, "http://localhost:3000/quotation/q1/accept");
        assert_eq!(c.build_accept_quotation("q1").method, HttpMethod::Post);
        assert_eq!(c.build_mark_notification_read("n1").path, "http://localhost:3000/notification/n1/read");
        assert_eq!(c.build_complete_pickup("k1").method, HttpMethod::Put);
        assert_eq!(c.build_complete_return("x1").path, "http://localhost:3000/rental-return/x1/complete");
        assert_eq!(c.build_delete_availability("p1", "a1").path, "http://localhost:3000/product/p1/availability/a1");
        assert_eq!(c.build_impersonate("u2").path, "http://localhost:3000/admin/impersonate/u2");
        assert_eq!(c.build_delete_user("u2").method, HttpMethod::Delete);
        assert_eq!(c.build_my_payments().path, "http://localhost:3000/payment/my");
    }

    #[test]
    fn parse_success_shape() {
        let rental: Rental = client().parse(HttpResponse::new(200, RENTAL_JSON)).unwrap();
        assert_eq!(rental.status, RentalStatus::Confirmed);
    }

    #[test]
    fn unauthorized_clears_token_and_fires_once() {
        for status in [401, 403] {
            let c = signed_in("stale");
            let calls = Arc::new(AtomicUsize::new(0));
            let counter = calls.clone();
            c.session().events().subscribe(move |event| {
                if matches!(event, SessionEvent::ForceLogout { .. }) {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            });

            let err = c
                .parse::<Rental>(HttpResponse::new(status, r#"{"message":"jwt expired"}"#))
                .unwrap_err();

            assert!(matches!(err, ApiError::SessionExpired { status: s } if s == status));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(c.session().token().is_none());
        }
    }

    #[test]
    fn unauthorized_ignores_unparseable_body() {
        let c = signed_in("stale");
        let err = c.parse::<Rental>(HttpResponse::new(401, "<html>nope</html>")).unwrap_err();
        assert!(err.is_auth_failure());
    }

    #[test]
    fn error_message_comes_from_body() {
        let err = client()
            .parse::<Product>(HttpResponse::new(404, r#"{"message":"Product not found"}"#))
            .unwrap_err();
        assert!(matches!(&err, ApiError::Api { status: 404, message } if message == "Product not found"));
    }

    #[test]
    fn error_without_message_uses_fallback() {
        let err = client()
            .parse::<Product>(HttpResponse::new(500, r#"{"error":"boom"}"#))
            .unwrap_err();
        assert_eq!(err.to_string(), FALLBACK_MESSAGE);
    }

    #[test]
    fn unparseable_body_is_invalid_format_for_any_status() {
        for status in [200, 400, 500] {
            let err = client().parse::<Value>(HttpResponse::new(status, "not json")).unwrap_err();
            assert!(matches!(err, ApiError::InvalidResponse(_)), "status {status}");
            assert_eq!(err.to_string(), "Invalid response format");
        }
    }

    #[test]
    fn ack_accepts_empty_success_body() {
        let c = client();
        assert_eq!(c.parse_ack(HttpResponse::new(204, "")).unwrap(), MessageResponse::default());
        let ack = c.parse_ack(HttpResponse::new(200, r#"{"message":"deleted"}"#)).unwrap();
        assert_eq!(ack.message.as_deref(), Some("deleted"));
        assert!(c.parse_ack(HttpResponse::new(500, "")).is_err());
    }

    #[test]
    fn parse_auth_stores_token() {
        let c = client();
        let body = r#"{"token":"new-token","user":{"id":"u1","name":"Ana","email":"ana@example.com","role":"USER"}}"#;
        let auth = c.parse_auth(HttpResponse::new(200, body)).unwrap();
        assert_eq!(auth.user.name, "Ana");
        assert_eq!(c.session().token().as_deref(), Some("new-token"));
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(RentalClient::new("ftp://example.com", Session::in_memory()).is_err());
        assert!(RentalClient::new("not a url", Session::in_memory()).is_err());
    }
}
