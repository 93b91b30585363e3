//! Blocking façade: one method per backend endpoint.
//!
//! Each method builds the request with `RentalClient`, hands it to a
//! `Transport`, and parses the response. There is no retry, no request
//! deduplication and no timeout beyond what the transport applies.

use tracing::instrument;

use crate::client::RentalClient;
use crate::error::{ApiError, ApiResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    AdminCheck, AuthResponse, AvailabilityInput, CreateInvoice, CreateNotification, CreatePayment, CreatePickup,
    CreateProduct, CreateQuotation, CreateRental, CreateRentalReturn, DashboardStats, DurationPrice, DurationRequest,
    Invoice, MessageResponse, Notification, Payment, Pickup, Product, ProductAvailability, ProductFilters, Quotation,
    Rental, RentalReturn, SigninRequest, SignupRequest, UpdateProduct, UpdateProfile, UpdateRentalReturn, User,
    UserCheck,
};

/// Executes an `HttpRequest`. Non-2xx statuses are data, not errors; only a
/// failed round-trip is an `Err`.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> ApiResult<HttpResponse>;
}

/// `Transport` backed by a ureq agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (key, value) in headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        let HttpRequest {
            method,
            path,
            headers,
            body,
        } = request;

        let result = match (method, body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(&path), &headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(&path), &headers).call(),
            (HttpMethod::Post, Some(body)) => with_headers(self.agent.post(&path), &headers).send(body.as_bytes()),
            (HttpMethod::Post, None) => with_headers(self.agent.post(&path), &headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(&path), &headers).send(body.as_bytes()),
            (HttpMethod::Put, None) => with_headers(self.agent.put(&path), &headers).send_empty(),
        };
        let mut response = result.map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}

/// Typed, blocking access to every backend endpoint.
#[derive(Debug, Clone)]
pub struct RentalApi<T = UreqTransport> {
    client: RentalClient,
    transport: T,
}

impl RentalApi<UreqTransport> {
    pub fn new(client: RentalClient) -> Self {
        Self::with_transport(client, UreqTransport::new())
    }
}

impl<T: Transport> RentalApi<T> {
    pub fn with_transport(client: RentalClient, transport: T) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &RentalClient {
        &self.client
    }

    #[instrument(level = "debug", skip_all, fields(method = %request.method, path = %request.path))]
    fn send(&self, request: HttpRequest) -> ApiResult<HttpResponse> {
        self.transport.execute(request)
    }

    fn fetch<R: serde::de::DeserializeOwned>(&self, request: HttpRequest) -> ApiResult<R> {
        let response = self.send(request)?;
        self.client.parse(response)
    }

    fn ack(&self, request: HttpRequest) -> ApiResult<MessageResponse> {
        let response = self.send(request)?;
        self.client.parse_ack(response)
    }

    fn auth(&self, request: HttpRequest) -> ApiResult<AuthResponse> {
        let response = self.send(request)?;
        self.client.parse_auth(response)
    }

    // auth

    pub fn generate_otp(&self, email: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_generate_otp(email)?)
    }

    pub fn verify_otp(&self, email: &str, otp: &str) -> ApiResult<AuthResponse> {
        self.auth(self.client.build_verify_otp(email, otp)?)
    }

    pub fn signup(&self, input: &SignupRequest) -> ApiResult<AuthResponse> {
        self.auth(self.client.build_signup(input)?)
    }

    pub fn signin(&self, input: &SigninRequest) -> ApiResult<AuthResponse> {
        self.auth(self.client.build_signin(input)?)
    }

    /// Clears the local token. The backend keeps no session state to revoke.
    pub fn signout(&self) -> ApiResult<()> {
        self.client.session().sign_out()
    }

    pub fn me(&self) -> ApiResult<User> {
        self.fetch(self.client.build_me())
    }

    pub fn update_profile(&self, input: &UpdateProfile) -> ApiResult<User> {
        self.fetch(self.client.build_update_profile(input)?)
    }

    pub fn check_admin(&self) -> ApiResult<AdminCheck> {
        self.fetch(self.client.build_check_admin())
    }

    pub fn check_user(&self, email: &str) -> ApiResult<UserCheck> {
        self.fetch(self.client.build_check_user(email))
    }

    pub fn list_users(&self) -> ApiResult<Vec<User>> {
        self.fetch(self.client.build_list_users())
    }

    pub fn delete_user(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_user(id))
    }

    // admin

    pub fn admin_dashboard(&self) -> ApiResult<DashboardStats> {
        self.fetch(self.client.build_admin_dashboard())
    }

    pub fn impersonate(&self, user_id: &str) -> ApiResult<AuthResponse> {
        self.auth(self.client.build_impersonate(user_id))
    }

    // product

    pub fn create_product(&self, input: &CreateProduct) -> ApiResult<Product> {
        self.fetch(self.client.build_create_product(input)?)
    }

    pub fn list_products(&self, filters: &ProductFilters) -> ApiResult<Vec<Product>> {
        self.fetch(self.client.build_list_products(filters))
    }

    pub fn get_product(&self, id: &str) -> ApiResult<Product> {
        self.fetch(self.client.build_get_product(id))
    }

    pub fn update_product(&self, id: &str, input: &UpdateProduct) -> ApiResult<Product> {
        self.fetch(self.client.build_update_product(id, input)?)
    }

    pub fn delete_product(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_product(id))
    }

    pub fn product_duration(&self, id: &str, input: &DurationRequest) -> ApiResult<DurationPrice> {
        self.fetch(self.client.build_product_duration(id, input)?)
    }

    pub fn add_availability(&self, product_id: &str, input: &AvailabilityInput) -> ApiResult<ProductAvailability> {
        self.fetch(self.client.build_add_availability(product_id, input)?)
    }

    pub fn update_availability(
        &self,
        product_id: &str,
        availability_id: &str,
        input: &AvailabilityInput,
    ) -> ApiResult<ProductAvailability> {
        self.fetch(self.client.build_update_availability(product_id, availability_id, input)?)
    }

    pub fn delete_availability(&self, product_id: &str, availability_id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_availability(product_id, availability_id))
    }

    // rental

    pub fn create_rental(&self, input: &CreateRental) -> ApiResult<Rental> {
        self.fetch(self.client.build_create_rental(input)?)
    }

    pub fn list_rentals(&self) -> ApiResult<Vec<Rental>> {
        self.fetch(self.client.build_list_rentals())
    }

    pub fn my_rentals(&self) -> ApiResult<Vec<Rental>> {
        self.fetch(self.client.build_my_rentals())
    }

    pub fn update_rental_status(&self, id: &str, status: &str) -> ApiResult<Rental> {
        self.fetch(self.client.build_update_rental_status(id, status)?)
    }

    pub fn delete_rental(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_rental(id))
    }

    // quotation

    pub fn create_quotation(&self, input: &CreateQuotation) -> ApiResult<Quotation> {
        self.fetch(self.client.build_create_quotation(input)?)
    }

    /// The backend converts an accepted quotation into a rental.
    pub fn accept_quotation(&self, id: &str) -> ApiResult<Rental> {
        self.fetch(self.client.build_accept_quotation(id))
    }

    pub fn list_quotations(&self) -> ApiResult<Vec<Quotation>> {
        self.fetch(self.client.build_list_quotations())
    }

    pub fn my_quotations(&self) -> ApiResult<Vec<Quotation>> {
        self.fetch(self.client.build_my_quotations())
    }

    pub fn delete_quotation(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_quotation(id))
    }

    // invoice

    pub fn create_invoice(&self, input: &CreateInvoice) -> ApiResult<Invoice> {
        self.fetch(self.client.build_create_invoice(input)?)
    }

    pub fn list_invoices(&self) -> ApiResult<Vec<Invoice>> {
        self.fetch(self.client.build_list_invoices())
    }

    pub fn get_invoice(&self, id: &str) -> ApiResult<Invoice> {
        self.fetch(self.client.build_get_invoice(id))
    }

    pub fn update_invoice_status(&self, id: &str, status: &str) -> ApiResult<Invoice> {
        self.fetch(self.client.build_update_invoice_status(id, status)?)
    }

    pub fn delete_invoice(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_invoice(id))
    }

    // payment

    pub fn create_payment(&self, input: &CreatePayment) -> ApiResult<Payment> {
        self.fetch(self.client.build_create_payment(input)?)
    }

    pub fn my_payments(&self) -> ApiResult<Vec<Payment>> {
        self.fetch(self.client.build_my_payments())
    }

    pub fn list_payments(&self) -> ApiResult<Vec<Payment>> {
        self.fetch(self.client.build_list_payments())
    }

    pub fn update_payment_status(&self, id: &str, status: &str) -> ApiResult<Payment> {
        self.fetch(self.client.build_update_payment_status(id, status)?)
    }

    pub fn delete_payment(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_payment(id))
    }

    // notification

    pub fn create_notification(&self, input: &CreateNotification) -> ApiResult<Notification> {
        self.fetch(self.client.build_create_notification(input)?)
    }

    pub fn my_notifications(&self) -> ApiResult<Vec<Notification>> {
        self.fetch(self.client.build_my_notifications())
    }

    pub fn mark_notification_read(&self, id: &str) -> ApiResult<Notification> {
        self.fetch(self.client.build_mark_notification_read(id))
    }

    pub fn delete_notification(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_notification(id))
    }

    // pickup

    pub fn create_pickup(&self, input: &CreatePickup) -> ApiResult<Pickup> {
        self.fetch(self.client.build_create_pickup(input)?)
    }

    pub fn complete_pickup(&self, id: &str) -> ApiResult<Pickup> {
        self.fetch(self.client.build_complete_pickup(id))
    }

    pub fn list_pickups(&self) -> ApiResult<Vec<Pickup>> {
        self.fetch(self.client.build_list_pickups())
    }

    pub fn my_pickups(&self) -> ApiResult<Vec<Pickup>> {
        self.fetch(self.client.build_my_pickups())
    }

    pub fn delete_pickup(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_pickup(id))
    }

    // rental-return

    pub fn create_return(&self, input: &CreateRentalReturn) -> ApiResult<RentalReturn> {
        self.fetch(self.client.build_create_return(input)?)
    }

    pub fn complete_return(&self, id: &str) -> ApiResult<RentalReturn> {
        self.fetch(self.client.build_complete_return(id))
    }

    pub fn list_returns(&self) -> ApiResult<Vec<RentalReturn>> {
        self.fetch(self.client.build_list_returns())
    }

    pub fn my_returns(&self) -> ApiResult<Vec<RentalReturn>> {
        self.fetch(self.client.build_my_returns())
    }

    pub fn update_return(&self, id: &str, input: &UpdateRentalReturn) -> ApiResult<RentalReturn> {
        self.fetch(self.client.build_update_return(id, input)?)
    }

    pub fn delete_return(&self, id: &str) -> ApiResult<MessageResponse> {
        self.ack(self.client.build_delete_return(id))
    }
}
