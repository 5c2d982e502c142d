//! Computer (connector) endpoints of the Secure Endpoint v1 API.
//!
//! | Method | API Path |
//! |--------|----------|
//! | [`list_computers`](SecureEndpointClient::list_computers) | GET `/v1/computers` |
//! | [`get_computer`](SecureEndpointClient::get_computer) | GET `/v1/computers/{guid}` |
//! | [`move_computer`](SecureEndpointClient::move_computer) | PATCH `/v1/computers/{guid}` |
//! | [`delete_computer`](SecureEndpointClient::delete_computer) | DELETE `/v1/computers/{guid}` |
//! | [`get_computer_activity`](SecureEndpointClient::get_computer_activity) | GET `/v1/computers/activity` |
//! | [`get_device_trajectory`](SecureEndpointClient::get_device_trajectory) | GET `/v1/computers/{guid}/trajectory` |
//! | [`get_user_activity`](SecureEndpointClient::get_user_activity) | GET `/v1/computers/user_activity` |
//! | [`get_user_trajectory`](SecureEndpointClient::get_user_trajectory) | GET `/v1/computers/{guid}/user_trajectory` |
//! | [`check_isolation_availability`](SecureEndpointClient::check_isolation_availability) | OPTIONS `/v1/computers/{guid}/isolation` |
//! | [`get_isolation_status`](SecureEndpointClient::get_isolation_status) | GET `/v1/computers/{guid}/isolation` |
//!
//! Every method returns the envelope's `data` on success, `None` when the
//! envelope carries no `data`, or the [`HttpOutcome`](crate::error::HttpOutcome)
//! for a failed call. `check_isolation_availability` is the exception: it
//! reads the `Allow` header and returns a flag.
//!
//! `advanced_query` arguments are raw query fragments such as
//! `hostname[]=host1&group_guid[]=...`; they are merged after the typed
//! parameters.

use serde_json::{Value, json};

use crate::client::SecureEndpointClient;
use crate::error::ApiResult;
use crate::http::{HttpMethod, Payload, Query};

impl SecureEndpointClient {
    /// One page of computers, optionally narrowed by `advanced_query`.
    pub async fn list_computers(
        &self,
        offset: u32,
        limit: u32,
        advanced_query: Option<&str>,
    ) -> ApiResult<Option<Value>> {
        let query = Query::new()
            .push("offset", offset)
            .push("limit", limit)
            .extend_raw(advanced_query);
        self.v1_get("/computers", query).await
    }

    /// A single computer by connector GUID.
    pub async fn get_computer(&self, uuid: &str) -> ApiResult<Option<Value>> {
        self.v1_get(&format!("/computers/{uuid}"), Query::new()).await
    }

    /// Moves a connector into another group. The PATCH body replaces the
    /// group assignment outright.
    pub async fn move_computer(
        &self,
        uuid: &str,
        target_group_uuid: &str,
    ) -> ApiResult<Option<Value>> {
        let body = Payload::Json(json!({ "group_guid": target_group_uuid }));
        self.v1_request(
            HttpMethod::Patch,
            &format!("/computers/{uuid}"),
            Some(&body),
            None,
        )
        .await
    }

    /// Removes a computer. The API may answer with no body, which yields `None`.
    pub async fn delete_computer(&self, uuid: &str) -> ApiResult<Option<Value>> {
        self.v1_request(HttpMethod::Delete, &format!("/computers/{uuid}"), None, None)
            .await
    }

    /// Computers that have observed `query` (a hash, IP, URL or file name).
    pub async fn get_computer_activity(
        &self,
        query: &str,
        limit: u32,
        offset: u32,
    ) -> ApiResult<Option<Value>> {
        let query = Query::new()
            .push("q", query)
            .push("limit", limit)
            .push("offset", offset);
        self.v1_get("/computers/activity", query).await
    }

    /// Trajectory events for one computer within an optional time window.
    pub async fn get_device_trajectory(
        &self,
        uuid: &str,
        start: Option<&str>,
        end: Option<&str>,
        advanced_query: Option<&str>,
        limit: u32,
    ) -> ApiResult<Option<Value>> {
        let query = Query::new()
            .push_opt("start_time", start)
            .push_opt("end_time", end)
            .push("limit", limit)
            .extend_raw(advanced_query);
        self.v1_get(&format!("/computers/{uuid}/trajectory"), query)
            .await
    }

    /// Computers on which `username` has been observed.
    pub async fn get_user_activity(&self, username: &str, limit: u32) -> ApiResult<Option<Value>> {
        let query = Query::new().push("q", username).push("limit", limit);
        self.v1_get("/computers/user_activity", query).await
    }

    /// Trajectory events on one computer filtered to `username`.
    pub async fn get_user_trajectory(
        &self,
        username: &str,
        uuid: &str,
        limit: u32,
        start: Option<&str>,
        end: Option<&str>,
    ) -> ApiResult<Option<Value>> {
        let query = Query::new()
            .push("q", username)
            .push("limit", limit)
            .push_opt("start_time", start)
            .push_opt("end_time", end);
        self.v1_get(&format!("/computers/{uuid}/user_trajectory"), query)
            .await
    }

    /// Whether policy and org configuration allow `uuid` to be isolated.
    /// The API answers OPTIONS with an `Allow` header; isolation can be
    /// started when it lists `PUT`.
    ///
    /// # Errors
    ///
    /// - `HttpOutcome::NotFound` — no such computer.
    /// - any other [`HttpOutcome`](crate::error::HttpOutcome) for a failed call.
    pub async fn check_isolation_availability(&self, uuid: &str) -> ApiResult<bool> {
        let allowed = self
            .v1_allowed_methods(&format!("/computers/{uuid}/isolation"))
            .await?;
        Ok(allowed.iter().any(|verb| verb == "PUT"))
    }

    /// Current isolation state of a computer.
    pub async fn get_isolation_status(&self, uuid: &str) -> ApiResult<Option<Value>> {
        self.v1_get(&format!("/computers/{uuid}/isolation"), Query::new())
            .await
    }
}
