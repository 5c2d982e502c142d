//! Vulnerability endpoints for a single computer.

use serde_json::Value;

use crate::client::SecureEndpointClient;
use crate::error::ApiResult;
use crate::http::Query;

impl SecureEndpointClient {
    /// Vulnerable applications observed on `uuid`
    /// (GET `/v1/computers/{guid}/vulnerabilities`).
    pub async fn get_vulnerabilities(
        &self,
        uuid: &str,
        start: Option<&str>,
        end: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> ApiResult<Option<Value>> {
        let query = Query::new()
            .push_opt("start_time", start)
            .push_opt("end_time", end)
            .push("limit", limit)
            .push("offset", offset);
        self.v1_get(&format!("/computers/{uuid}/vulnerabilities"), query)
            .await
    }

    /// Operating-system CVEs for `uuid`
    /// (GET `/v1/computers/{guid}/os_vulnerabilities`).
    pub async fn get_os_vulnerabilities(
        &self,
        uuid: &str,
        limit: u32,
        offset: u32,
    ) -> ApiResult<Option<Value>> {
        let query = Query::new().push("limit", limit).push("offset", offset);
        self.v1_get(&format!("/computers/{uuid}/os_vulnerabilities"), query)
            .await
    }
}
