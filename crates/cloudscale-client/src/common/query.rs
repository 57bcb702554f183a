//! Query utilities for the cloudscale API
//!
//! List endpoints return plain JSON arrays and accept a single
//! `tag:<key>=<value>` equality filter.

use crate::common::HttpClient;
use crate::error::CloudscaleError;
use crate::models::TagFilter;
use serde::Deserialize;

/// Build the query string for a tag filter
pub fn tag_query(filter: &TagFilter) -> String {
    format!(
        "{}={}",
        urlencoding::encode(&format!("tag:{}", filter.key)),
        urlencoding::encode(&filter.value)
    )
}

/// List resources of an endpoint with an optional tag filter
pub async fn list_resources<T: for<'de> Deserialize<'de>>(
    http: &HttpClient,
    endpoint: &str,
    filter: Option<&TagFilter>,
) -> Result<Vec<T>, CloudscaleError> {
    let mut url = format!("/v1/{}", endpoint);

    if let Some(filter) = filter {
        url = format!("{}?{}", url, tag_query(filter));
    }

    http.get(&url).await
}
