//! Supabase REST API client using service_role key

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::SupabaseConfig;

/// PostgREST client for server-side table access.
/// The service_role key bypasses RLS, so it never leaves this process.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    fn rest_url(&self, table: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{}/rest/v1/{}?{}", self.base_url, table, q),
            None => format!("{}/rest/v1/{}", self.base_url, table),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SupabaseError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(SupabaseError::Request)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Rows matching a PostgREST filter
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SupabaseError> {
        let request = self.client.get(self.rest_url(table, Some(query)));
        let response = self.send(request).await?;
        response.json().await.map_err(SupabaseError::Parse)
    }

    /// First row matching a filter, if any
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Option<T>, SupabaseError> {
        let query = format!("{}&limit=1", query);
        let rows: Vec<T> = self.select(table, &query).await?;
        Ok(rows.into_iter().next())
    }

    /// Insert a row and return its representation
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, SupabaseError> {
        let request = self
            .client
            .post(self.rest_url(table, None))
            .header("Prefer", "return=representation")
            .json(data);
        let response = self.send(request).await?;

        // PostgREST answers with an array even for single inserts
        let rows: Vec<R> = response.json().await.map_err(SupabaseError::Parse)?;
        rows.into_iter().next().ok_or(SupabaseError::NoRowReturned)
    }

    pub async fn update<T: Serialize>(
        &self,
        table: &str,
        query: &str,
        data: &T,
    ) -> Result<(), SupabaseError> {
        let request = self
            .client
            .patch(self.rest_url(table, Some(query)))
            .json(data);
        self.send(request).await.map(|_| ())
    }
}

/// Supabase errors
#[derive(Debug, thiserror::Error)]
pub enum SupabaseError {
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_rest_urls() {
        let client = SupabaseClient::new(&SupabaseConfig {
            url: "https://db.example.com/".into(),
            service_role_key: "key".into(),
        });
        assert_eq!(
            client.rest_url("matches", Some("id=eq.4")),
            "https://db.example.com/rest/v1/matches?id=eq.4"
        );
        assert_eq!(
            client.rest_url("profiles", None),
            "https://db.example.com/rest/v1/profiles"
        );
    }
}
