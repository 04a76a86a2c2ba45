//! PostgREST client for the hosted store (Supabase `rest/v1` surface)

use super::{NewQrCode, NewUser, QrCodeRecord, Store, User, UserChanges, Visit};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

const USERS: &str = "users";
const QR_CODES: &str = "qr_codes";
const VISITS: &str = "visits";

const RETURN_REPRESENTATION: &str = "return=representation";
const MERGE_DUPLICATES: &str = "resolution=merge-duplicates,return=representation";

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct RestErrorBody {
    message: Option<String>,
    details: Option<String>,
}

/// Store backed by the PostgREST HTTP API
#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
}

impl RestStore {
    /// Create a client for the project at `url`, authenticating with the anonymous key.
    pub fn new(url: &str, anon_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(anon_key)
            .map_err(|e| Error::Config(format!("Invalid store key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {anon_key}"))
            .map_err(|e| Error::Config(format!("Invalid store key: {e}")))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn table(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Store(format!("{action}: {e}")))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<RestErrorBody>(&body) {
            Ok(RestErrorBody {
                message: Some(message),
                details,
            }) => match details {
                Some(details) => format!("{message} ({details})"),
                None => message,
            },
            _ => body,
        };
        tracing::debug!(%status, action, "Store request rejected");
        Err(Error::Store(format!("{action} failed ({status}): {message}")))
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<Vec<T>> {
        self.send(request, action)
            .await?
            .json::<Vec<T>>()
            .await
            .map_err(|e| Error::Store(format!("{action}: unexpected response: {e}")))
    }

    async fn single<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T> {
        self.rows(request, action)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store(format!("{action}: no row returned")))
    }
}

#[async_trait]
impl Store for RestStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let request = self
            .client
            .get(self.table(USERS))
            .query(&[("select", "*".to_string()), ("email", format!("eq.{email}"))]);
        let users: Vec<User> = self.rows(request, "find user").await?;
        Ok(users.into_iter().next())
    }

    async fn insert_user(&self, user: &NewUser) -> Result<User> {
        let request = self
            .client
            .post(self.table(USERS))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(user);
        self.single(request, "insert user").await
    }

    async fn update_user(&self, id: Uuid, changes: &UserChanges) -> Result<User> {
        let request = self
            .client
            .patch(self.table(USERS))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", RETURN_REPRESENTATION)
            .json(changes);
        self.single(request, "update user").await
    }

    async fn insert_qr_code(&self, qr: &NewQrCode) -> Result<QrCodeRecord> {
        let request = self
            .client
            .post(self.table(QR_CODES))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(qr);
        self.single(request, "insert qr code").await
    }

    async fn find_visit(&self, user_id: Uuid, app_id: &str) -> Result<Option<Visit>> {
        let request = self.client.get(self.table(VISITS)).query(&[
            ("select", "*".to_string()),
            ("user_id", format!("eq.{user_id}")),
            ("app_id", format!("eq.{app_id}")),
        ]);
        let visits: Vec<Visit> = self.rows(request, "find visit").await?;
        Ok(visits.into_iter().next())
    }

    async fn upsert_visit(&self, visit: &Visit) -> Result<Visit> {
        let request = self
            .client
            .post(self.table(VISITS))
            .query(&[("on_conflict", "user_id,app_id")])
            .header("Prefer", MERGE_DUPLICATES)
            .json(visit);
        self.single(request, "upsert visit").await
    }
}
