//! Address store backed by a REST/JSON address service.
//!
//! Endpoints, relative to the base URL:
//! - `GET /addresses` lists every address
//! - `POST /addresses` creates one from a JSON body
//! - `DELETE /addresses/{id}` removes one
//! - `DELETE /addresses` removes all

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use kubel_core::{
    model::{AddressId, NewAddress, PersistedAddress},
    ports::{AddressStore, StoreError},
};

/// Address store talking to a remote address service.
pub struct HttpAddressStore {
    client: Client,
    base_url: String,
}

impl HttpAddressStore {
    /// Create a store bound to the given HTTP client and base URL.
    #[must_use]
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    fn addresses_url(&self) -> String {
        format!("{}/addresses", self.base_url)
    }
}

#[async_trait]
impl AddressStore for HttpAddressStore {
    async fn list(&self) -> Result<Vec<PersistedAddress>, StoreError> {
        let addresses =
            fetch_json::<Vec<PersistedAddress>>(self.client.get(self.addresses_url())).await?;
        debug!(count = addresses.len(), "listed remote addresses");
        Ok(addresses)
    }

    async fn create(&self, fields: NewAddress) -> Result<PersistedAddress, StoreError> {
        fetch_json(self.client.post(self.addresses_url()).json(&fields)).await
    }

    async fn delete(&self, id: &AddressId) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(format!("{}/{}", self.addresses_url(), id.0))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.clone()));
        }
        resp.error_for_status()?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), StoreError> {
        self.client
            .delete(self.addresses_url())
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// Small helper to fetch and decode JSON with status handling.
async fn fetch_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, StoreError> {
    req.send()
        .await
        .map_err(StoreError::from)?
        .error_for_status()
        .map_err(StoreError::from)?
        .json()
        .await
        .map_err(StoreError::from)
}
