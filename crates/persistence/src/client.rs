use crate::auth::{AuthResponse, AuthStrategy, Credentials};
use crate::wire::{
    ForecastPayload, ListPage, RawPlace, RawReservation, RawSensorReading, ReadingPayload,
    RecordRef, ReservationPayload,
};
use crate::{
    FORECASTS, PLACES, RESERVATIONS, RecordId, RecordStore, Result, SENSOR_READINGS, StoreError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config;
use common::timestamp;
use common::types::{ForecastRecord, Place, PlaceId, Reservation, SensorReading};
use logging::*;
use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StoreClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub page_size: u32,
    pub credentials: Credentials,
    pub strategies: Vec<AuthStrategy>,
}

impl Default for StoreClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".to_string(),
            timeout: Duration::from_secs(10),
            page_size: 500,
            credentials: Credentials::default(),
            strategies: vec![
                AuthStrategy::Superuser,
                AuthStrategy::Admin,
                AuthStrategy::User,
            ],
        }
    }
}

impl StoreClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_credentials(mut self, identity: &str, password: &str) -> Self {
        self.credentials = Credentials {
            identity: identity.to_string(),
            password: password.to_string(),
        };
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<AuthStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the client settings from `STORE_*` configuration keys.
    pub fn from_config() -> anyhow::Result<Self> {
        let strategies = AuthStrategy::parse_list(&config::get("STORE_AUTH_STRATEGIES")?)
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(Self::new(config::get("STORE_BASE_URL")?)
            .with_credentials(
                &config::get("STORE_IDENTITY").unwrap_or_default(),
                &config::get("STORE_PASSWORD").unwrap_or_default(),
            )
            .with_strategies(strategies)
            .with_page_size(config::get_parsed("STORE_PAGE_SIZE")?)
            .with_timeout(Duration::from_secs(config::get_parsed(
                "STORE_TIMEOUT_SECONDS",
            )?)))
    }
}

/// REST client of the collection-style record store.
pub struct StoreClient {
    client: Client,
    config: StoreClientConfig,
    token: Option<String>,
}

impl StoreClient {
    pub fn new(config: StoreClientConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            token: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn records_path(collection: &str) -> String {
        format!("/api/collections/{}/records", collection)
    }

    /// URL of one record; `id` is percent-encoded as a single path segment.
    fn record_url(&self, collection: &str, id: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(&Self::records_path(collection)))
            .map_err(|e| StoreError::Network(format!("invalid store url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Network("store url cannot take a path".to_string()))?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .timeout(self.config.timeout);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Authentication(body),
            _ => StoreError::Status {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn login(&self, strategy: AuthStrategy) -> Result<String> {
        let response = self
            .client
            .post(self.url(strategy.path()))
            .timeout(self.config.timeout)
            .json(&self.config.credentials)
            .send()
            .await?;
        let auth: AuthResponse = Self::check(response).await?.json().await?;
        Ok(auth.token)
    }

    /// Fetches every page of a filtered listing.
    async fn list_all<T: DeserializeOwned>(
        &self,
        collection: &str,
        filter: &str,
        sort: Option<&str>,
    ) -> Result<Vec<T>> {
        let log = DEFAULT.new(o!(
            "function" => "list_all",
            "collection" => collection.to_owned(),
        ));

        let path = Self::records_path(collection);
        let per_page = self.config.page_size.to_string();
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query = vec![
                ("filter", filter.to_string()),
                ("perPage", per_page.clone()),
                ("page", page.to_string()),
            ];
            if let Some(sort) = sort {
                query.push(("sort", sort.to_string()));
            }

            let response = self
                .request(Method::GET, self.url(&path))
                .query(&query)
                .send()
                .await?;
            let body: ListPage<T> = Self::check(response).await?.json().await?;
            trace!(log, "page fetched"; "page" => page, "items" => body.items.len(), "total_pages" => body.total_pages);

            let last = body.items.is_empty() || page >= body.total_pages;
            items.extend(body.items);
            if last {
                break;
            }
            page += 1;
        }

        debug!(log, "listing complete"; "count" => items.len());
        Ok(items)
    }

    async fn create<B: Serialize + ?Sized>(&self, collection: &str, body: &B) -> Result<()> {
        let response = self
            .request(Method::POST, self.url(&Self::records_path(collection)))
            .json(body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Quotes a value for use inside a store filter expression.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn place_filter(place: &PlaceId) -> String {
    format!("place_id={}", quote(place.as_str()))
}

/// Converts wire records, dropping (and logging) the ones that fail validation.
fn validated<R, T>(raw: Vec<R>, log: &Logger) -> Vec<T>
where
    T: TryFrom<R, Error = crate::wire::InvalidRecord>,
{
    raw.into_iter()
        .filter_map(|r| match T::try_from(r) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(log, "skipping invalid record"; "error" => %e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl RecordStore for StoreClient {
    async fn authenticate(&mut self) -> Result<()> {
        let log = DEFAULT.new(o!("function" => "authenticate"));

        let mut failures = Vec::new();
        for strategy in self.config.strategies.clone() {
            match self.login(strategy).await {
                Ok(token) => {
                    info!(log, "logged in"; "strategy" => %strategy);
                    self.token = Some(token);
                    return Ok(());
                }
                Err(e) => {
                    debug!(log, "login rejected"; "strategy" => %strategy, "error" => %e);
                    failures.push(format!("{}: {}", strategy, e));
                }
            }
        }

        self.token = None;
        if failures.is_empty() {
            failures.push("no auth strategy configured".to_string());
        }
        Err(StoreError::Authentication(failures.join("; ")))
    }

    async fn list_active_places(&self) -> Result<Vec<Place>> {
        let raw: Vec<RawPlace> = self.list_all(PLACES, "is_active=true", None).await?;
        Ok(raw.into_iter().map(Place::from).collect())
    }

    async fn get_place(&self, id: &PlaceId) -> Result<Place> {
        let url = self.record_url(PLACES, id.as_str())?;
        let response = self.request(Method::GET, url).send().await?;
        let raw: RawPlace = Self::check(response).await?.json().await?;
        Ok(raw.into())
    }

    async fn list_readings_since(
        &self,
        place: &PlaceId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        let log = DEFAULT.new(o!("function" => "list_readings_since", "place" => place.to_string()));
        let filter = format!(
            "{} && recorded_at >= {}",
            place_filter(place),
            quote(&timestamp::format(&since))
        );
        let raw: Vec<RawSensorReading> = self
            .list_all(SENSOR_READINGS, &filter, Some("recorded_at"))
            .await?;
        let mut readings: Vec<SensorReading> = validated(raw, &log);
        readings.sort_by_key(|r| r.recorded_at);
        Ok(readings)
    }

    async fn list_reservations(&self, place: &PlaceId) -> Result<Vec<Reservation>> {
        let log = DEFAULT.new(o!("function" => "list_reservations", "place" => place.to_string()));
        let raw: Vec<RawReservation> = self
            .list_all(RESERVATIONS, &place_filter(place), Some("start_ts"))
            .await?;
        Ok(validated(raw, &log))
    }

    async fn list_forecast_ids(&self, place: &PlaceId) -> Result<Vec<RecordId>> {
        let refs: Vec<RecordRef> = self
            .list_all(FORECASTS, &place_filter(place), None)
            .await?;
        Ok(refs.into_iter().map(|r| RecordId(r.id)).collect())
    }

    async fn delete_forecast(&self, id: &RecordId) -> Result<()> {
        let url = self.record_url(FORECASTS, &id.0)?;
        let response = self.request(Method::DELETE, url).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn create_forecast(&self, record: &ForecastRecord) -> Result<()> {
        self.create(FORECASTS, &ForecastPayload::from(record)).await
    }

    async fn create_reading(&self, reading: &SensorReading) -> Result<()> {
        self.create(SENSOR_READINGS, &ReadingPayload::from(reading))
            .await
    }

    async fn create_reservation(&self, reservation: &Reservation) -> Result<()> {
        self.create(RESERVATIONS, &ReservationPayload::from(reservation))
            .await
    }
}
