use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::Reading;

/// Sentinel strings shown in place of an address when resolution degrades.
/// These are report content, not errors: the pipeline always continues.
pub const SENTINEL_NOT_FOUND: &str = "Endereço não encontrado";
pub const SENTINEL_TIMEOUT: &str = "Timeout na busca do endereço";
pub const SENTINEL_SERVICE_ERROR: &str = "Erro no serviço de geocodificação";

/// Minimum spacing between consecutive network lookups (cache hits exempt).
pub const NETWORK_CALL_INTERVAL: Duration = Duration::from_millis(100);

/// Per-request timeout towards the geocoding service.
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

const NOMINATIM_ENDPOINT: &str = "https://nominatim.openstreetmap.org/reverse";
const USER_AGENT: &str = concat!("route_report/", env!("CARGO_PKG_VERSION"));

/// Structured components of a reverse-geocoding hit, in the service's naming.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressComponents {
    pub road: Option<String>,
    pub pedestrian: Option<String>,
    pub house_number: Option<String>,
    pub suburb: Option<String>,
    pub neighbourhood: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedAddress {
    pub display_name: String,
    pub components: AddressComponents,
}

/// Every way one lookup can end. `Found`/`NotFound` are service answers;
/// the rest classify transport failures.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Found(ResolvedAddress),
    NotFound,
    Timeout,
    ServiceError,
    Failure(String),
}

/// Seam for the external geocoding collaborator.
pub trait ReverseGeocode {
    fn reverse(&mut self, latitude: f64, longitude: f64) -> LookupOutcome;
}

/// Join the structured components the way the report displays them:
/// road (or pedestrian way) with house number attached, then
/// suburb/neighbourhood, city/town/village, state, country. Falls back to
/// the service's formatted string when nothing structured came back.
pub fn compose_address(resolved: &ResolvedAddress) -> String {
    let c = &resolved.components;
    let mut parts: Vec<String> = Vec::new();

    if let Some(road) = c.road.as_ref().or(c.pedestrian.as_ref()) {
        match &c.house_number {
            Some(number) => parts.push(format!("{road}, {number}")),
            None => parts.push(road.clone()),
        }
    }
    if let Some(district) = c.suburb.as_ref().or(c.neighbourhood.as_ref()) {
        parts.push(district.clone());
    }
    if let Some(locality) = c
        .city
        .as_ref()
        .or(c.town.as_ref())
        .or(c.village.as_ref())
    {
        parts.push(locality.clone());
    }
    if let Some(state) = &c.state {
        parts.push(state.clone());
    }
    if let Some(country) = &c.country {
        parts.push(country.clone());
    }

    if parts.is_empty() {
        resolved.display_name.clone()
    } else {
        parts.join(" - ")
    }
}

/// Map a lookup outcome to the string stored on the reading.
pub fn outcome_to_address(outcome: &LookupOutcome) -> String {
    match outcome {
        LookupOutcome::Found(resolved) => compose_address(resolved),
        LookupOutcome::NotFound => SENTINEL_NOT_FOUND.to_string(),
        LookupOutcome::Timeout => SENTINEL_TIMEOUT.to_string(),
        LookupOutcome::ServiceError => SENTINEL_SERVICE_ERROR.to_string(),
        LookupOutcome::Failure(message) => format!("Erro: {message}"),
    }
}

/// Run-scoped address cache keyed by coordinates rounded to 6 decimals.
/// Guarantees at most one network lookup per distinct key.
#[derive(Debug, Default)]
pub struct AddressCache {
    entries: HashMap<String, String>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(latitude: f64, longitude: f64) -> String {
        format!("{latitude:.6},{longitude:.6}")
    }

    pub fn get(&self, latitude: f64, longitude: f64) -> Option<&String> {
        self.entries.get(&Self::key(latitude, longitude))
    }

    pub fn insert(&mut self, latitude: f64, longitude: f64, address: String) {
        self.entries.insert(Self::key(latitude, longitude), address);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Minimum-interval limiter around the network boundary. Pure bookkeeping
/// over caller-supplied instants, so tests inject the clock.
#[derive(Debug)]
pub struct MinIntervalLimiter {
    interval: Duration,
    last_call: Option<Instant>,
}

impl MinIntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: None,
        }
    }

    /// How long the caller must still wait before the next network call.
    pub fn wait_needed(&self, now: Instant) -> Duration {
        match self.last_call {
            None => Duration::ZERO,
            Some(last) => self.interval.saturating_sub(now.duration_since(last)),
        }
    }

    /// Record that a network call happened at `now`.
    pub fn record(&mut self, now: Instant) {
        self.last_call = Some(now);
    }
}

/// Nominatim-backed implementation of the geocoding seam.
pub struct NominatimClient {
    http: reqwest::blocking::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    error: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    address: AddressComponents,
}

impl NominatimClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(LOOKUP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            endpoint: NOMINATIM_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let mut client = Self::new()?;
        client.endpoint = endpoint.into();
        Ok(client)
    }
}

impl ReverseGeocode for NominatimClient {
    fn reverse(&mut self, latitude: f64, longitude: f64) -> LookupOutcome {
        let request = self
            .http
            .get(&self.endpoint)
            .query(&[("format", "jsonv2")])
            .query(&[("lat", latitude), ("lon", longitude)])
            .query(&[("accept-language", "pt")]);

        let response = match request.send() {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return LookupOutcome::Timeout,
            Err(e) if e.is_connect() => return LookupOutcome::ServiceError,
            Err(e) => return LookupOutcome::Failure(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            warn!("Geocoding service answered {} for {latitude},{longitude}", status);
            return LookupOutcome::ServiceError;
        }

        let payload: ReverseResponse = match response.json() {
            Ok(payload) => payload,
            Err(e) => return LookupOutcome::Failure(e.to_string()),
        };

        // Nominatim reports "Unable to geocode" as a 200 with an error body.
        if payload.error.is_some() {
            return LookupOutcome::NotFound;
        }
        match payload.display_name {
            Some(display_name) => LookupOutcome::Found(ResolvedAddress {
                display_name,
                components: payload.address,
            }),
            None => LookupOutcome::NotFound,
        }
    }
}

/// Resolve an address for every reading, in order, deduplicating lookups
/// through the cache and pacing network calls through the limiter.
/// `progress` receives (rows completed, total rows) after each row.
pub fn annotate_readings(
    readings: &mut [Reading],
    geocoder: &mut dyn ReverseGeocode,
    mut progress: impl FnMut(usize, usize),
) {
    let total = readings.len();
    let mut cache = AddressCache::new();
    let mut limiter = MinIntervalLimiter::new(NETWORK_CALL_INTERVAL);

    for (done, reading) in readings.iter_mut().enumerate() {
        let address = match cache.get(reading.latitude, reading.longitude) {
            Some(cached) => cached.clone(),
            None => {
                let wait = limiter.wait_needed(Instant::now());
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
                let outcome = geocoder.reverse(reading.latitude, reading.longitude);
                limiter.record(Instant::now());

                let address = outcome_to_address(&outcome);
                cache.insert(reading.latitude, reading.longitude, address.clone());
                address
            }
        };
        reading.address = Some(address);
        progress(done + 1, total);
    }

    debug!(
        "Annotated {} readings using {} distinct lookups",
        total,
        cache.len()
    );
}
