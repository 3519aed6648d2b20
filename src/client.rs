//! HTTP client for the tour-search provider
//!
//! Wraps the provider's GET-based JSON API: authenticated request execution,
//! reference lookups, the asynchronous submit/poll/fetch search protocol and
//! the name-based smart-search composition on top of it.

use crate::references::{self, PlaceMatch, ReferenceEntry, ReferenceKind};
use crate::results::{self, num_field, SearchSummary, TourRecord};
use crate::{coerce_params, Params, PollTiming, TourConfig, TourError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

/// Bound on raw-body excerpts carried inside parse errors.
const EXCERPT_CHARS: usize = 500;

/// First result page, fetched once polling settles.
const RESULT_PAGE: i64 = 1;
const RESULT_PAGE_SIZE: i64 = 25;

/// Main client for the tour-search provider
#[derive(Clone)]
pub struct TourClient {
    http_client: Client,
    config: TourConfig,
    timing: PollTiming,
}

/// Successful smart-search envelope: resolved places, the parameters the
/// search actually ran with, summary counters, the ranked flat tour list and
/// the raw hotel-grouped tree for callers that still want the grouping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartSearchResult {
    pub success: bool,
    pub city: ReferenceEntry,
    pub country: ReferenceEntry,
    pub search_params: Params,
    pub status: SearchSummary,
    pub tours: Vec<TourRecord>,
    pub raw_result: Value,
}

impl TourClient {
    /// Create a client for the given provider configuration.
    pub fn new(config: &TourConfig) -> Result<Self, TourError> {
        debug!(base_url = %config.base_url, "Creating tour client");
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TourError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config: config.clone(),
            timing: PollTiming::default(),
        })
    }

    /// Override the poll pacing.
    pub fn with_poll_timing(mut self, timing: PollTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Issue one authenticated GET against a provider endpoint.
    ///
    /// Credentials and the JSON format flag are appended to a copy of the
    /// caller's parameters. Every failure class comes back as a `TourError`;
    /// there are no retries at this layer.
    pub async fn request(&self, endpoint: &str, params: &Params) -> Result<Value, TourError> {
        let mut request_params = params.clone();
        request_params.insert("authlogin".to_string(), Value::from(self.config.login.as_str()));
        request_params.insert("authpass".to_string(), Value::from(self.config.password.as_str()));
        request_params.insert("format".to_string(), Value::from("json"));

        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);

        debug!(endpoint = endpoint, "Requesting provider endpoint");
        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .get(&url)
            .query(&query_pairs(&request_params))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        info!(
            endpoint = endpoint,
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Provider request completed"
        );

        let body = response.text().await.map_err(classify_transport_error)?;

        if !status.is_success() {
            // A failing status can still carry the provider's own structured
            // error payload; pass that through unchanged.
            if let Ok(tree) = serde_json::from_str::<Value>(&body) {
                if tree.get("error").is_some() {
                    return Err(upstream_error(tree));
                }
            }
            error!(endpoint = endpoint, status = %status, "Provider returned HTTP error");
            return Err(TourError::HttpStatus {
                status: status.as_u16(),
                body_excerpt: excerpt(&body),
            });
        }

        serde_json::from_str(&body).map_err(|_| {
            warn!(endpoint = endpoint, "Provider body failed to parse as JSON");
            TourError::MalformedResponse {
                excerpt: excerpt(&body),
            }
        })
    }

    /// Fetch a reference list (`list.php`).
    ///
    /// `filters` carries optional provider filter codes such as `regcountry`
    /// or `cndep`; the raw list tree is returned as-is.
    pub async fn get_references(
        &self,
        ref_type: &str,
        filters: &Params,
    ) -> Result<Value, TourError> {
        let mut params = filters.clone();
        params.insert("type".to_string(), Value::from(ref_type));
        self.request("list.php", &params).await
    }

    /// Resolve a departure-city name to its provider code.
    #[instrument(level = "info", skip(self))]
    pub async fn find_city(&self, name: &str) -> Result<PlaceMatch, TourError> {
        self.resolve(ReferenceKind::Departure, name).await
    }

    /// Resolve a destination-country name to its provider code.
    #[instrument(level = "info", skip(self))]
    pub async fn find_country(&self, name: &str) -> Result<PlaceMatch, TourError> {
        self.resolve(ReferenceKind::Country, name).await
    }

    async fn resolve(&self, kind: ReferenceKind, query: &str) -> Result<PlaceMatch, TourError> {
        // A provider-reported error on the list fetch is a failure, never a
        // "not found".
        let tree = check_provider_error(self.get_references(kind.as_str(), &Params::new()).await?)?;
        let entries = references::parse_entries(kind, &tree);
        debug!(
            kind = kind.as_str(),
            entries = entries.len(),
            "Fetched reference list"
        );

        let lookup = references::match_name(kind, &entries, query);
        info!(
            kind = kind.as_str(),
            query = query,
            found = lookup.found,
            alternatives = lookup.alternatives.len(),
            "Reference lookup finished"
        );
        Ok(lookup)
    }

    /// Run one full search: submit, poll until settled, fetch page 1.
    ///
    /// `departure` and `country` must be present (as provider codes) in the
    /// parameters. The raw result tree is returned; rank it with
    /// [`results::flatten_tours`]. Polling stops early once the provider
    /// reports `finished` or its elapsed counter passes the cutoff, and runs
    /// out of attempts otherwise, fetching whatever accumulated so far.
    #[instrument(level = "info", skip(self, params))]
    pub async fn search_tours(&self, params: &Params) -> Result<Value, TourError> {
        let clean_params = coerce_params(params);
        for field in ["departure", "country"] {
            if !clean_params.contains_key(field) {
                return Err(TourError::MissingField(field));
            }
        }

        // Submit
        let search_response =
            check_provider_error(self.request("search.php", &clean_params).await?)?;
        let request_id = match request_id(&search_response) {
            Some(id) => id,
            None => {
                error!("Search submission returned no request id");
                return Err(TourError::NoRequestId {
                    response: search_response,
                    sent_params: clean_params,
                });
            }
        };
        info!(request_id = %request_id, "Search submitted");

        // Poll. Exhaustion is not an error: the fetch below returns whatever
        // the provider aggregated within the attempt budget.
        let mut poll_params = Params::new();
        poll_params.insert("requestid".to_string(), Value::from(request_id.as_str()));
        poll_params.insert("type".to_string(), Value::from("status"));

        for attempt in 0..self.timing.max_attempts {
            let delay = if attempt == 0 {
                self.timing.first_delay
            } else {
                self.timing.poll_delay
            };
            tokio::time::sleep(delay).await;

            let status_response = self.request("result.php", &poll_params).await?;
            let null = Value::Null;
            let status = status_response.get("status").unwrap_or(&null);
            let state = status.get("state").and_then(Value::as_str).unwrap_or("");
            let timepassed = num_field(status, "timepassed").unwrap_or(0.0);

            debug!(
                attempt = attempt + 1,
                state = state,
                timepassed = timepassed,
                "Search status poll"
            );

            if state == "finished" || timepassed > self.timing.elapsed_cutoff as f64 {
                info!(attempt = attempt + 1, state = state, "Search settled");
                break;
            }
        }

        // Fetch the first result page
        let mut result_params = Params::new();
        result_params.insert("requestid".to_string(), Value::from(request_id.as_str()));
        result_params.insert("type".to_string(), Value::from("result"));
        result_params.insert("page".to_string(), Value::from(RESULT_PAGE));
        result_params.insert("onpage".to_string(), Value::from(RESULT_PAGE_SIZE));
        self.request("result.php", &result_params).await
    }

    /// Search by human-readable place names instead of provider codes.
    ///
    /// Resolves the city and country through the reference lists, merges the
    /// resolved codes over `extra_params` (the codes win on collision), runs
    /// the search and returns the bundled envelope.
    #[instrument(level = "info", skip(self, extra_params, limit))]
    pub async fn search_tours_smart(
        &self,
        city_name: &str,
        country_name: &str,
        extra_params: &Params,
        limit: Option<usize>,
    ) -> Result<SmartSearchResult, TourError> {
        // An unresolvable city must not cost a country lookup or a search
        // submission.
        let city_lookup = self.find_city(city_name).await?;
        let city = match city_lookup.entry.clone().filter(|_| city_lookup.found) {
            Some(entry) => entry,
            None => {
                warn!(city = city_name, "Departure city did not resolve");
                return Err(TourError::CityNotFound {
                    query: city_name.to_string(),
                    lookup: city_lookup,
                });
            }
        };

        let country_lookup = self.find_country(country_name).await?;
        let country = match country_lookup.entry.clone().filter(|_| country_lookup.found) {
            Some(entry) => entry,
            None => {
                warn!(country = country_name, "Destination country did not resolve");
                return Err(TourError::CountryNotFound {
                    query: country_name.to_string(),
                    lookup: country_lookup,
                });
            }
        };

        // Resolved codes win over any same-keyed caller extras
        let mut search_params = extra_params.clone();
        search_params.insert("departure".to_string(), Value::from(city.id));
        search_params.insert("country".to_string(), Value::from(country.id));

        let raw_result = match self.search_tours(&search_params).await {
            Ok(raw) => raw,
            Err(source) => {
                return Err(TourError::SearchFailed {
                    city: city.name,
                    country: country.name,
                    source: Box::new(source),
                })
            }
        };

        let tours = results::flatten_tours(&raw_result, limit);
        let status = results::search_summary(&raw_result, tours.len());
        info!(
            city = %city.name,
            country = %country.name,
            tours = tours.len(),
            state = status.state.as_deref().unwrap_or(""),
            "Smart search completed"
        );

        Ok(SmartSearchResult {
            success: true,
            city,
            country,
            search_params,
            status,
            tours,
            raw_result,
        })
    }

    /// Re-check a tour's current price (`actualize.php`).
    pub async fn actualize_tour(&self, tour_id: &str, currency: i64) -> Result<Value, TourError> {
        self.request("actualize.php", &tour_params(tour_id, currency))
            .await
    }

    /// Fetch flight and surcharge detail for a tour (`actdetail.php`).
    pub async fn get_tour_details(
        &self,
        tour_id: &str,
        currency: i64,
    ) -> Result<Value, TourError> {
        self.request("actdetail.php", &tour_params(tour_id, currency))
            .await
    }

    /// Fetch a hotel's card (`hotel.php`).
    pub async fn get_hotel_info(
        &self,
        hotel_code: i64,
        include_reviews: bool,
        include_big_images: bool,
    ) -> Result<Value, TourError> {
        let mut params = Params::new();
        params.insert("hotelcode".to_string(), Value::from(hotel_code));
        params.insert("reviews".to_string(), Value::from(include_reviews as i64));
        params.insert("imgbig".to_string(), Value::from(include_big_images as i64));
        self.request("hotel.php", &params).await
    }

    /// Fetch current hot-tour offers (`hottours.php`).
    pub async fn get_hot_tours(&self, params: &Params) -> Result<Value, TourError> {
        let clean_params = coerce_params(params);
        self.request("hottours.php", &clean_params).await
    }
}

fn tour_params(tour_id: &str, currency: i64) -> Params {
    let mut params = Params::new();
    params.insert("tourid".to_string(), Value::from(tour_id));
    params.insert("currency".to_string(), Value::from(currency));
    coerce_params(&params)
}

/// Render a parameter mapping as query pairs. Scalars print bare, anything
/// structured falls back to its JSON text.
fn query_pairs(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

fn classify_transport_error(err: reqwest::Error) -> TourError {
    if err.is_timeout() {
        TourError::Timeout
    } else {
        TourError::Connection(err.to_string())
    }
}

/// Provider errors ride inside otherwise well-formed bodies as a top-level
/// `error` field.
fn check_provider_error(tree: Value) -> Result<Value, TourError> {
    if tree.get("error").is_some() {
        Err(upstream_error(tree))
    } else {
        Ok(tree)
    }
}

fn upstream_error(tree: Value) -> TourError {
    let message = match tree.get("error") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unknown provider error".to_string(),
    };
    TourError::Upstream {
        message,
        detail: Some(tree),
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(EXCERPT_CHARS).collect()
}

fn request_id(response: &Value) -> Option<String> {
    match response.pointer("/result/requestid")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}
