// src/mcp_server.rs

use rmcp::{
    ServerHandler, ServiceExt,
    model::{ServerCapabilities, ServerInfo},
    schemars, tool,
    transport::stdio,
};
use rust_tours::{provider_date, Params, TourClient, TourConfig, TourError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use anyhow::Result;
use tracing::{info, error, debug};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender;
use std::path::PathBuf;

/// Tour search MCP server
#[derive(Clone)]
pub struct TourServer {
    client: TourClient,
}

impl TourServer {
    pub fn new(client: TourClient) -> Self {
        Self { client }
    }

    /// Initialize logging to file
    fn init_logging() -> Result<()> {
        let log_dir = PathBuf::from("logs");
        std::fs::create_dir_all(&log_dir)?;

        // Daily rotation; stdout stays clean for the stdio transport
        let file_appender = tracing_appender::rolling::daily(&log_dir, "rust-tours-mcp.log");

        tracing_subscriber::registry()
            .with(
                EnvFilter::new("debug")
                    .add_directive("rust_tours=debug".parse()?)
                    .add_directive("reqwest=trace".parse()?)
                    .add_directive("hyper=trace".parse()?)
                    .add_directive("h2=trace".parse()?),
            )
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json(),
            )
            .init();

        info!("Logging initialized - logs will be written to logs/rust-tours-mcp.log.*");
        debug!("Debug logging is enabled and working");
        Ok(())
    }
}

/// Code-based tour search parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct SearchToursParams {
    #[schemars(description = "Departure city code (resolve names with find_city)")]
    pub departure: i64,
    #[schemars(description = "Destination country code (resolve names with find_country)")]
    pub country: i64,
    #[schemars(description = "Earliest departure date, DD.MM.YYYY or YYYY-MM-DD")]
    pub datefrom: Option<String>,
    #[schemars(description = "Latest departure date, DD.MM.YYYY or YYYY-MM-DD")]
    pub dateto: Option<String>,
    #[schemars(description = "Minimum number of nights (default: 7)")]
    pub nightsfrom: Option<i64>,
    #[schemars(description = "Maximum number of nights (default: 10)")]
    pub nightsto: Option<i64>,
    #[schemars(description = "Number of adults (default: 2)")]
    pub adults: Option<i64>,
    #[schemars(description = "Number of children (default: 0)")]
    pub child: Option<i64>,
    #[schemars(description = "Age of the first child")]
    pub childage1: Option<i64>,
    #[schemars(description = "Age of the second child")]
    pub childage2: Option<i64>,
    #[schemars(description = "Age of the third child")]
    pub childage3: Option<i64>,
    #[schemars(description = "Minimum hotel star rating")]
    pub stars: Option<i64>,
    #[schemars(description = "Meal type code (see get_references with ref_type=meal)")]
    pub meal: Option<i64>,
    #[schemars(description = "Minimum hotel guest rating")]
    pub rating: Option<i64>,
    #[schemars(description = "Resort region codes, comma-separated")]
    pub regions: Option<String>,
    #[schemars(description = "Minimum tour price")]
    pub pricefrom: Option<i64>,
    #[schemars(description = "Maximum tour price")]
    pub priceto: Option<i64>,
}

/// Name-based smart search parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct SmartSearchParams {
    #[schemars(description = "Departure city name, e.g. 'Москва' or 'Иркутск'")]
    pub city: String,
    #[schemars(description = "Destination country name, e.g. 'Египет' or 'Турция'")]
    pub country: String,
    #[schemars(description = "Earliest departure date, DD.MM.YYYY or YYYY-MM-DD")]
    pub datefrom: Option<String>,
    #[schemars(description = "Latest departure date, DD.MM.YYYY or YYYY-MM-DD")]
    pub dateto: Option<String>,
    #[schemars(description = "Minimum number of nights (default: 7)")]
    pub nightsfrom: Option<i64>,
    #[schemars(description = "Maximum number of nights (default: 10)")]
    pub nightsto: Option<i64>,
    #[schemars(description = "Number of adults (default: 2)")]
    pub adults: Option<i64>,
    #[schemars(description = "Number of children (default: 0)")]
    pub child: Option<i64>,
    #[schemars(description = "Age of the first child")]
    pub childage1: Option<i64>,
    #[schemars(description = "Age of the second child")]
    pub childage2: Option<i64>,
    #[schemars(description = "Age of the third child")]
    pub childage3: Option<i64>,
    #[schemars(description = "Minimum hotel star rating")]
    pub stars: Option<i64>,
    #[schemars(description = "Meal type code")]
    pub meal: Option<i64>,
    #[schemars(description = "Minimum hotel guest rating")]
    pub rating: Option<i64>,
    #[schemars(description = "Resort region codes, comma-separated")]
    pub regions: Option<String>,
    #[schemars(description = "Minimum tour price")]
    pub pricefrom: Option<i64>,
    #[schemars(description = "Maximum tour price")]
    pub priceto: Option<i64>,
    #[schemars(description = "Maximum number of flattened tours to return (unbounded if omitted)")]
    pub limit: Option<usize>,
}

/// Place name lookup parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct FindPlaceParams {
    #[schemars(description = "Free-text place name; partial names match by substring")]
    pub name: String,
}

/// Reference list parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct GetReferencesParams {
    #[schemars(
        description = "Reference list kind: departure, country, region, subregion, meal, stars, operator, flyregion, currency or hotel"
    )]
    pub ref_type: String,
    #[schemars(description = "Restrict region/hotel lists to this country code")]
    pub country_code: Option<i64>,
    #[schemars(description = "Restrict country lists to this departure city code")]
    pub departure_code: Option<i64>,
}

/// Tour price re-check parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct ActualizeTourParams {
    #[schemars(description = "Tour id from search results")]
    pub tourid: String,
    #[schemars(description = "Price currency: 0=RUB, 1=USD/EUR (default: 0)")]
    pub currency: Option<i64>,
}

/// Hotel card parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct GetHotelInfoParams {
    #[schemars(description = "Hotel code from search results")]
    pub hotelcode: i64,
    #[schemars(description = "Include guest reviews (default: false)")]
    pub reviews: Option<bool>,
    #[schemars(description = "Include full-size photos (default: true)")]
    pub imgbig: Option<bool>,
}

/// Hot tours parameters
#[derive(Debug, Deserialize, Clone, schemars::JsonSchema)]
pub struct GetHotToursParams {
    #[schemars(description = "Departure city code")]
    pub city: i64,
    #[schemars(description = "Number of offers to return (default: 10)")]
    pub items: Option<i64>,
    #[schemars(description = "Second departure city code")]
    pub city2: Option<i64>,
    #[schemars(description = "Third departure city code")]
    pub city3: Option<i64>,
    #[schemars(description = "Only departures within this many days from today")]
    pub maxdays: Option<i64>,
    #[schemars(description = "Country codes, comma-separated")]
    pub countries: Option<String>,
    #[schemars(description = "Minimum hotel star rating")]
    pub stars: Option<i64>,
}

#[tool(tool_box)]
impl TourServer {
    /// Code-based tour search
    #[tool(
        description = "Search tour packages by provider codes. Requires a departure city code and a destination country code; resolve human names first with find_city/find_country, or use search_tours_smart. Returns the raw provider result tree."
    )]
    async fn search_tours(&self, #[tool(aggr)] params: SearchToursParams) -> String {
        info!(
            departure = params.departure,
            country = params.country,
            datefrom = params.datefrom.as_deref(),
            dateto = params.dateto.as_deref(),
            nightsfrom = params.nightsfrom.unwrap_or(7),
            nightsto = params.nightsto.unwrap_or(10),
            "Tour search request received"
        );

        match self.client.search_tours(&build_search_params(&params)).await {
            Ok(result) => {
                info!("Tour search completed");
                success_json(&result)
            }
            Err(e) => {
                error!("Tour search failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Name-based smart search
    #[tool(
        description = "Search tour packages by human-readable place names (e.g. city 'Москва', country 'Египет'). Resolves both names to provider codes, runs the search and returns resolved places, a summary, a price-sorted flat tour list and the raw tree."
    )]
    async fn search_tours_smart(&self, #[tool(aggr)] params: SmartSearchParams) -> String {
        info!(
            city = %params.city,
            country = %params.country,
            limit = params.limit,
            "Smart search request received"
        );

        let extra = build_smart_filters(&params);
        match self
            .client
            .search_tours_smart(&params.city, &params.country, &extra, params.limit)
            .await
        {
            Ok(result) => {
                info!(
                    city_code = result.city.id,
                    country_code = result.country.id,
                    tours = result.tours.len(),
                    "Smart search completed"
                );
                success_json(&result)
            }
            Err(e) => {
                error!("Smart search failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Departure city lookup
    #[tool(
        description = "Resolve a departure city name to its provider code. Exact matches win; otherwise the first substring match is returned with up to 4 alternatives."
    )]
    async fn find_city(&self, #[tool(aggr)] params: FindPlaceParams) -> String {
        match self.client.find_city(&params.name).await {
            Ok(lookup) => success_json(&lookup),
            Err(e) => {
                error!("City lookup failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Destination country lookup
    #[tool(
        description = "Resolve a destination country name to its provider code. Exact matches win; otherwise the first substring match is returned with up to 4 alternatives."
    )]
    async fn find_country(&self, #[tool(aggr)] params: FindPlaceParams) -> String {
        match self.client.find_country(&params.name).await {
            Ok(lookup) => success_json(&lookup),
            Err(e) => {
                error!("Country lookup failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Raw reference lists
    #[tool(
        description = "Fetch a provider reference list (departure cities, countries, regions, meal types, star levels, operators, currencies or hotels) for code lookups."
    )]
    async fn get_references(&self, #[tool(aggr)] params: GetReferencesParams) -> String {
        let mut filters = Params::new();
        if let Some(code) = params.country_code {
            filters.insert("regcountry".to_string(), Value::from(code));
            filters.insert("hotcountry".to_string(), Value::from(code));
        }
        if let Some(code) = params.departure_code {
            filters.insert("cndep".to_string(), Value::from(code));
        }

        match self.client.get_references(&params.ref_type, &filters).await {
            Ok(result) => success_json(&result),
            Err(e) => {
                error!("Reference fetch failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Price re-check
    #[tool(
        description = "Re-check the current price and availability of a specific tour by its id."
    )]
    async fn actualize_tour(&self, #[tool(aggr)] params: ActualizeTourParams) -> String {
        info!(tourid = %params.tourid, "Tour actualization request received");
        match self
            .client
            .actualize_tour(&params.tourid, params.currency.unwrap_or(0))
            .await
        {
            Ok(result) => success_json(&result),
            Err(e) => {
                error!("Tour actualization failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Detailed actualization
    #[tool(
        description = "Fetch detailed tour information by id: flight options, surcharges and the exact final price."
    )]
    async fn get_tour_details(&self, #[tool(aggr)] params: ActualizeTourParams) -> String {
        info!(tourid = %params.tourid, "Tour detail request received");
        match self
            .client
            .get_tour_details(&params.tourid, params.currency.unwrap_or(0))
            .await
        {
            Ok(result) => success_json(&result),
            Err(e) => {
                error!("Tour detail fetch failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Hotel card
    #[tool(
        description = "Fetch a hotel's description card by hotel code, optionally with guest reviews and full-size photos."
    )]
    async fn get_hotel_info(&self, #[tool(aggr)] params: GetHotelInfoParams) -> String {
        match self
            .client
            .get_hotel_info(
                params.hotelcode,
                params.reviews.unwrap_or(false),
                params.imgbig.unwrap_or(true),
            )
            .await
        {
            Ok(result) => success_json(&result),
            Err(e) => {
                error!("Hotel info fetch failed: {}", e);
                error_json(&e)
            }
        }
    }

    /// Hot tours feed
    #[tool(
        description = "Fetch current hot (last-minute) tour offers for a departure city, optionally filtered by countries and star rating."
    )]
    async fn get_hot_tours(&self, #[tool(aggr)] params: GetHotToursParams) -> String {
        info!(city = params.city, "Hot tours request received");
        match self.client.get_hot_tours(&build_hot_tours_params(&params)).await {
            Ok(result) => success_json(&result),
            Err(e) => {
                error!("Hot tours fetch failed: {}", e);
                error_json(&e)
            }
        }
    }
}

// Helper functions for parameter conversion

fn build_search_params(p: &SearchToursParams) -> Params {
    let mut params = Params::new();
    params.insert("departure".to_string(), Value::from(p.departure));
    params.insert("country".to_string(), Value::from(p.country));
    params.insert("nightsfrom".to_string(), Value::from(p.nightsfrom.unwrap_or(7)));
    params.insert("nightsto".to_string(), Value::from(p.nightsto.unwrap_or(10)));
    params.insert("adults".to_string(), Value::from(p.adults.unwrap_or(2)));
    params.insert("child".to_string(), Value::from(p.child.unwrap_or(0)));

    if let Some(date) = &p.datefrom {
        params.insert("datefrom".to_string(), Value::from(provider_date(date)));
    }
    if let Some(date) = &p.dateto {
        params.insert("dateto".to_string(), Value::from(provider_date(date)));
    }

    insert_some_i64(&mut params, "childage1", p.childage1);
    insert_some_i64(&mut params, "childage2", p.childage2);
    insert_some_i64(&mut params, "childage3", p.childage3);
    insert_some_i64(&mut params, "stars", p.stars);
    insert_some_i64(&mut params, "meal", p.meal);
    insert_some_i64(&mut params, "rating", p.rating);
    insert_some_str(&mut params, "regions", &p.regions);
    insert_some_i64(&mut params, "pricefrom", p.pricefrom);
    insert_some_i64(&mut params, "priceto", p.priceto);
    params
}

fn build_smart_filters(p: &SmartSearchParams) -> Params {
    let mut params = Params::new();
    params.insert("nightsfrom".to_string(), Value::from(p.nightsfrom.unwrap_or(7)));
    params.insert("nightsto".to_string(), Value::from(p.nightsto.unwrap_or(10)));
    params.insert("adults".to_string(), Value::from(p.adults.unwrap_or(2)));
    params.insert("child".to_string(), Value::from(p.child.unwrap_or(0)));

    if let Some(date) = &p.datefrom {
        params.insert("datefrom".to_string(), Value::from(provider_date(date)));
    }
    if let Some(date) = &p.dateto {
        params.insert("dateto".to_string(), Value::from(provider_date(date)));
    }

    insert_some_i64(&mut params, "childage1", p.childage1);
    insert_some_i64(&mut params, "childage2", p.childage2);
    insert_some_i64(&mut params, "childage3", p.childage3);
    insert_some_i64(&mut params, "stars", p.stars);
    insert_some_i64(&mut params, "meal", p.meal);
    insert_some_i64(&mut params, "rating", p.rating);
    insert_some_str(&mut params, "regions", &p.regions);
    insert_some_i64(&mut params, "pricefrom", p.pricefrom);
    insert_some_i64(&mut params, "priceto", p.priceto);
    params
}

fn build_hot_tours_params(p: &GetHotToursParams) -> Params {
    let mut params = Params::new();
    params.insert("city".to_string(), Value::from(p.city));
    params.insert("items".to_string(), Value::from(p.items.unwrap_or(10)));
    insert_some_i64(&mut params, "city2", p.city2);
    insert_some_i64(&mut params, "city3", p.city3);
    insert_some_i64(&mut params, "maxdays", p.maxdays);
    insert_some_str(&mut params, "countries", &p.countries);
    insert_some_i64(&mut params, "stars", p.stars);
    params
}

fn insert_some_i64(params: &mut Params, key: &str, value: Option<i64>) {
    if let Some(v) = value {
        params.insert(key.to_string(), Value::from(v));
    }
}

fn insert_some_str(params: &mut Params, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        params.insert(key.to_string(), Value::from(v.as_str()));
    }
}

fn success_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "internal", "message": "Failed to serialize result: {}"}}"#, e))
}

fn error_json(err: &TourError) -> String {
    serde_json::to_string(&err.envelope()).unwrap_or_else(|_| {
        r#"{"error": "internal", "message": "Failed to serialize error"}"#.to_string()
    })
}

#[tool(tool_box)]
impl ServerHandler for TourServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some("A travel package search server backed by the TourVisor API. Resolves city and country names to provider codes, orchestrates asynchronous tour searches, and returns price-sorted flat tour lists alongside hotel cards, hot-tour offers and raw reference lists.".into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging before anything else
    if let Err(e) = TourServer::init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        // Keep serving; the stdio transport works without the log file
    }

    info!("Starting MCP tour server");

    let config = TourConfig::from_env()?;
    let client = TourClient::new(&config)?;
    let server = TourServer::new(client);
    let transport = stdio();

    info!("MCP server initialized, starting service");

    // SDK handles initialization, tool discovery, and message routing
    let service = server.serve(transport).await?;

    info!("MCP service started, waiting for requests");

    // Wait for shutdown
    service.waiting().await?;

    info!("MCP service shutting down");
    Ok(())
}
