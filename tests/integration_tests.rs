//! Integration tests for rust-tours
//!
//! These tests drive the full search pipeline against a mocked provider:
//! the submit/poll/fetch protocol, transport and upstream error
//! normalization, reference resolution and the smart-search envelope.

use rust_tours::{results, Params, PollTiming, TourClient, TourConfig, TourError};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> TourConfig {
    TourConfig::new("demo", "secret")
        .with_base_url(base_url)
        .with_request_timeout(Duration::from_millis(500))
}

/// Poll pacing shrunk to milliseconds so the 10-attempt loop runs instantly.
fn fast_timing() -> PollTiming {
    PollTiming {
        first_delay: Duration::from_millis(5),
        poll_delay: Duration::from_millis(2),
        max_attempts: 10,
        elapsed_cutoff: 7,
    }
}

fn test_client(server: &MockServer) -> TourClient {
    TourClient::new(&test_config(&server.uri()))
        .unwrap()
        .with_poll_timing(fast_timing())
}

fn params(value: Value) -> Params {
    value.as_object().unwrap().clone()
}

fn departures_list() -> Value {
    json!({
        "lists": {
            "departures": {
                "departure": [
                    {"id": "1", "name": "Москва", "namefrom": "Москвы"},
                    {"id": "9", "name": "Иркутск", "namefrom": "Иркутска"},
                    {"id": "24", "name": "Новосибирск", "namefrom": "Новосибирска"}
                ]
            }
        }
    })
}

fn countries_list() -> Value {
    json!({
        "lists": {
            "countries": {
                "country": [
                    {"id": "4", "name": "Египет"},
                    {"id": "9", "name": "Турция"}
                ]
            }
        }
    })
}

fn result_tree() -> Value {
    json!({
        "data": {
            "status": {
                "state": "finished",
                "hotelsfound": 2,
                "toursfound": 3,
                "minprice": "52400"
            },
            "result": {
                "hotel": [
                    {
                        "hotelcode": "101",
                        "hotelname": "Coral Beach",
                        "hotelstars": "4",
                        "hotelrating": "4.3",
                        "countryname": "Египет",
                        "regionname": "Хургада",
                        "tours": {
                            "tour": [
                                {
                                    "tourid": "888001",
                                    "operatorname": "Pegas",
                                    "flydate": "05.09.2026",
                                    "nights": 7,
                                    "price": "61200",
                                    "currency": "RUB"
                                },
                                {
                                    "tourid": "888002",
                                    "operatorname": "Anex",
                                    "flydate": "06.09.2026",
                                    "nights": 10,
                                    "price": 52400,
                                    "currency": "RUB"
                                }
                            ]
                        }
                    },
                    {
                        "hotelcode": 202,
                        "hotelname": "Sunrise Garden",
                        "hotelstars": 5,
                        "countryname": "Египет",
                        "regionname": "Хургада",
                        "tours": {
                            "tour": {
                                "tourid": "888003",
                                "operatorname": "Coral",
                                "flydate": "07.09.2026",
                                "nights": 7,
                                "price": 58900,
                                "currency": "RUB"
                            }
                        }
                    }
                ]
            }
        }
    })
}

async fn mount_reference_lists(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/list.php"))
        .and(query_param("type", "departure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(departures_list()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list.php"))
        .and(query_param("type", "country"))
        .respond_with(ResponseTemplate::new(200).set_body_json(countries_list()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_search_tours_full_protocol() {
    let server = MockServer::start().await;

    // Submission must carry credentials, the JSON format flag and the
    // coerced search parameters.
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .and(query_param("authlogin", "demo"))
        .and(query_param("authpass", "secret"))
        .and(query_param("format", "json"))
        .and(query_param("departure", "24"))
        .and(query_param("country", "4"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"requestid": "36954"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("requestid", "36954"))
        .and(query_param("type", "status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "finished", "timepassed": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("requestid", "36954"))
        .and(query_param("type", "result"))
        .and(query_param("page", "1"))
        .and(query_param("onpage", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(result_tree()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let raw = client
        .search_tours(&params(json!({"departure": "24", "country": 4})))
        .await
        .unwrap();

    let tours = results::flatten_tours(&raw, None);
    assert_eq!(tours.len(), 3);
    assert_eq!(tours[0].price, Some(52400.0));
    assert_eq!(tours[1].price, Some(58900.0));
    assert_eq!(tours[2].price, Some(61200.0));

    let summary = results::search_summary(&raw, tours.len());
    assert_eq!(summary.state.as_deref(), Some("finished"));
    assert_eq!(summary.hotels_found, Some(2));
    assert_eq!(summary.min_price, Some(52400.0));
}

#[tokio::test]
async fn test_polling_exhausts_attempts_then_fetches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"requestid": "777"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Never finished, elapsed stays under the cutoff: all 10 attempts run.
    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("type", "status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "searching", "timepassed": 3}
        })))
        .expect(10)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("type", "result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(result_tree()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let raw = client
        .search_tours(&params(json!({"departure": 1, "country": 4})))
        .await
        .unwrap();

    // Exhaustion is not an error; whatever the provider has is returned
    assert!(raw.pointer("/data/result/hotel").is_some());
}

#[tokio::test]
async fn test_polling_stops_once_elapsed_passes_cutoff() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"requestid": "778"}})),
        )
        .mount(&server)
        .await;

    // Not finished, but the provider-side clock is past the cutoff
    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("type", "status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "searching", "timepassed": 8}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("type", "result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(result_tree()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let raw = client
        .search_tours(&params(json!({"departure": 1, "country": 4})))
        .await;
    assert!(raw.is_ok());
}

#[tokio::test]
async fn test_submission_error_propagates_without_polling() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "Неверный логин"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .search_tours(&params(json!({"departure": 1, "country": 4})))
        .await
        .unwrap_err();

    match err {
        TourError::Upstream { message, detail } => {
            assert_eq!(message, "Неверный логин");
            assert_eq!(detail.unwrap()["error"], json!("Неверный логин"));
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_request_id_echoes_sent_params() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .search_tours(&params(json!({"departure": "24", "country": "4"})))
        .await
        .unwrap_err();

    match err {
        TourError::NoRequestId {
            response,
            sent_params,
        } => {
            assert_eq!(response, json!({"result": {}}));
            // The echoed parameters are the coerced ones that went out
            assert_eq!(sent_params["departure"], json!(24));
            assert_eq!(sent_params["country"], json!(4));
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_required_field_fails_before_any_call() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .search_tours(&params(json!({"departure": 1})))
        .await
        .unwrap_err();

    match err {
        TourError::MissingField(field) => assert_eq!(field, "country"),
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_with_structured_body_passes_through() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hottours.php"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "временно недоступно"})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .get_hot_tours(&params(json!({"city": 1})))
        .await
        .unwrap_err();

    match err {
        TourError::Upstream { message, .. } => assert_eq!(message, "временно недоступно"),
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_http_error_with_plain_body_carries_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hottours.php"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .get_hot_tours(&params(json!({"city": 1})))
        .await
        .unwrap_err();

    match err {
        TourError::HttpStatus {
            status,
            body_excerpt,
        } => {
            assert_eq!(status, 502);
            assert!(body_excerpt.contains("Bad Gateway"));
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_body_yields_bounded_excerpt() {
    let server = MockServer::start().await;

    let page = format!("<html><body>{}</body></html>", "страница ошибки ".repeat(200));
    Mock::given(method("GET"))
        .and(path("/list.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .get_references("departure", &Params::new())
        .await
        .unwrap_err();

    match err {
        TourError::MalformedResponse { excerpt } => {
            assert!(excerpt.starts_with("<html>"));
            assert_eq!(excerpt.chars().count(), 500);
        }
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_provider_is_a_timeout() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/list.php"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(departures_list())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let config = test_config(&server.uri()).with_request_timeout(Duration::from_millis(50));
    let client = TourClient::new(&config).unwrap();
    let err = client
        .get_references("departure", &Params::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TourError::Timeout), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_provider_is_a_connection_error() {
    // Grab a free port, then close it again so nothing is listening
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = test_config(&format!("http://127.0.0.1:{}", port));
    let client = TourClient::new(&config).unwrap();
    let err = client
        .get_references("departure", &Params::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, TourError::Connection(_)),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_find_city_exact_match() {
    let server = MockServer::start().await;
    mount_reference_lists(&server).await;

    let client = test_client(&server);
    let lookup = client.find_city("Москва").await.unwrap();

    assert!(lookup.found);
    let entry = lookup.entry.unwrap();
    assert_eq!(entry.id, 1);
    assert_eq!(entry.name, "Москва");
    assert_eq!(entry.name_from.as_deref(), Some("Москвы"));
    assert!(lookup.alternatives.is_empty());
}

#[tokio::test]
async fn test_find_country_without_match_is_not_an_error() {
    let server = MockServer::start().await;
    mount_reference_lists(&server).await;

    let client = test_client(&server);
    let lookup = client.find_country("Атлантида").await.unwrap();

    assert!(!lookup.found);
    assert!(lookup.entry.is_none());
    assert!(!lookup.message.unwrap().is_empty());
}

#[tokio::test]
async fn test_reference_fetch_error_is_not_a_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/list.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "справочник недоступен"})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client.find_city("Москва").await.unwrap_err();

    match err {
        TourError::Upstream { message, .. } => assert_eq!(message, "справочник недоступен"),
        other => panic!("Unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_smart_search_happy_path() {
    let server = MockServer::start().await;
    mount_reference_lists(&server).await;

    // The resolved codes must be the ones on the wire, not the caller's
    // colliding extras.
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .and(query_param("departure", "9"))
        .and(query_param("country", "4"))
        .and(query_param("adults", "2"))
        .and(query_param("priceto", "200000"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"result": {"requestid": "555"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("type", "status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {"state": "finished", "timepassed": 5}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/result.php"))
        .and(query_param("type", "result"))
        .respond_with(ResponseTemplate::new(200).set_body_json(result_tree()))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let extra = params(json!({"departure": 999, "adults": "2", "priceto": "200000"}));
    let result = client
        .search_tours_smart("Иркутск", "Египет", &extra, Some(2))
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.city.id, 9);
    assert_eq!(result.city.name, "Иркутск");
    assert_eq!(result.country.id, 4);
    assert_eq!(result.search_params["departure"], json!(9));

    assert_eq!(result.tours.len(), 2);
    assert_eq!(result.tours[0].price, Some(52400.0));
    assert_eq!(result.tours[1].price, Some(58900.0));

    assert_eq!(result.status.state.as_deref(), Some("finished"));
    assert_eq!(result.status.tours_found, Some(3));
    assert_eq!(result.status.tours_returned, 2);

    assert!(result.raw_result.pointer("/data/result/hotel").is_some());
}

#[tokio::test]
async fn test_smart_search_unknown_city_never_searches() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/list.php"))
        .and(query_param("type", "departure"))
        .respond_with(ResponseTemplate::new(200).set_body_json(departures_list()))
        .expect(1)
        .mount(&server)
        .await;

    // Neither the country list nor the search endpoint may be touched
    Mock::given(method("GET"))
        .and(path("/list.php"))
        .and(query_param("type", "country"))
        .respond_with(ResponseTemplate::new(200).set_body_json(countries_list()))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .search_tours_smart("Питер", "Египет", &Params::new(), None)
        .await
        .unwrap_err();

    match &err {
        TourError::CityNotFound { query, lookup } => {
            assert_eq!(query, "Питер");
            assert!(!lookup.found);
        }
        other => panic!("Unexpected error: {:?}", other),
    }

    let envelope = err.envelope();
    assert_eq!(envelope.error, "city_not_found");
    assert_eq!(envelope.detail.unwrap()["found"], json!(false));
}

#[tokio::test]
async fn test_smart_search_wraps_orchestrator_failure() {
    let server = MockServer::start().await;
    mount_reference_lists(&server).await;

    Mock::given(method("GET"))
        .and(path("/search.php"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": "лимит запросов"})),
        )
        .mount(&server)
        .await;

    let client = test_client(&server);
    let err = client
        .search_tours_smart("Иркутск", "Египет", &Params::new(), None)
        .await
        .unwrap_err();

    match &err {
        TourError::SearchFailed {
            city,
            country,
            source,
        } => {
            assert_eq!(city, "Иркутск");
            assert_eq!(country, "Египет");
            assert!(matches!(**source, TourError::Upstream { .. }));
        }
        other => panic!("Unexpected error: {:?}", other),
    }

    let envelope = err.envelope();
    assert_eq!(envelope.error, "search_failed");
    let detail = envelope.detail.unwrap();
    assert_eq!(detail["city"], json!("Иркутск"));
    assert_eq!(detail["error"]["error"], json!("upstream_error"));
}

#[tokio::test]
async fn test_actualize_tour_passthrough() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/actualize.php"))
        .and(query_param("tourid", "888001"))
        .and(query_param("currency", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tour": {"tourid": "888001", "price": 61500}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let raw = client.actualize_tour("888001", 0).await.unwrap();

    assert_eq!(raw["tour"]["price"], json!(61500));
}

#[tokio::test]
async fn test_hotel_info_sends_flags_as_ints() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/hotel.php"))
        .and(query_param("hotelcode", "101"))
        .and(query_param("reviews", "1"))
        .and(query_param("imgbig", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"hotel": {"name": "Coral Beach"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let raw = client.get_hotel_info(101, true, false).await.unwrap();

    assert_eq!(raw["data"]["hotel"]["name"], json!("Coral Beach"));
}

/// Live smoke test against the real provider; needs credentials, so it is
/// ignored by default. Run with `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn test_live_find_city() {
    let config = match TourConfig::from_env() {
        Ok(config) => config,
        Err(_) => {
            eprintln!("Skipping live test - TOURVISOR_LOGIN/TOURVISOR_PASSWORD not set");
            return;
        }
    };

    let client = TourClient::new(&config).unwrap();
    match client.find_city("Москва").await {
        Ok(lookup) => {
            println!("✅ Москва resolved to {:?}", lookup.entry);
            assert!(lookup.found);
        }
        Err(e) => {
            eprintln!("Live lookup failed (acceptable offline): {}", e);
        }
    }
}
