//! Flattening of nested hotel/tour search results
//!
//! The provider groups tours under hotels. Consumers of this crate want a
//! flat "top N cheapest tours" list, so every tour is denormalized into a
//! self-contained record carrying a copy of its hotel's attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_items;

/// One tour, denormalized with its hotel's attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TourRecord {
    // Hotel attributes
    pub hotel_code: Option<i64>,
    pub hotel_name: Option<String>,
    pub hotel_stars: Option<i64>,
    pub hotel_rating: Option<f64>,
    pub country_name: Option<String>,
    pub region_name: Option<String>,
    pub hotel_description: Option<String>,
    pub picture_link: Option<String>,
    pub full_description_link: Option<String>,
    pub review_link: Option<String>,
    // Tour attributes
    pub tour_id: Option<String>,
    pub operator_name: Option<String>,
    pub fly_date: Option<String>,
    pub nights: Option<i64>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub adults: Option<i64>,
    pub child: Option<i64>,
    pub meal: Option<String>,
    pub room: Option<String>,
    pub placement: Option<String>,
    pub on_request: Option<bool>,
    pub promo: Option<bool>,
    pub regular: Option<bool>,
    pub night_flight: Option<bool>,
}

/// Summary counters pulled from a search result's status block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSummary {
    pub state: Option<String>,
    pub hotels_found: Option<i64>,
    pub tours_found: Option<i64>,
    pub tours_returned: usize,
    pub min_price: Option<f64>,
}

/// Flatten a raw search result into one record per tour, cheapest first.
///
/// A raw tree carrying a provider error flag yields an empty list; callers
/// check the error status on the raw tree separately, so an empty list here
/// never has to mean two different things.
pub fn flatten_tours(raw: &Value, limit: Option<usize>) -> Vec<TourRecord> {
    if raw.get("error").is_some() {
        return Vec::new();
    }

    let hotels_node = raw
        .pointer("/data/result/hotel")
        .or_else(|| raw.pointer("/result/hotel"));
    let hotels = match hotels_node {
        Some(node) => json_items(node),
        None => return Vec::new(),
    };

    let mut records = Vec::new();
    for hotel in hotels {
        let base = hotel_record(hotel);
        for tour in hotel_tours(hotel) {
            records.push(tour_record(&base, tour));
        }
    }

    // Missing prices sink to the end; the sort is stable, so provider order
    // survives among equal prices.
    records.sort_by(|a, b| {
        let pa = a.price.unwrap_or(f64::INFINITY);
        let pb = b.price.unwrap_or(f64::INFINITY);
        pa.total_cmp(&pb)
    });

    if let Some(limit) = limit {
        records.truncate(limit);
    }
    records
}

/// Pull the summary counters out of a raw result tree.
pub fn search_summary(raw: &Value, tours_returned: usize) -> SearchSummary {
    let status = raw
        .pointer("/data/status")
        .or_else(|| raw.get("status"))
        .cloned()
        .unwrap_or(Value::Null);

    SearchSummary {
        state: str_field(&status, "state"),
        hotels_found: int_field(&status, "hotelsfound"),
        tours_found: int_field(&status, "toursfound"),
        tours_returned,
        min_price: num_field(&status, "minprice"),
    }
}

fn hotel_record(hotel: &Value) -> TourRecord {
    TourRecord {
        hotel_code: int_field(hotel, "hotelcode"),
        hotel_name: str_field(hotel, "hotelname"),
        hotel_stars: int_field(hotel, "hotelstars"),
        hotel_rating: num_field(hotel, "hotelrating"),
        country_name: str_field(hotel, "countryname"),
        region_name: str_field(hotel, "regionname"),
        hotel_description: str_field(hotel, "hoteldescription"),
        picture_link: str_field(hotel, "picturelink"),
        full_description_link: str_field(hotel, "fulldesclink"),
        review_link: str_field(hotel, "reviewlink"),
        ..Default::default()
    }
}

fn hotel_tours(hotel: &Value) -> Vec<&Value> {
    let node = match hotel.get("tours") {
        Some(node) => node,
        None => return Vec::new(),
    };
    // Tours usually sit one level down under a "tour" wrapper key
    let node = node.get("tour").unwrap_or(node);
    json_items(node)
}

fn tour_record(base: &TourRecord, tour: &Value) -> TourRecord {
    let mut record = base.clone();
    record.tour_id = str_field(tour, "tourid");
    record.operator_name = str_field(tour, "operatorname");
    record.fly_date = str_field(tour, "flydate");
    record.nights = int_field(tour, "nights");
    record.price = num_field(tour, "price");
    record.currency = str_field(tour, "currency");
    record.adults = int_field(tour, "adults");
    record.child = int_field(tour, "child");
    record.meal = str_field(tour, "meal");
    record.room = str_field(tour, "room");
    record.placement = str_field(tour, "placement");
    record.on_request = flag_field(tour, "onrequest");
    record.promo = flag_field(tour, "promo");
    record.regular = flag_field(tour, "regular");
    record.night_flight = flag_field(tour, "nightflight");
    record
}

// The provider is inconsistent about scalar types (numbers arrive as both
// 85000 and "85000"), so every field read tolerates both spellings.

pub(crate) fn str_field(node: &Value, key: &str) -> Option<String> {
    match node.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn int_field(node: &Value, key: &str) -> Option<i64> {
    match node.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

pub(crate) fn num_field(node: &Value, key: &str) -> Option<f64> {
    match node.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub(crate) fn flag_field(node: &Value, key: &str) -> Option<bool> {
    match node.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
