//! Basic code-based tour search example

use rust_tours::results::{flatten_tours, search_summary};
use rust_tours::{search_tours, Params, TourConfig};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TourConfig::from_env()?;

    // Moscow (1) to Egypt (4); resolve other codes with the find-city tools
    let mut params = Params::new();
    params.insert("departure".to_string(), Value::from(1));
    params.insert("country".to_string(), Value::from(4));
    params.insert("nightsfrom".to_string(), Value::from(7));
    params.insert("nightsto".to_string(), Value::from(10));
    params.insert("adults".to_string(), Value::from(2));

    println!("Searching tours from Москва to Египет...");

    match search_tours(&config, &params).await {
        Ok(raw) => {
            let tours = flatten_tours(&raw, Some(5));
            let summary = search_summary(&raw, tours.len());

            println!("✅ Search completed!");
            println!(
                "State: {}, hotels found: {}, tours found: {}",
                summary.state.as_deref().unwrap_or("unknown"),
                summary.hotels_found.unwrap_or(0),
                summary.tours_found.unwrap_or(0)
            );

            for (i, tour) in tours.iter().enumerate() {
                println!("\n--- Tour {} ---", i + 1);
                println!("Hotel: {}", tour.hotel_name.as_deref().unwrap_or("unknown"));
                println!("Stars: {}", tour.hotel_stars.unwrap_or(0));
                println!("Nights: {}", tour.nights.unwrap_or(0));
                println!(
                    "Price: {} {}",
                    tour.price.unwrap_or(0.0),
                    tour.currency.as_deref().unwrap_or("")
                );
                if let Some(date) = &tour.fly_date {
                    println!("Departure: {}", date);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Error searching tours: {}", e);
            eprintln!("This is expected without valid TOURVISOR_LOGIN/TOURVISOR_PASSWORD credentials.");
        }
    }

    Ok(())
}
