//! Name-based smart search example

use rust_tours::{search_tours_smart, Params, TourConfig};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TourConfig::from_env()?;

    let mut filters = Params::new();
    filters.insert("nightsfrom".to_string(), Value::from(7));
    filters.insert("nightsto".to_string(), Value::from(10));
    filters.insert("adults".to_string(), Value::from(2));

    println!("Searching tours from Иркутск to Египет...");

    match search_tours_smart(&config, "Иркутск", "Египет", &filters, Some(3)).await {
        Ok(result) => {
            println!("✅ Search completed!");
            println!(
                "Resolved: {} ({}) -> {} ({})",
                result.city.name, result.city.id, result.country.name, result.country.id
            );
            println!(
                "State: {}, returning {} of {} tours",
                result.status.state.as_deref().unwrap_or("unknown"),
                result.status.tours_returned,
                result.status.tours_found.unwrap_or(0)
            );

            for (i, tour) in result.tours.iter().enumerate() {
                println!("\n--- Tour {} ---", i + 1);
                println!("Hotel: {}", tour.hotel_name.as_deref().unwrap_or("unknown"));
                println!("Region: {}", tour.region_name.as_deref().unwrap_or("unknown"));
                println!(
                    "Price: {} {}",
                    tour.price.unwrap_or(0.0),
                    tour.currency.as_deref().unwrap_or("")
                );
            }
        }
        Err(e) => {
            eprintln!("❌ Error searching tours: {}", e);
            eprintln!("This is expected without valid TOURVISOR_LOGIN/TOURVISOR_PASSWORD credentials.");
        }
    }

    Ok(())
}
