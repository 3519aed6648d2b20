//! CLI interface for rust-tours

use clap::{Parser, Subcommand};
use rust_tours::{canonical_params, provider_date, Params, TourClient, TourConfig};
use serde_json::Value;
use std::fs;

#[derive(Parser)]
#[command(name = "rust-tours")]
#[command(about = "Tour package search against the TourVisor API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search tours by provider codes
    Search {
        /// Departure city code
        #[arg(short, long)]
        departure: i64,
        /// Destination country code
        #[arg(short, long)]
        country: i64,
        /// Earliest departure date (DD.MM.YYYY or YYYY-MM-DD)
        #[arg(long)]
        date_from: Option<String>,
        /// Latest departure date (DD.MM.YYYY or YYYY-MM-DD)
        #[arg(long)]
        date_to: Option<String>,
        /// Minimum nights
        #[arg(long, default_value = "7")]
        nights_from: i64,
        /// Maximum nights
        #[arg(long, default_value = "10")]
        nights_to: i64,
        /// Number of adults
        #[arg(long, default_value = "2")]
        adults: i64,
        /// Number of children
        #[arg(long, default_value = "0")]
        children: i64,
        /// Extra provider parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Search tours by city and country names
    Smart {
        /// Departure city name
        #[arg(long)]
        city: String,
        /// Destination country name
        #[arg(long)]
        country: String,
        /// Maximum number of tours to return
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Extra provider parameters as a JSON object
        #[arg(long)]
        params: Option<String>,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Resolve a departure city name to its provider code
    FindCity {
        /// City name (partial names match by substring)
        name: String,
    },
    /// Resolve a country name to its provider code
    FindCountry {
        /// Country name (partial names match by substring)
        name: String,
    },
    /// Fetch current hot tour offers
    Hot {
        /// Departure city code
        #[arg(short, long)]
        city: i64,
        /// Number of offers
        #[arg(long, default_value = "10")]
        items: i64,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = TourConfig::from_env()?;
    let client = TourClient::new(&config)?;

    match cli.command {
        Commands::Search {
            departure,
            country,
            date_from,
            date_to,
            nights_from,
            nights_to,
            adults,
            children,
            params,
            output,
        } => {
            // Explicit flags win over anything in --params
            let mut search_params = extra_params(&params)?;
            search_params.insert("departure".to_string(), Value::from(departure));
            search_params.insert("country".to_string(), Value::from(country));
            search_params.insert("nightsfrom".to_string(), Value::from(nights_from));
            search_params.insert("nightsto".to_string(), Value::from(nights_to));
            search_params.insert("adults".to_string(), Value::from(adults));
            search_params.insert("child".to_string(), Value::from(children));
            if let Some(date) = &date_from {
                search_params.insert("datefrom".to_string(), Value::from(provider_date(date)));
            }
            if let Some(date) = &date_to {
                search_params.insert("dateto".to_string(), Value::from(provider_date(date)));
            }

            println!("Searching tours...");
            match client.search_tours(&search_params).await {
                Ok(raw) => {
                    emit(&serde_json::to_string_pretty(&raw)?, &output)?;

                    let tours = rust_tours::results::flatten_tours(&raw, None);
                    let summary = rust_tours::results::search_summary(&raw, tours.len());
                    println!("\nSummary:");
                    println!(
                        "Search state: {}",
                        summary.state.as_deref().unwrap_or("unknown")
                    );
                    println!(
                        "Hotels found: {}, tours found: {}",
                        summary.hotels_found.unwrap_or(0),
                        summary.tours_found.unwrap_or(0)
                    );
                    if let Some(price) = summary.min_price {
                        println!("Minimum price: {}", price);
                    }
                }
                Err(e) => {
                    eprintln!("Error searching tours: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Smart {
            city,
            country,
            limit,
            params,
            output,
        } => {
            let extra = extra_params(&params)?;

            println!("Searching tours from {} to {}...", city, country);
            match client
                .search_tours_smart(&city, &country, &extra, Some(limit))
                .await
            {
                Ok(result) => {
                    emit(&serde_json::to_string_pretty(&result)?, &output)?;

                    println!("\nSummary:");
                    println!(
                        "Resolved: {} ({}) -> {} ({})",
                        result.city.name, result.city.id, result.country.name, result.country.id
                    );
                    println!(
                        "Search state: {}",
                        result.status.state.as_deref().unwrap_or("unknown")
                    );
                    println!("Returning {} tours", result.tours.len());
                    if let Some(best) = result.tours.first() {
                        println!(
                            "Cheapest: {} ({} nights) - {} {}",
                            best.hotel_name.as_deref().unwrap_or("unknown hotel"),
                            best.nights.unwrap_or(0),
                            best.price.unwrap_or(0.0),
                            best.currency.as_deref().unwrap_or("")
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Error searching tours: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::FindCity { name } => match client.find_city(&name).await {
            Ok(lookup) => println!("{}", serde_json::to_string_pretty(&lookup)?),
            Err(e) => {
                eprintln!("Error resolving city: {}", e);
                std::process::exit(1);
            }
        },
        Commands::FindCountry { name } => match client.find_country(&name).await {
            Ok(lookup) => println!("{}", serde_json::to_string_pretty(&lookup)?),
            Err(e) => {
                eprintln!("Error resolving country: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Hot {
            city,
            items,
            output,
        } => {
            let mut params = Params::new();
            params.insert("city".to_string(), Value::from(city));
            params.insert("items".to_string(), Value::from(items));

            match client.get_hot_tours(&params).await {
                Ok(raw) => emit(&serde_json::to_string_pretty(&raw)?, &output)?,
                Err(e) => {
                    eprintln!("Error fetching hot tours: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn extra_params(raw: &Option<String>) -> Result<Params, Box<dyn std::error::Error>> {
    match raw {
        Some(text) => {
            let value: Value = serde_json::from_str(text)?;
            Ok(canonical_params(&value))
        }
        None => Ok(Params::new()),
    }
}

fn emit(json: &str, output: &Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(output_file) = output {
        fs::write(output_file, json)?;
        println!("Results saved to {}", output_file);
    } else {
        println!("{}", json);
    }
    Ok(())
}
