use crate::comps::{ComparablesService, RefreshRequest};
use crate::config::Config;
use crate::db::connection::{init_db, Database};
use crate::db::SqlitePersistence;
use crate::domain::lead::NewLead;
use crate::domain::rental::RentalEstimator;
use crate::gateway::HttpComparableSource;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod comps;
mod config;
mod db;
mod domain;
mod errors;
mod gateway;

#[cfg(test)]
mod tests;

#[derive(Parser)]
#[command(name = "lead_comps", about = "Comparable sales and rental signals for property leads")]
struct Cli {
    /// Read settings from this file instead of `./.env`
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema
    Init,
    /// Register a lead to evaluate
    AddLead {
        #[arg(long)]
        postcode: String,
        #[arg(long)]
        price: i64,
        #[arg(long)]
        bedrooms: Option<u32>,
        #[arg(long = "type")]
        property_type: Option<String>,
    },
    /// Refresh a lead's comparables, using the cache while it is fresh
    Refresh {
        lead_id: i64,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long)]
        max_results: Option<u32>,
        #[arg(long)]
        max_age_months: Option<u32>,
    },
    /// Show stored comparables without calling the source
    Show { lead_id: i64 },
    /// Estimate and store rent for a lead
    LeadRental { lead_id: i64 },
    /// Heuristic rental estimate for ad-hoc inputs
    EstimateRent {
        #[arg(long)]
        price: i64,
        #[arg(long = "type")]
        property_type: Option<String>,
        #[arg(long)]
        bedrooms: Option<u32>,
        #[arg(long)]
        postcode: Option<String>,
    },
    /// Estimate floor area in square feet
    FloorArea {
        #[arg(long = "type")]
        property_type: Option<String>,
        #[arg(long)]
        bedrooms: Option<u32>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.env_file {
        Some(path) => Config::from_env_file(path),
        None => Config::from_env(),
    }
    .context("Failed to load configuration")?;

    match cli.command {
        Command::EstimateRent {
            price,
            property_type,
            bedrooms,
            postcode,
        } => {
            if price <= 0 {
                anyhow::bail!("--price must be positive");
            }
            let estimate = RentalEstimator::default().estimate_rental(&domain::rental::RentalInputs {
                asking_price: price,
                property_type: property_type.as_deref(),
                bedrooms,
                postcode: postcode.as_deref(),
            });
            print_json(&estimate)
        }
        Command::FloorArea {
            property_type,
            bedrooms,
        } => print_json(&RentalEstimator::default().estimate_floor_area(property_type.as_deref(), bedrooms)),
        command => run_with_db(&config, command),
    }
}

fn run_with_db(config: &Config, command: Command) -> Result<()> {
    let db = Database::new(config.db_path.clone());
    init_db(&db).with_context(|| format!("Database initialization failed for {}", config.db_path))?;
    let store = SqlitePersistence::new(db);
    let service = || -> Result<_> {
        let source = HttpComparableSource::from_config(config)?;
        Ok(ComparablesService::new(source, store.clone(), config))
    };

    match command {
        Command::Init => Ok(()),
        Command::AddLead {
            postcode,
            price,
            bedrooms,
            property_type,
        } => {
            let lead = NewLead {
                postcode,
                bedrooms,
                property_type,
                asking_price: price,
            };
            let id = store.insert_lead(&lead, chrono::Utc::now().timestamp())?;
            print_json(&serde_json::json!({ "lead_id": id }))
        }
        Command::Refresh {
            lead_id,
            force,
            radius,
            max_results,
            max_age_months,
        } => {
            let result = service()?.refresh_comparables(
                lead_id,
                &RefreshRequest {
                    force_refresh: force,
                    radius_miles: radius,
                    max_results,
                    max_age_months,
                },
            )?;
            print_json(&result)
        }
        Command::Show { lead_id } => print_json(&service()?.get_comparables(lead_id)?),
        Command::LeadRental { lead_id } => print_json(&service()?.estimate_lead_rental(lead_id)?),
        Command::EstimateRent { .. } | Command::FloorArea { .. } => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
