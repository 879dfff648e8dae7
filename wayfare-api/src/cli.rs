use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use wayfare_core::{resolve_price, FilterCriteria, SortKey};
use wayfare_results::{EngineWorker, Phase, ResultCoordinator};
use wayfare_session::SessionManager;
use wayfare_shared::{CabinClass, Flight, TripType};
use wayfare_store::app_config::StreamConfig;
use wayfare_store::{LocalStores, RecentSearch};

use crate::bookings::{cache_entry, list_bookings};
use crate::client::ApiClient;
use crate::flights::{search_flights, FlightSearchQuery};
use crate::seats::{HttpSeatSource, SeatTracker, StreamState};

#[derive(Debug, Parser)]
#[command(name = "wayfare", about = "Flight search and booking client")]
pub struct Cli {
    /// Provider redirect URL carrying access_token/refresh_token
    #[arg(long, global = true)]
    pub redirect_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search flights and print the filtered, sorted list
    Search(SearchArgs),
    /// Follow live seat availability for one flight
    Seats {
        flight_id: String,
        /// Seat count to show until the first update arrives
        #[arg(long, default_value_t = 0)]
        initial: u32,
    },
    SignIn {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    SignOut,
    /// List bookings and refresh the local cache
    Bookings,
    /// Show recent searches
    Recent,
}

#[derive(Debug, clap::Args)]
pub struct SearchArgs {
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub to: String,
    #[arg(long)]
    pub date: String,
    #[arg(long)]
    pub return_date: Option<String>,
    #[arg(long, default_value = "economy")]
    pub cabin: CabinClass,
    #[arg(long, default_value = "price")]
    pub sort: SortKey,
    #[arg(long)]
    pub min_price: Option<f64>,
    #[arg(long)]
    pub max_price: Option<f64>,
    /// Minutes
    #[arg(long)]
    pub max_duration: Option<u32>,
    /// Round trips: outbound flight to list matching returns for
    #[arg(long, requires = "return_date")]
    pub outbound: Option<String>,
}

/// Services the commands run against, built once in `main`.
pub struct App {
    pub client: ApiClient,
    pub session: Arc<SessionManager>,
    pub stores: LocalStores,
    pub stream: StreamConfig,
}

pub async fn run(command: Command, app: &App) -> anyhow::Result<()> {
    match command {
        Command::Search(args) => search(args, app).await,
        Command::Seats { flight_id, initial } => seats(&flight_id, initial, app).await,
        Command::SignIn { email, password } => {
            let user = app.session.sign_in(&email, &password).await?;
            println!("Signed in as {}", user.display_name());
            Ok(())
        }
        Command::SignOut => {
            app.session.sign_out().await;
            println!("Signed out");
            Ok(())
        }
        Command::Bookings => bookings(app).await,
        Command::Recent => {
            let prefs = app.stores.search.load().await?;
            if prefs.recent_searches.is_empty() {
                println!("No recent searches");
            }
            for recent in prefs.recent_searches {
                println!("{} → {}  {}", recent.from, recent.to, recent.date);
            }
            Ok(())
        }
    }
}

async fn search(args: SearchArgs, app: &App) -> anyhow::Result<()> {
    let trip_type = if args.return_date.is_some() { TripType::RoundTrip } else { TripType::OneWay };
    let query = FlightSearchQuery {
        from: args.from.clone(),
        to: args.to.clone(),
        departure_date: args.date.clone(),
        return_date: args.return_date.clone(),
        cabin_class: args.cabin,
        trip_type,
    };
    let results = search_flights(&app.client, &query).await.context("Flight search failed")?;

    app.stores
        .search
        .add_recent_search(RecentSearch {
            from: query.from.to_ascii_uppercase(),
            to: query.to.to_ascii_uppercase(),
            date: query.departure_date.clone(),
        })
        .await?;

    let (worker, mut responses) = EngineWorker::spawn();
    let mut coordinator = ResultCoordinator::new(worker.requests());
    coordinator.new_search(results, trip_type).await?;
    coordinator.set_cabin_class(args.cabin).await?;
    coordinator.set_sort(args.sort).await?;
    coordinator
        .set_filters(FilterCriteria {
            min_price: args.min_price,
            max_price: args.max_price,
            max_duration: args.max_duration,
            cabin_class: Some(args.cabin),
            ..Default::default()
        })
        .await?;
    coordinator.settle(&mut responses).await?;

    if let Some(err) = coordinator.last_error() {
        anyhow::bail!("Could not process results: {}", err);
    }

    let heading = match coordinator.phase() {
        Phase::SelectingOutbound => "Outbound flights",
        _ => "Flights",
    };
    print_flights(heading, coordinator.visible(), args.cabin);

    if trip_type == TripType::RoundTrip {
        match &args.outbound {
            Some(outbound) => {
                coordinator.select(outbound).await?;
                coordinator.settle(&mut responses).await?;
                if let Some(err) = coordinator.last_error() {
                    anyhow::bail!("Could not process return flights: {}", err);
                }
                print_flights("Return flights", coordinator.visible(), args.cabin);
            }
            None => println!("Pass --outbound <ID> to list return flights for it"),
        }
    }

    drop(coordinator);
    worker.shutdown().await;
    Ok(())
}

fn print_flights(heading: &str, flights: &[Flight], cabin: CabinClass) {
    println!("{} ({})", heading, flights.len());
    for flight in flights {
        println!(
            "  {:<10} {:<12} {} → {}  {:>9.2}",
            flight.id,
            flight.route_label(),
            flight.departure_time,
            flight.arrival_time,
            resolve_price(flight, cabin)
        );
    }
}

async fn seats(flight_id: &str, initial: u32, app: &App) -> anyhow::Result<()> {
    let source = HttpSeatSource::new(&app.client)?;
    let mut tracker = SeatTracker::new(Arc::new(source), &app.stream);
    let mut feed = tracker.subscribe();
    tracker.track(flight_id);

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = feed.borrow_and_update().state;
                let seats = tracker.current_seats(initial);
                let marker = if tracker.is_selling_fast(initial) { "  (selling fast)" } else { "" };
                println!("{:?}: {} seats{}", state, seats, marker);
                if matches!(state, StreamState::Errored | StreamState::Closed) {
                    if let Some(err) = tracker.feed().last_error {
                        println!("Live updates paused: {}", err);
                    }
                    break;
                }
            }
            _ = &mut interrupt => {
                tracker.close();
                break;
            }
        }
    }
    Ok(())
}

async fn bookings(app: &App) -> anyhow::Result<()> {
    let records = list_bookings(&app.client).await.context("Could not load bookings")?;

    app.stores.bookings.clear().await?;
    // `add` prepends, so insert oldest first
    for entry in records.iter().rev().filter_map(cache_entry) {
        app.stores.bookings.add(entry).await?;
    }

    if records.is_empty() {
        println!("No bookings");
    }
    for record in &records {
        println!("  {}  {:<10} {:>9.2}  {}", record.id, record.status, record.total_amount, record.booking_date);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_command() {
        let cli = Cli::try_parse_from([
            "wayfare", "search", "--from", "JFK", "--to", "LHR", "--date", "2025-03-01",
            "--cabin", "premium-economy", "--sort", "duration", "--max-duration", "120",
        ])
        .unwrap();
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.cabin, CabinClass::PremiumEconomy);
                assert_eq!(args.sort, SortKey::Duration);
                assert_eq!(args.max_duration, Some(120));
                assert_eq!(args.return_date, None);
                assert_eq!(args.outbound, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_seats_and_auth_commands() {
        let cli = Cli::try_parse_from([
            "wayfare", "search", "--from", "JFK", "--to", "LHR", "--date", "2025-03-01",
            "--return-date", "2025-03-08", "--outbound", "F7",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Search(ref args) if args.outbound.as_deref() == Some("F7")));
        // An outbound pick only makes sense for a round trip
        assert!(Cli::try_parse_from([
            "wayfare", "search", "--from", "JFK", "--to", "LHR", "--date", "2025-03-01", "--outbound", "F7",
        ])
        .is_err());

        let cli = Cli::try_parse_from(["wayfare", "seats", "F1", "--initial", "42"]).unwrap();
        assert!(matches!(cli.command, Command::Seats { ref flight_id, initial: 42 } if flight_id == "F1"));

        let cli = Cli::try_parse_from(["wayfare", "sign-in", "--email", "a@b.c", "--password", "pw"]).unwrap();
        assert!(matches!(cli.command, Command::SignIn { .. }));

        assert!(Cli::try_parse_from(["wayfare", "search", "--from", "JFK"]).is_err());
        assert!(Cli::try_parse_from(["wayfare", "search", "--from", "A", "--to", "B", "--date", "d", "--cabin", "coach"]).is_err());
    }
}
