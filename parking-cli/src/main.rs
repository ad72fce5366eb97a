//! Parking CLI
//!
//! Command-line interface for the Parking API.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use parking_client::ParkingClient;
use parking_types::{
    ActivityId, ActivityQuery, CreateUserRequest, PageQuery, ParkingStatus, PlanId, SaleQuery,
    UpdateAccountRequest, UpdateActivityRequest,
};

#[derive(Parser)]
#[command(name = "parking")]
#[command(author, version, about = "Parking API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the Parking API
    #[arg(long, env = "PARKING_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Bearer token from `parking login`
    #[arg(long, env = "PARKING_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "PARKING_API_VERSION", default_value = "v1")]
    api_version: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        license_plate: Option<String>,
        #[arg(long)]
        region: Option<String>,
        /// Card token from the payment provider
        #[arg(long)]
        card_token: Option<String>,
    },
    /// Obtain a bearer token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Account operations
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },
    /// Plan operations
    Plan {
        #[command(subcommand)]
        action: PlanCommands,
    },
    /// Parking session operations
    Activity {
        #[command(subcommand)]
        action: ActivityCommands,
    },
    /// Sale operations
    Sale {
        #[command(subcommand)]
        action: SaleCommands,
    },
    /// Send client log events
    Log {
        events: Vec<String>,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Show the current account
    Show,
    /// Update name and region
    Update {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        region: Option<String>,
    },
    /// Change the password
    Password { password: String },
}

#[derive(Subcommand)]
enum PlanCommands {
    /// List eligible plans
    List,
    /// Subscribe to a plan
    Subscribe {
        /// Plan ID (UUID)
        id: String,
    },
}

#[derive(Subcommand)]
enum ActivityCommands {
    /// List your parking sessions
    List {
        #[arg(long, default_value = "0")]
        page: u32,
        #[arg(long, default_value = "20")]
        size: u32,
    },
    /// Start a parking session
    Start {
        #[arg(long)]
        lot: i64,
    },
    /// Exit a parking session
    Exit {
        /// Activity ID (UUID)
        id: String,
    },
    /// Update a session (admin)
    Update {
        id: String,
        /// PENDING_ENTRY, PARKED, PENDING_EXIT or EXITED
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        gate_response: Option<String>,
        #[arg(long)]
        exception_flag: Option<String>,
    },
    /// Search sessions (admin)
    Search {
        #[arg(long)]
        lot: Option<i64>,
        #[arg(long)]
        status: Option<String>,
        /// RFC 3339 timestamp
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
enum SaleCommands {
    /// List sales
    List {
        #[arg(long)]
        sale: bool,
        #[arg(long)]
        record: bool,
        #[arg(long)]
        in_flight: bool,
        /// RFC 3339 timestamp (admin, with --to)
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Record a sale against a plan
    Create {
        #[arg(long)]
        plan: String,
    },
}

fn parse_plan_id(s: &str) -> Result<PlanId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid plan ID: {}", s))
}

fn parse_activity_id(s: &str) -> Result<ActivityId> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid activity ID: {}", s))
}

fn parse_status(s: Option<String>) -> Result<Option<ParkingStatus>> {
    s.map(|s| s.to_uppercase().parse::<ParkingStatus>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("{}", e))
}

fn parse_time(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| anyhow::anyhow!("Invalid timestamp {}: {}", s, e))
    })
    .transpose()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = ParkingClient::new(&cli.api_url).with_api_version(cli.api_version);
    if let Some(token) = cli.token {
        client = client.with_token(token);
    }

    match cli.command {
        Commands::Health => {
            if client.health().await? {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Register {
            email,
            password,
            mobile,
            first_name,
            last_name,
            license_plate,
            region,
            card_token,
        } => {
            let plans = client
                .register(&CreateUserRequest {
                    email,
                    password,
                    mobile_number: mobile,
                    first_name,
                    last_name,
                    license_plate,
                    region,
                    card_token,
                })
                .await?;
            print_json(&plans)?;
        }

        Commands::Login { email, password } => {
            let token = client.authenticate(&email, &password).await?;
            println!("{}", token.access_token);
        }

        Commands::Account { action } => match action {
            AccountCommands::Show => print_json(&client.account().await?)?,
            AccountCommands::Update {
                first_name,
                last_name,
                region,
            } => {
                client
                    .update_account(&UpdateAccountRequest {
                        first_name,
                        last_name,
                        region,
                    })
                    .await?;
                println!("✓ Account updated");
            }
            AccountCommands::Password { password } => {
                client.change_password(&password).await?;
                println!("✓ Password changed");
            }
        },

        Commands::Plan { action } => match action {
            PlanCommands::List => print_json(&client.plans().await?)?,
            PlanCommands::Subscribe { id } => {
                let plan_id = parse_plan_id(&id)?;
                print_json(&client.subscribe(plan_id).await?)?;
            }
        },

        Commands::Activity { action } => match action {
            ActivityCommands::List { page, size } => {
                let query = PageQuery {
                    page: Some(page),
                    size: Some(size),
                };
                print_json(&client.activities(&query).await?)?;
            }
            ActivityCommands::Start { lot } => print_json(&client.start_parking(lot).await?)?,
            ActivityCommands::Exit { id } => {
                let activity_id = parse_activity_id(&id)?;
                print_json(&client.exit_parking(activity_id).await?)?;
            }
            ActivityCommands::Update {
                id,
                status,
                gate_response,
                exception_flag,
            } => {
                let activity_id = parse_activity_id(&id)?;
                let req = UpdateActivityRequest {
                    status: parse_status(status)?,
                    gate_response,
                    exception_flag,
                };
                print_json(&client.update_activity(activity_id, &req).await?)?;
            }
            ActivityCommands::Search {
                lot,
                status,
                from,
                to,
            } => {
                let query = ActivityQuery {
                    lot_id: lot,
                    status: parse_status(status)?,
                    from: parse_time(from)?,
                    to: parse_time(to)?,
                };
                print_json(&client.search_activities(&query).await?)?;
            }
        },

        Commands::Sale { action } => match action {
            SaleCommands::List {
                sale,
                record,
                in_flight,
                from,
                to,
            } => {
                let query = SaleQuery {
                    sale,
                    record,
                    in_flight,
                    from: parse_time(from)?,
                    to: parse_time(to)?,
                };
                print_json(&client.sales(&query).await?)?;
            }
            SaleCommands::Create { plan } => {
                let plan_id = parse_plan_id(&plan)?;
                print_json(&client.create_sale(plan_id).await?)?;
            }
        },

        Commands::Log { events } => {
            client.log_message(events).await?;
            println!("✓ Log sent");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_is_case_insensitive() {
        assert_eq!(
            parse_status(Some("parked".into())).unwrap(),
            Some(ParkingStatus::Parked)
        );
        assert!(parse_status(Some("gone".into())).is_err());
        assert_eq!(parse_status(None).unwrap(), None);
    }

    #[test]
    fn test_parse_time() {
        let t = parse_time(Some("2024-05-01T10:00:00+02:00".into()))
            .unwrap()
            .unwrap();
        assert_eq!(t.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(parse_time(Some("yesterday".into())).is_err());
    }

    #[test]
    fn test_cli_parses_sale_flags() {
        let cli = Cli::try_parse_from(["parking", "sale", "list", "--in-flight"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sale {
                action: SaleCommands::List { in_flight: true, sale: false, .. }
            }
        ));
    }
}
