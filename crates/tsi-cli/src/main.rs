use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;
use tsi_schemas::Side;

mod commands;

use commands::{demo, load_json, positions, screen, tables, watch, ApiClient};

#[derive(Parser)]
#[command(name = "tsi")]
#[command(about = "Trading screen interface CLI", long_about = None)]
struct Cli {
    /// Daemon base URL
    #[arg(long, env = "TSI_URL", default_value = "http://localhost:5000", global = true)]
    url: String,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Screen field commands
    Field {
        #[command(subcommand)]
        cmd: FieldCmd,
    },

    /// Trigger a named command (place_order | clear_fields | refresh_positions)
    Command { name: String },

    /// Print account balance, total P&L and every position
    Positions,

    /// Submit an order directly to the backend
    Order {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        price: Decimal,
        /// BUY | SELL
        #[arg(long, default_value = "BUY")]
        side: Side,
    },

    /// Position row edits
    Position {
        #[command(subcommand)]
        cmd: PositionCmd,
    },

    /// Connection status
    Status,

    /// Console log commands
    Console {
        #[command(subcommand)]
        cmd: ConsoleCmd,
    },

    /// Table commands
    Table {
        #[command(subcommand)]
        cmd: TableCmd,
    },

    /// UI event commands
    Event {
        #[command(subcommand)]
        cmd: EventCmd,
    },

    /// Print pushes from the hub
    Watch {
        /// Exit after this many frames
        #[arg(long)]
        count: Option<usize>,
        /// Also print heartbeats
        #[arg(long, default_value_t = false)]
        heartbeats: bool,
        /// Print full JSON frames
        #[arg(long, default_value_t = false)]
        raw: bool,
    },

    /// Invoke one hub method and print the reply
    HubCall {
        /// Method name, e.g. GetPositions
        method: String,
        /// Arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },

    /// Scripted walk-through of the screen API
    Demo,
}

#[derive(Subcommand)]
enum FieldCmd {
    Get { name: String },
    Set { name: String, value: String },
    /// Print every field as name=value
    All,
}

#[derive(Subcommand)]
enum PositionCmd {
    Add {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        avg_price: Decimal,
        /// Defaults to the average price
        #[arg(long)]
        current_price: Option<Decimal>,
        #[arg(long, default_value_t = false)]
        live: bool,
        #[arg(long, default_value_t = false)]
        flatten: bool,
    },
    Update {
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        avg_price: Decimal,
        /// Keeps the current mark when omitted
        #[arg(long)]
        current_price: Option<Decimal>,
        #[arg(long, default_value_t = false)]
        live: bool,
        #[arg(long, default_value_t = false)]
        flatten: bool,
    },
    Delete {
        symbol: String,
    },
    ToggleLive {
        symbol: String,
    },
    ToggleFlatten {
        symbol: String,
    },
    /// Replace the whole book from a JSON array of positions
    Refresh {
        #[arg(conflicts_with = "file")]
        json: Option<String>,
        #[arg(long)]
        file: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConsoleCmd {
    Add { message: String },
    List {
        /// Only the last N lines
        #[arg(long)]
        recent: Option<usize>,
    },
    Clear,
}

#[derive(Subcommand)]
enum TableCmd {
    List,
    Show {
        table_id: String,
        #[arg(long, default_value_t = false)]
        raw: bool,
    },
    /// Replace a table from JSON
    Put {
        table_id: String,
        #[arg(conflicts_with = "file")]
        json: Option<String>,
        #[arg(long)]
        file: Option<String>,
    },
    AddRow {
        table_id: String,
        /// Cell values as a JSON object keyed by column id
        data: String,
    },
    UpdateRow {
        table_id: String,
        index: usize,
        data: String,
    },
    DeleteRow {
        table_id: String,
        index: usize,
    },
    Columns {
        table_id: String,
    },
}

#[derive(Subcommand)]
enum EventCmd {
    Send {
        #[arg(long = "type")]
        event_type: String,
        #[arg(long)]
        source: String,
        #[arg(long)]
        source_id: Option<String>,
        /// Payload as a JSON object
        #[arg(long)]
        data: Option<String>,
    },
    List {
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    let api = ApiClient::new(&cli.url);

    match cli.cmd {
        Commands::Field { cmd } => match cmd {
            FieldCmd::Get { name } => screen::field_get(&api, &name).await?,
            FieldCmd::Set { name, value } => screen::field_set(&api, &name, &value).await?,
            FieldCmd::All => screen::field_all(&api).await?,
        },

        Commands::Command { name } => screen::command(&api, &name).await?,

        Commands::Positions => positions::summary(&api).await?,

        Commands::Order {
            symbol,
            quantity,
            price,
            side,
        } => positions::order(&api, &symbol, quantity, price, side).await?,

        Commands::Position { cmd } => match cmd {
            PositionCmd::Add {
                symbol,
                quantity,
                avg_price,
                current_price,
                live,
                flatten,
            } => {
                let p = positions::position_body(
                    &symbol,
                    quantity,
                    avg_price,
                    current_price,
                    live,
                    flatten,
                );
                positions::add(&api, &p).await?
            }
            PositionCmd::Update {
                symbol,
                quantity,
                avg_price,
                current_price,
                live,
                flatten,
            } => {
                let p = positions::position_body(
                    &symbol,
                    quantity,
                    avg_price,
                    current_price,
                    live,
                    flatten,
                );
                positions::update(&api, &symbol, &p).await?
            }
            PositionCmd::Delete { symbol } => positions::delete(&api, &symbol).await?,
            PositionCmd::ToggleLive { symbol } => positions::toggle_live(&api, &symbol).await?,
            PositionCmd::ToggleFlatten { symbol } => {
                positions::toggle_flatten(&api, &symbol).await?
            }
            PositionCmd::Refresh { json, file } => {
                positions::refresh(&api, load_json(json, file)?).await?
            }
        },

        Commands::Status => screen::status(&api).await?,

        Commands::Console { cmd } => match cmd {
            ConsoleCmd::Add { message } => screen::console_add(&api, &message).await?,
            ConsoleCmd::List { recent } => screen::console_list(&api, recent).await?,
            ConsoleCmd::Clear => screen::console_clear(&api).await?,
        },

        Commands::Table { cmd } => match cmd {
            TableCmd::List => tables::list(&api).await?,
            TableCmd::Show { table_id, raw } => tables::show(&api, &table_id, raw).await?,
            TableCmd::Put {
                table_id,
                json,
                file,
            } => tables::put(&api, &table_id, load_json(json, file)?).await?,
            TableCmd::AddRow { table_id, data } => {
                tables::add_row(&api, &table_id, load_json(Some(data), None)?).await?
            }
            TableCmd::UpdateRow {
                table_id,
                index,
                data,
            } => tables::update_row(&api, &table_id, index, load_json(Some(data), None)?).await?,
            TableCmd::DeleteRow { table_id, index } => {
                tables::delete_row(&api, &table_id, index).await?
            }
            TableCmd::Columns { table_id } => tables::columns(&api, &table_id).await?,
        },

        Commands::Event { cmd } => match cmd {
            EventCmd::Send {
                event_type,
                source,
                source_id,
                data,
            } => {
                let data = data.map(|d| load_json(Some(d), None)).transpose()?;
                tables::send_event(&api, &event_type, &source, source_id, data).await?
            }
            EventCmd::List { count } => tables::list_events(&api, count).await?,
        },

        Commands::Watch {
            count,
            heartbeats,
            raw,
        } => watch::watch(&cli.url, count, heartbeats, raw).await?,

        Commands::HubCall {
            method,
            args,
            timeout_secs,
        } => {
            let args = args.map(|a| load_json(Some(a), None)).transpose()?;
            watch::call(&cli.url, &method, args, Duration::from_secs(timeout_secs)).await?
        }

        Commands::Demo => demo::run(&api).await?,
    }

    Ok(())
}
