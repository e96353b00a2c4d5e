use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use wayfare_core::{collections, RecordKind};

#[derive(Parser)]
#[command(name = "wayfare")]
#[command(about = "Keep saved deals, trips and bookings on this machine")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Do not contact the backend even if one is configured
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save a deal (or any other record) and mirror it to the backend
    Save {
        /// Destination shown on the card, e.g. "Lisbon"
        city: Vec<String>,
        /// Record ID; saving an existing ID updates it in place
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        title: Option<String>,
        /// Price label, e.g. "$249"
        #[arg(long)]
        price: Option<String>,
        /// Image reference (URL or asset name)
        #[arg(long)]
        img: Option<String>,
        #[arg(long, default_value = "deal")]
        kind: RecordKind,
        #[arg(short, long, value_enum, default_value_t = CollectionArg::Saved)]
        collection: CollectionArg,
    },
    /// List records in a collection
    List {
        #[arg(short, long, value_enum, default_value_t = CollectionArg::Saved)]
        collection: CollectionArg,
        #[arg(long, value_enum, default_value_t = SortOrder::Newest)]
        sort: SortOrder,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove one record
    #[command(alias = "rm")]
    Remove {
        id: String,
        #[arg(short, long, value_enum, default_value_t = CollectionArg::Saved)]
        collection: CollectionArg,
    },
    /// Remove every record in a collection
    Clear {
        #[arg(short, long, value_enum, default_value_t = CollectionArg::Saved)]
        collection: CollectionArg,
    },
    /// Print a collection every time it changes, until Ctrl-C
    Watch {
        #[arg(short, long, value_enum, default_value_t = CollectionArg::Saved)]
        collection: CollectionArg,
    },
    /// Show the home page top deals, seeding them on first use
    Deals {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage created trips
    Trip {
        #[command(subcommand)]
        command: TripCommands,
    },
    /// Search the backend for stays, flights or experiences
    Search {
        /// Origin or destination to search from
        from: Vec<String>,
        #[arg(long, default_value = "stays")]
        tab: String,
        /// Save the result with this ID to saved items
        #[arg(long, value_name = "ID")]
        save: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Book a saved item or top deal
    Book {
        /// ID of the record to book
        id: String,
        /// Collection the record lives in
        #[arg(short, long, value_enum, default_value_t = CollectionArg::Saved)]
        collection: CollectionArg,
        /// Extra booking fields, e.g. --detail travelers=2
        #[arg(long = "detail", value_name = "KEY=VALUE")]
        details: Vec<String>,
    },
    /// Subscribe to deal alerts
    Subscribe {
        email: String,
        #[arg(long, value_enum, default_value_t = PlanArg::Monthly)]
        plan: PlanArg,
        #[arg(long, value_enum, default_value_t = PaymentMethodArg::Card)]
        method: PaymentMethodArg,
    },
    /// Inspect or update the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum TripCommands {
    /// Create a trip
    Add {
        /// Destination of the trip
        city: Vec<String>,
        #[arg(long)]
        title: Option<String>,
        /// Budget label, e.g. "$1,200"
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        img: Option<String>,
    },
    /// List created trips
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Travel backend base URL, e.g. http://localhost:8083
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Owner stamped on new records
        #[arg(long, value_name = "ID")]
        user_id: Option<String>,
        /// Mirror request timeout in milliseconds
        #[arg(long, value_name = "MS")]
        mirror_timeout_ms: Option<u64>,
        /// Bearer token sent to the backend
        #[arg(long, value_name = "TOKEN")]
        auth_token: Option<String>,
    },
    /// Print the effective configuration
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CollectionArg {
    Saved,
    Trips,
    Bookings,
    Deals,
}

impl CollectionArg {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Saved => collections::SAVED_ITEMS,
            Self::Trips => collections::CREATED_TRIPS,
            Self::Bookings => collections::BOOKINGS,
            Self::Deals => collections::TOP_DEALS,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortOrder {
    Newest,
    PriceLow,
    PriceHigh,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PlanArg {
    Free,
    Monthly,
    Yearly,
}

impl PlanArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PaymentMethodArg {
    Card,
    Qr,
}

impl PaymentMethodArg {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Qr => "qr",
        }
    }
}
