use clap::{Args, Parser, Subcommand};

use crate::formats::TocOrder;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Show(ShowArgs),
    Flatten(FlattenArgs),
    Order(OrderArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Collection to load.
    #[arg(long)]
    pub collection: String,

    /// Order to apply once the collection is loaded.
    #[arg(long, default_value_t = TocOrder::Default)]
    pub order: TocOrder,

    /// Backend base URL (default: `api_base` from config or EDITION_TOC_API_BASE).
    #[arg(long)]
    pub api_base: Option<String>,

    /// Locale appended to the TOC path.
    #[arg(long)]
    pub locale: Option<String>,

    /// YAML config file with ordering allow-lists.
    #[arg(long)]
    pub config: Option<String>,

    /// Print the flattened view instead of the tree.
    #[arg(long)]
    pub flat: bool,
}

#[derive(Debug, Args)]
pub struct FlattenArgs {
    /// Input path to a TOC tree (JSON).
    #[arg(long)]
    pub input: String,

    /// Only emit nodes whose value for this key is truthy (e.g. `itemId`).
    #[arg(long)]
    pub required_key: Option<String>,
}

#[derive(Debug, Args)]
pub struct OrderArgs {
    /// Input path to a TOC tree (JSON).
    #[arg(long)]
    pub input: String,

    /// Collection the tree belongs to (checked against the allow-lists).
    #[arg(long)]
    pub collection: String,

    #[arg(long)]
    pub order: TocOrder,

    /// YAML config file with ordering allow-lists.
    #[arg(long)]
    pub config: Option<String>,
}
