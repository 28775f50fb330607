use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "termsheet",
    version,
    about = "Structured-note term extraction for EDGAR filings"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a filing and print the extracted terms as JSON.
    Parse(ParseArgs),
    /// Detect the issuing bank from a filing.
    Detect(DetectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Input filing (HTML or plain text); reads stdin when omitted.
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Issuer name; auto-detected from the document when omitted.
    #[arg(long)]
    pub issuer: Option<String>,

    /// Treat the input as plain text even if it looks like HTML.
    #[arg(long, default_value_t = false)]
    pub text: bool,

    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Coupon periods per year assumed when deriving the per-period rate
    /// from an annual rate.
    #[arg(long, default_value_t = 4.0)]
    pub payments_per_year: f64,
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Input filing (HTML or plain text); reads stdin when omitted.
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Treat the input as plain text even if it looks like HTML.
    #[arg(long, default_value_t = false)]
    pub text: bool,
}
