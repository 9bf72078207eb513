use clap::{Parser, Subcommand, ValueEnum};

use crate::rfv::{DEFAULT_BATCH_SIZE, DEFAULT_PAGE_SIZE, JobConfig};

const DEFAULT_DUCKDB_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data/rfv.duckdb");

#[derive(Parser, Debug)]
#[command(name = "clinic-rfv")]
#[command(about = "Customer RFV segmentation job (Supabase or DuckDB storage)", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP trigger (POST /calculate-rfv).
    Serve(ServeArgs),
    /// Run one recalculation and print the stats as JSON.
    Run(RunArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Supabase,
    Duckdb,
}

#[derive(clap::Args, Debug, Clone)]
pub struct StoreArgs {
    /// Where revenue, patient and RFV tables live.
    #[arg(long, value_enum, default_value_t = Backend::Supabase, env = "RFV_BACKEND")]
    pub backend: Backend,

    /// Supabase project URL (e.g., https://xyz.supabase.co).
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase service role key.
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// DuckDB database file (tables are created if missing).
    #[arg(long, default_value = DEFAULT_DUCKDB_PATH)]
    pub duckdb_path: String,

    #[arg(long, default_value = "revenue_records")]
    pub revenue_table: String,

    #[arg(long, default_value = "patients")]
    pub patients_table: String,

    #[arg(long, default_value = "rfv_customers")]
    pub rfv_table: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct JobArgs {
    /// Rows per read page.
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Rows per upsert batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
}

impl JobArgs {
    pub fn config(&self) -> JobConfig {
        JobConfig {
            page_size: self.page_size.max(1),
            batch_size: self.batch_size.max(1),
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub job: JobArgs,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8788)]
    pub port: u16,
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub job: JobArgs,
}
