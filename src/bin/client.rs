//! Small interactive client CLI, for manual smoke-testing a running
//! `luxdb-server` (spec §2, "Clients"). Not part of the CORE protocol —
//! a convenience binary, in the same spirit as the teacher's auxiliary
//! bins alongside its main one.

use clap::{Parser, Subcommand};
use luxdb::Client;

#[derive(Parser)]
#[command(name = "luxdb-client", version, about = "LuxDB: manual client CLI")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long)]
    port: u16,

    #[arg(long, env = "LUXDB_SECRET", default_value = "")]
    secret: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List all indexes.
    List,
    /// Check whether an index exists.
    Exists { name: String },
    /// Create a new index.
    Create { name: String, space: String, dim: usize },
    /// Initialize an index with capacity and HNSW parameters.
    Init {
        name: String,
        max_elements: usize,
        #[arg(default_value_t = 200)]
        ef_construction: usize,
        #[arg(default_value_t = 16)]
        m: usize,
    },
    /// Print index metadata.
    Info { name: String },
    /// Print the current element count.
    Count { name: String },
    /// Delete an index.
    Delete { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut client = Client::connect(&cli.host, cli.port, &cli.secret, b"wYfJIy4Nx1hPcxiljwg", 1 << 18, 60).await?;

    match cli.command {
        Cmd::List => {
            for name in client.get_indexes().await? {
                println!("{name}");
            }
        }
        Cmd::Exists { name } => println!("{}", client.index_exists(&name).await?),
        Cmd::Create { name, space, dim } => {
            client.create_index(&name, &space, dim).await?;
            println!("created {name}");
        }
        Cmd::Init { name, max_elements, ef_construction, m } => {
            client.init_index(&name, max_elements, ef_construction, m).await?;
            println!("initialized {name}");
        }
        Cmd::Info { name } => {
            let info = client.info(&name).await?;
            println!("{info:#?}");
        }
        Cmd::Count { name } => println!("{}", client.count(&name).await?),
        Cmd::Delete { name } => {
            client.delete_index(&name).await?;
            println!("deleted {name}");
        }
    }

    client.quit().await?;
    Ok(())
}
