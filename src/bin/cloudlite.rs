use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use cloudlite::command::parse::{parse_condition, parse_update};
use cloudlite::config::{EnvConfig, InitCloudConfig};
use cloudlite::errors::CloudError;
use cloudlite::geo::Geometry;
use cloudlite::request::{Direction, DocumentId, Envelope, Request};
use cloudlite::{Cloud, Database, RecordingTransport};
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(
    name = "cloudlite",
    version,
    about = "Build and inspect cloud database requests",
    long_about = None
)]
struct Cli {
    #[arg(
        long,
        help = "Path to a config file (TOML). If omitted, the usual locations are searched."
    )]
    config: Option<PathBuf>,
    #[arg(long, help = "Env for every service. Takes precedence over config/env vars.")]
    env: Option<String>,
    #[arg(long, help = "Write rolling logs to this directory")]
    log_dir: Option<PathBuf>,
    #[arg(long, default_value = "info", help = "off|error|warn|info|debug|trace")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Print the queryDocument request for a query")]
    Query {
        #[arg(long)]
        collection: String,
        #[arg(long = "where", help = "Condition as JSON (raw map or command tree)")]
        where_json: Option<String>,
        #[arg(long = "order-by", help = "field[:asc|desc], repeatable")]
        order_by: Vec<String>,
        #[arg(long)]
        skip: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
        #[arg(long, help = "Projection as JSON, e.g. {\"name\":true}")]
        field: Option<String>,
    },
    #[command(about = "Print the countDocument request")]
    Count {
        #[arg(long)]
        collection: String,
        #[arg(long = "where")]
        where_json: Option<String>,
    },
    #[command(about = "Print the updateDocument request for one document")]
    Update {
        #[arg(long)]
        collection: String,
        #[arg(long)]
        doc: String,
        #[arg(long, help = "Update data as JSON (literals and update commands)")]
        data: String,
    },
    #[command(about = "Print the normalized expression tree for a condition")]
    Explain {
        #[arg(long = "where")]
        where_json: String,
    },
    #[command(about = "Validate a GeoJSON geometry and print it back")]
    Geo {
        #[arg(long)]
        geojson: String,
    },
}

fn load_config(cli: &Cli) -> Result<InitCloudConfig, CloudError> {
    // Precedence: CLI > env > config file > defaults
    let mut cfg = match &cli.config {
        Some(p) => {
            let mut c = InitCloudConfig::load(p)?;
            c.apply_env();
            c
        }
        None => InitCloudConfig::discover()?,
    };
    if let Some(env) = &cli.env {
        cfg.env = Some(EnvConfig::Single(env.clone()));
    }
    Ok(cfg)
}

fn parse_json(what: &str, text: &str) -> Result<Value, CloudError> {
    serde_json::from_str(text).map_err(|e| CloudError::InvalidArgument(format!("{what}: {e}")))
}

fn parse_order(spec: &str) -> Result<(String, Direction), CloudError> {
    match spec.rsplit_once(':') {
        Some((field, dir)) => Ok((field.to_string(), dir.parse()?)),
        None => Ok((spec.to_string(), Direction::Asc)),
    }
}

fn projection(text: &str) -> Result<bson::Document, CloudError> {
    cloudlite::utils::json::json_value_to_bson_document(&parse_json("--field", text)?)
}

fn describe(db: &Database, request: Request) -> Value {
    let cfg = db.config();
    let envelope = Envelope::new(request, cfg.env.clone(), cfg.trace_user.unwrap_or(false));
    serde_json::to_value(envelope).unwrap_or(Value::Null)
}

fn run(cli: &Cli) -> Result<Value, CloudError> {
    let cloud = Cloud::new(Arc::new(RecordingTransport::replying(Value::Null)));
    cloud.init(load_config(cli)?);
    let db = cloud.database(None);
    match &cli.command {
        Commands::Query { collection, where_json, order_by, skip, limit, field } => {
            let mut q = db.collection(collection.as_str()).query();
            if let Some(w) = where_json {
                q = q.where_(parse_condition(&parse_json("--where", w)?)?);
            }
            for o in order_by {
                let (f, d) = parse_order(o)?;
                q = q.order_by(f, d);
            }
            if let Some(n) = skip {
                q = q.skip(*n);
            }
            if let Some(n) = limit {
                q = q.limit(*n);
            }
            if let Some(f) = field {
                q = q.field(projection(f)?);
            }
            Ok(describe(&db, q.to_get_request()?))
        }
        Commands::Count { collection, where_json } => {
            let mut q = db.collection(collection.as_str()).query();
            if let Some(w) = where_json {
                q = q.where_(parse_condition(&parse_json("--where", w)?)?);
            }
            Ok(describe(&db, q.to_count_request()?))
        }
        Commands::Update { collection, doc, data } => {
            let data = parse_update(&parse_json("--data", data)?)?;
            let id: DocumentId =
                doc.parse::<i64>().map(Into::into).unwrap_or_else(|_| doc.as_str().into());
            let request = db.collection(collection.as_str()).doc(id).to_update_request(data)?;
            Ok(describe(&db, request))
        }
        Commands::Explain { where_json } => {
            let node = parse_condition(&parse_json("--where", where_json)?)?;
            Ok(serde_json::to_value(node)?)
        }
        Commands::Geo { geojson } => {
            let g = Geometry::parse(geojson)?;
            log::debug!("parsed {} geometry", g.kind());
            Ok(serde_json::from_str(&g.to_string())?)
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Some(dir) = &cli.log_dir {
        let configured =
            cloudlite::logger::configure_logging(Some(dir), Some(&cli.log_level), None);
        if let Err(e) = configured {
            eprintln!("logging disabled: {e}");
        }
    } else if std::env::var_os("CLOUDLITE_LOG_DIR").is_some()
        && let Err(e) = cloudlite::init()
    {
        eprintln!("logging disabled: {e}");
    }
    match run(&cli) {
        Ok(v) => match serde_json::to_string_pretty(&v) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
