use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tsdeck::{
    filter_facet_values, render_groups, Combinator, ConsoleError, FilterCondition, FilterGroup,
    ImportAction, SearchParameters, SearchRequestBuilder, SearchResults, SelectedFacets,
};
use tsdeck_cluster::{ClientConfig, Node, TypesenseClient};

#[derive(Parser)]
#[command(name = "tsdeck", about = "Query and administer a Typesense cluster")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Node URL, e.g. https://search.example.com:443. Repeat or comma-separate for a cluster.
    #[arg(long = "node", env = "TSDECK_NODES", value_delimiter = ',', global = true)]
    nodes: Vec<String>,
    #[arg(long, env = "TSDECK_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// JSON client config file. Flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Per-attempt timeout in seconds.
    #[arg(long, global = true)]
    timeout: Option<f64>,
    #[arg(long, global = true)]
    retries: Option<u32>,
    /// Seconds to wait before retrying on the next node.
    #[arg(long, global = true)]
    retry_interval: Option<f64>,
}

#[derive(Subcommand)]
enum Command {
    /// Check GET /health
    Health,
    /// List collections
    Collections,
    /// Show one collection's schema
    Collection { name: String },
    /// Create a collection from a JSON schema file
    CreateCollection {
        #[arg(long)]
        schema: PathBuf,
    },
    /// Delete a collection and all its documents
    DropCollection { name: String },
    GetDoc { collection: String, id: String },
    /// Index one document given as a JSON object
    IndexDoc { collection: String, document: String },
    /// Apply a partial update given as a JSON object
    UpdateDoc {
        collection: String,
        id: String,
        patch: String,
    },
    DeleteDoc { collection: String, id: String },
    /// Bulk import a JSONL file (or a JSON array)
    Import {
        collection: String,
        file: PathBuf,
        #[arg(long, default_value = "upsert")]
        action: ImportAction,
    },
    Search(SearchArgs),
    /// Print GET /stats.json
    Stats,
    /// Print GET /metrics.json
    Metrics,
}

#[derive(clap::Args)]
struct SearchArgs {
    collection: String,
    #[arg(short, long, default_value = "")]
    q: String,
    #[arg(long, default_value = "")]
    query_by: String,
    /// Raw filter_by expression
    #[arg(long)]
    filter: Option<String>,
    /// Condition such as `price>=10` or `tags in a,b`. Repeatable.
    #[arg(long = "where", value_parser = parse_condition)]
    conditions: Vec<FilterCondition>,
    /// OR the --where conditions instead of AND-ing them
    #[arg(long)]
    any: bool,
    #[arg(long)]
    facet_by: Option<String>,
    /// Selected facet value as field=value. Repeatable.
    #[arg(long = "facet", value_parser = parse_key_value)]
    facets: Vec<(String, String)>,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    per_page: u32,
    /// Narrow one facet's values as field=text
    #[arg(long, value_parser = parse_key_value)]
    facet_search: Option<(String, String)>,
}

fn parse_condition(s: &str) -> Result<FilterCondition, String> {
    s.parse::<FilterCondition>().map_err(|e| e.to_string())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", s))?;
    if key.trim().is_empty() {
        return Err(format!("missing field name in '{}'", s));
    }
    Ok((key.trim().to_string(), value.to_string()))
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig, ConsoleError> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(Some(path.as_path()))?,
        None => {
            let nodes = cli
                .nodes
                .iter()
                .filter(|n| !n.trim().is_empty())
                .map(|n| Node::parse(n))
                .collect::<Result<Vec<_>, _>>()?;
            ClientConfig::new(nodes, cli.api_key.clone().unwrap_or_default())
        }
    };

    if cli.config.is_some() {
        if let Some(key) = &cli.api_key {
            config.api_key = key.clone();
        }
    }
    if let Some(timeout) = cli.timeout {
        config = config.with_connection_timeout(timeout);
    }
    if let Some(retries) = cli.retries {
        config = config.with_num_retries(retries);
    }
    if let Some(interval) = cli.retry_interval {
        config = config.with_retry_interval(interval);
    }
    config.validate()?;
    Ok(config)
}

/// Base filter: the raw `--filter` AND the rendered `--where` group.
fn base_filter(args: &SearchArgs) -> Option<String> {
    let combinator = if args.any {
        Combinator::Or
    } else {
        Combinator::And
    };
    let group = args
        .conditions
        .iter()
        .cloned()
        .fold(FilterGroup::new(combinator), FilterGroup::with);
    let rendered = render_groups(&[group]);

    let parts: Vec<&str> = [args.filter.as_deref().unwrap_or(""), rendered.as_str()]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" && "))
    }
}

fn search_params(args: &SearchArgs) -> SearchParameters {
    SearchParameters {
        filter_by: base_filter(args),
        facet_by: args.facet_by.clone(),
        sort_by: args.sort_by.clone(),
        page: Some(args.page.max(1)),
        per_page: Some(args.per_page),
        ..SearchParameters::new(args.q.clone(), args.query_by.clone())
    }
}

fn read_documents(path: &Path) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(&content)?);
    }
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_search(
    client: &TypesenseClient,
    args: &SearchArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = search_params(args);
    let mut selected = SelectedFacets::new();
    for (field, value) in &args.facets {
        selected.toggle(field, value, true);
    }
    let request = SearchRequestBuilder::new(&params)
        .collection(Some(args.collection.as_str()))
        .selected_facets(&selected)
        .build()?;

    let results: SearchResults = request.send(client).await?.into();

    if let Some((field, needle)) = &args.facet_search {
        let matches: Vec<_> = results
            .facets
            .iter()
            .filter(|f| &f.field_name == field)
            .flat_map(|f| filter_facet_values(f, needle))
            .collect();
        return print_json(&matches);
    }

    print_json(&results)?;
    eprintln!(
        "Showing {}-{} of {} results (page {} of {}, {} ms)",
        results.paging.start,
        results.paging.end,
        results.found,
        results.paging.page,
        results.paging.total_pages,
        results.search_time_ms
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&cli)?;
    let client = TypesenseClient::new(&config)?;
    tracing::info!(
        "Using nodes [{}] (retries={}, timeout={}s)",
        config
            .nodes
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        config.num_retries,
        config.connection_timeout_seconds
    );

    match &cli.command {
        Command::Health => print_json(&client.health().await?),
        Command::Collections => print_json(&client.list_collections().await?),
        Command::Collection { name } => print_json(&client.get_collection(name).await?),
        Command::CreateCollection { schema } => {
            let schema: tsdeck::CollectionSchema =
                serde_json::from_str(&std::fs::read_to_string(schema)?)?;
            print_json(&client.create_collection(&schema).await?)
        }
        Command::DropCollection { name } => print_json(&client.delete_collection(name).await?),
        Command::GetDoc { collection, id } => {
            print_json(&client.get_document::<Value>(collection, id).await?)
        }
        Command::IndexDoc {
            collection,
            document,
        } => {
            let document: Value = serde_json::from_str(document)?;
            print_json(&client.index_document(collection, &document).await?)
        }
        Command::UpdateDoc {
            collection,
            id,
            patch,
        } => {
            let patch: Value = serde_json::from_str(patch)?;
            print_json(&client.update_document(collection, id, &patch).await?)
        }
        Command::DeleteDoc { collection, id } => {
            print_json(&client.delete_document(collection, id).await?)
        }
        Command::Import {
            collection,
            file,
            action,
        } => {
            let documents = read_documents(file)?;
            let results = client
                .import_documents(collection, &documents, *action)
                .await?;
            let failed = results.iter().filter(|r| !r.success).count();
            print_json(&results)?;
            eprintln!(
                "Imported {} of {} documents",
                results.len() - failed,
                results.len()
            );
            Ok(())
        }
        Command::Search(args) => run_search(&client, args).await,
        Command::Stats => print_json(&client.stats().await?),
        Command::Metrics => {
            println!("{}", client.metrics().await?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run(cli).await
}
