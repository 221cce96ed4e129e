use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use flow_analysis::counterparty::{classify_dataset, classify_for_account, tracked_set};
use flow_analysis::hierarchy::{build_hierarchy, find_roots, FlowGraph};
use flow_analysis::network::{build_network, compute_metrics};
use flow_analysis::stats::{compute_dataset_stats, format_timestamp};
use flow_data::dataset::{annotate_file, list_csv_files, read_rows};
use flow_data::export::write_records;
use flow_data::tokens::{extract_token_mappings, parse_decimals, TokenInfo, TokenRegistry};
use flow_data::AccountDataset;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "txflow")]
#[command(about = "Transaction-flow analysis over per-account CSV exports")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the token contract registry from raw exports.
    Tokens(TokensArgs),
    /// Rewrite exports with the decimals column filled from a registry.
    Annotate(AnnotateArgs),
    /// Per-address lifecycle/degree/balance statistics.
    Stats(StatsArgs),
    /// Sender→receiver hierarchy decomposition from root addresses.
    Hierarchy(HierarchyArgs),
    /// Internal/external counterparty classification.
    Counterparty(CounterpartyArgs),
    /// Global transaction-network metrics.
    Metrics(MetricsArgs),
}

#[derive(Args, Debug)]
struct TokensArgs {
    /// Directory of per-account CSV exports.
    #[arg(long)]
    data_dir: PathBuf,

    /// Registry CSV to write.
    #[arg(long, default_value = "registry.csv")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    #[arg(long)]
    data_dir: PathBuf,

    /// Registry CSV produced by `txflow tokens`.
    #[arg(long)]
    registry: PathBuf,

    /// Directory for the annotated copies.
    #[arg(long)]
    output_dir: PathBuf,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[arg(long)]
    data_dir: PathBuf,

    /// Optional registry for decimals resolution of unannotated exports.
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Output format: table (default), json, or csv.
    #[arg(long, default_value = "table")]
    output: String,

    /// Also write the full statistics table to this CSV file.
    #[arg(long)]
    out_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct HierarchyArgs {
    #[arg(long)]
    data_dir: PathBuf,

    #[arg(long)]
    registry: Option<PathBuf>,

    /// Addresses treated as roots regardless of in-edges. Repeatable.
    #[arg(long = "forced-root")]
    forced_roots: Vec<String>,

    /// Keep only edges where both endpoints are key accounts.
    #[arg(long)]
    key_only: bool,

    /// Parent/child hierarchy edges CSV to write.
    #[arg(long, default_value = "hierarchy.csv")]
    hierarchy_out: PathBuf,

    /// Key-account (account, level) CSV to write.
    #[arg(long, default_value = "key_account_levels.csv")]
    levels_out: PathBuf,

    /// Output format for the per-depth summary: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

#[derive(Args, Debug)]
struct CounterpartyArgs {
    #[arg(long)]
    data_dir: PathBuf,

    #[arg(long)]
    registry: Option<PathBuf>,

    /// Restrict the report to one tracked account's export.
    #[arg(long)]
    account: Option<String>,

    /// Only show counterparties with more than this many contacts.
    #[arg(long, default_value_t = 0)]
    min_total: usize,

    /// Output format: table (default), json, or csv.
    #[arg(long, default_value = "table")]
    output: String,

    #[arg(long)]
    out_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MetricsArgs {
    #[arg(long)]
    data_dir: PathBuf,

    #[arg(long)]
    registry: Option<PathBuf>,

    /// Output format: table (default) or json.
    #[arg(long, default_value = "table")]
    output: String,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    match cli.command {
        Commands::Tokens(args) => handle_tokens(args),
        Commands::Annotate(args) => handle_annotate(args),
        Commands::Stats(args) => handle_stats(args),
        Commands::Hierarchy(args) => handle_hierarchy(args),
        Commands::Counterparty(args) => handle_counterparty(args),
        Commands::Metrics(args) => handle_metrics(args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn load_registry(path: Option<&Path>) -> Result<Option<TokenRegistry>> {
    match path {
        Some(path) => Ok(Some(
            TokenRegistry::read_csv(path).wrap_err("failed to load token registry")?,
        )),
        None => Ok(None),
    }
}

fn load_dataset(data_dir: &Path, registry: Option<&Path>) -> Result<AccountDataset> {
    let registry = load_registry(registry)?;
    AccountDataset::load(data_dir, registry.as_ref()).wrap_err("failed to load dataset")
}

fn file_progress(len: u64) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} files")
            .wrap_err("failed to create progress style")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn handle_tokens(args: TokensArgs) -> Result<()> {
    let files = list_csv_files(&args.data_dir)?;
    if files.is_empty() {
        return Err(eyre!("no CSV exports found in {}", args.data_dir.display()));
    }

    let pb = file_progress(files.len() as u64)?;

    let mut registry = TokenRegistry::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut rows_scanned = 0usize;

    for path in &files {
        let rows = read_rows(path)?;
        rows_scanned += rows.len();

        // First appearance wins across files.
        for (contract, symbol) in extract_token_mappings(&rows) {
            if !seen.insert(contract.clone()) {
                continue;
            }
            let decimals = rows
                .iter()
                .find(|row| row.contract_address.trim() == contract)
                .and_then(|row| row.decimals.as_deref())
                .map(parse_decimals)
                .unwrap_or(0);
            registry.insert(contract, TokenInfo { symbol, decimals });
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    registry
        .write_csv(&args.output)
        .wrap_err("failed to write registry")?;

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Files scanned", &files.len().to_string()]);
    table.add_row(vec!["Rows scanned", &rows_scanned.to_string()]);
    table.add_row(vec!["Unique contracts", &registry.len().to_string()]);
    println!("\n{table}\n");

    info!(
        files = files.len(),
        contracts = registry.len(),
        output = %args.output.display(),
        "tokens command completed"
    );
    Ok(())
}

fn handle_annotate(args: AnnotateArgs) -> Result<()> {
    let registry = TokenRegistry::read_csv(&args.registry)?;
    let files = list_csv_files(&args.data_dir)?;
    if files.is_empty() {
        return Err(eyre!("no CSV exports found in {}", args.data_dir.display()));
    }

    std::fs::create_dir_all(&args.output_dir).wrap_err_with(|| {
        format!("failed to create output directory {}", args.output_dir.display())
    })?;

    let pb = file_progress(files.len() as u64)?;
    let mut rows_written = 0usize;

    for path in &files {
        let file_name = path
            .file_name()
            .ok_or_else(|| eyre!("export has no file name: {}", path.display()))?;
        let dst = args.output_dir.join(file_name);
        rows_written += annotate_file(path, &dst, &registry)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        files = files.len(),
        rows = rows_written,
        output_dir = %args.output_dir.display(),
        "annotate command completed"
    );
    Ok(())
}

fn handle_stats(args: StatsArgs) -> Result<()> {
    let dataset = load_dataset(&args.data_dir, args.registry.as_deref())?;
    let stats = compute_dataset_stats(&dataset);

    if let Some(out_file) = &args.out_file {
        write_records(out_file, &stats).wrap_err("failed to write statistics CSV")?;
    }

    match args.output.to_lowercase().as_str() {
        "table" => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec![
                "Address",
                "First Txn",
                "Lifecycle (days)",
                "Txns",
                "In",
                "Out",
                "Final Balance",
            ]);
            for row in &stats {
                table.add_row(vec![
                    truncate_address(&row.address),
                    format_timestamp(row.first_seen),
                    row.lifecycle_days.to_string(),
                    row.total_txns.to_string(),
                    row.in_degree.to_string(),
                    row.out_degree.to_string(),
                    format!("{:.6}", row.final_balance),
                ]);
            }
            println!("\n{table}\n");
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for row in &stats {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        other => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table', 'json', or 'csv'",
                other
            ))
        }
    }

    info!(
        accounts = stats.len(),
        output = %args.output,
        "stats command completed"
    );
    Ok(())
}

fn handle_hierarchy(args: HierarchyArgs) -> Result<()> {
    let dataset = load_dataset(&args.data_dir, args.registry.as_deref())?;
    let key_accounts = dataset.key_accounts().clone();

    let pairs = dataset.edge_pairs();
    let graph = if args.key_only {
        FlowGraph::from_pairs_among(pairs, Some(&key_accounts))
    } else {
        FlowGraph::from_pairs(pairs)
    };

    let forced: BTreeSet<String> = args.forced_roots.iter().cloned().collect();
    let roots = find_roots(&graph, &forced);
    let hierarchy = build_hierarchy(&roots, &graph, &key_accounts);

    write_records(&args.hierarchy_out, &hierarchy.edge_rows())
        .wrap_err("failed to write hierarchy edges")?;
    write_records(&args.levels_out, &hierarchy.key_level_rows())
        .wrap_err("failed to write key-account levels")?;

    let summaries = hierarchy.level_summaries();
    match args.output.to_lowercase().as_str() {
        "table" => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Level", "Total Accounts", "Key Accounts"]);
            for summary in &summaries {
                table.add_row(vec![
                    summary.level.to_string(),
                    summary.total_accounts.to_string(),
                    summary.key_accounts.to_string(),
                ]);
            }
            println!("\n{table}\n");
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        other => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table' or 'json'",
                other
            ))
        }
    }

    info!(
        edges = graph.edge_count(),
        roots = roots.len(),
        labels = hierarchy.children.len(),
        hierarchy_out = %args.hierarchy_out.display(),
        levels_out = %args.levels_out.display(),
        "hierarchy command completed"
    );
    Ok(())
}

fn handle_counterparty(args: CounterpartyArgs) -> Result<()> {
    let dataset = load_dataset(&args.data_dir, args.registry.as_deref())?;

    let rows = match &args.account {
        Some(account) => {
            let tracked = tracked_set(dataset.key_accounts());
            let transfers = dataset.transfers_for(account);
            if transfers.is_empty() && !dataset.key_accounts().contains(account) {
                return Err(eyre!("account {} is not in the dataset", account));
            }
            classify_for_account(account, transfers, &tracked)
        }
        None => classify_dataset(&dataset),
    };

    let shown: Vec<_> = rows
        .iter()
        .filter(|row| row.total > args.min_total)
        .cloned()
        .collect();

    if let Some(out_file) = &args.out_file {
        write_records(out_file, &rows).wrap_err("failed to write counterparty CSV")?;
    }

    match args.output.to_lowercase().as_str() {
        "table" => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Counterparty", "Internal", "External", "Total", "Type"]);
            for row in &shown {
                table.add_row(vec![
                    truncate_address(&row.counterparty),
                    row.internal_count.to_string(),
                    row.external_count.to_string(),
                    row.total.to_string(),
                    format!("{:?}", row.kind).to_lowercase(),
                ]);
            }
            println!("\n{table}\n");
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        "csv" => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for row in &shown {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        other => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table', 'json', or 'csv'",
                other
            ))
        }
    }

    info!(
        counterparties = rows.len(),
        shown = shown.len(),
        min_total = args.min_total,
        "counterparty command completed"
    );
    Ok(())
}

fn handle_metrics(args: MetricsArgs) -> Result<()> {
    let dataset = load_dataset(&args.data_dir, args.registry.as_deref())?;
    let graph = build_network(dataset.all_transfers());
    let metrics = compute_metrics(&graph);

    match args.output.to_lowercase().as_str() {
        "table" => {
            let mut table = Table::new();
            table.load_preset(UTF8_BORDERS_ONLY);
            table.set_header(vec!["Metric", "Value"]);
            table.add_row(vec!["Nodes", &metrics.node_count.to_string()]);
            table.add_row(vec!["Edges", &metrics.edge_count.to_string()]);
            table.add_row(vec!["Density", &format!("{:.8}", metrics.density)]);
            table.add_row(vec!["Self-loops", &metrics.self_loops.to_string()]);
            table.add_row(vec!["Reciprocity", &format!("{:.6}", metrics.reciprocity)]);
            table.add_row(vec![
                "Avg clustering",
                &format!("{:.6}", metrics.avg_clustering),
            ]);
            table.add_row(vec![
                "Largest component",
                &metrics.largest_component_size.to_string(),
            ]);
            table.add_row(vec!["Diameter", &metrics.diameter.to_string()]);
            table.add_row(vec![
                "Avg path length",
                &format!("{:.6}", metrics.avg_path_length),
            ]);
            println!("\n{table}\n");
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
        other => {
            return Err(eyre!(
                "unknown output format '{}'; use 'table' or 'json'",
                other
            ))
        }
    }

    info!(
        nodes = metrics.node_count,
        edges = metrics.edge_count,
        "metrics command completed"
    );
    Ok(())
}

/// Truncate a hex address for compact table display.
fn truncate_address(address: &str) -> String {
    if address.len() > 14 {
        format!("{}…{}", &address[..8], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_addresses_only() {
        assert_eq!(
            truncate_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            "0xaaaaaa…aaaa"
        );
        assert_eq!(truncate_address("0xshort"), "0xshort");
    }
}
