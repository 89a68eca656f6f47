// Copyright 2026 Corpus Probe Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod cli;
mod config;
mod load;
mod memory;
mod model;
mod output;
mod query;
mod scan;
mod sql;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::CommandFactory;
use clap::Parser;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::cli::Commands;
use crate::cli::ScanArgs;
use crate::cli::SearchArgs;
use crate::cli::TestArgs;
use crate::config::Backend;
use crate::config::ConfigCtx;
use crate::memory::MemoryWarehouse;
use crate::output::JsonResponse;
use crate::output::RecordOut;
use crate::output::SearchOut;
use crate::output::StatsOut;
use crate::output::print_json;
use crate::scan::ScanReport;
use crate::store::SqliteWarehouse;
use crate::store::StoreMode;
use crate::store::Warehouse;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let backend = cli.backend;
    match cli.command {
        Commands::Scan(args) => {
            let json = args.json;
            handle_result(cmd_scan(args), json)
        }
        Commands::Upload(args) => {
            let json = args.json;
            handle_result(cmd_upload(args, backend), json)
        }
        Commands::Search(args) => {
            let json = args.json;
            handle_result(cmd_search(args, backend), json)
        }
        Commands::Test(args) => {
            let json = args.json;
            handle_result(cmd_test(args, backend), json)
        }
        Commands::Stats { json } => handle_result(cmd_stats(backend, json), json),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "probe", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn handle_result(result: Result<()>, json: bool) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            if json {
                let resp = JsonResponse::error("error", &format!("{err:#}"));
                print_json(&resp)?;
                Ok(())
            } else {
                Err(err)
            }
        }
    }
}

fn open_store(
    ctx: &ConfigCtx,
    backend: Option<Backend>,
    mode: StoreMode,
) -> Result<Box<dyn Warehouse>> {
    match backend.unwrap_or(ctx.config.backend) {
        Backend::Sqlite => Ok(Box::new(SqliteWarehouse::open(&ctx.store_path(), mode)?)),
        Backend::Memory => {
            if matches!(mode, StoreMode::ReadOnly) {
                warn!("memory backend starts empty; it only holds data within a `probe test` run");
            }
            Ok(Box::new(MemoryWarehouse::new()))
        }
    }
}

fn scan_root(ctx: &ConfigCtx, dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| ctx.root.clone())
}

fn no_files_hint(ctx: &ConfigCtx) -> String {
    format!(
        "Make sure you have {} files",
        ctx.config.scan.extensions.join(", ")
    )
}

fn cmd_scan(args: ScanArgs) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let root = scan_root(&ctx, args.dir);
    let started = Instant::now();
    let report = scan::scan_directory(&root, &ctx.config.scan)?;

    if args.json {
        let mut stats = report.stats();
        stats.took_ms = started.elapsed().as_millis() as i64;
        let resp = JsonResponse::ok()
            .with_records(report.records.iter().map(RecordOut::from).collect())
            .with_stats(stats)
            .with_warnings(report.warnings);
        print_json(&resp)?;
    } else {
        print_found(&ctx, &root, &report);
    }
    Ok(())
}

fn print_found(ctx: &ConfigCtx, root: &std::path::Path, report: &ScanReport) {
    if report.records.is_empty() {
        println!("No suitable files found in {}", root.display());
        println!("{}", no_files_hint(ctx));
    } else {
        println!("Found {} files:", report.records.len());
        print!("{}", query::render_records(&report.records));
    }
    for warn in &report.warnings {
        eprintln!("warning: {warn}");
    }
}

fn cmd_upload(args: ScanArgs, backend: Option<Backend>) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let root = scan_root(&ctx, args.dir);
    let started = Instant::now();
    let report = scan::scan_directory(&root, &ctx.config.scan)?;
    if report.records.is_empty() {
        anyhow::bail!(
            "no suitable files found in {}; {}",
            root.display(),
            no_files_hint(&ctx)
        );
    }
    let mut store = open_store(&ctx, backend, StoreMode::ReadWrite)?;
    let table = ctx.config.table_ref();

    let Some(table) = load::upload_documents(store.as_mut(), &table, &report.records) else {
        anyhow::bail!("upload to {table} failed");
    };

    if args.json {
        let mut stats = report.stats();
        stats.took_ms = started.elapsed().as_millis() as i64;
        stats.uploaded = Some(report.records.len() as i64);
        let resp = JsonResponse::ok()
            .with_table(Some(table.to_string()))
            .with_records(report.records.iter().map(RecordOut::from).collect())
            .with_stats(stats)
            .with_warnings(report.warnings);
        print_json(&resp)?;
    } else {
        println!(
            "Uploaded {} documents to {}",
            report.records.len(),
            table
        );
        for warn in report.warnings {
            eprintln!("warning: {warn}");
        }
    }
    Ok(())
}

fn cmd_search(args: SearchArgs, backend: Option<Backend>) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = open_store(&ctx, backend, StoreMode::ReadOnly)?;
    let table = ctx.config.table_ref();
    let k = args.k.unwrap_or(ctx.config.scoring.default_k);

    let results =
        query::search_documents(store.as_ref(), &table, &args.query, k, &ctx.config.scoring);

    if args.json {
        let total = results.as_ref().map_or(0, Vec::len);
        let resp = JsonResponse::ok()
            .with_table(Some(table.to_string()))
            .with_search(SearchOut {
                query: args.query,
                k,
                results,
            })
            .with_stats(StatsOut {
                total_hits: total as i64,
                ..Default::default()
            });
        print_json(&resp)?;
    } else {
        print_search_results(results.as_deref());
    }
    Ok(())
}

fn print_search_results(results: Option<&[model::ResultRow]>) {
    match results {
        Some(rows) if !rows.is_empty() => print!("{}", query::render_results(rows)),
        _ => println!("   No results found"),
    }
}

fn cmd_test(args: TestArgs, backend: Option<Backend>) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let root = scan_root(&ctx, args.dir);
    let json = args.json;
    let k = args.k.unwrap_or(ctx.config.scoring.default_k);
    let queries = if args.queries.is_empty() {
        ctx.config.scoring.demo_queries.clone()
    } else {
        args.queries
    };
    let started = Instant::now();

    if !json {
        println!("Probing files in: {}", root.display());
        println!();
        println!("Loading files...");
    }
    let report = scan::scan_directory(&root, &ctx.config.scan)?;
    if report.records.is_empty() {
        if json {
            let resp = JsonResponse::error(
                "no_documents",
                &format!("no suitable files found in {}", root.display()),
            )
            .with_hint(&no_files_hint(&ctx))
            .with_warnings(report.warnings);
            print_json(&resp)?;
        } else {
            print_found(&ctx, &root, &report);
        }
        return Ok(());
    }
    if !json {
        print_found(&ctx, &root, &report);
        println!();
        println!("Uploading...");
    }

    let mut store = open_store(&ctx, backend, StoreMode::ReadWrite)?;
    let table = ctx.config.table_ref();
    let Some(table) = load::upload_documents(store.as_mut(), &table, &report.records) else {
        if json {
            let resp = JsonResponse::error("upload_failed", &format!("upload to {table} failed"))
                .with_warnings(report.warnings);
            print_json(&resp)?;
        } else {
            println!("Upload failed; skipping searches");
        }
        return Ok(());
    };
    if !json {
        println!("Uploaded {} documents to {}", report.records.len(), table);
        println!();
        println!("Running searches...");
    }

    let mut resp = JsonResponse::ok()
        .with_table(Some(table.to_string()))
        .with_records(report.records.iter().map(RecordOut::from).collect());
    let mut total_hits = 0usize;
    for text in queries {
        let results =
            query::search_documents(store.as_ref(), &table, &text, k, &ctx.config.scoring);
        total_hits += results.as_ref().map_or(0, Vec::len);
        if json {
            resp = resp.with_search(SearchOut {
                query: text,
                k,
                results,
            });
        } else {
            println!();
            println!("Searching for: '{text}'");
            print_search_results(results.as_deref());
        }
    }
    info!(
        documents = report.records.len(),
        hits = total_hits,
        "probe run complete"
    );

    if json {
        let mut stats = report.stats();
        stats.total_hits = total_hits as i64;
        stats.uploaded = Some(report.records.len() as i64);
        stats.took_ms = started.elapsed().as_millis() as i64;
        let resp = resp.with_stats(stats).with_warnings(report.warnings);
        print_json(&resp)?;
    } else {
        println!();
        println!("Probe complete: {} documents searchable in {}", report.records.len(), table);
    }
    Ok(())
}

fn cmd_stats(backend: Option<Backend>, json: bool) -> Result<()> {
    let ctx = ConfigCtx::load_from_cwd()?;
    let store = open_store(&ctx, backend, StoreMode::ReadOnly)?;
    let table = ctx.config.table_ref();
    let stats = store.table_stats(&table)?;

    if json {
        let resp = JsonResponse::ok()
            .with_table(Some(table.to_string()))
            .with_table_stats(stats);
        print_json(&resp)?;
        return Ok(());
    }

    match stats {
        Some(stats) => {
            println!("Table: {}", stats.table);
            println!("Rows: {}", stats.row_count);
            for (category, count) in &stats.categories {
                println!("  {category}: {count}");
            }
            if let Some(loaded_at) = &stats.loaded_at {
                println!("Loaded at: {loaded_at}");
            }
        }
        None => println!("Table {table} has not been loaded"),
    }
    Ok(())
}
