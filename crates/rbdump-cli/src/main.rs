use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rbdump_core::report::Row;
use rbdump_core::{
	discover_profile_bins, CsvSink, DecodePolicy, DumpConfig, Dumper, HostFileSystem,
	JsonLinesSink, OutputEncoding, QuotePolicy, RowSink,
};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "rbdump", version, about = "Dump Windows Recycle Bin metadata as a report")]
struct Cli {
	/// Recycle bin folders to dump (e.g. C:\$Recycle.Bin\S-1-5-21-...)
	#[arg(required = true)]
	roots: Vec<PathBuf>,
	/// Report format
	#[arg(long, value_parser = ["csv", "jsonl"], default_value = "csv")]
	format: String,
	/// Text encoding of the csv report
	#[arg(long, value_parser = ["utf16le", "utf8"], default_value = "utf16le")]
	encoding: String,
	/// Quote values containing the separator
	#[arg(long, value_parser = ["never", "rfc4180"], default_value = "never")]
	quote: String,
	/// Longest row in characters; a longer row aborts the dump
	#[arg(long, default_value_t = rbdump_core::report::DEFAULT_ROW_CAPACITY)]
	row_capacity: usize,
	/// Emit a row with empty provenance for index files that fail to decode
	#[arg(long)]
	keep_undecodable: bool,
	/// Report hidden entries inside deleted folders
	#[arg(long)]
	include_hidden: bool,
	/// Do not descend into a directory twice (junction loops)
	#[arg(long)]
	guard_cycles: bool,
	/// Deepest level to list below a deleted folder
	#[arg(long)]
	max_depth: Option<usize>,
	/// Treat each root as a drive's $Recycle.Bin and dump every S-1-* folder in it
	#[arg(long)]
	all_profiles: bool,
	/// More log output on stderr (-v info, -vv debug, -vvv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

/// Ticks a spinner for every row passed through
struct ProgressSink<'a> {
	inner: &'a mut dyn RowSink,
	progress: ProgressBar,
	rows: u64,
}

impl RowSink for ProgressSink<'_> {
	fn write_header(&mut self, header: Row<'_>) -> io::Result<()> {
		self.inner.write_header(header)
	}

	fn write_row(&mut self, row: Row<'_>) -> io::Result<()> {
		self.rows += 1;
		if self.rows % 256 == 0 {
			self.progress.set_message(format!("{} rows", self.rows));
		}
		self.inner.write_row(row)
	}

	fn finish(&mut self) -> io::Result<()> {
		self.inner.finish()
	}
}

fn spinner() -> ProgressBar {
	let progress = ProgressBar::new_spinner();
	if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
		progress.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
	}
	progress.set_message("Reading recycle bin");
	progress.enable_steady_tick(Duration::from_millis(80));
	progress
}

fn init_logging(verbose: u8) {
	let level = match verbose {
		0 => Level::WARN,
		1 => Level::INFO,
		2 => Level::DEBUG,
		_ => Level::TRACE,
	};
	tracing_subscriber::fmt()
		.with_writer(io::stderr)
		.with_max_level(level)
		.init();
}

fn build_config(cli: &Cli) -> DumpConfig {
	DumpConfig {
		row_capacity: cli.row_capacity,
		quote_policy: match cli.quote.as_str() {
			"never" => QuotePolicy::Never,
			"rfc4180" => QuotePolicy::Rfc4180,
			_ => unreachable!(),
		},
		decode_policy: if cli.keep_undecodable {
			DecodePolicy::EmitBlank
		} else {
			DecodePolicy::Skip
		},
		skip_hidden: !cli.include_hidden,
		guard_cycles: cli.guard_cycles,
		max_depth: cli.max_depth,
		..Default::default()
	}
}

/// Expand drive-level `$Recycle.Bin` folders into their per-user folders
fn resolve_roots(host: &HostFileSystem, cli: &Cli) -> Vec<PathBuf> {
	if !cli.all_profiles {
		return cli.roots.clone();
	}

	let mut roots = Vec::new();
	for root in &cli.roots {
		match discover_profile_bins(host, root) {
			Ok(bins) if !bins.is_empty() => roots.extend(bins),
			Ok(_) => {
				tracing::warn!("No S-1-* folders in {}, dumping it as is", root.display());
				roots.push(root.clone());
			}
			Err(e) => {
				tracing::warn!("Cannot list {}: {}, dumping it as is", root.display(), e);
				roots.push(root.clone());
			}
		}
	}
	roots
}

fn dump(roots: &[PathBuf], config: &DumpConfig, sink: &mut dyn RowSink) -> Result<()> {
	let host = HostFileSystem;
	let mut dumper = Dumper::new(&host, config);
	let mut progress = ProgressSink {
		inner: sink,
		progress: spinner(),
		rows: 0,
	};

	for root in roots {
		progress.progress.set_message(root.display().to_string());
		dumper
			.dump_root(root, &mut progress)
			.with_context(|| format!("Failed to dump {}", root.display()))?;
	}
	progress.finish().context("Failed to flush report")?;

	let totals = dumper.totals();
	progress.progress.finish_and_clear();
	tracing::info!(
		"{} roots, {} index files ({} skipped), {} deleted files, {} deleted folders, {} rows",
		roots.len(),
		totals.index_files,
		totals.records_skipped,
		totals.deleted_files,
		totals.deleted_folders,
		totals.rows_emitted
	);
	Ok(())
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_logging(cli.verbose);

	let config = build_config(&cli);
	let roots = resolve_roots(&HostFileSystem, &cli);

	let stdout = io::stdout();
	let writer = BufWriter::new(stdout.lock());
	let mut sink: Box<dyn RowSink> = match cli.format.as_str() {
		"csv" => {
			let encoding = match cli.encoding.as_str() {
				"utf8" => OutputEncoding::Utf8,
				"utf16le" => OutputEncoding::Utf16Le,
				_ => unreachable!(),
			};
			Box::new(CsvSink::new(writer, encoding))
		}
		"jsonl" => Box::new(JsonLinesSink::new(writer)),
		_ => unreachable!(),
	};

	dump(&roots, &config, sink.as_mut())
}
