use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::io::{self, Write};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use csvview::cli::CliArgs;
use csvview::loader::{Loader, LoaderEvent, RowStatus};
use csvview::util::filename_for_display;
use csvview::LoaderConfig;

/// Upper bound on one wait for a refresh event before re-polling
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Poll a row until it leaves the loading state or `deadline` passes
fn fetch_row(
    loader: &Loader,
    events: &Receiver<LoaderEvent>,
    row: i64,
    deadline: Instant,
) -> Result<Option<Vec<String>>> {
    loop {
        match loader.get_row(row) {
            RowStatus::Ready { fields, .. } => return Ok(Some(fields)),
            RowStatus::OutOfRange => return Ok(None),
            RowStatus::Fatal(message) => bail!("Failed to index file: {}", message),
            RowStatus::Loading => {}
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!("Timed out waiting for row {}", row);
        }
        // Any event may mean new rows; a closed channel just falls back to polling
        let _ = events.recv_timeout(remaining.min(POLL_INTERVAL));
    }
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    csvview::tracing::init();

    let mut config = LoaderConfig::load();
    args.apply(&mut config);
    let config = config.validated();
    if args.save_config {
        config.save().map_err(|e| anyhow!(e))?;
    }

    let filename = filename_for_display(&args.path);
    let loader =
        Loader::open(&args.path, &config).map_err(|e| anyhow!(e.user_message(&filename)))?;

    for edit in &args.edits {
        loader.set_edit(edit.row, edit.col, edit.value.clone());
    }

    let timeout = Duration::from_millis(args.timeout_ms);
    if args.wait_index && !loader.wait_for_index(timeout) {
        tracing::warn!("Index of {} not complete after {:?}", filename, timeout);
    }

    let events = loader.subscribe();
    let mut out = csv::WriterBuilder::new()
        .delimiter(loader.delimiter().byte())
        .flexible(true)
        .from_writer(io::stdout().lock());

    for offset in 0..args.count {
        let row = args.from.saturating_add(offset as i64);
        let deadline = Instant::now() + timeout;
        match fetch_row(&loader, &events, row, deadline)? {
            Some(fields) => out
                .write_record(&fields)
                .with_context(|| format!("Failed to write row {}", row))?,
            None => break,
        }
    }
    out.flush()?;
    drop(out);

    if args.status {
        let status = serde_json::to_string_pretty(&loader.status())?;
        writeln!(io::stdout(), "{}", status)?;
    }

    loader.close();
    Ok(())
}
