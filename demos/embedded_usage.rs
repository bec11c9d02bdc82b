//! Minimal embedding example for feedpipe-core
//!
//! This example demonstrates using feedpipe-core as a library: building
//! entries by hand, attaching lazy fields, snapshotting, rendering, and
//! driving the engine with a custom runner.

use async_trait::async_trait;
use feedpipe_core::traits::{DiagnosticLevel, TaskContext, TaskReport};
use feedpipe_core::{
    inject_entries, AppConfig, DiagnosticSink, Entry, EntryServices, ExecuteOptions,
    LazyResolver, PipelineEngine, Result, TaskConfig, TaskRunner, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Diagnostic sink that prints warnings and counts everything else
struct ConsoleSink {
    quiet: AtomicUsize,
}

impl DiagnosticSink for ConsoleSink {
    fn emit(&self, level: DiagnosticLevel, message: &str) {
        if level == DiagnosticLevel::Warning {
            println!("[Entry {}] {}", level, message);
        } else {
            self.quiet.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Runner that accepts everything and names a download file for it
struct FilenameRunner;

#[async_trait]
impl TaskRunner for FilenameRunner {
    async fn run_task(&self, task: &TaskContext, entries: Vec<Entry>) -> Result<TaskReport> {
        let mut report = TaskReport::new(&task.name);
        for mut entry in entries {
            let filename = entry.render("{{ title | downcase | replace: ' ', '.' }}.torrent")?;
            entry.set("filename", filename)?;
            entry.add_trace("filename", "set", "named download file");
            report.accepted.push(entry);
        }
        Ok(report)
    }

    fn runner_name(&self) -> &'static str {
        "filename"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn")
        .init();

    println!("=== Embedded feedpipe-core Example ===\n");

    // Entries with a custom diagnostic sink
    let sink = Arc::new(ConsoleSink {
        quiet: AtomicUsize::new(0),
    });
    let services = Arc::new(EntryServices::new().with_diagnostics(sink.clone()));

    println!("1. Building an entry...");
    let mut entry = Entry::with_services(services);
    entry.set("title", "Some Show S01E02 720p")?;
    entry.set("url", "http://example.com/some.show.s01e02")?;
    entry.set("imdb_url", "https://imdb.com/title/tt0944947/?ref_=x")?;
    println!("   {}", entry);
    println!("   imdb_url = {:?}", entry.get("imdb_url")?);

    println!("\n2. Lazy fields resolve on every read...");
    let lookups = Arc::new(AtomicUsize::new(0));
    let counter = lookups.clone();
    let resolver = LazyResolver::new("series_lookup", move |entry: &Entry, _field: &str| {
        counter.fetch_add(1, Ordering::SeqCst);
        let title = entry.get_opt("title")?;
        let name = title.as_str()?.split(" S0").next()?.to_string();
        Some(Value::from(name))
    });
    entry.register_lazy_fields(["series_name"], &resolver)?;
    println!("   series_name = {:?}", entry.get("series_name")?);
    println!("   series_name = {:?}", entry.get("series_name")?);
    println!("   resolver called {} times", lookups.load(Ordering::SeqCst));

    println!("\n3. Snapshots are deep copies...");
    entry.take_snapshot("before");
    entry.set("quality", "720p")?;
    if let Some(snapshot) = entry.snapshot("before") {
        for change in snapshot.diff(&entry) {
            println!("   {:?}", change);
        }
    }

    println!("\n4. Rendering...");
    println!("   {}", entry.render("{{ series_name }} [{{ quality }}]")?);

    println!("\n5. Running the engine with a custom runner...");
    let config = AppConfig::new().with_task("tv", TaskConfig::new().with_mock("Mock Show S02E01", "http://m"));
    let (engine, mut event_rx) = PipelineEngine::new(Box::new(FilenameRunner), config)?;

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("   [Event] {:?}", event);
        }
    });

    let summary = engine.execute(&ExecuteOptions::default()).await?;
    let injected = ExecuteOptions {
        inject: inject_entries(["Injected Show S09E09"])?,
        ..ExecuteOptions::default()
    };
    let injected_summary = engine.execute(&injected).await?;

    for report in summary.reports.iter().chain(&injected_summary.reports) {
        for accepted in &report.accepted {
            println!("   accepted: {} -> {:?}", accepted, accepted.get("filename")?);
        }
    }

    drop(engine);
    let _ = event_listener.await;

    println!("\n6. Done.");
    println!("   {} quiet diagnostics collected", sink.quiet.load(Ordering::Relaxed));
    println!("\n=== Embedding Successful ===");
    println!("Key Points:");
    println!("- Entries own their data; &mut is the only lock");
    println!("- Diagnostics, rendering and id parsing are injected services");
    println!("- The engine is driven entirely by the application");

    Ok(())
}
