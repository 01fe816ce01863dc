use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use imgsweep::collector::{compile_filters, Collector};
use imgsweep::data;
use imgsweep::downloader::names;
use imgsweep::{ChannelSink, Engine, EngineConfig, Event, FsSaver, HttpNet, SaveRequest};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = cli::Cli::parse();
    let settings = data::load_settings();

    let deep = args.deep.unwrap_or(settings.deep).min(3);
    let timeout = Duration::from_secs(args.timeout.unwrap_or(settings.timeout_secs));
    let page = Url::parse(&args.url).context("invalid page url")?;

    let pattern = args
        .filter
        .clone()
        .or_else(|| data::filter_for(&settings, page.as_str()).map(str::to_string));
    let filters = match &pattern {
        Some(p) => compile_filters(std::slice::from_ref(p)),
        None => None,
    };

    let net = Arc::new(HttpNet::new(&settings.user_agent, timeout));
    let (base, html) = net
        .fetch_text(page.as_str())
        .await
        .context("page fetch failed")?;
    info!(url = %base, deep, "scanning");

    let (sink, mut rx) = ChannelSink::channel();
    let token = CancellationToken::new();
    let scan_net = net.clone();
    let scan = tokio::spawn(async move {
        let collector = Collector::new(scan_net, Arc::new(sink), deep, filters, token);
        collector.run(&base, &html).await;
    });

    let mut images = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            Event::LinkCount { total } => info!(total, "links queued"),
            Event::Batch {
                images: batch,
                index,
            } => {
                info!(found = batch.len(), of = index, "batch classified");
                images.extend(batch);
            }
            _ => {}
        }
    }
    scan.await?;
    info!(count = images.len(), "scan complete");

    if args.dry_run {
        for img in &images {
            println!("{}\t{}\t{}", img.r#type, img.size, img.src);
        }
        return Ok(());
    }
    if images.is_empty() {
        info!("nothing to download");
        return Ok(());
    }

    names::assign(&mut images);
    let host = page.host_str().unwrap_or("page").to_string();
    let (zip, filename) = match &args.zip {
        Some(name) => (true, name.clone()),
        // individual files land under the host's directory
        None => (false, format!("{host}/archive.zip")),
    };
    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| settings.default_download_dir.clone());

    let (sink, mut rx) = ChannelSink::channel();
    let engine = Engine::new(
        net,
        Arc::new(FsSaver::new(dir)),
        Arc::new(sink),
        EngineConfig {
            settle: Duration::from_millis(settings.settle_ms),
            grace: Duration::from_millis(settings.grace_ms),
            record_history: true,
        },
    );
    engine.save(0, SaveRequest {
        images,
        zip,
        filename,
        save_as: false,
    });
    while let Some(event) = rx.recv().await {
        match event {
            Event::Progress { remaining } => info!(remaining, "downloading"),
            Event::Notice { message } => info!("{message}"),
            Event::Close { .. } => break,
            _ => {}
        }
    }
    Ok(())
}
