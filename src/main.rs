use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use human_bytes::human_bytes;
use logging_timer::{stimer, timer};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use es_scroll::audit_builder::AuditedClient;
use es_scroll::conf::Config;
use es_scroll::debug_if;
use es_scroll::utils::progress_percent;
use es_scroll::{EsClient, HttpClient, ScrollSession};

#[derive(Parser, Debug)]
#[command(name = "es-scroll", version, about = "Export an index through the scroll API")]
struct Args {
    /// Config file (.toml or .json)
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,
    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,
    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
    /// Export every page instead of only reading the first one
    #[arg(short, long = "no-dry-run")]
    no_dry_run: bool,
    /// Stop after this many non-empty pages
    #[arg(long, value_name = "COUNT", value_parser = clap::value_parser!(u64).range(1..))]
    max_pages: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug, args.json_logs);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool, json_logs: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    info!("Application started!");
    info!(
        "Args debug={:?}, no-dry-run={:?}, config_path={:?}",
        args.debug, args.no_dry_run, args.config
    );

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config file with name {:?}", args.config))?;
    debug_if!(args.debug, "Config file loaded correctly ... {:#?}", config);

    let es_client = EsClient::from_endpoint(config.get_endpoint().clone())
        .context("Failed to build HTTP client")?;
    let prefix = format!("Source '{}'", es_client.get_endpoint().get_name());
    let server_info = es_client
        .print_server_info(&prefix)
        .await
        .context("Failed to read server info")?;
    if !server_info.supports_typed_search() {
        warn!(
            "Server version {} has no typed search endpoints, scroll requests may be rejected",
            server_info.get_version()
        );
    }

    let client: Arc<dyn HttpClient> = match config.get_audit_file_name() {
        Some(file_name) => Arc::new(AuditedClient::new(es_client, file_name).await),
        None => Arc::new(es_client),
    };

    let scroll = config.get_scroll();
    let mut session = ScrollSession::builder()
        .client(client)
        .page_size(scroll.get_page_size())
        .keep_alive(scroll.get_keep_alive())
        .mode(scroll.get_mode())
        .build()?;
    let query_body = scroll
        .build_query_body()
        .context("Invalid query or sort in config")?;
    session.init(scroll.get_index(), scroll.get_doc_type(), &query_body)?;

    let result = if args.no_dry_run {
        export(&mut session, config.get_output_file(), args.max_pages).await
    } else {
        dry_run(&mut session).await
    };

    if let Err(e) = session.clear().await {
        warn!("Scroll was not released on the server: {}", e);
    }
    result
}

async fn dry_run(session: &mut ScrollSession) -> anyhow::Result<()> {
    let page = session.start().await?;
    info!(
        "Dry run: total={:?}, first page={} docs, took={:?}ms",
        page.get_total_size(),
        page.get_current_size(),
        page.get_took()
    );
    Ok(())
}

async fn export(
    session: &mut ScrollSession,
    output: Option<&PathBuf>,
    max_pages: Option<u64>,
) -> anyhow::Result<()> {
    let mut writer: Box<dyn AsyncWrite + Unpin + Send> = match output {
        Some(path) => {
            let file = File::create(path)
                .await
                .with_context(|| format!("Failed to create output file {:?}", path))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(tokio::io::stdout())),
    };

    let mut page = {
        let _tmr = stimer!("SCROLL_START");
        session.start().await?
    };
    let total = page.get_total_size();
    let mut pages: u64 = 0;
    let mut docs: u64 = 0;
    let mut bytes: u64 = 0;

    while page.has_docs() {
        pages += 1;
        for doc in page.into_docs() {
            let line = serde_json::to_string(&doc)?;
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            bytes += line.len() as u64 + 1;
            docs += 1;
        }
        info!(
            pages,
            docs,
            progress = ?progress_percent(docs, total),
            "Page exported"
        );

        if max_pages.is_some_and(|max| pages >= max) {
            info!("Stopping after {} pages", pages);
            break;
        }
        page = {
            let _tmr = timer!("SCROLL_NEXT");
            session.next().await?
        };
    }
    writer.flush().await?;

    info!(
        "Exported {} docs in {} pages ({})",
        docs,
        pages,
        human_bytes(bytes as f64)
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_pages_must_be_positive() {
        let args = ["es-scroll", "--config", "scroll.toml", "--max-pages"];
        assert!(Args::try_parse_from(args.iter().copied().chain(["0"])).is_err());

        let parsed = Args::try_parse_from(args.iter().copied().chain(["1"])).unwrap();
        assert_eq!(parsed.max_pages, Some(1));
        let parsed = Args::try_parse_from(["es-scroll", "-c", "scroll.toml"]).unwrap();
        assert_eq!(parsed.max_pages, None);
    }
}
