use anyhow::Context;
use catalog_csv::entities::ReviewRules;
use catalog_csv::logging::init_logging;
use catalog_csv::{
    DiscardSink, ImportConfig, ImportDataRequest, ImportJob, ImportProgressInfo, ImporterRegistry,
};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("import")
        .about("Import a catalog CSV file and write an error report next to it")
        .arg(
            Arg::new("path")
                .long("path")
                .value_parser(clap::value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("data-type")
                .long("data-type")
                .help("PhysicalProduct or EditorialReview")
                .required(true),
        )
        .arg(Arg::new("delim").long("delim").default_value(";"))
        .arg(
            Arg::new("page-size")
                .long("page-size")
                .value_parser(clap::value_parser!(usize))
                .default_value("50"),
        )
        .arg(Arg::new("charset").long("charset").default_value("utf-8"))
        .arg(Arg::new("report-base-url").long("report-base-url"))
        .arg(
            Arg::new("language")
                .long("language")
                .help("Language accepted for editorial reviews (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .help("Only run pre-flight file validation")
                .action(ArgAction::SetTrue),
        )
        .arg(Arg::new("log").long("log").default_value("info"))
        .get_matches();

    init_logging(
        matches
            .get_one::<String>("log")
            .map(String::as_str)
            .unwrap_or("info"),
    );

    let path = matches
        .get_one::<PathBuf>("path")
        .context("--path is required")?;
    let data_type = matches
        .get_one::<String>("data-type")
        .context("--data-type is required")?;

    let delim = matches
        .get_one::<String>("delim")
        .map(String::as_str)
        .unwrap_or(";");
    let delimiter = match delim.as_bytes() {
        [b] => *b,
        [b'\\', b't'] => b'\t',
        _ => anyhow::bail!("delimiter must be a single byte, got {delim:?}"),
    };

    let mut config = ImportConfig::default()
        .with_page_size(matches.get_one::<usize>("page-size").copied().unwrap_or(50))
        .with_delimiter(delimiter);
    if let Some(label) = matches.get_one::<String>("charset") {
        config.dialect = config
            .dialect
            .clone()
            .with_charset_label(label)
            .with_context(|| format!("unknown charset {label:?}"))?;
    }
    config.report_base_url = matches.get_one::<String>("report-base-url").cloned();

    let mut rules = ReviewRules::default();
    if let Some(languages) = matches.get_many::<String>("language") {
        rules.languages = languages.cloned().collect();
    }

    let registry = ImporterRegistry::catalog(
        config,
        rules,
        Arc::new(DiscardSink),
        Arc::new(DiscardSink),
    );

    if registry.resolve(data_type).is_err() {
        anyhow::bail!(
            "unknown data type {data_type:?}, expected one of: {}",
            registry.data_types().join(", ")
        );
    }

    if matches.get_flag("check") {
        let problems = registry.resolve(data_type)?.validate_file(path).await?;
        println!("{}", serde_json::to_string(&problems)?);
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current page");
            on_ctrl_c.cancel();
        }
    });

    let mut print = |progress: &ImportProgressInfo| match serde_json::to_string(progress) {
        Ok(line) => println!("{line}"),
        Err(e) => warn!(error = %e, "progress snapshot not serializable"),
    };

    let request = ImportDataRequest::new(path.to_string_lossy(), data_type.as_str());
    let summary = ImportJob::new(registry)
        .run(&request, &mut print, &cancel)
        .await?;

    if !summary.errors.is_empty() {
        anyhow::bail!("import failed: {}", summary.errors.join("; "));
    }
    Ok(())
}
