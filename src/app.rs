//! Application logic behind the CLI.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cache;
use crate::cli::{Cli, Commands, ConfigArgs, GetArgs, InfoArgs, TilesArgs};
use crate::config::Config;
use crate::error::{ExitCode, RemoteError};
use crate::logging::init_logging;
use crate::manifest::CatalogEntry;
use crate::progress::Progress;
use crate::remote::RemoteData;
use crate::signal::install_handler;
use crate::tiles::Prefetch;

/// Run the command described by `cli`.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    log::debug!("Effective configuration: {config:?}");

    if let Commands::Config(args) = &cli.command {
        return show_config(&config, args);
    }

    let handler = install_handler().context("Failed to install signal handler")?;
    let remote = RemoteData::from_config(&config)?
        .with_shutdown(handler)
        .with_progress(Arc::new(Progress::new(cli.quiet)));

    match &cli.command {
        Commands::Get(args) => get(&remote, args),
        Commands::Tiles(args) => tiles(&remote, args),
        Commands::Refresh => refresh(&remote, config.offline),
        Commands::Clear(args) => {
            let removed = cache::clear(remote.layout(), args.target.into())?;
            if removed.is_empty() {
                log::info!("Nothing to remove");
            }
            Ok(ExitCode::Success)
        }
        Commands::Info(args) => info(&remote, args),
        Commands::Config(args) => show_config(&config, args),
    }
}

fn get(remote: &RemoteData, args: &GetArgs) -> Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();
    for name in &args.names {
        let path = remote
            .locate(name, args.placement.into())
            .with_context(|| format!("Cannot obtain {name}"))?;
        writeln!(stdout, "{}", path.display())?;
    }
    Ok(ExitCode::Success)
}

fn tiles(remote: &RemoteData, args: &TilesArgs) -> Result<ExitCode> {
    let request = remote.tiles_for(&args.name, &args.region)?;
    log::info!(
        "{} tile(s) cover {}{}",
        request.tiles.len(),
        request.region,
        if request.need_filler { ", filler needed" } else { "" }
    );

    let mut stdout = std::io::stdout().lock();
    if args.list_only {
        for tile in &request.tiles {
            writeln!(stdout, "{tile}")?;
        }
        return Ok(ExitCode::Success);
    }

    let summary = remote.grid_for_region(&args.name, &args.region, &Prefetch)?;
    for path in &summary.available {
        writeln!(stdout, "{}", path.display())?;
    }
    if !summary.missing.is_empty() {
        log::warn!("{} tile(s) could not be obtained", summary.missing.len());
        for tile in &summary.missing {
            log::debug!("Missing tile {tile}");
        }
    }
    Ok(ExitCode::Success)
}

fn refresh(remote: &RemoteData, offline: bool) -> Result<ExitCode> {
    let outcomes = remote.refresh_manifests();
    for (kind, outcome) in &outcomes {
        log::info!("{kind}: {outcome:?}");
    }
    if remote.session().network_disabled() && !offline {
        return Err(RemoteError::NetworkUnavailable(remote.layout().server_url().to_string()).into());
    }
    Ok(ExitCode::Success)
}

fn describe(entry: &CatalogEntry) -> String {
    let mut line = format!(
        "@{:<28} {:>4} {} {:>6}",
        entry.tag(),
        entry.inc,
        entry.registration,
        entry.size_label
    );
    if entry.is_tiled() {
        line.push_str(&format!("  tiles {}°", entry.tile_size));
    }
    if let Some(filler) = &entry.filler {
        line.push_str(&format!("  filler @{filler}"));
    }
    line
}

fn info(remote: &RemoteData, args: &InfoArgs) -> Result<ExitCode> {
    let catalog = remote
        .catalog()
        .ok_or_else(|| RemoteError::NetworkUnavailable("no catalog is available".to_string()))?;
    let mut stdout = std::io::stdout().lock();

    let Some(name) = &args.name else {
        for entry in catalog.entries() {
            writeln!(stdout, "{}", describe(entry))?;
        }
        return Ok(ExitCode::Success);
    };

    let entry = catalog.resolve(name).ok_or_else(|| RemoteError::NotFound {
        name: name.clone(),
        suggestion: catalog.suggest(name).map(str::to_string),
    })?;
    writeln!(stdout, "{}", describe(entry))?;
    writeln!(stdout, "  remote:   {}", remote.layout().url_for(&entry.remote_path()))?;
    writeln!(stdout, "  released: {}", entry.release_date)?;
    if let Some(coverage) = &entry.coverage {
        writeln!(stdout, "  coverage: @{coverage}")?;
    }
    writeln!(stdout, "  {}", entry.attribution)?;
    Ok(ExitCode::Success)
}

fn show_config(config: &Config, args: &ConfigArgs) -> Result<ExitCode> {
    if args.path {
        println!("{}", Config::config_path()?.display());
        return Ok(ExitCode::Success);
    }
    if args.save {
        let path = Config::config_path()?;
        config.save(&path)?;
        log::info!("Saved configuration to {}", path.display());
        return Ok(ExitCode::Success);
    }
    print!("{}", config.to_toml()?);
    Ok(ExitCode::Success)
}
