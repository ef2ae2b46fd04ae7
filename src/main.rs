//! microview - compose microscopy images into dataset views.
//!
//! This binary builds datasets from file patterns or annotation tables and
//! either prints them as JSON or adds them to a project directory.

use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use microview::{
    build_dataset, materialize_view, probe_metadata,
    config::{BuildArgs, Cli, Command, FilesConfig, GroupArg, InfoConfig, TableConfig},
    config::{DEFAULT_IMAGE_GROUP, DEFAULT_LABEL_GROUP},
    detect_format, BuildContext, Dataset, FileSources, GroupOptions, ImageRegistry, LabelGroup,
    LocalImageOpener, ProjectWriter, SourceGroup, Table, VIEW_NAME,
};

type Registry = ImageRegistry<LocalImageOpener>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Files(config) => run_files(config).await,
        Command::Table(config) => run_table(config).await,
        Command::Info(config) => run_info(config).await,
    }
}

// =============================================================================
// Files Command
// =============================================================================

async fn run_files(config: FilesConfig) -> ExitCode {
    init_logging(config.build.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let registry = ImageRegistry::with_capacity(LocalImageOpener::new(), config.build.cache_images);
    let groups = match file_groups(&registry, &config).await {
        Ok(groups) => groups,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    finish(&registry, groups, &config.build).await
}

async fn file_groups(registry: &Registry, config: &FilesConfig) -> Result<Vec<FileSources>, String> {
    let options = group_options(&config.build, config.channel)?;
    let mut groups = Vec::new();

    for (i, arg) in config.images.iter().enumerate() {
        let name = arg.name_or(&default_group_name(DEFAULT_IMAGE_GROUP, i));
        let group = SourceGroup::from_pattern(registry, &name, &arg.value, &options)
            .await
            .map_err(|e| format!("Group '{}': {}", name, e))?;
        groups.push(FileSources::from(group));
    }

    for (i, arg) in config.labels.iter().enumerate() {
        let name = arg.name_or(&default_group_name(DEFAULT_LABEL_GROUP, i));
        let group = SourceGroup::from_pattern(registry, &name, &arg.value, &options)
            .await
            .map_err(|e| format!("Group '{}': {}", name, e))?;
        let mut labels = LabelGroup::new(group);
        if let Some(pattern) = &config.label_tables {
            labels = labels
                .with_label_table_pattern(pattern, options.root.as_deref())
                .map_err(|e| format!("Label tables of '{}': {}", name, e))?;
        }
        groups.push(FileSources::from(labels));
    }

    Ok(groups)
}

// =============================================================================
// Table Command
// =============================================================================

async fn run_table(config: TableConfig) -> ExitCode {
    init_logging(config.build.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let registry = ImageRegistry::with_capacity(LocalImageOpener::new(), config.build.cache_images);
    let groups = match table_groups(&registry, &config).await {
        Ok(groups) => groups,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    finish(&registry, groups, &config.build).await
}

async fn table_groups(registry: &Registry, config: &TableConfig) -> Result<Vec<FileSources>, String> {
    let table = Table::read(&config.table)
        .await
        .map_err(|e| format!("Cannot read {}: {}", config.table.display(), e))?;
    info!(
        "Read table '{}': {} row(s), {} column(s)",
        table.name(),
        table.row_count(),
        table.column_names().len()
    );

    let mut options = group_options(&config.build, config.channel)?;
    options.path_mapping = config.path_mapping.clone();

    let mut groups = Vec::new();
    for arg in &config.images {
        let group = table_group(registry, &table, arg, &options).await?;
        groups.push(FileSources::from(group));
    }
    for arg in &config.labels {
        let group = table_group(registry, &table, arg, &options).await?;
        groups.push(FileSources::from(LabelGroup::new(group)));
    }

    Ok(groups)
}

async fn table_group(
    registry: &Registry,
    table: &Table,
    arg: &GroupArg,
    options: &GroupOptions,
) -> Result<SourceGroup, String> {
    let name = arg.name_or(&arg.value);
    SourceGroup::from_table(registry, &name, table, &arg.value, options)
        .await
        .map_err(|e| format!("Group '{}': {}", name, e))
}

// =============================================================================
// Shared Build Steps
// =============================================================================

fn group_options(build: &BuildArgs, channel: Option<u32>) -> Result<GroupOptions, String> {
    let mut options = GroupOptions::default().with_grid_type(build.grid_type()?);
    if let Some(root) = &build.root {
        options = options.with_root(root.clone());
    }
    if let Some(channel) = channel {
        options = options.with_channel(channel);
    }
    Ok(options)
}

fn default_group_name(base: &str, index: usize) -> String {
    if index == 0 {
        base.to_string()
    } else {
        format!("{}_{}", base, index)
    }
}

/// Assemble the dataset and emit it as JSON or into a project.
async fn finish(registry: &Registry, groups: Vec<FileSources>, build: &BuildArgs) -> ExitCode {
    let Some(region_table) = groups.first().and_then(|g| g.group().region_table()).cloned() else {
        error!("No source groups were built");
        return ExitCode::FAILURE;
    };

    let dataset = match build_dataset(&groups, &region_table) {
        Ok(dataset) => dataset,
        Err(e) => {
            error!("Failed to build dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Built {} dataset with {} source(s)",
        if dataset.is_2d() { "2-D" } else { "3-D" },
        dataset.sources().len()
    );

    if build.verbose {
        log_layout(registry, &dataset).await;
    }

    if let (Some(project), Some(name)) = (&build.project, &build.dataset) {
        let writer = ProjectWriter::new(project);
        if let Err(e) = writer.add_dataset(name, dataset, build.add_method()).await {
            error!("Failed to add dataset '{}' to {}: {}", name, project.display(), e);
            return ExitCode::FAILURE;
        }
        info!("Wrote dataset '{}' to {}", name, writer.root().display());
        return ExitCode::SUCCESS;
    }

    let json = match dataset.to_json() {
        Ok(json) => json,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    match &build.output {
        Some(path) => {
            if let Err(e) = tokio::fs::write(path, json).await {
                error!("Failed to write {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
            info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }

    ExitCode::SUCCESS
}

/// Log where every image of the composed view ends up.
async fn log_layout(registry: &Registry, dataset: &Dataset) {
    let mut context = BuildContext::new();
    match materialize_view(registry, dataset, VIEW_NAME, None, &mut context).await {
        Ok(images) => {
            for name in context.sources() {
                debug!(
                    "  {}: {:?}",
                    name,
                    context.accumulated(name).to_row_major()
                );
            }
            debug!("Placed {} image(s) in view '{}'", images.len(), VIEW_NAME);
        }
        Err(e) => warn!("Could not lay out view '{}': {}", VIEW_NAME, e),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "microview=debug"
    } else {
        "microview=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Info Command
// =============================================================================

async fn run_info(config: InfoConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    let format = match detect_format(&config.path) {
        Ok(format) => format,
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let registry = ImageRegistry::new(LocalImageOpener::new());
    let metadata = match probe_metadata(&registry, &config.path, config.channel).await {
        Ok(metadata) => metadata,
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", config.path);
    println!("─────────────────");
    println!("  Format:      {}", format);
    println!(
        "  Shape:       {} x {} x {}",
        metadata.shape[0], metadata.shape[1], metadata.shape[2]
    );
    println!(
        "  Voxel size:  {} x {} x {} {}",
        metadata.voxel_size[0], metadata.voxel_size[1], metadata.voxel_size[2], metadata.unit
    );
    println!("  Channels:    {}", metadata.num_channels);
    match metadata.num_time_points {
        Some(t) => println!("  Timepoints:  {}", t),
        None => println!("  Timepoints:  unknown"),
    }
    println!("  Z-slices:    {}", metadata.num_z_slices);
    println!("  Color:       {}", metadata.color);
    if let Some([min, max]) = metadata.contrast_limits {
        println!("  Contrast:    {} - {}", min, max);
    }

    ExitCode::SUCCESS
}
