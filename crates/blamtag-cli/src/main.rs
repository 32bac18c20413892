use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use blamtag::batch::ConvertOptions;
use blamtag::deps::DependencyWalker;
use blamtag::header::TAG_HEADER_SIZE;
use blamtag::{
    checksum, convert_dir, verify_round_trip, Engine, FourCC, MigrationTable, ReadOptions, SchemaSet, Tag, TagCache,
    TagHeader, TagRef, WriteOptions,
};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::{parse_group, Config};

#[derive(Parser)]
#[command(name = "blamtag", about = "Read, convert and verify Blam engine tag files")]
struct Cli {
    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Path to a `blamtag.json`; searched upward from the working directory when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a tag file's header and checksum status.
    Info {
        file: PathBuf,
    },
    /// Print a tag file as JSON.
    Dump {
        file: PathBuf,
        /// Show angles in radians instead of degrees.
        #[arg(long)]
        radians: bool,
    },
    /// Convert a tag file, or every tag under a directory, to another generation.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Target engine marker: blam, ambl, LAMB, MLAB or BLM!. Defaults to the source's.
        #[arg(long)]
        engine: Option<Engine>,
        /// Keep stored layout versions instead of upgrading them.
        #[arg(long)]
        preserve_version: bool,
    },
    /// Read and rewrite every tag under a directory, reporting any byte differences.
    Verify {
        dir: PathBuf,
    },
    /// List the tags a tag transitively depends on.
    Deps {
        /// Tag path relative to the tags directory, without extension.
        path: String,
        /// Group code of the root tag (e.g. "shad").
        #[arg(value_parser = parse_group)]
        group: FourCC,
        /// Overrides `tags_dir` from the config.
        #[arg(long)]
        tags_dir: Option<PathBuf>,
        /// Bypass the on-disk cache.
        #[arg(long)]
        no_cache: bool,
    },
}

fn cmd_info(file: &Path) -> Result<()> {
    let data = std::fs::read(file).with_context(|| format!("failed to read tag: {}", file.display()))?;
    let header = TagHeader::parse(&data).with_context(|| format!("failed to parse header: {}", file.display()))?;
    let computed = checksum(&data[TAG_HEADER_SIZE..]);
    println!("Group:     {}", header.group);
    println!("Engine:    {}", header.engine);
    println!("Version:   {}", header.version);
    if !header.name.is_empty() {
        println!("Name:      {}", header.name);
    }
    println!("Body:      {} bytes", data.len() - TAG_HEADER_SIZE);
    if header.checksum == computed {
        println!("Checksum:  {:08x} (ok)", header.checksum);
    } else {
        println!("Checksum:  {:08x} (computed {computed:08x})", header.checksum);
    }
    Ok(())
}

fn cmd_dump(file: &Path, schemas: &SchemaSet, radians: bool) -> Result<()> {
    let opts = ReadOptions {
        angles_in_degrees: !radians,
    };
    let tag = Tag::read_file(file, schemas, &opts).with_context(|| format!("failed to read tag: {}", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&tag)?);
    Ok(())
}

fn cmd_convert(
    input: &Path,
    output: &Path,
    engine: Option<Engine>,
    preserve_version: bool,
    schemas: &SchemaSet,
    config: &Config,
) -> Result<()> {
    let migrations = MigrationTable::builtin();
    let migration_config = config.migration_config(preserve_version);

    if input.is_dir() {
        let Some(engine) = engine else {
            bail!("--engine is required when converting a directory");
        };
        let opts = ConvertOptions {
            engine,
            migrations: &migrations,
            config: migration_config,
        };
        let report = convert_dir(input, output, schemas, &opts);
        println!("{report}");
        if report.failed() > 0 {
            bail!("{} file(s) failed to convert", report.failed());
        }
        return Ok(());
    }

    let mut tag =
        Tag::read_file(input, schemas, &ReadOptions::default()).with_context(|| format!("failed to read tag: {}", input.display()))?;
    let group = schemas.get(tag.group())?;
    let migrated = migrations.run(&mut tag, group, &migration_config)?;
    let opts = WriteOptions {
        engine,
        ..WriteOptions::default()
    };
    tag.write_file(output, schemas, &opts)
        .with_context(|| format!("failed to write tag: {}", output.display()))?;
    info!(input = %input.display(), output = %output.display(), migrated, "converted");
    println!(
        "converted {} -> {}{}",
        input.display(),
        output.display(),
        if migrated { " (migrated)" } else { "" }
    );
    Ok(())
}

fn cmd_verify(dir: &Path, schemas: &SchemaSet) -> Result<()> {
    if !dir.is_dir() {
        bail!("not a directory: {}", dir.display());
    }
    let report = verify_round_trip(dir, schemas);
    println!("{report}");
    if !report.is_clean() {
        bail!(
            "{} mismatched, {} failed",
            report.mismatched(),
            report.failed()
        );
    }
    Ok(())
}

fn cmd_deps(
    path: &str,
    group: FourCC,
    tags_dir: Option<&Path>,
    no_cache: bool,
    schemas: &SchemaSet,
    config: &Config,
) -> Result<()> {
    let Some(tags_dir) = tags_dir.or(config.tags_dir.as_deref()) else {
        bail!("no tags directory: pass --tags-dir or set tags_dir in the config");
    };
    let migrations = MigrationTable::builtin();
    let mut walker = DependencyWalker::new(schemas, tags_dir).with_migrations(&migrations, config.migration_config(false));
    if let Some(groups) = config.dependency_groups()? {
        walker = walker.with_groups(groups);
    }
    if let (Some(cache_dir), false) = (&config.cache_dir, no_cache) {
        let cache = TagCache::open(cache_dir).with_context(|| format!("failed to open cache: {}", cache_dir.display()))?;
        walker = walker.with_cache(cache);
    }

    let report = walker.walk(&TagRef::new(group, path))?;
    for walked in &report.tags {
        let source = if walked.from_cache { " (cached)" } else { "" };
        println!("{} {}{source}", walked.tag.group(), walked.path);
    }
    for skipped in &report.skipped {
        println!("skipped {} {}: {:?}", skipped.group, skipped.path, skipped.reason);
    }
    for error in &report.errors {
        eprintln!("error: {error}");
    }
    if report.tags.is_empty() {
        bail!("root tag {path} ({group}) could not be loaded");
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cwd = std::env::current_dir().context("failed to get current directory")?;
    let config = Config::discover(cli.config.as_deref(), &cwd)?;
    let schemas = config.schema_set()?;

    match &cli.command {
        Command::Info { file } => cmd_info(file),
        Command::Dump { file, radians } => cmd_dump(file, &schemas, *radians),
        Command::Convert {
            input,
            output,
            engine,
            preserve_version,
        } => cmd_convert(input, output, *engine, *preserve_version, &schemas, &config),
        Command::Verify { dir } => cmd_verify(dir, &schemas),
        Command::Deps {
            path,
            group,
            tags_dir,
            no_cache,
        } => cmd_deps(path, *group, tags_dir.as_deref(), *no_cache, &schemas, &config),
    }
}
