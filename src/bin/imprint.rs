//! CLI binary for imprint.
//!
//! A thin shim over the library crate that maps flags and the optional JSON
//! layout to `ComposeConfig` and reports results.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use imprint::pipeline::encode::png_data_uri;
use imprint::{
    generate_batch_to_file, generate_county_batch_to_file, generate_png, inspect_shapefile,
    write_individual, write_png, Assets, BatchOutput, BatchProgressCallback, ColorKey,
    ComposeConfig, CountyConfig, HexColor, ProgressCallback, TextAlign,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress bar with one log line per generated or skipped image.
struct CliProgressCallback {
    bar: ProgressBar,
    skipped: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            skipped: AtomicUsize::new(0),
        })
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Generating");
    }

    fn on_image_complete(&self, index: usize, total: usize, file_name: &str, png_len: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<24}  {}",
            green("✓"),
            index,
            total,
            file_name,
            dim(&format!("{:.1} KiB", png_len as f64 / 1024.0)),
        ));
        self.bar.inc(1);
    }

    fn on_line_skipped(&self, line: usize, reason: &str) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
        self.bar
            .println(format!("  {} line {:>3}  {}", red("✗"), line, red(reason)));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, generated: usize) {
        self.bar.finish_and_clear();
        let skipped = self.skipped.load(Ordering::SeqCst);
        if skipped == 0 {
            eprintln!("{} {} images generated", green("✔"), bold(&generated.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images generated  ({} skipped)",
                if generated == 0 { red("✘") } else { cyan("⚠") },
                bold(&generated.to_string()),
                total,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # One image, text only
  imprint single --template card.png --font DejaVuSans.ttf --text "Acme Corp\nSpringfield" -o acme.png

  # One image with a logo
  imprint single --template card.png --font DejaVuSans.ttf --overlay logo.png \
      --use-overlay logo.png --text "Acme Corp" -o acme.png

  # Batch: one image per line, packaged as a ZIP
  imprint batch --template card.png --font DejaVuSans.ttf \
      --overlay logo.png,star.png --input lines.txt -o images.zip

  # County maps for California
  imprint counties --template card.png --font DejaVuSans.ttf \
      --shapefile tl_2023_us_county.zip --state 06 -o ca.zip

  # Which states does a shapefile cover?
  imprint states --shapefile tl_2023_us_county.zip

BATCH LINE FORMAT:
  filename | text line 1 | text line 2 | ... | overlay_name (optional)

  The last field selects an overlay only if it matches a loaded overlay's
  file name exactly; otherwise it is another text line.

LAYOUT FILE:
  --layout takes a JSON file with any subset of:
    { "overlay": { "x": 400, "y": 1060, "max_width": 225, "max_height": 175 },
      "text": { "x": 650, "y": 1075, "font_size": 54, "line_spacing": 6,
                "align": "center", "color": "#2B4396" },
      "trim_whitespace": true, "center_overlay": true,
      "analyze_whitespace": false,
      "color_key": { "color": "#FFFFFF", "threshold": 30 } }
  Flags override values from the file.

ENVIRONMENT VARIABLES:
  IMPRINT_LAYOUT, IMPRINT_TEMPLATE, IMPRINT_FONT, IMPRINT_OVERLAYS,
  IMPRINT_SHAPEFILE, IMPRINT_STATE, IMPRINT_OUTPUT and one IMPRINT_* per flag.
  RUST_LOG overrides the log filter.
"##;

/// Stamp text, logos and county maps onto a template image.
#[derive(Parser, Debug)]
#[command(
    name = "imprint",
    version,
    about = "Stamp text, logos and county maps onto a template image",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// JSON layout file (overlay box, text style, trimming).
    #[arg(long, global = true, env = "IMPRINT_LAYOUT")]
    layout: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "IMPRINT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "IMPRINT_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "IMPRINT_NO_PROGRESS")]
    no_progress: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one image.
    Single(SingleArgs),
    /// Generate one image per input line and package them as a ZIP.
    Batch(BatchArgs),
    /// Generate one county map image per county of a state.
    Counties(CountiesArgs),
    /// List the state codes in a county shapefile.
    States(StatesArgs),
}

#[derive(Args, Debug)]
struct AssetArgs {
    /// Template image (PNG or JPEG).
    #[arg(long, env = "IMPRINT_TEMPLATE")]
    template: PathBuf,

    /// TrueType/OpenType font; required when drawing text.
    #[arg(long, env = "IMPRINT_FONT")]
    font: Option<PathBuf>,

    /// Overlay images; referenced by file name. Repeat or comma-separate.
    #[arg(long = "overlay", env = "IMPRINT_OVERLAYS", value_delimiter = ',')]
    overlays: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct LayoutArgs {
    /// Overlay box left edge.
    #[arg(long, env = "IMPRINT_OVERLAY_X", allow_negative_numbers = true)]
    overlay_x: Option<i64>,

    /// Overlay box top edge.
    #[arg(long, env = "IMPRINT_OVERLAY_Y", allow_negative_numbers = true)]
    overlay_y: Option<i64>,

    /// Overlay box width.
    #[arg(long, env = "IMPRINT_OVERLAY_WIDTH")]
    overlay_width: Option<u32>,

    /// Overlay box height.
    #[arg(long, env = "IMPRINT_OVERLAY_HEIGHT")]
    overlay_height: Option<u32>,

    /// Keep transparent borders around overlays.
    #[arg(long, env = "IMPRINT_NO_TRIM")]
    no_trim: bool,

    /// Put overlays at the box origin instead of centering them.
    #[arg(long, env = "IMPRINT_NO_CENTER")]
    no_center: bool,

    /// Report how much of the overlay box is blank.
    #[arg(long, env = "IMPRINT_ANALYZE_WHITESPACE")]
    analyze_whitespace: bool,

    /// Make overlay pixels near this color transparent (e.g. "#FFFFFF").
    #[arg(long, env = "IMPRINT_REMOVE_COLOR")]
    remove_color: Option<HexColor>,

    /// RGB distance below which --remove-color applies.
    #[arg(long, env = "IMPRINT_COLOR_THRESHOLD", default_value_t = 30.0)]
    color_threshold: f32,

    /// Text block left edge.
    #[arg(long, env = "IMPRINT_TEXT_X", allow_negative_numbers = true)]
    text_x: Option<i32>,

    /// Text block top edge.
    #[arg(long, env = "IMPRINT_TEXT_Y", allow_negative_numbers = true)]
    text_y: Option<i32>,

    /// Font em size in pixels (10–200).
    #[arg(long, env = "IMPRINT_FONT_SIZE")]
    font_size: Option<f32>,

    /// Extra pixels between lines (0–50).
    #[arg(long, env = "IMPRINT_LINE_SPACING")]
    line_spacing: Option<u32>,

    /// Line alignment: left, center, right.
    #[arg(long, env = "IMPRINT_ALIGN")]
    align: Option<TextAlign>,

    /// Text color, "#RRGGBB".
    #[arg(long, env = "IMPRINT_COLOR")]
    color: Option<HexColor>,
}

#[derive(Args, Debug)]
struct SingleArgs {
    #[command(flatten)]
    assets: AssetArgs,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Text to draw; "\n" starts a new line.
    #[arg(long, env = "IMPRINT_TEXT", default_value = "")]
    text: String,

    /// Name of a loaded overlay to composite (e.g. logo.png).
    #[arg(long, env = "IMPRINT_USE_OVERLAY")]
    use_overlay: Option<String>,

    /// Output PNG path.
    #[arg(short, long, env = "IMPRINT_OUTPUT")]
    output: Option<PathBuf>,

    /// Print JSON (PNG data URI + whitespace report) to stdout.
    #[arg(long, env = "IMPRINT_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[command(flatten)]
    assets: AssetArgs,

    #[command(flatten)]
    layout: LayoutArgs,

    /// File with one "filename | text | ... | overlay" line per image; "-" for stdin.
    #[arg(short, long, env = "IMPRINT_INPUT")]
    input: PathBuf,

    /// Output ZIP path.
    #[arg(short, long, env = "IMPRINT_OUTPUT", default_value = "generated_images.zip")]
    output: PathBuf,

    /// Also write each PNG into this directory.
    #[arg(long, env = "IMPRINT_INDIVIDUAL_DIR")]
    individual_dir: Option<PathBuf>,

    /// Print the batch summary as JSON to stdout.
    #[arg(long, env = "IMPRINT_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct CountiesArgs {
    #[command(flatten)]
    assets: AssetArgs,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Zipped county shapefile (.shp + .dbf).
    #[arg(long, env = "IMPRINT_SHAPEFILE")]
    shapefile: PathBuf,

    /// State code as stored in the shapefile (e.g. 06).
    #[arg(long, env = "IMPRINT_STATE")]
    state: String,

    /// Output ZIP path.
    #[arg(short, long, env = "IMPRINT_OUTPUT", default_value = "county_images.zip")]
    output: PathBuf,

    /// Text per image; {name}, {id} and {state} are replaced.
    #[arg(long, env = "IMPRINT_TEXT_PATTERN", default_value = "{name} County")]
    text_pattern: String,

    /// File name per image, same placeholders.
    #[arg(long, env = "IMPRINT_NAME_PATTERN", default_value = "{name}")]
    name_pattern: String,

    #[command(flatten)]
    map: MapArgs,

    /// Also write each PNG into this directory.
    #[arg(long, env = "IMPRINT_INDIVIDUAL_DIR")]
    individual_dir: Option<PathBuf>,

    /// Print the batch summary as JSON to stdout.
    #[arg(long, env = "IMPRINT_JSON")]
    json: bool,
}

#[derive(Args, Debug)]
struct MapArgs {
    /// Rendered map width before fitting into the overlay box.
    #[arg(long, env = "IMPRINT_MAP_WIDTH", default_value_t = 900)]
    map_width: u32,

    /// Rendered map height before fitting into the overlay box.
    #[arg(long, env = "IMPRINT_MAP_HEIGHT", default_value_t = 700)]
    map_height: u32,

    /// Fill for the highlighted county.
    #[arg(long, env = "IMPRINT_HIGHLIGHT", default_value = "#2B4396")]
    highlight: HexColor,

    /// Fill for the other counties.
    #[arg(long, env = "IMPRINT_BASE_FILL", default_value = "#D9D9D9")]
    base_fill: HexColor,

    /// County outline color.
    #[arg(long, env = "IMPRINT_OUTLINE", default_value = "#FFFFFF")]
    outline: HexColor,

    /// Skip county outlines.
    #[arg(long, env = "IMPRINT_NO_OUTLINE")]
    no_outline: bool,

    #[command(flatten)]
    fields: FieldArgs,
}

#[derive(Args, Debug)]
struct FieldArgs {
    /// .dbf column holding the county id.
    #[arg(long, env = "IMPRINT_ID_FIELD", default_value = "GEOID")]
    id_field: String,

    /// .dbf column holding the county name.
    #[arg(long, env = "IMPRINT_NAME_FIELD", default_value = "NAME")]
    name_field: String,

    /// .dbf column holding the state code.
    #[arg(long, env = "IMPRINT_STATE_FIELD", default_value = "STATEFP")]
    state_field: String,
}

#[derive(Args, Debug)]
struct StatesArgs {
    /// Zipped county shapefile (.shp + .dbf).
    #[arg(long, env = "IMPRINT_SHAPEFILE")]
    shapefile: PathBuf,

    #[command(flatten)]
    fields: FieldArgs,

    /// Print JSON instead of a table.
    #[arg(long, env = "IMPRINT_JSON")]
    json: bool,
}

/// `--json` payload for `single`.
#[derive(Serialize)]
struct SingleJson<'a> {
    output: Option<&'a Path>,
    png_bytes: usize,
    whitespace: Option<imprint::WhitespaceReport>,
    data_uri: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs for batch runs; -v restores them.
    let json = match &cli.command {
        Command::Single(a) => a.json,
        Command::Batch(a) => a.json,
        Command::Counties(a) => a.json,
        Command::States(a) => a.json,
    };
    let is_batch = matches!(cli.command, Command::Batch(_) | Command::Counties(_));
    let show_progress = is_batch && !cli.quiet && !cli.no_progress && !json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    match &cli.command {
        Command::Single(args) => run_single(&cli, args).await,
        Command::Batch(args) => run_batch(&cli, args, progress_cb).await,
        Command::Counties(args) => run_counties(&cli, args, progress_cb).await,
        Command::States(args) => run_states(args).await,
    }
}

async fn run_single(cli: &Cli, args: &SingleArgs) -> Result<()> {
    let config = build_config(cli.layout.as_deref(), &args.layout, None)?;
    let assets = load_assets(&args.assets).await?;
    let text = args.text.replace("\\n", "\n");

    let (png, whitespace) = {
        let use_overlay = args.use_overlay.clone();
        tokio::task::spawn_blocking(move || {
            generate_png(&assets, &text, use_overlay.as_deref(), &config)
        })
        .await
        .context("Compose task panicked")?
        .context("Image generation failed")?
    };

    let output = match (&args.output, args.json) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => None,
        (None, false) => Some(PathBuf::from("generated_image.png")),
    };
    if let Some(ref path) = output {
        write_png(path, &png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if args.json {
        let payload = SingleJson {
            output: output.as_deref(),
            png_bytes: png.len(),
            whitespace,
            data_uri: png_data_uri(&png),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&payload).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        if let Some(ref path) = output {
            eprintln!(
                "{}  {}  {}",
                green("✔"),
                bold(&path.display().to_string()),
                dim(&format!("{} bytes", png.len()))
            );
        }
        if let Some(report) = whitespace {
            print_whitespace(&report);
        }
    }
    Ok(())
}

async fn run_batch(cli: &Cli, args: &BatchArgs, progress: Option<ProgressCallback>) -> Result<()> {
    let config = build_config(cli.layout.as_deref(), &args.layout, progress)?;
    let assets = load_assets(&args.assets).await?;
    let input = read_lines_input(&args.input).await?;

    let output = generate_batch_to_file(&input, &assets, &args.output, &config)
        .await
        .context("Batch generation failed")?;

    finish_batch(cli, &output, &args.output, args.individual_dir.as_deref(), args.json)
}

async fn run_counties(
    cli: &Cli,
    args: &CountiesArgs,
    progress: Option<ProgressCallback>,
) -> Result<()> {
    let config = build_config(cli.layout.as_deref(), &args.layout, progress)?;
    let assets = load_assets(&args.assets).await?;
    let shapefile = tokio::fs::read(&args.shapefile)
        .await
        .with_context(|| format!("Failed to read shapefile {}", args.shapefile.display()))?;

    let county_config = CountyConfig {
        fields: county_fields(&args.map.fields),
        map: imprint::MapStyle {
            width: args.map.map_width,
            height: args.map.map_height,
            base_fill: args.map.base_fill,
            highlight_fill: args.map.highlight,
            outline: (!args.map.no_outline).then_some(args.map.outline),
            ..imprint::MapStyle::default()
        },
        text_pattern: args.text_pattern.clone(),
        name_pattern: args.name_pattern.clone(),
    };

    let output = generate_county_batch_to_file(
        shapefile,
        &args.state,
        &assets,
        &args.output,
        &config,
        &county_config,
    )
    .await
    .context("County generation failed")?;

    finish_batch(cli, &output, &args.output, args.individual_dir.as_deref(), args.json)
}

async fn run_states(args: &StatesArgs) -> Result<()> {
    let shapefile = tokio::fs::read(&args.shapefile)
        .await
        .with_context(|| format!("Failed to read shapefile {}", args.shapefile.display()))?;
    let county_config = CountyConfig {
        fields: county_fields(&args.fields),
        ..CountyConfig::default()
    };
    let states = tokio::task::spawn_blocking(move || inspect_shapefile(&shapefile, &county_config))
        .await
        .context("Shapefile task panicked")?
        .context("Failed to inspect shapefile")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&states).context("Failed to serialise states")?
        );
    } else {
        println!("State  Counties");
        for s in &states {
            println!("{:<6} {:>8}", s.state, s.counties);
        }
    }
    Ok(())
}

/// Shared tail of `batch` and `counties`: individual files, JSON, summary.
fn finish_batch(
    cli: &Cli,
    output: &BatchOutput,
    zip_path: &Path,
    individual_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    if let Some(dir) = individual_dir {
        write_individual(output, dir)
            .with_context(|| format!("Failed to write images to {}", dir.display()))?;
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(output).context("Failed to serialise output")?
        );
        return Ok(());
    }

    if !cli.quiet {
        let s = &output.stats;
        eprintln!(
            "{}  {}/{} images  {}ms  →  {}",
            if s.skipped == 0 { green("✔") } else { cyan("⚠") },
            s.generated,
            s.total_lines,
            s.duration_ms,
            bold(&zip_path.display().to_string()),
        );
        for image in &output.images {
            if let Some(report) = image.whitespace {
                eprint!("   {}: ", image.file_name);
                print_whitespace(&report);
            }
        }
    }
    Ok(())
}

fn print_whitespace(report: &imprint::WhitespaceReport) {
    eprintln!(
        "whitespace {:.1}%  original {}x{}  trimmed {}x{}  final {}x{}",
        report.whitespace_pct,
        report.original_size.0,
        report.original_size.1,
        report.trimmed_size.0,
        report.trimmed_size.1,
        report.final_size.0,
        report.final_size.1,
    );
}

/// Load template, font and overlays without blocking the runtime.
async fn load_assets(args: &AssetArgs) -> Result<Assets> {
    let template = args.template.clone();
    let font = args.font.clone();
    let overlays = args.overlays.clone();
    tokio::task::spawn_blocking(move || Assets::load(&template, font.as_deref(), &overlays))
        .await
        .context("Asset loading task panicked")?
        .context("Failed to load assets")
}

async fn read_lines_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read batch lines from stdin")?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read batch lines from {}", path.display()))
}

fn county_fields(args: &FieldArgs) -> imprint::CountyFields {
    imprint::CountyFields {
        id: args.id_field.clone(),
        name: args.name_field.clone(),
        state: args.state_field.clone(),
    }
}

/// Layout file (or defaults), then flag overrides, then validation.
fn build_config(
    layout: Option<&Path>,
    args: &LayoutArgs,
    progress: Option<ProgressCallback>,
) -> Result<ComposeConfig> {
    let base = match layout {
        Some(path) => ComposeConfig::from_json_file(path)
            .with_context(|| format!("Failed to load layout {}", path.display()))?,
        None => ComposeConfig::default(),
    };

    let o = base.overlay;
    let t = base.text;
    let mut builder = base
        .to_builder()
        .overlay_box(
            args.overlay_x.unwrap_or(o.x),
            args.overlay_y.unwrap_or(o.y),
            args.overlay_width.unwrap_or(o.max_width),
            args.overlay_height.unwrap_or(o.max_height),
        )
        .text_position(args.text_x.unwrap_or(t.x), args.text_y.unwrap_or(t.y));

    if args.no_trim {
        builder = builder.trim_whitespace(false);
    }
    if args.no_center {
        builder = builder.center_overlay(false);
    }
    if args.analyze_whitespace {
        builder = builder.analyze_whitespace(true);
    }
    if let Some(color) = args.remove_color {
        if args.color_threshold < 0.0 {
            bail!("--color-threshold must be ≥ 0, got {}", args.color_threshold);
        }
        builder = builder.color_key(ColorKey {
            color,
            threshold: args.color_threshold,
        });
    }
    if let Some(px) = args.font_size {
        builder = builder.font_size(px);
    }
    if let Some(px) = args.line_spacing {
        builder = builder.line_spacing(px);
    }
    if let Some(align) = args.align {
        builder = builder.align(align);
    }
    if let Some(color) = args.color {
        builder = builder.text_color(color);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
