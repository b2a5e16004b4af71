use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use inkboard::config::Config;
use inkboard::render::render_scene;
use inkboard::scene::{BoardScene, StrokeGroup, StrokePolygon};
use inkboard::tiles::StrokeFlatteningLayer;
use inkboard::touch::{ScreenLayout, ScreenPoint, TouchService};
use tiny_skia::{Color, PathBuilder, Pixmap, Transform};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "inkboard", version, about = "Whiteboard ink core tools")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the multitouch device and report contact sizes
    Touch(TouchArgs),
    /// Flatten a generated board into tiles and render it to PNG
    Flatten(FlattenArgs),
}

#[derive(Args, Debug)]
struct TouchArgs {
    /// Screen width in pixels
    #[arg(long, default_value_t = 1920)]
    width: u32,
    /// Screen height in pixels
    #[arg(long, default_value_t = 1080)]
    height: u32,
    /// Query point, defaults to the screen centre
    #[arg(long)]
    x: Option<f64>,
    #[arg(long)]
    y: Option<f64>,
    /// Query radius in pixels
    #[arg(long, default_value_t = 2000.0)]
    radius: f64,
    #[arg(long, default_value_t = 100)]
    interval_ms: u64,
}

#[derive(Args, Debug)]
struct FlattenArgs {
    /// Number of generated strokes
    #[arg(long, default_value_t = 40)]
    strokes: usize,
    /// Board extent in scene units
    #[arg(long, default_value_t = 4096.0)]
    extent: f32,
    /// Also sweep an eraser across the board
    #[arg(long)]
    erase: bool,
    /// Rebuild the tiles from the vector strokes before rendering
    #[arg(long)]
    rebuild: bool,
    /// Output image edge in pixels (the board is square)
    #[arg(long, default_value_t = 1024)]
    image_width: u32,
    #[arg(short, long, default_value = "board.png")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Touch(args) => touch(&config, args).await,
        Command::Flatten(args) => flatten(&config, &args),
    }
}

async fn touch(config: &Config, args: TouchArgs) -> anyhow::Result<()> {
    let service = TouchService::initialize(&config.touch, ScreenLayout::single(args.width, args.height));
    if !service.is_available() {
        info!("no multitouch device, nothing to watch");
        return Ok(());
    }
    let handle = service.handle();
    let point = ScreenPoint::new(
        args.x.unwrap_or(f64::from(args.width) / 2.0),
        args.y.unwrap_or(f64::from(args.height) / 2.0),
    );

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let contacts = handle.contacts();
                if contacts.is_empty() {
                    continue;
                }
                let size = handle.contact_size(point, args.radius);
                info!(contacts = contacts.len(), size, "contact size near ({}, {})", point.x, point.y);
                for (slot, contact) in contacts {
                    tracing::debug!(slot, ?contact);
                }
            }
        }
    }

    tokio::task::spawn_blocking(move || service.shutdown())
        .await
        .context("joining touch shutdown")?;
    Ok(())
}

/// A ribbon polygon of half-width `half` around a polyline.
fn ribbon(points: &[(f32, f32)], half: f32, fill: Color) -> StrokePolygon {
    let mut left = Vec::with_capacity(points.len());
    let mut right = Vec::with_capacity(points.len());
    for (i, &(x, y)) in points.iter().enumerate() {
        let (px, py) = points[i.saturating_sub(1)];
        let (nx, ny) = points[(i + 1).min(points.len() - 1)];
        let (dx, dy) = (nx - px, ny - py);
        let len = (dx * dx + dy * dy).sqrt().max(f32::EPSILON);
        let (ox, oy) = (-dy / len * half, dx / len * half);
        left.push((x + ox, y + oy));
        right.push((x - ox, y - oy));
    }
    right.reverse();
    left.extend(right);
    StrokePolygon::new(left, fill)
}

fn generated_stroke(index: usize, extent: f32) -> StrokeGroup {
    let t = index as f32;
    let y0 = (t * 97.0) % extent;
    let amplitude = 40.0 + (t * 13.0) % 120.0;
    let points: Vec<(f32, f32)> = (0..=64)
        .map(|i| {
            let x = i as f32 / 64.0 * extent;
            (x, y0 + (x / 180.0 + t).sin() * amplitude)
        })
        .collect();
    let shade = (index * 37 % 200) as u8;
    let fill = Color::from_rgba8(shade, 40, 255 - shade, 220);
    StrokeGroup::new(vec![ribbon(&points, 3.0 + (t * 7.0) % 9.0, fill)])
}

fn flatten(config: &Config, args: &FlattenArgs) -> anyhow::Result<()> {
    if args.extent <= 0.0 || args.image_width == 0 {
        bail!("extent and image width must be positive");
    }
    let mut scene = BoardScene::new();
    let mut layer = StrokeFlatteningLayer::new(&config.flatten);

    for index in 0..args.strokes {
        let group = scene.add_stroke(generated_stroke(index, args.extent), index as f32);
        layer.flatten_stroke(&mut scene, group);
    }
    info!(
        strokes = args.strokes,
        tiles = layer.tiles().len(),
        tile_size = layer.tile_size(),
        enabled = layer.is_enabled(),
        "flattened board"
    );

    if args.erase {
        let mut pb = PathBuilder::new();
        let step = args.extent / 32.0;
        for i in 0..32 {
            let c = i as f32 * step;
            pb.push_circle(c, c, step);
        }
        if let Some(eraser) = pb.finish() {
            layer.erase(&eraser);
        }
    }
    if args.rebuild {
        layer.rebuild(&mut scene);
    }

    let scale = args.image_width as f32 / args.extent;
    let mut target = Pixmap::new(args.image_width, args.image_width)
        .context("allocating output image")?;
    target.fill(Color::WHITE);
    render_scene(
        &scene,
        &layer,
        &mut target,
        Transform::from_scale(scale, scale),
        config.flatten.anti_alias,
    );
    target
        .save_png(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!(path = %args.out.display(), "board rendered");
    Ok(())
}
