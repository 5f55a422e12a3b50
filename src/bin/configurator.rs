use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use configurator::{
    ChangeFrameOpts, Configurator, ConfiguratorOpts, DirUrlResolver, Event, FsImageSource,
    ImageSource, ManualClock, ProductSpec, RendererKind,
};
use tracing_subscriber::EnvFilter;

const TICK_MS: f64 = 5.0;
const MAX_TICKS: usize = 200_000;

#[derive(Parser, Debug)]
#[command(name = "configurator", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Animate a frame change and write one PNG per drawn frame.
    Spin(SpinArgs),
    /// Print the part under a point of a frame's index mask.
    Pick(PickArgs),
}

#[derive(Parser, Debug)]
struct SpinArgs {
    /// Product description JSON.
    #[arg(long)]
    product: PathBuf,

    /// Directory holding `frames/` and `masks/`.
    #[arg(long)]
    frames: PathBuf,

    /// Output directory for the drawn frames.
    #[arg(long)]
    out: PathBuf,

    /// Target frame; defaults to the opposite side of the start view.
    #[arg(long)]
    to: Option<String>,

    /// Duration of a full turn in milliseconds.
    #[arg(long)]
    revolution_ms: Option<f64>,

    /// Duration of one rotation step in milliseconds.
    #[arg(long)]
    step_ms: Option<f64>,

    /// Square surface size in pixels.
    #[arg(long, default_value_t = 256)]
    size: u32,
}

#[derive(Parser, Debug)]
struct PickArgs {
    /// Product description JSON.
    #[arg(long)]
    product: PathBuf,

    /// Directory holding `frames/` and `masks/`.
    #[arg(long)]
    frames: PathBuf,

    /// Frame to test (`side-3`, `top`, ...).
    #[arg(long)]
    frame: String,

    #[arg(long)]
    x: f64,

    #[arg(long)]
    y: f64,

    /// Displayed square size the coordinates refer to.
    #[arg(long, default_value_t = 256)]
    size: u32,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Spin(args) => cmd_spin(args),
        Command::Pick(args) => cmd_pick(args),
    }
}

struct Simulation {
    cfg: Configurator<FsImageSource>,
    clock: ManualClock,
    events: Receiver<Event>,
}

impl Simulation {
    fn new(product: &Path, frames: &Path, size: u32, kind: RendererKind) -> anyhow::Result<Self> {
        let product = ProductSpec::from_path(product)?;
        let opts = ConfiguratorOpts {
            size: Some(size),
            max_size: size,
            pixel_ratio: 1.0,
            ..ConfiguratorOpts::default()
        };
        let clock = ManualClock::new(0.0);
        let mut cfg = Configurator::new(
            opts,
            FsImageSource::new(frames),
            Box::new(DirUrlResolver::default()),
        )?
        .with_clock(Box::new(clock.clone()))
        .with_renderer(kind);
        let (_, events) = cfg.subscribe(None);
        cfg.load_product(product, None)?;
        Ok(Self { cfg, clock, events })
    }

    /// Tick until the configurator is idle, calling `on_tick` after every tick.
    fn run(
        &mut self,
        mut on_tick: impl FnMut(&Configurator<FsImageSource>) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        for _ in 0..MAX_TICKS {
            self.clock.advance(TICK_MS);
            self.cfg.tick();
            on_tick(&self.cfg)?;
            self.check_events()?;
            if self.cfg.is_idle() {
                return Ok(());
            }
        }
        anyhow::bail!("simulation did not settle after {MAX_TICKS} ticks")
    }

    fn check_events(&self) -> anyhow::Result<()> {
        for event in self.events.try_iter() {
            tracing::debug!(?event, "event");
            match event {
                Event::ChangeFrameFailed { frame, error } => {
                    anyhow::bail!("frame change to {frame} failed: {error}")
                }
                Event::UpdateFinished { outcome, .. } if !outcome.is_success() => {
                    tracing::warn!(?outcome, "update did not draw");
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn cmd_spin(args: SpinArgs) -> anyhow::Result<()> {
    let mut sim = Simulation::new(&args.product, &args.frames, args.size, RendererKind::Raster)?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("create output dir '{}'", args.out.display()))?;

    let mut written = 0;
    let mut write_new = |cfg: &Configurator<FsImageSource>| -> anyhow::Result<()> {
        while written < cfg.draw_log().len() {
            let record = &cfg.draw_log()[written];
            let path = args.out.join(format!("{written:03}-{}.png", record.frame));
            cfg.composite()
                .save_with_format(&path, image::ImageFormat::Png)
                .with_context(|| format!("write png '{}'", path.display()))?;
            written += 1;
        }
        Ok(())
    };
    sim.run(&mut write_new)?;

    let target = match &args.to {
        Some(to) => to.clone(),
        None => opposite_frame(&sim.cfg)?,
    };
    let opts = ChangeFrameOpts {
        revolution_duration: args.revolution_ms,
        step_duration: args.step_ms,
        ..ChangeFrameOpts::default()
    };
    let status = sim.cfg.change_frame(&target, opts)?;
    tracing::info!(frame = %target, ?status, "spinning");
    sim.run(&mut write_new)?;
    write_new(&sim.cfg)?;

    eprintln!("wrote {written} frames to {}", args.out.display());
    Ok(())
}

fn opposite_frame<S: ImageSource>(cfg: &Configurator<S>) -> anyhow::Result<String> {
    let state = cfg.state();
    let positions = state
        .frames
        .positions(&state.view)
        .context("current view has no frames")?;
    let position = (state.position + positions / 2) % positions;
    Ok(state.frames.encode(&state.view, position)?)
}

fn cmd_pick(args: PickArgs) -> anyhow::Result<()> {
    let mut sim = Simulation::new(&args.product, &args.frames, args.size, RendererKind::Headless)?;
    sim.run(|_| Ok(()))?;
    sim.cfg.change_frame(&args.frame, ChangeFrameOpts::default())?;
    sim.run(|_| Ok(()))?;

    match sim.cfg.resolve_part(args.x, args.y) {
        Some(part) => println!("{part}"),
        None => println!("none"),
    }
    Ok(())
}
