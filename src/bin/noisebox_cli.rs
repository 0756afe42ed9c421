use clap::{Args as ClapArgs, Parser, Subcommand};
use crossbeam::channel::{never, unbounded, Receiver};
use noisebox::audio_io::{self, OutputDevice};
use noisebox::config::{BackendConfig, CONFIG};
use noisebox::mode::{SoundMode, ALL_MODES};
use noisebox::prefs::Preferences;
use noisebox::presets::chain_config;
use noisebox::{AssetStore, NoiseChain, NoiseEngine, Player};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

/// CLI for playing or rendering ambient noise
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a sound mode on the default output device
    Play(PlayArgs),
    /// Render a sound mode to a WAV file
    Render(RenderArgs),
    /// List the available sound modes
    Modes(ModesArgs),
    /// Generate a default config file and exit
    GenerateConfig(ConfigArgs),
}

#[derive(ClapArgs)]
struct PlayArgs {
    /// Sound mode (defaults to the saved preference)
    #[arg(long)]
    mode: Option<SoundMode>,
    /// Intensity slider, 0-100
    #[arg(long)]
    intensity: Option<f32>,
    /// Volume slider, 0-100
    #[arg(long)]
    volume: Option<f32>,
    /// Fade out and stop after this many minutes
    #[arg(long)]
    timer: Option<u32>,
    /// Preferences file read at start and updated on exit
    #[arg(long, default_value = "prefs.toml")]
    prefs: PathBuf,
}

#[derive(ClapArgs)]
struct RenderArgs {
    #[arg(long, default_value = "white")]
    mode: SoundMode,
    /// Intensity slider, 0-100
    #[arg(long, default_value_t = 50.0)]
    intensity: f32,
    /// Volume slider, 0-100
    #[arg(long, default_value_t = 80.0)]
    volume: f32,
    /// Length of the rendered file in seconds
    #[arg(long, default_value_t = 30.0)]
    seconds: f32,
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,
    /// Output path, relative paths land in the configured output directory
    #[arg(long)]
    out: String,
}

#[derive(ClapArgs)]
struct ModesArgs {
    /// Emit the list as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(ClapArgs)]
struct ConfigArgs {
    /// Output path for the generated configuration
    #[arg(long, default_value = "config.toml")]
    out: String,
}

fn main() -> anyhow::Result<()> {
    noisebox::logging::init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Play(args) => play_command(args),
        Commands::Render(args) => render_command(args),
        Commands::Modes(args) => {
            modes_command(args)?;
            Ok(())
        }
        Commands::GenerateConfig(cfg) => {
            BackendConfig::generate_default(&cfg.out)?;
            println!("Generated default config at {}", cfg.out);
            Ok(())
        }
    }
}

fn play_command(args: PlayArgs) -> anyhow::Result<()> {
    let mut prefs = Preferences::load(&args.prefs)?;
    if let Some(mode) = args.mode {
        prefs.mode = mode;
    }
    if let Some(intensity) = args.intensity {
        prefs.intensity = intensity.clamp(0.0, 100.0);
    }
    if let Some(volume) = args.volume {
        prefs.volume = volume.clamp(0.0, 100.0);
    }
    if let Some(timer) = args.timer {
        prefs.timer_minutes = Some(timer);
    }

    let output = OutputDevice::open_default()?;
    let sample_rate = output.sample_rate();
    let store = AssetStore::new(CONFIG.asset_dir.clone(), sample_rate);
    let engine = NoiseEngine::new(store, sample_rate as f32);
    let consumer = engine.connect();
    let player = Player::new(sample_rate as f32, engine.playing_flag());

    let (stop_tx, stop_rx) = unbounded();
    let stream_stop = stop_rx.clone();
    let audio_thread = std::thread::spawn(move || {
        if let Err(e) = audio_io::run_audio_stream(output, player, consumer, stream_stop) {
            log::error!("audio stream failed: {e:#}");
        }
    });

    ctrlc::set_handler({
        let tx = stop_tx.clone();
        move || {
            let _ = tx.send(());
        }
    })?;

    engine.set_volume(prefs.volume);
    engine.set_intensity(prefs.intensity);
    engine.set_mode(prefs.mode);
    engine.start();

    println!("Playing {} (intensity {}, volume {})", prefs.mode, prefs.intensity, prefs.volume);
    println!("Controls: m <mode>, i <0-100>, v <0-100>, q = quit");

    spawn_input_thread(engine.clone(), stop_tx.clone());

    let deadline: Receiver<std::time::Instant> = match prefs.timer_minutes {
        Some(minutes) => crossbeam::channel::after(Duration::from_secs(u64::from(minutes) * 60)),
        None => never(),
    };
    crossbeam::select! {
        recv(stop_rx) -> _ => {}
        recv(deadline) -> _ => {
            println!("Timer elapsed, fading out");
            engine.fade_out(3.0);
            std::thread::sleep(Duration::from_secs(4));
            let _ = stop_tx.send(());
        }
    }

    audio_io::stop_audio_stream(&stop_tx);
    let _ = audio_thread.join();

    prefs.mode = engine.mode();
    prefs.intensity = engine.intensity_percent();
    prefs.volume = engine.volume_percent();
    prefs.save(&args.prefs)?;
    Ok(())
}

fn spawn_input_thread(engine: std::sync::Arc<NoiseEngine>, stop_tx: crossbeam::channel::Sender<()>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("q"), _) => {
                    let _ = stop_tx.send(());
                    break;
                }
                (Some("m"), Some(name)) => match name.parse::<SoundMode>() {
                    Ok(mode) => {
                        engine.set_mode(mode);
                        println!("mode: {mode}");
                    }
                    Err(e) => println!("{e}"),
                },
                (Some("i"), Some(value)) => match value.parse::<f32>() {
                    Ok(v) => engine.set_intensity(v),
                    Err(_) => println!("expected a number"),
                },
                (Some("v"), Some(value)) => match value.parse::<f32>() {
                    Ok(v) => engine.set_volume(v),
                    Err(_) => println!("expected a number"),
                },
                _ => println!("Controls: m <mode>, i <0-100>, v <0-100>, q = quit"),
            }
        }
    });
}

fn render_command(args: RenderArgs) -> anyhow::Result<()> {
    let sample_rate = args.sample_rate;
    let intensity = (args.intensity / 100.0).clamp(0.0, 1.0);
    let volume = (args.volume / 100.0).clamp(0.0, 1.0);

    let flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mut player = Player::new(sample_rate as f32, flag);

    let chain = match args.mode.asset_name() {
        None => {
            let config = chain_config(args.mode, intensity)
                .ok_or_else(|| anyhow::anyhow!("no synthesis preset for {}", args.mode))?;
            NoiseChain::synth(config, sample_rate as f32)
        }
        Some(name) => {
            let store = AssetStore::new(CONFIG.asset_dir.clone(), sample_rate);
            let asset = store.fetch_blocking(name)?;
            NoiseChain::real(args.mode, asset, sample_rate as f32)
        }
    };
    player.handle_command(noisebox::Command::SetGain(
        volume.powf(CONFIG.volume_exponent),
    ));
    player.handle_command(noisebox::Command::ReplaceChain(chain));

    let out_path = if std::path::Path::new(&args.out).is_absolute() {
        PathBuf::from(&args.out)
    } else {
        CONFIG.output_dir.join(&args.out)
    };
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&out_path, spec)?;

    let mut remaining = (args.seconds.max(0.0) * sample_rate as f32) as usize;
    let mut buffer = vec![0.0f32; 512 * 2];
    while remaining > 0 {
        let frames = 512.min(remaining);
        buffer.resize(frames * 2, 0.0);
        player.process_block(&mut buffer);
        for sample in &buffer[..frames * 2] {
            let s = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(s)?;
        }
        remaining -= frames;
    }
    writer.finalize()?;
    println!("Rendered {} seconds of {} to {}", args.seconds, args.mode, out_path.display());
    Ok(())
}

fn modes_command(args: ModesArgs) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&ALL_MODES)?);
    } else {
        for mode in ALL_MODES {
            let kind = if mode.is_real() { "recording" } else { "synthesized" };
            println!("{:<16} {kind}", mode.to_string());
        }
    }
    Ok(())
}
