//! soundshader CLI: headless playback, WAV export and waveform previews.
//!
//! Usage:
//!   ss-cli stereo-beat
//!   ss-cli saw --seconds 3 --wav output.wav
//!   ss-cli saw --wav output.wav --float
//!   ss-cli instrument --note 57 --note 64 --preview 72
//!   ss-cli sine --config session.toml --param 0=0.8

use clap::Parser;
use log::info;
use serde::Deserialize;
use ss_master::{Controller, NoteState, SampleIndex, SessionConfig, WavFormat, WaveformView};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{fs, process};

#[derive(Parser, Debug)]
#[command(name = "ss-cli", about = "Play, render or preview a sound shader")]
struct Args {
    /// Program to compile
    program: Option<String>,

    /// Render offline to this WAV file instead of playing
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Write 32-bit float samples instead of 16-bit PCM
    #[arg(long, requires = "wav")]
    float: bool,

    /// Print an ASCII waveform preview this many columns wide
    #[arg(long)]
    preview: Option<usize>,

    /// Length to play, render or preview
    #[arg(long, default_value_t = 5.0)]
    seconds: f64,

    /// TOML file with `program`, `wav_format` and a [session] table
    #[arg(long)]
    config: Option<PathBuf>,

    /// Parameter slot value, as INDEX=VALUE
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(usize, f32)>,

    /// MIDI note to hold
    #[arg(long = "note")]
    notes: Vec<i32>,

    /// List built-in programs and exit
    #[arg(long)]
    list: bool,
}

#[derive(Deserialize, Default, Debug)]
#[serde(default)]
struct FileConfig {
    program: Option<String>,
    wav_format: Option<WavFormat>,
    session: SessionConfig,
}

fn parse_param(s: &str) -> Result<(usize, f32), String> {
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=VALUE, got `{}`", s))?;
    let index = index.trim().parse().map_err(|e| format!("bad index: {}", e))?;
    let value = value.trim().parse().map_err(|e| format!("bad value: {}", e))?;
    Ok((index, value))
}

fn load_config(path: &Path) -> FileConfig {
    let text = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        process::exit(1);
    });
    toml::from_str(&text).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        process::exit(1);
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let file = args.config.as_deref().map(load_config).unwrap_or_default();
    let mut ctrl = Controller::new(file.session);

    if args.list {
        let mut names = ctrl.programs();
        names.sort_unstable();
        for name in names {
            println!("{}", name);
        }
        return;
    }

    let program = args
        .program
        .or(file.program)
        .unwrap_or_else(|| ss_master::presets::SINE.to_string());
    ctrl.set_source(&program);
    for &(index, value) in &args.params {
        ctrl.set_param(index, value);
    }
    if !args.notes.is_empty() {
        let notes = args.notes.iter().map(|&n| ss_master::NoteSlot::held(n, 1.0, 0.0));
        ctrl.set_notes(NoteState::from_notes(notes));
    }

    let config = ctrl.config();
    println!("Program:     {}", program);
    println!("Sample rate: {} Hz", config.sample_rate);
    println!("Look-ahead:  {:.0} ms", config.look_ahead_seconds * 1000.0);
    println!("Preview:     {:?}", config.preview_mode);
    println!();

    if let Some(width) = args.preview {
        print_preview(&ctrl, args.seconds, width);
    } else if let Some(wav) = args.wav {
        let format = if args.float { WavFormat::Float32 } else { file.wav_format.unwrap_or_default() };
        render_to_wav(&ctrl, &wav, args.seconds, format);
    } else {
        play_audio(&mut ctrl, args.seconds);
    }
}

fn play_audio(ctrl: &mut Controller, seconds: f64) {
    if let Err(e) = ctrl.play() {
        eprintln!("Failed to start playback: {}", e);
        process::exit(1);
    }
    println!("Playing...");
    println!();

    let started = Instant::now();
    let limit = Duration::from_secs_f64(seconds.max(0.0));
    while ctrl.is_playing() && started.elapsed() < limit {
        for err in ctrl.take_errors() {
            eprintln!("\r{}", err);
        }
        if let Some(pos) = ctrl.position() {
            let t = pos.to_seconds(ctrl.config().sample_rate as f64);
            print!("\rSample: {:>10} | {:>7.2}s", pos.get(), t);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    ctrl.stop();
    println!("\rDone.                              ");
}

fn render_to_wav(ctrl: &Controller, path: &Path, seconds: f64, format: WavFormat) {
    println!("Rendering {:.2}s to {} ({:?}) ...", seconds, path.display(), format);

    let wav = ctrl.render_to_wav(seconds, format).unwrap_or_else(|e| {
        eprintln!("Render failed: {}", e);
        process::exit(1);
    });
    info!("rendered {} bytes", wav.len());

    fs::write(path, &wav).unwrap_or_else(|e| {
        eprintln!("Failed to write {}: {}", path.display(), e);
        process::exit(1);
    });

    println!("Done.");
}

fn print_preview(ctrl: &Controller, seconds: f64, width: usize) {
    let end = (seconds.max(0.0) * ctrl.config().sample_rate as f64) as u64;
    let view = ctrl
        .preview(SampleIndex::ZERO, SampleIndex::new(end), width)
        .unwrap_or_else(|e| {
            eprintln!("Preview failed: {}", e);
            process::exit(1);
        });
    println!("Left:");
    print!("{}", ascii_channel(&view, |c| (c.min_left, c.max_left)));
    println!("Right:");
    print!("{}", ascii_channel(&view, |c| (c.min_right, c.max_right)));
}

/// Draw one channel as rows of `#` wherever a column's [min, max] covers
/// the row's level.
fn ascii_channel<F>(view: &WaveformView, range: F) -> String
where
    F: Fn(&ss_master::ColumnMinMax) -> (f32, f32),
{
    const ROWS: usize = 9;
    let mut out = String::with_capacity((view.width() + 1) * ROWS);
    for row in 0..ROWS {
        let top = 1.0 - 2.0 * row as f32 / ROWS as f32;
        let bottom = top - 2.0 / ROWS as f32;
        for column in &view.columns {
            let (min, max) = range(column);
            out.push(if max >= bottom && min <= top { '#' } else { ' ' });
        }
        out.push('\n');
    }
    out
}
