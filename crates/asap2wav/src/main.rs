//! SAP to WAV converter.
//!
//! Plays one song of a module into a WAV file, or into headerless PCM with
//! `--raw`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use asap::{Asap, AsapError, SampleFormat, change_ext, duration_to_string, parse_duration};
use clap::Parser;

/// Length used when the module gives none.
const DEFAULT_DURATION_MS: u32 = 180_000;

#[derive(Parser)]
#[command(name = "asap2wav")]
#[command(about = "Convert Atari 8-bit SAP music to WAV")]
struct Args {
    /// Input SAP file
    input: PathBuf,

    /// Output file (default: input with .wav or .raw extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Song number, zero-based (default: the module's default song)
    #[arg(short, long)]
    song: Option<usize>,

    /// Length as mm:ss.xxx (default: the module's, or 3 minutes)
    #[arg(short, long, value_parser = parse_time)]
    time: Option<u32>,

    /// Write 8-bit unsigned samples
    #[arg(short, long)]
    byte_samples: bool,

    /// Write raw PCM without a WAV header
    #[arg(long)]
    raw: bool,

    /// Big-endian 16-bit samples (raw output only)
    #[arg(long, requires = "raw")]
    big_endian: bool,

    /// Mute POKEY channels, a hex mask (bits 0-3 left chip, 4-7 right)
    #[arg(short, long, value_parser = parse_mask, default_value = "0")]
    mute: u8,

    /// Stop after this many seconds of silence
    #[arg(long, default_value_t = 0)]
    silence: u32,
}

fn parse_time(s: &str) -> Result<u32, AsapError> {
    parse_duration(s).ok_or_else(|| AsapError::InvalidDuration(s.to_string()))
}

fn parse_mask(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches('$');
    u8::from_str_radix(digits, 16).map_err(|e| format!("bad mute mask {s:?}: {e}"))
}

impl Args {
    fn format(&self) -> SampleFormat {
        if self.byte_samples {
            SampleFormat::U8
        } else if self.big_endian {
            SampleFormat::S16Be
        } else {
            SampleFormat::S16Le
        }
    }

    fn output_path(&self) -> Option<PathBuf> {
        if let Some(ref output) = self.output {
            return Some(output.clone());
        }
        let ext = if self.raw { "raw" } else { "wav" };
        change_ext(&self.input.to_string_lossy(), ext).map(PathBuf::from)
    }
}

fn convert(args: &Args) -> Result<(PathBuf, usize), String> {
    let mut asap = Asap::new();
    asap.load_file(&args.input)
        .map_err(|e| format!("{}: {e}", args.input.display()))?;

    let info = asap.module_info();
    let song = args.song.unwrap_or(info.default_song);
    let duration = args
        .time
        .or_else(|| info.duration(song))
        .unwrap_or(DEFAULT_DURATION_MS);
    asap.play_song(song, Some(duration)).map_err(|e| e.to_string())?;
    asap.mute_pokey_channels(args.mute);
    asap.detect_silence(args.silence);

    let output = args
        .output_path()
        .ok_or_else(|| format!("{}: cannot derive output name", args.input.display()))?;
    let written = write_song(&mut asap, args, &output)
        .map_err(|e| format!("{}: {e}", output.display()))?;

    eprintln!(
        "{}: song {} of {}, {}",
        output.display(),
        song + 1,
        asap.module_info().songs,
        duration_to_string(duration)
    );
    Ok((output, written))
}

fn write_song(asap: &mut Asap, args: &Args, path: &Path) -> std::io::Result<usize> {
    let format = args.format();
    let mut out = BufWriter::new(File::create(path)?);
    if !args.raw {
        out.write_all(&asap.wav_header(format))?;
    }

    let mut buffer = [0u8; 8192];
    let mut written = 0;
    loop {
        let n = asap.generate(&mut buffer, format);
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n])?;
        written += n;
    }
    out.flush()?;
    Ok(written)
}

fn main() -> ExitCode {
    let args = Args::parse();
    match convert(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("asap2wav: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments() {
        let args = Args::parse_from([
            "asap2wav",
            "-s",
            "2",
            "-t",
            "1:30",
            "-m",
            "0F",
            "music/x.sap",
        ]);
        assert_eq!(args.song, Some(2));
        assert_eq!(args.time, Some(90_000));
        assert_eq!(args.mute, 0x0F);
        assert_eq!(args.format(), SampleFormat::S16Le);
        assert_eq!(args.output_path(), Some(PathBuf::from("music/x.wav")));
    }

    #[test]
    fn raw_output() {
        let args = Args::parse_from(["asap2wav", "--raw", "--big-endian", "x.sap"]);
        assert_eq!(args.format(), SampleFormat::S16Be);
        assert_eq!(args.output_path(), Some(PathBuf::from("x.raw")));

        let args = Args::parse_from(["asap2wav", "-b", "-o", "out.wav", "x.sap"]);
        assert_eq!(args.format(), SampleFormat::U8);
        assert_eq!(args.output_path(), Some(PathBuf::from("out.wav")));
    }

    #[test]
    fn rejected_arguments() {
        assert!(Args::try_parse_from(["asap2wav", "--big-endian", "x.sap"]).is_err());
        assert!(Args::try_parse_from(["asap2wav", "-t", "1:75", "x.sap"]).is_err());
        assert!(Args::try_parse_from(["asap2wav", "-m", "xyz", "x.sap"]).is_err());
    }
}
