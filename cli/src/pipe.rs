//! Raw PCM pipes standing in for capture/playback hardware
//!
//! `fskwave transmit | aplay -f S16_LE -r 44100` and
//! `arecord -f S16_LE -r 44100 | fskwave listen out.bin` use these.

use fskwave_core::{
    AudioBlock, BlockSink, BlockSource, CaptureDevice, GateHandle, ModemConfig, ModemError,
    PcmReader, PcmWriter, PlaybackDevice, Result,
};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// A file path, or `-` for stdin/stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Std,
    File(PathBuf),
}

impl Endpoint {
    pub fn is_std(&self) -> bool {
        matches!(self, Endpoint::Std)
    }
}

impl From<&Path> for Endpoint {
    fn from(path: &Path) -> Self {
        if path == Path::new("-") {
            Endpoint::Std
        } else {
            Endpoint::File(path.to_path_buf())
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Std => write!(f, "-"),
            Endpoint::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Little-endian s16 mono PCM read from a pipe or file
pub struct PipeCapture {
    endpoint: Endpoint,
    reader: Option<PcmReader<Box<dyn Read>>>,
    /// Sleep one symbol per block, for replaying recordings at live speed
    realtime: bool,
    pace: Duration,
}

impl PipeCapture {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            reader: None,
            realtime: false,
            pace: Duration::ZERO,
        }
    }

    pub fn paced(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }
}

impl CaptureDevice for PipeCapture {
    fn open(&mut self, config: &ModemConfig) -> Result<()> {
        let input: Box<dyn Read> = match &self.endpoint {
            Endpoint::Std => Box::new(io::stdin().lock()),
            Endpoint::File(path) => Box::new(BufReader::new(File::open(path).map_err(|e| {
                ModemError::DeviceOpen(format!("{}: {}", path.display(), e))
            })?)),
        };
        self.pace = config.symbol_duration();
        self.reader = Some(PcmReader::new(input, config.samples_per_symbol()));
        log::debug!("capturing from {}", self.endpoint);
        Ok(())
    }

    fn read_block(&mut self) -> Result<Option<AudioBlock>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        if self.realtime {
            thread::sleep(self.pace);
        }
        reader.next_block()
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Little-endian s16 mono PCM written to a pipe or file
pub struct PipePlayback {
    endpoint: Endpoint,
    writer: Option<PcmWriter<Box<dyn Write>>>,
}

impl PipePlayback {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            writer: None,
        }
    }
}

impl PlaybackDevice for PipePlayback {
    fn open(&mut self, _config: &ModemConfig) -> Result<()> {
        let output: Box<dyn Write> = match &self.endpoint {
            Endpoint::Std => Box::new(io::stdout().lock()),
            Endpoint::File(path) => Box::new(BufWriter::new(File::create(path).map_err(|e| {
                ModemError::DeviceOpen(format!("{}: {}", path.display(), e))
            })?)),
        };
        self.writer = Some(PcmWriter::new(output));
        log::debug!("playing to {}", self.endpoint);
        Ok(())
    }

    fn write_block(&mut self, block: &AudioBlock) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => {
                writer.write_block(block)?;
                // Keep a downstream player fed when pacing in real time
                writer.flush()
            }
            None => Err(ModemError::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                "playback device is not open",
            ))),
        }
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                log::warn!("failed to flush {}: {}", self.endpoint, e);
            }
        }
    }
}

/// Apply one line of terminal input to the gate; `false` once stopped
pub fn apply_control(line: &str, handle: &GateHandle) -> bool {
    match line.trim() {
        "q" | "Q" | "quit" => {
            handle.stop();
            false
        }
        _ => {
            handle.open();
            true
        }
    }
}

/// Read start/stop controls on a background thread
///
/// Controls come from stdin unless stdin carries the audio, in which case the
/// controlling terminal is used. Returns `false` if no control input is available.
pub fn spawn_control_reader(handle: GateHandle, audio_on_stdin: bool) -> bool {
    let input: Box<dyn Read + Send> = if audio_on_stdin {
        match File::open("/dev/tty") {
            Ok(tty) => Box::new(tty),
            Err(e) => {
                log::warn!("no terminal for controls: {}", e);
                return false;
            }
        }
    } else {
        Box::new(io::stdin())
    };

    thread::spawn(move || {
        for line in BufReader::new(input).lines() {
            let Ok(line) = line else { break };
            if !apply_control(&line, &handle) {
                break;
            }
        }
        log::debug!("control input closed");
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use fskwave_core::{Gate, GateSignal, SharedGate};

    #[test]
    fn test_endpoint_from_path() {
        assert_eq!(Endpoint::from(Path::new("-")), Endpoint::Std);
        assert_eq!(
            Endpoint::from(Path::new("out.pcm")),
            Endpoint::File(PathBuf::from("out.pcm"))
        );
    }

    #[test]
    fn test_controls() {
        let mut gate = SharedGate::new();
        let handle = gate.handle();

        assert!(apply_control("", &handle));
        assert_eq!(gate.poll(), GateSignal::Open);
        assert!(!apply_control(" q\n", &handle));
        assert_eq!(gate.poll(), GateSignal::Stop);
    }

    #[test]
    fn test_missing_capture_file() {
        let mut device = PipeCapture::new(Endpoint::File(PathBuf::from("/nonexistent/in.pcm")));
        let err = device.open(&ModemConfig::default()).unwrap_err();
        assert!(matches!(err, ModemError::DeviceOpen(_)));
    }

    #[test]
    fn test_pipe_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.pcm");
        let modulator = fskwave_core::Modulator::default();

        let mut speaker = PipePlayback::new(Endpoint::File(path.clone()));
        fskwave_core::realtime::play(
            &modulator,
            &mut speaker,
            b"pipe",
            fskwave_core::Pacing::Immediate,
        )
        .unwrap();
        assert_eq!(
            std::fs::metadata(&path).unwrap().len() as usize,
            modulator.encode_samples(b"pipe").len() * 2
        );

        let mut mic = PipeCapture::new(Endpoint::File(path));
        let mut decoder = fskwave_core::RealtimeDecoder::new(
            fskwave_core::Demodulator::default(),
            fskwave_core::SyncStrategy::Automatic,
        );
        let decoded = decoder.run(&mut mic, &mut fskwave_core::Ungated).unwrap();
        assert_eq!(decoded, b"pipe");
    }
}
