mod pipe;
mod wav;

use clap::{Parser, Subcommand, ValueEnum};
use fskwave_core::realtime::play;
use fskwave_core::{
    DecodeMode, Demodulator, EndPolicy, Modulator, ModemConfig, Pacing, RealtimeDecoder,
    SharedGate, SyncStrategy,
};
use pipe::{spawn_control_reader, Endpoint, PipeCapture, PipePlayback};
use std::path::{Path, PathBuf};
use wav::{WavBlockSink, WavBlockSource};

#[derive(Parser)]
#[command(name = "fskwave")]
#[command(about = "Ultrasonic FSK acoustic modem")]
struct Cli {
    /// JSON file with modem parameters (missing fields keep their defaults)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the bit-0 tone in Hz (20000 selects the historical tone table)
    #[arg(long, global = true, value_name = "HZ")]
    freq_zero: Option<f32>,

    /// Override the frequency match tolerance in Hz
    #[arg(long, global = true, value_name = "HZ")]
    tolerance: Option<f32>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a file (or text) to a WAV audio file
    Encode {
        /// Input file, or the message itself with --text
        #[arg(value_name = "INPUT")]
        input: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Treat INPUT as literal text instead of a path
        #[arg(long)]
        text: bool,
    },

    /// Decode a WAV audio file to binary data
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Output binary file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        receive: ReceiveArgs,
    },

    /// Stream a frame as raw s16le mono PCM (pipe into a player)
    Transmit {
        /// Input file, or the message itself with --text
        #[arg(value_name = "INPUT")]
        input: String,

        /// Raw PCM destination, `-` for stdout
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        output: PathBuf,

        /// Treat INPUT as literal text instead of a path
        #[arg(long)]
        text: bool,

        /// Emit one symbol per symbol duration instead of as fast as possible
        #[arg(long)]
        realtime: bool,
    },

    /// Decode a live raw s16le mono PCM stream (pipe from a recorder)
    Listen {
        /// Output binary file
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Raw PCM source, `-` for stdin
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: PathBuf,

        /// Ignore audio until Enter is pressed; `q` stops in either mode
        #[arg(long)]
        gated: bool,

        /// Read at one block per symbol duration (replaying a recording)
        #[arg(long)]
        realtime: bool,

        #[command(flatten)]
        receive: ReceiveArgs,
    },

    /// Print the effective configuration and its protocol audit
    Info,
}

#[derive(clap::Args)]
struct ReceiveArgs {
    /// Fail when the start or end marker is missing
    #[arg(long)]
    strict: bool,

    /// How the end marker is recognised
    #[arg(long, value_enum, default_value_t = EndPolicyArg::Ordered)]
    end_policy: EndPolicyArg,
}

#[derive(Clone, Copy, ValueEnum)]
enum EndPolicyArg {
    /// Full END sequence in order
    Ordered,
    /// Any END tone ends the frame (legacy)
    AnyOf,
}

impl From<EndPolicyArg> for EndPolicy {
    fn from(arg: EndPolicyArg) -> Self {
        match arg {
            EndPolicyArg::Ordered => EndPolicy::Ordered,
            EndPolicyArg::AnyOf => EndPolicy::AnyOf,
        }
    }
}

impl ReceiveArgs {
    fn demodulator(&self, config: ModemConfig) -> Result<Demodulator, Box<dyn std::error::Error>> {
        let mode = if self.strict {
            DecodeMode::Strict
        } else {
            DecodeMode::Lenient
        };
        Ok(Demodulator::new(config)?
            .with_mode(mode)
            .with_end_policy(self.end_policy.into()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Encode { input, output, text } => {
            encode_command(config, &read_payload(&input, text)?, &output)?
        }
        Commands::Decode {
            input,
            output,
            receive,
        } => decode_command(receive.demodulator(config)?, &input, &output)?,
        Commands::Transmit {
            input,
            output,
            text,
            realtime,
        } => transmit_command(config, &read_payload(&input, text)?, &output, realtime)?,
        Commands::Listen {
            output,
            input,
            gated,
            realtime,
            receive,
        } => listen_command(receive.demodulator(config)?, &input, &output, gated, realtime)?,
        Commands::Info => info_command(&config)?,
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Defaults, then the JSON file, then command-line overrides
fn load_config(cli: &Cli) -> Result<ModemConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            let config: ModemConfig = serde_json::from_str(&json)?;
            log::info!("loaded configuration from {}", path.display());
            config
        }
        None => ModemConfig::default(),
    };

    if let Some(freq_zero) = cli.freq_zero {
        config.freq_zero = freq_zero;
    }
    if let Some(tolerance) = cli.tolerance {
        config.tolerance_hz = tolerance;
    }

    config.validate()?;
    Ok(config)
}

fn read_payload(input: &str, text: bool) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if text {
        return Ok(input.as_bytes().to_vec());
    }
    Ok(std::fs::read(input)?)
}

fn encode_command(
    config: ModemConfig,
    data: &[u8],
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Read {} bytes", data.len());

    let modulator = Modulator::new(config)?;
    let mut sink = WavBlockSink::create(output_path, modulator.config())?;
    let blocks = modulator.transmit(data, &mut sink, Pacing::Immediate)?;
    sink.finalize()?;

    println!(
        "Encoded to {} blocks ({} samples)",
        blocks,
        blocks * modulator.config().samples_per_symbol()
    );
    println!("Wrote {}", output_path.display());
    Ok(())
}

fn decode_command(
    mut demodulator: Demodulator,
    input_path: &Path,
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = WavBlockSource::open(input_path, demodulator.config())?;
    let spec = source.spec();
    println!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let data = demodulator.decode_source(&mut source)?;
    println!("Decoded {} bytes", data.len());

    std::fs::write(output_path, &data)?;
    println!("Wrote {} bytes to {}", data.len(), output_path.display());
    Ok(())
}

fn transmit_command(
    config: ModemConfig,
    data: &[u8],
    output: &Path,
    realtime: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let modulator = Modulator::new(config)?;
    let endpoint = Endpoint::from(output);
    let pacing = if realtime {
        Pacing::RealTime
    } else {
        Pacing::Immediate
    };

    // stdout may carry the audio, so progress goes to stderr here
    eprintln!("Transmitting {} bytes to {}", data.len(), endpoint);
    let blocks = play(&modulator, &mut PipePlayback::new(endpoint), data, pacing)?;
    eprintln!(
        "Sent {} blocks ({:.2} s of audio)",
        blocks,
        blocks as f64 * modulator.config().symbol_duration_secs
    );
    Ok(())
}

fn listen_command(
    demodulator: Demodulator,
    input: &Path,
    output_path: &Path,
    gated: bool,
    realtime: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = Endpoint::from(input);
    let mut gate = SharedGate::new();
    let controls = spawn_control_reader(gate.handle(), endpoint.is_std());

    let strategy = if gated {
        if !controls {
            return Err("--gated needs control input, but none is available".into());
        }
        SyncStrategy::Gated
    } else {
        SyncStrategy::Automatic
    };

    // stdin may carry the audio, and stdout is free, so prompts go to stderr
    match strategy {
        SyncStrategy::Gated => eprintln!("Press Enter to start listening, q + Enter to stop"),
        SyncStrategy::Automatic if controls => eprintln!("Listening; q + Enter to stop"),
        SyncStrategy::Automatic => eprintln!("Listening"),
    }

    let mut device = PipeCapture::new(endpoint).paced(realtime);
    let data = RealtimeDecoder::new(demodulator, strategy).run(&mut device, &mut gate)?;
    println!("Decoded {} bytes", data.len());

    std::fs::write(output_path, &data)?;
    println!("Wrote {} bytes to {}", data.len(), output_path.display());
    Ok(())
}

fn info_command(config: &ModemConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);
    println!(
        "Block: {} samples, resolution {:.1} Hz, Nyquist {:.1} Hz",
        config.samples_per_symbol(),
        config.resolution_hz(),
        config.nyquist_hz()
    );

    let issues = config.audit();
    if issues.is_empty() {
        println!("Audit: no issues");
    } else {
        println!("Audit: {} issues", issues.len());
        for issue in issues {
            println!("  - {}", issue);
        }
    }
    Ok(())
}
