use clap::{Parser, Subcommand, ValueEnum};
use hound::WavSpec;
use log::{error, info, warn};
use serde::Serialize;
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::Instant;
use telemwave_core::config::{SimConfig, CONFIG_FILE_NAME};
use telemwave_core::sensors::{CommandSource, ReaderCommand, SensorSource};
use telemwave_core::sim::SimulatedSource;
use telemwave_core::status::LogIndicator;
use telemwave_core::telemetry::{encode_payload, Antennas, Board, BoardConfig, FrameType, StatusFlags};
use telemwave_core::transport::{TcpSink, TransportSink, DEFAULT_TRANSPORT_ADDR};
use telemwave_core::{
    Encoder, FrameHeader, Mode, SessionOptions, TelemetryError, TelemetrySession, TransmitProfile,
};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Usage(String),
}

#[derive(Parser)]
#[command(name = "telemwave")]
#[command(about = "Spacecraft telemetry encoder: FEC, 8b10b and FSK/BPSK modulation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BoardArg {
    Standard,
    Vb4,
    Vb5,
}

impl From<BoardArg> for Board {
    fn from(arg: BoardArg) -> Self {
        match arg {
            BoardArg::Standard => Board::Standard,
            BoardArg::Vb4 => Board::VB4,
            BoardArg::Vb5 => Board::VB5,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Transmit telemetry cycles to the RF pipeline
    Run {
        /// Mode: f (FSK), b (BPSK), a (AFSK), c (CW)
        #[arg(default_value = "f")]
        mode: String,

        /// Number of cycles, -1 for forever
        #[arg(default_value_t = -1, allow_negative_numbers = true)]
        loops: i64,

        /// Skip the Morse identification at start
        #[arg(long)]
        no_cw_id: bool,

        /// Station config file
        #[arg(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,

        /// Sensor board revision
        #[arg(short, long, value_enum, default_value = "standard")]
        board: BoardArg,

        /// Command printing "v i v i ..." power readings; simulated when absent
        #[arg(long, value_name = "COMMAND")]
        power_cmd: Option<String>,

        /// Command answering the payload query with "OK ..."
        #[arg(long, value_name = "COMMAND")]
        payload_cmd: Option<String>,

        /// Address of the PCM sink
        #[arg(short, long, default_value = DEFAULT_TRANSPORT_ADDR)]
        addr: String,

        /// Frames per cycle
        #[arg(short, long, default_value_t = 1)]
        frames: usize,

        /// File receiving AFSK packet text for the packet generator
        #[arg(long, value_name = "PATH")]
        text_out: Option<PathBuf>,

        /// Seed for simulated telemetry
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Encode simulated telemetry frames to a WAV file
    Encode {
        /// Mode: f (FSK), b (BPSK), c (CW)
        mode: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Number of cycles to encode
        #[arg(short, long, default_value_t = 1)]
        cycles: usize,

        /// Prepend the Morse identification
        #[arg(long)]
        cw_id: bool,

        /// Callsign used for identification and text modes
        #[arg(long)]
        callsign: Option<String>,

        /// Seed for simulated telemetry
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the encoding stages of one frame as JSON
    Inspect {
        /// Mode: f (FSK) or b (BPSK)
        #[arg(default_value = "f")]
        mode: String,

        /// Reset count carried in the header
        #[arg(long, default_value_t = 0)]
        reset_count: u16,

        /// Uptime carried in the header, seconds
        #[arg(long, default_value_t = 0)]
        uptime: u32,

        /// Frame number within the session, selects MIN/MAX frames
        #[arg(long, default_value_t = 1)]
        frame: u64,

        /// Seed for simulated telemetry
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            mode,
            loops,
            no_cw_id,
            config,
            board,
            power_cmd,
            payload_cmd,
            addr,
            frames,
            text_out,
            seed,
        } => {
            let args = RunArgs {
                mode: Mode::from_selector(&mode),
                loops,
                cw_id: !no_cw_id,
                config,
                board: BoardConfig::new(board.into()),
                power_cmd,
                payload_cmd,
                addr,
                frames,
                text_out,
                seed,
            };
            if let Err(e) = run_command(args) {
                error!("{}", e);
                return Err(e.into());
            }
        }
        Commands::Encode {
            mode,
            output,
            cycles,
            cw_id,
            callsign,
            seed,
        } => encode_command(&mode, &output, cycles, cw_id, callsign, seed)?,
        Commands::Inspect {
            mode,
            reset_count,
            uptime,
            frame,
            seed,
        } => inspect_command(&mode, reset_count, uptime, frame, seed)?,
    }

    Ok(())
}

struct RunArgs {
    mode: Mode,
    loops: i64,
    cw_id: bool,
    config: PathBuf,
    board: BoardConfig,
    power_cmd: Option<String>,
    payload_cmd: Option<String>,
    addr: String,
    frames: usize,
    text_out: Option<PathBuf>,
    seed: Option<u64>,
}

fn sensor_source(args: &RunArgs) -> Result<Box<dyn SensorSource>, CliError> {
    let Some(line) = &args.power_cmd else {
        println!("Simulated telemetry mode");
        let sim = match args.seed {
            Some(seed) => SimulatedSource::seeded(args.board.map, seed),
            None => SimulatedSource::new(args.board.map),
        };
        return Ok(Box::new(sim));
    };
    let power = ReaderCommand::parse(line)
        .ok_or_else(|| CliError::Usage("empty power reader command".to_string()))?;
    let mut source = CommandSource::new(args.board, power);
    if let Some(payload) = args.payload_cmd.as_deref().and_then(ReaderCommand::parse) {
        source = source.with_payload(payload);
    }
    Ok(Box::new(source))
}

fn run_command(args: RunArgs) -> Result<(), CliError> {
    let station = SimConfig::record_reset(&args.config)?;
    println!(
        "Mode {} callsign {} reset count {}",
        args.mode, station.callsign, station.reset_count
    );

    let mut options = SessionOptions::new(args.mode, station);
    options.board = args.board;
    options.frames_per_cycle = args.frames;
    options.cw_id = args.cw_id;
    options.battery_check = args.power_cmd.is_some();

    let source = sensor_source(&args)?;
    let sink = TcpSink::new(args.addr.clone());
    let mut session = TelemetrySession::new(options, source, Box::new(sink), Box::new(LogIndicator))?;
    if let Some(seed) = args.seed {
        session = session.with_seed(seed);
    }

    let mut transmitted = session.identify().is_some_and(|s| !s.is_empty());
    let mut remaining = args.loops;
    let started = Instant::now();

    while remaining != 0 {
        if remaining > 0 {
            remaining -= 1;
        }
        let cycle_start = Instant::now();
        let report = session.run_cycle()?;
        transmitted |= report.delivered;

        if !report.packets.is_empty() {
            for packet in &report.packets {
                println!("{}", packet);
            }
            if let Some(path) = &args.text_out {
                write_packets(path, &report.packets)?;
            }
        }
        println!(
            "Cycle {}: {} frame(s), {} samples{}",
            report.cycle,
            report.headers.len(),
            report.samples.len(),
            if report.delivered { "" } else { " (not sent)" }
        );

        // Keep pace with the air time of what was just queued
        if report.delivered {
            if let Some(frame) = session.frame_duration() {
                let air = frame * report.headers.len() as u32;
                if let Some(rest) = air.checked_sub(cycle_start.elapsed()) {
                    thread::sleep(rest);
                }
            }
        }
    }

    if transmitted && args.loops > 0 {
        let drain = args.mode.drain_time(args.loops as u64);
        if !drain.is_zero() {
            println!("Sleeping {:?} to allow {} transmission to finish", drain, args.mode);
            thread::sleep(drain);
        }
    }
    info!(
        "Sent {} cycle(s) in {:.1} s",
        session.cycles(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn write_packets(path: &Path, packets: &[String]) -> Result<(), CliError> {
    let mut file = BufWriter::new(File::create(path)?);
    for packet in packets {
        writeln!(file, "{}", packet)?;
    }
    file.flush()?;
    Ok(())
}

/// Sink collecting every sent buffer in memory
#[derive(Clone, Default)]
struct CollectSink {
    samples: Rc<RefCell<Vec<i16>>>,
}

impl TransportSink for CollectSink {
    fn send(&mut self, samples: &[i16]) -> telemwave_core::Result<()> {
        self.samples.borrow_mut().extend_from_slice(samples);
        Ok(())
    }
}

fn write_wav(path: &Path, samples: &[i16]) -> Result<(), CliError> {
    // Write WAV file (16-bit PCM)
    let spec = WavSpec {
        channels: 1,
        sample_rate: telemwave_core::SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let file = File::create(path)?;
    let mut writer = hound::WavWriter::new(BufWriter::new(file), spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn encode_command(
    mode: &str,
    output_path: &Path,
    cycles: usize,
    cw_id: bool,
    callsign: Option<String>,
    seed: Option<u64>,
) -> Result<(), CliError> {
    let mode = Mode::from_selector(mode);
    if mode == Mode::Afsk {
        return Err(CliError::Usage(
            "AFSK audio comes from the packet generator; use `run a --text-out`".to_string(),
        ));
    }

    let mut station = SimConfig::default();
    if let Some(call) = callsign {
        station.callsign = call;
    }
    let board = BoardConfig::default();
    let mut options = SessionOptions::new(mode, station);
    options.board = board;
    options.cw_id = cw_id;
    options.battery_check = false;

    let sim = match seed {
        Some(seed) => SimulatedSource::seeded(board.map, seed),
        None => SimulatedSource::new(board.map),
    };
    let sink = CollectSink::default();
    let mut session =
        TelemetrySession::new(options, Box::new(sim), Box::new(sink.clone()), Box::new(LogIndicator))?;
    if let Some(seed) = seed {
        session = session.with_seed(seed);
    }

    session.identify();
    for _ in 0..cycles {
        session.run_cycle()?;
    }
    println!("Encoded {} cycle(s) in {} mode", cycles, mode);

    let samples = sink.samples.borrow();
    write_wav(output_path, &samples)?;
    println!(
        "Wrote {} samples ({:.2} s) to {}",
        samples.len(),
        samples.len() as f64 / telemwave_core::SAMPLE_RATE as f64,
        output_path.display()
    );
    Ok(())
}

#[derive(Serialize)]
struct InspectReport {
    mode: String,
    header: HeaderReport,
    layout: LayoutReport,
    header_bytes: String,
    payload: String,
    parity: Vec<String>,
    symbols: usize,
    first_symbols: Vec<String>,
    disparity_after: String,
    samples: usize,
    duration_ms: f64,
    phase_reversals: u64,
}

#[derive(Serialize)]
struct HeaderReport {
    mode_id: u8,
    reset_count: u16,
    uptime: u32,
    frame_type: u8,
}

#[derive(Serialize)]
struct LayoutReport {
    sub_frames: usize,
    columns: usize,
    header_len: usize,
    data_len: usize,
    payload_copies: usize,
    logical_bytes: usize,
    sync_bits: usize,
    samples_per_bit: usize,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn inspect_command(mode: &str, reset_count: u16, uptime: u32, frame: u64, seed: u64) -> Result<(), CliError> {
    let mode = Mode::from_selector(mode);
    let modulation = mode
        .modulation()
        .ok_or_else(|| CliError::Usage(format!("{} mode has no binary frames", mode)))?;

    let profile = TransmitProfile::for_modulation(modulation);
    let board = BoardConfig::default();
    let mut sim = SimulatedSource::seeded(board.map, seed);
    let readings = sim.step(1.0);
    let frame_type = FrameType::for_frame(modulation, frame);
    let header = FrameHeader {
        mode_id: profile.mode_id,
        reset_count,
        uptime,
        frame_type: frame_type.code(),
    };
    let payload = encode_payload(
        modulation,
        &readings,
        &board.map,
        &StatusFlags::default(),
        &Antennas::default(),
        profile.layout.data_len,
    );

    let mut encoder = Encoder::new(profile.clone())?;
    let mut samples = Vec::with_capacity(profile.frame_samples());
    let encoded = encoder.encode_frame_into(&header, &payload, &mut samples)?;
    if encoded.frame.written.len() != profile.layout.logical_len() {
        warn!(
            "Wrote {} logical bytes, layout expects {}",
            encoded.frame.written.len(),
            profile.layout.logical_len()
        );
    }

    let report = InspectReport {
        mode: mode.to_string(),
        header: HeaderReport {
            mode_id: header.mode_id,
            reset_count: header.reset_count,
            uptime: header.uptime,
            frame_type: header.frame_type,
        },
        layout: LayoutReport {
            sub_frames: profile.layout.rs_frames,
            columns: profile.layout.rs_frame_len,
            header_len: profile.layout.header_len,
            data_len: profile.layout.data_len,
            payload_copies: profile.layout.payload_copies,
            logical_bytes: profile.layout.logical_len(),
            sync_bits: profile.sync.bits,
            samples_per_bit: profile.modulator.samples_per_bit(),
        },
        header_bytes: hex(&encoded.header),
        payload: hex(&payload),
        parity: encoded.frame.parity.iter().map(|p| hex(p)).collect(),
        symbols: encoded.symbols.len(),
        first_symbols: encoded
            .symbols
            .iter()
            .take(8)
            .map(|s| format!("{:010b}", s))
            .collect(),
        disparity_after: format!("{:?}", encoder.line_encoder().disparity()),
        samples: samples.len(),
        duration_ms: profile.frame_duration().as_secs_f64() * 1000.0,
        phase_reversals: encoder.modulator().reversals(),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
