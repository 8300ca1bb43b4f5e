use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::thread;
use std::time::Duration;
use tracing::info;

use dofbot_driver::{
    load_config_file, ArmConfig, DofbotArm, DofbotBus, JointCache, KinestheticConfig,
    KinestheticSession, MetricsHub, ServoReading, SimulatedDofbot,
};
use dofbot_protocol::JointId;
use serial_transport::{ByteTransport, MockTransport, SerialPortTransport};

#[derive(Parser, Debug)]
#[command(
    name = "dofbot",
    version,
    about = "Dofbot SE arm CLI",
    disable_help_subcommand = true
)]
struct Cli {
    /// Run against a simulated arm instead of a serial port
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// Serial port (overrides the config file)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Arm configuration YAML
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    PortList,
    /// Read one joint angle
    Read {
        /// Joint number (1-6)
        #[arg(long)]
        joint: u8,
    },
    /// Read all six joints
    ReadAll,
    /// Move one joint (angle is clamped into the joint range)
    Write {
        #[arg(long)]
        joint: u8,
        /// Target angle in degrees
        #[arg(long, allow_negative_numbers = true)]
        angle: f64,
        /// Move duration in milliseconds
        #[arg(long, default_value_t = 1000u16)]
        duration_ms: u16,
    },
    /// Move all six joints at once (out-of-range angles are rejected)
    WriteAll {
        /// Six comma-separated angles, joint 1 first
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        angles: Vec<f64>,
        #[arg(long, default_value_t = 1000u16)]
        duration_ms: u16,
    },
    /// Enable or disable servo torque
    Torque {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Set the RGB LED
    Led {
        r: u8,
        g: u8,
        b: u8,
    },
    /// Sound the buzzer
    Buzzer {
        /// Board duration code (0xFF keeps it on until switched off)
        #[arg(long, default_value_t = 1u8)]
        duration: u8,
        /// Switch the buzzer off
        #[arg(long, action = ArgAction::SetTrue)]
        off: bool,
    },
    /// Stream joint observations as JSON lines
    Observe {
        #[arg(long, default_value_t = 10u32)]
        count: u32,
        #[arg(long, default_value_t = 100u64)]
        interval_ms: u64,
        /// Do not enable torque or move home; for arms driven by another controller
        #[arg(long, action = ArgAction::SetTrue)]
        read_only: bool,
        /// Print Prometheus counters to stderr when done
        #[arg(long, action = ArgAction::SetTrue)]
        metrics: bool,
    },
    /// Record a hand-guided demonstration as JSON lines
    Teach {
        #[arg(long, default_value_t = 100u32)]
        count: u32,
        #[arg(long, default_value_t = 100u64)]
        interval_ms: u64,
        /// Keep torque on (positions are still recorded)
        #[arg(long, action = ArgAction::SetTrue)]
        keep_torque: bool,
        /// Output file (defaults to stdout)
        #[arg(long)]
        out: Option<String>,
    },
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    if let Commands::PortList = cli.command {
        return port_list(cli.mock);
    }

    let mut config = match cli.config.as_deref() {
        Some(path) => load_config_file(path)?,
        None => ArmConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }

    if cli.mock {
        let sim = SimulatedDofbot::new();
        config.port = "sim".to_string();
        run(cli.command, sim.transport(), config)
    } else {
        let port = SerialPortTransport::open(&config.port, &config.serial_settings())?;
        info!(port = %config.port, baud = config.baud_rate, "port opened");
        run(cli.command, port, config)
    }
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn port_list(mock: bool) -> Result<()> {
    let ports = if mock {
        MockTransport::list()?
    } else {
        SerialPortTransport::list()?
    };
    for port in ports {
        println!("{}\t{}", port.name, port.driver);
    }
    Ok(())
}

fn run<T: ByteTransport>(command: Commands, transport: T, config: ArmConfig) -> Result<()> {
    match command {
        Commands::PortList => Ok(()),
        Commands::Observe {
            count,
            interval_ms,
            read_only,
            metrics,
        } => {
            let config = ArmConfig {
                read_only: read_only || config.read_only,
                ..config
            };
            observe(transport, config, count, interval_ms, metrics)
        }
        Commands::Teach {
            count,
            interval_ms,
            keep_torque,
            out,
        } => teach(transport, config, count, interval_ms, keep_torque, out.as_deref()),
        other => {
            let bus = DofbotBus::connect(transport, config.timing())?;
            bus_command(bus, other)
        }
    }
}

fn bus_command<T: ByteTransport>(mut bus: DofbotBus<T>, command: Commands) -> Result<()> {
    match command {
        Commands::Read { joint } => {
            let joint = JointId::try_from(joint)?;
            match bus.read_servo(joint)? {
                ServoReading::Angle(angle) => println!("{joint}\t{angle:.1}"),
                ServoReading::Absent(why) => println!("{joint}\tunavailable ({why})"),
            }
        }
        Commands::ReadAll => {
            for joint in JointId::all() {
                match bus.read_one(joint)? {
                    Some(angle) => println!("{joint}\t{angle:.1}"),
                    None => println!("{joint}\tunavailable"),
                }
            }
        }
        Commands::Write {
            joint,
            angle,
            duration_ms,
        } => {
            let joint = JointId::try_from(joint)?;
            bus.write_one(joint, angle, duration_ms)?;
            info!(%joint, angle, duration_ms, "write sent");
        }
        Commands::WriteAll {
            angles,
            duration_ms,
        } => {
            bus.write_all(&angles, duration_ms)?;
            info!(?angles, duration_ms, "write-all sent");
        }
        Commands::Torque { state } => bus.set_torque(state == Switch::On)?,
        Commands::Led { r, g, b } => bus.set_led(r, g, b)?,
        Commands::Buzzer { duration, off } => bus.set_buzzer(!off, duration)?,
        Commands::PortList | Commands::Observe { .. } | Commands::Teach { .. } => {}
    }
    Ok(())
}

fn observe<T: ByteTransport>(
    transport: T,
    config: ArmConfig,
    count: u32,
    interval_ms: u64,
    metrics: bool,
) -> Result<()> {
    let hub = MetricsHub::new()?;
    let mut arm = DofbotArm::connect(transport, config)?.with_metrics(hub.dev.clone());
    let mut cache = JointCache::new();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for _ in 0..count {
        let obs = arm.observe(&mut cache)?;
        writeln!(out, "{}", serde_json::to_string(&obs)?)?;
        thread::sleep(Duration::from_millis(interval_ms));
    }
    out.flush()?;
    drop(out);
    arm.disconnect();
    if metrics {
        eprint!("{}", hub.encode_text());
    }
    Ok(())
}

fn teach<T: ByteTransport>(
    transport: T,
    config: ArmConfig,
    count: u32,
    interval_ms: u64,
    keep_torque: bool,
    out: Option<&str>,
) -> Result<()> {
    let mut writer: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut arm = DofbotArm::connect(transport, config)?;
    let mut session = KinestheticSession::start(
        &mut arm,
        KinestheticConfig {
            disable_torque: !keep_torque,
        },
    )?;
    for step in 0..count {
        let action = session.action()?;
        let line = serde_json::json!({ "step": step, "action": action });
        writeln!(writer, "{line}")?;
        thread::sleep(Duration::from_millis(interval_ms));
    }
    writer.flush()?;
    session.finish()?;
    info!(steps = count, "demonstration recorded");
    arm.disconnect();
    Ok(())
}
