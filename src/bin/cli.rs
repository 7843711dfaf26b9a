use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use mpegts_retimer::retimer::{Input, Options, ReportFormat, run};

#[derive(Clone, Copy, ValueEnum)]
enum Report {
    Text,
    Json,
    None,
}

impl From<Report> for ReportFormat {
    fn from(r: Report) -> Self {
        match r {
            Report::Text => ReportFormat::Text,
            Report::Json => ReportFormat::Json,
            Report::None => ReportFormat::None,
        }
    }
}

/// Repair PCR/PTS/DTS discontinuities in an MPEG transport stream
#[derive(Parser)]
struct Opt {
    /// TS file to read ("-" for stdin)
    #[clap(short = 'f', long, required_unless_present = "udp", conflicts_with = "udp")]
    input: Option<PathBuf>,

    /// UDP socket to bind + listen instead of a file (IPv4, multicast ok)
    #[clap(long)]
    udp: Option<SocketAddr>,

    /// Stop a UDP run after this many seconds without a datagram
    #[clap(long, requires = "udp", value_parser = clap::value_parser!(u64).range(1..))]
    udp_timeout: Option<u64>,

    /// TS file to write the retimed stream to
    #[clap(short = 'o', long)]
    output: Option<PathBuf>,

    /// How timing events are printed on stdout
    #[clap(long, value_enum, default_value_t = Report::Text)]
    report: Report,

    /// Report corrected values without rewriting the stream
    #[clap(long, default_value_t = false)]
    report_only: bool,

    /// Print the first packet on this PID as hex and stop
    #[clap(long)]
    dump_pid: Option<u16>,

    /// Stop after this many packets
    #[clap(long)]
    max_packets: Option<u64>,

    /// Print a JSON summary when the run ends
    #[clap(long, default_value_t = false)]
    summary: bool,

    /// Default log filter (RUST_LOG takes precedence)
    #[clap(long, default_value = "warn")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(opt.log_level.as_str()),
    )
    .init();

    let input = match (opt.input, opt.udp) {
        (Some(path), _) if path.as_os_str() == "-" => Input::Stdin,
        (Some(path), _) => Input::File(path),
        (None, Some(addr)) => Input::Udp(addr),
        (None, None) => anyhow::bail!("either --input or --udp is required"),
    };

    let summary = run(Options {
        input,
        output: opt.output,
        report: opt.report.into(),
        retime: !opt.report_only,
        dump_pid: opt.dump_pid,
        max_packets: opt.max_packets,
        udp_timeout: opt.udp_timeout.map(Duration::from_secs),
    })?;

    if opt.summary {
        println!("{}", summary.to_json());
    }
    Ok(())
}
