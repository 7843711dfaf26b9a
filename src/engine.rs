use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use anyhow::Context;
use log::info;

use crate::constants::TS_PACKET_SIZE;
use crate::network::UdpSource;
use crate::packet::TsHeader;
use crate::processor::Retimer;
use crate::report::{Reporter, RetimeSummary};
use crate::source::{PacketReader, PacketSource};
use crate::types::{Input, Options};

pub fn run(opts: Options) -> anyhow::Result<RetimeSummary> {
    let started_at = chrono::Utc::now().to_rfc3339();

    let mut source = open_source(&opts)?;
    let mut output = match &opts.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot open output file {}", path.display()))?;
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let reporter = Reporter::new(opts.report);
    let mut retimer = Retimer::new(opts.retime);
    let mut stdout = io::stdout().lock();
    let mut pkt = [0u8; TS_PACKET_SIZE];
    let mut count: u64 = 0;

    info!("retiming {} (rewrite: {})", opts.input, opts.retime);

    while opts.max_packets.is_none_or(|max| count < max) {
        if !source.read_packet(&mut pkt).context("reading input")? {
            break;
        }
        count += 1;

        if let Some(pid) = opts.dump_pid {
            if TsHeader::parse(&pkt).is_ok_and(|h| h.pid == pid) {
                writeln!(stdout, "First packet of PID {pid} contents: {}", to_hex(&pkt))?;
                break;
            }
        }

        let events = retimer
            .process_packet(&mut pkt)
            .with_context(|| format!("rewriting packet {count}"))?;
        for event in &events {
            if let Some(line) = reporter.render(event) {
                writeln!(stdout, "{line}")?;
            }
        }

        if let Some(out) = output.as_mut() {
            out.write_all(&pkt).context("writing output")?;
        }
    }

    if let Some(mut out) = output {
        out.flush().context("flushing output")?;
    }
    stdout.flush()?;

    let stats = retimer.stats();
    let summary = RetimeSummary {
        started_at,
        finished_at: chrono::Utc::now().to_rfc3339(),
        input: opts.input.to_string(),
        output: opts.output.as_ref().map(|p| p.display().to_string()),
        retimed: opts.retime,
        final_offset: retimer.state().active_offset(),
        pcr_discontinuities: stats.pcr_discontinuities(),
        pts_discontinuities: stats.pts_discontinuities(),
        fallbacks: stats.fallbacks(),
        stats: retimer.into_stats(),
    };
    info!(
        "{} packets, {} PCR / {} PTS discontinuities",
        summary.stats.packets, summary.pcr_discontinuities, summary.pts_discontinuities
    );
    Ok(summary)
}

fn open_source(opts: &Options) -> anyhow::Result<Box<dyn PacketSource>> {
    let source: Box<dyn PacketSource> = match &opts.input {
        Input::File(path) => {
            let file =
                File::open(path).with_context(|| format!("cannot access {}", path.display()))?;
            let reader = PacketReader::new(BufReader::new(file))
                .with_context(|| format!("cannot find packets in {}", path.display()))?;
            Box::new(reader)
        }
        Input::Stdin => Box::new(
            PacketReader::new(io::stdin().lock()).context("cannot find packets on stdin")?,
        ),
        Input::Udp(addr) => Box::new(UdpSource::bind(*addr, opts.udp_timeout)?),
    };
    Ok(source)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
