use std::thread;
use std::time::{Duration, Instant};

use packetwire::demo::{self, DemoPacket, Ping, PingResponder, Pong};
use packetwire_packet::{expect_kind, Connection, RequestError, ResponseFuture};
use packetwire_transport::UnixDomainSocket;
use tracing::debug;

use crate::cmd::{parse_duration, PingArgs, STEP_BACKOFF};
use crate::exit::{
    packet_error, request_code, transport_error, CliError, CliResult, SUCCESS, TIMEOUT,
};
use crate::output::{print_ping_report, OutputFormat, PingReport, PingRow};

struct InFlight {
    sent: i32,
    response: ResponseFuture<DemoPacket>,
    outcome: Option<(Result<Pong, RequestError>, Duration)>,
}

pub fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let stream = UnixDomainSocket::connect(&args.path)
        .map_err(|err| transport_error("connect failed", err))?;
    let mut channel = stream
        .into_channel()
        .map_err(|err| transport_error("connect failed", err))?;

    let registry = demo::registry()
        .map_err(|err| packet_error("registry setup failed", err))?;
    let connection = Connection::with_config(
        registry,
        PingResponder::default(),
        args.byte_order.frame_config(),
    );

    let start = Instant::now();
    let mut pings = (0..args.count)
        .map(|n| -> CliResult<InFlight> {
            let sent = args.message.wrapping_add_unsigned(n);
            let response = connection
                .queue_request(Ping { message: sent })
                .map_err(|err| packet_error("queue failed", err))?;
            Ok(InFlight {
                sent,
                response,
                outcome: None,
            })
        })
        .collect::<CliResult<Vec<_>>>()?;

    let deadline = start + timeout;
    while pings.iter().any(|ping| ping.outcome.is_none()) {
        if Instant::now() >= deadline {
            connection.close();
            return Err(CliError::new(
                TIMEOUT,
                format!("timed out after {timeout:?} waiting for pongs"),
            ));
        }

        let progressed = demo::step(&connection, &mut channel)
            .map_err(|err| packet_error("exchange failed", err))?;
        collect(&mut pings, start.elapsed());
        if !progressed {
            thread::sleep(STEP_BACKOFF);
        }
    }
    let elapsed = start.elapsed();
    connection.close();

    let mut exit_code = SUCCESS;
    let rows: Vec<PingRow> = pings
        .into_iter()
        .map(|ping| {
            let request_id = ping.response.request_id();
            let (outcome, rtt) = ping
                .outcome
                .unwrap_or_else(|| (Err(closed_early()), elapsed));
            let (received, error) = match outcome {
                Ok(pong) => (Some(pong.message), None),
                Err(err) => {
                    exit_code = request_code(&err);
                    (None, Some(err.to_string()))
                }
            };
            PingRow {
                request_id,
                sent: ping.sent,
                received,
                error,
                rtt_us: micros(rtt),
            }
        })
        .collect();

    let path = args.path.display().to_string();
    let order = format!("{:?}", args.byte_order).to_lowercase();
    print_ping_report(
        &PingReport {
            path: &path,
            byte_order: &order,
            sent: rows.len(),
            answered: rows.iter().filter(|row| row.received.is_some()).count(),
            elapsed_us: micros(elapsed),
            pings: rows,
        },
        format,
    );
    Ok(exit_code)
}

/// Move every arrived outcome out of its future.
fn collect(pings: &mut [InFlight], elapsed: Duration) {
    for ping in pings.iter_mut().filter(|ping| ping.outcome.is_none()) {
        if let Some(outcome) = ping.response.try_take() {
            debug!(request_id = ping.response.request_id(), "ping resolved");
            ping.outcome = Some((outcome.and_then(expect_kind::<DemoPacket, Pong>), elapsed));
        }
    }
}

fn closed_early() -> RequestError {
    RequestError::Closed {
        remote: false,
        reason: None,
    }
}

fn micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
