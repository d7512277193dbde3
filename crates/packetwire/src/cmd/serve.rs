use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use packetwire::demo::{self, PingResponder};
use packetwire_packet::Connection;
use packetwire_transport::{IpcStream, UnixDomainSocket};
use tracing::{info, warn};

use crate::cmd::{ServeArgs, WireOrder, STEP_BACKOFF};
use crate::exit::{packet_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_serve_summary, OutputFormat, ServeSummary};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let listener =
        UnixDomainSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;
    info!(path = %args.path.display(), "serving pings");

    let mut peers = 0u64;
    let mut answered = 0u64;
    while running.load(Ordering::SeqCst) && args.peers.is_none_or(|limit| peers < limit) {
        let stream = match listener.try_accept() {
            Ok(Some(stream)) => stream,
            Ok(None) => {
                thread::sleep(ACCEPT_BACKOFF);
                continue;
            }
            Err(err) => return Err(transport_error("accept failed", err)),
        };

        peers += 1;
        let served = serve_peer(stream, args.byte_order, &running)?;
        answered += served;
        info!(peer = peers, answered = served, "peer disconnected");
    }

    let path = args.path.display().to_string();
    print_serve_summary(
        &ServeSummary {
            path: &path,
            peers,
            answered,
        },
        format,
    );
    Ok(SUCCESS)
}

/// Drive one peer until it hangs up, fails, or the server is interrupted.
fn serve_peer(stream: IpcStream, order: WireOrder, running: &AtomicBool) -> CliResult<u64> {
    match stream.peer_credentials() {
        Some((uid, gid, pid)) => info!(uid, gid, pid, "peer connected"),
        None => info!("peer connected"),
    }
    let mut channel = stream
        .into_channel()
        .map_err(|err| transport_error("accept failed", err))?;
    let registry =
        demo::registry().map_err(|err| packet_error("registry setup failed", err))?;
    let connection =
        Connection::with_config(registry, PingResponder::default(), order.frame_config());

    while running.load(Ordering::SeqCst) && !connection.is_closed() {
        match demo::step(&connection, &mut channel) {
            Ok(true) => {}
            Ok(false) => thread::sleep(STEP_BACKOFF),
            Err(err) => {
                warn!(error = %err, "peer connection failed");
                break;
            }
        }
    }

    connection.close();
    Ok(connection.handler().answered())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
