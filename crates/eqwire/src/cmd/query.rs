use std::time::{Duration, Instant};

use eqwire_node::QueryFilter;
use tracing::info;

use crate::cmd::{open_node, parse_duration, LinkArgs, QueryArgs};
use crate::exit::{node_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_peers, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn run(args: QueryArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let filter = build_filter(&args);
    let mut node = open_node(link, &args.identity)?;

    let request_id = node
        .query_devices(&args.to, &filter)
        .map_err(|err| node_error("query failed", err))?;
    info!(request_id, to = %args.to, "query sent");

    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if node.process() == 0 {
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    let peers = node.peers();
    if peers.is_empty() {
        return Err(CliError::new(
            TIMEOUT,
            format!("no devices answered within {timeout:?}"),
        ));
    }
    print_peers(&peers, node.command_table(), format);
    Ok(SUCCESS)
}

fn build_filter(args: &QueryArgs) -> QueryFilter {
    let filter = args
        .device_types
        .iter()
        .fold(QueryFilter::any(), |filter, kind| filter.with_device_type(*kind));
    args.addresses
        .iter()
        .fold(filter, |filter, address| filter.with_address(*address))
}
