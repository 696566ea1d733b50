//! Two nodes on an in-memory link: discovery, then a request/reply.
//!
//! Run with:
//!   cargo run --example loopback-discovery

use eqwire::node::{DeviceType, Node, QueryFilter, Version};
use eqwire::transport::{LoopbackBus, MacAddress, BROADCAST};

const BATTERY: u8 = 0x06;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = LoopbackBus::new();
    let controller_addr = MacAddress([0x02, 0, 0, 0, 0, 0x01]);
    let sensor_addr = MacAddress([0x02, 0, 0, 0, 0, 0x02]);

    let mut controller = Node::new(bus.attach(controller_addr));
    controller.begin("controller", DeviceType::new(0x01, 0x00), Version::new(1, 0, 0))?;

    let mut sensor = Node::new(bus.attach(sensor_addr));
    sensor.begin("garden-sensor", DeviceType::new(0x07, 0x01), Version::new(0, 9, 2))?;
    sensor.on(BATTERY, |message, outbox| {
        if let Err(err) = outbox.reply(message, 0x01, b"87%") {
            eprintln!("battery reply failed: {err}");
        }
    });

    controller.on_discovery(|peer, request_id| {
        eprintln!(
            "found {} ({}) type={} version={} commands={:?} [req {}]",
            peer.info.name_lossy(),
            peer.address,
            peer.info.device_type,
            peer.info.version,
            peer.commands,
            request_id
        );
    });

    controller.query_devices(&BROADCAST, &QueryFilter::any())?;
    sensor.process();
    controller.process();

    controller.request(&sensor_addr, BATTERY, 0x00, b"", |reply, _| {
        eprintln!(
            "battery from {}: {}",
            reply.source,
            String::from_utf8_lossy(reply.payload)
        );
    })?;
    sensor.process();
    controller.process();

    eprintln!("known peers: {}", controller.peers().len());
    Ok(())
}
