use anyhow::Result;
use pedalog_lib::constants::{ANONYMOUS_SERIAL, DEFAULT_TIMEOUT, PID, VID};
use pedalog_lib::identity::resolve_serial;
use pedalog_lib::{NusbTransport, Transport};
use tracing::info;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let transport = NusbTransport::new()?;
    transport.refresh_bus_listing()?;
    let handles = transport.enumerate_matching(VID, PID)?;

    info!("Listing Pedalog devices ({:#06x}:{:#06x})...", VID, PID);
    if handles.is_empty() {
        println!("No Pedalog devices found.");
    }

    for (index, handle) in handles.iter().enumerate() {
        let serial = resolve_serial(&transport, handle, DEFAULT_TIMEOUT);
        println!(
            "Device #{}: Bus: {:03}, Address: {:03}",
            index + 1,
            handle.bus_number(),
            handle.device_address()
        );
        if serial == ANONYMOUS_SERIAL {
            println!("  Serial: <Not supported by firmware>");
        } else {
            println!("  Serial: {:04}", serial);
        }
    }
    Ok(())
}
