mod devices;
mod environment;
mod io;
mod navigator;
mod protocol;
mod router;

pub(crate) use {
    devices::{BridgeDevices, DisplayAnswer},
    environment::BridgeEnvironment,
    io::{INBOUND_CAPACITY, Outbox, spawn_reader, spawn_writer},
    navigator::BridgeNavigator,
    protocol::{Inbound, Outbound, UiEvent},
    router::{Router, spawn_router},
};

#[cfg(test)]
pub(crate) use io::parse_line;
