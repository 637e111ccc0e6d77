//! SIGINT/SIGTERM handling.
//!
//! `ctrlc` runs the handler on its own thread. It raises [`TERMINATE`] and
//! pings the event loop so a blocked wait returns at once. Teardown happens
//! in the loop.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use smithay_client_toolkit::reexports::calloop::LoopHandle;
use smithay_client_toolkit::reexports::calloop::ping::make_ping;

static TERMINATE: AtomicBool = AtomicBool::new(false);

pub fn terminated() -> bool {
    TERMINATE.load(Ordering::SeqCst)
}

/// Installs the handler and the ping source it wakes. Callers check
/// [`terminated`] after each dispatch.
pub fn install<D>(handle: &LoopHandle<'_, D>) -> Result<()> {
    let (ping, source) = make_ping().context("failed to create wake-up ping")?;
    handle
        .insert_source(source, |_, _, _| {})
        .map_err(|e| e.error)
        .context("failed to insert wake-up source")?;
    ctrlc::set_handler(move || {
        TERMINATE.store(true, Ordering::SeqCst);
        ping.ping();
    })
    .context("failed to install signal handler")?;
    Ok(())
}
