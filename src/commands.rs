//! Operational commands: infrastructure lifecycle, consuming, debugging.
//!
//! These are what an operator CLI calls once it has parsed its arguments.
//! Every outcome goes to the [`Progress`] sink; the returned
//! [`ExitStatus`] is what the process should exit with.

use std::sync::Arc;

use tracing::error;

use crate::bus::{Bus, Buses};
use crate::progress::Progress;
use crate::transport::{ExchangeSpec, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failure,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Failure => 1,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Infrastructure {
    Create,
    Drop,
    Check,
}

impl Infrastructure {
    fn started(&self) -> &'static str {
        match self {
            Infrastructure::Create => "Started building infrastructure...",
            Infrastructure::Drop => "Started dropping infrastructure...",
            Infrastructure::Check => "Started checking infrastructure...",
        }
    }

    fn finished(&self) -> &'static str {
        match self {
            Infrastructure::Create => "Infrastructure created",
            Infrastructure::Drop => "Infrastructure dropped",
            Infrastructure::Check => "Infrastructure checked",
        }
    }
}

async fn run_infrastructure(
    action: Infrastructure,
    transport: &dyn Transport,
    specs: &[ExchangeSpec],
    force: bool,
    progress: &dyn Progress,
) -> ExitStatus {
    if !force {
        progress.header("Please, use the flag --force");
        return ExitStatus::Failure;
    }

    progress.header(action.started());
    progress.header(&format!("Using adapter {}", transport.name()));

    let result = match action {
        Infrastructure::Create => transport.create_infrastructure(specs, progress).await,
        Infrastructure::Drop => transport.drop_infrastructure(specs, progress).await,
        Infrastructure::Check => transport.check_infrastructure(specs, progress).await,
    };

    match result {
        Ok(()) => {
            progress.header(action.finished());
            ExitStatus::Success
        }
        Err(err) => {
            error!(?action, error = %err, "infrastructure command failed");
            progress.line(&format!("Exception thrown. Reason - {err}"));
            ExitStatus::Failure
        }
    }
}

/// Declare exchanges and named queues. Refuses to run without `force`.
pub async fn create_infrastructure(
    transport: &dyn Transport,
    specs: &[ExchangeSpec],
    force: bool,
    progress: &dyn Progress,
) -> ExitStatus {
    run_infrastructure(Infrastructure::Create, transport, specs, force, progress).await
}

/// Delete exchanges and named queues. Refuses to run without `force`.
pub async fn drop_infrastructure(
    transport: &dyn Transport,
    specs: &[ExchangeSpec],
    force: bool,
    progress: &dyn Progress,
) -> ExitStatus {
    run_infrastructure(Infrastructure::Drop, transport, specs, force, progress).await
}

/// Check exchanges and named queues exist. Refuses to run without `force`.
pub async fn check_infrastructure(
    transport: &dyn Transport,
    specs: &[ExchangeSpec],
    force: bool,
    progress: &dyn Progress,
) -> ExitStatus {
    run_infrastructure(Infrastructure::Check, transport, specs, force, progress).await
}

/// Consume from `specs`, dispatching on `inline_bus`, until every consumer
/// stops.
pub async fn consume_events(
    transport: &dyn Transport,
    inline_bus: Arc<Bus>,
    specs: &[ExchangeSpec],
    progress: Arc<dyn Progress>,
) -> ExitStatus {
    progress.header("Consumer built");
    progress.header(&format!("Using adapter {}", transport.name()));
    progress.header("Started listening...");

    match transport.subscribe(inline_bus, Arc::clone(&progress), specs).await {
        Ok(()) => ExitStatus::Success,
        Err(err) => {
            error!(error = %err, "consumer failed to start");
            progress.header(&format!("The consumer has thrown an exception - {err}"));
            progress.header("Consumer stopped");
            ExitStatus::Failure
        }
    }
}

/// List the middleware of both buses.
pub fn debug_buses(buses: &Buses, progress: &dyn Progress) -> ExitStatus {
    for (name, bus) in [
        ("Event Bus", &buses.event_bus),
        ("Inline Event Bus", &buses.inline_event_bus),
    ] {
        progress.header(name);
        for middleware in bus.middleware_list() {
            progress.line(&format!("- {middleware}"));
        }
    }
    ExitStatus::Success
}
