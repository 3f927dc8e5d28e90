//! Host namespace policies.
//!
//! Pod-scoped: a failure names no containers.

use super::PodSpecContext;
use crate::pipeline::Violation;

pub const HOST_PID: &str = "host-pid";
pub const HOST_IPC: &str = "host-ipc";
pub const HOST_NETWORK: &str = "host-network";

/// Reject pods sharing the host PID namespace
pub fn host_pid(ctx: &PodSpecContext) -> Result<(), Violation> {
    deny_if(ctx.pod_spec.host_pid, "unable to permit pod with hostPID")
}

/// Reject pods sharing the host IPC namespace
pub fn host_ipc(ctx: &PodSpecContext) -> Result<(), Violation> {
    deny_if(ctx.pod_spec.host_ipc, "unable to permit pod with hostIPC")
}

/// Reject pods binding to the host network
pub fn host_network(ctx: &PodSpecContext) -> Result<(), Violation> {
    deny_if(ctx.pod_spec.host_network, "unable to permit pod with hostNetwork")
}

fn deny_if(flag: Option<bool>, message: &str) -> Result<(), Violation> {
    if flag.unwrap_or(false) {
        Err(Violation::new(message))
    } else {
        Ok(())
    }
}
