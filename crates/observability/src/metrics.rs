//! Shipper metric recording
//!
//! Thin helpers over the `metrics` macros so metric names live in one place.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Record a successfully delivered batch
pub fn record_batch_delivered(transport: &str, lines: usize) {
    counter!("shipper_batches_delivered_total", "transport" => transport.to_string()).increment(1);
    counter!("shipper_lines_delivered_total", "transport" => transport.to_string())
        .increment(lines as u64);
}

/// Record a failed delivery attempt and the backoff it triggered
pub fn record_delivery_failure(transport: &str, backoff: Duration) {
    counter!("shipper_delivery_failures_total", "transport" => transport.to_string())
        .increment(1);
    histogram!("shipper_backoff_seconds").record(backoff.as_secs_f64());
}

/// Record a reconnect attempt
pub fn record_reconnect(transport: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "shipper_reconnects_total",
        "transport" => transport.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a checkpoint written to the sincedb
pub fn record_checkpoint(position: u64) {
    counter!("shipper_checkpoints_written_total").increment(1);
    gauge!("shipper_last_checkpoint_position").set(position as f64);
}

/// Record a callback whose lines were all empty
pub fn record_empty_batch() {
    counter!("shipper_empty_batches_total").increment(1);
}

/// Record the current command queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("shipper_queue_depth").set(depth as f64);
}

/// Record a processed command
pub fn record_command(command: &str) {
    counter!("shipper_commands_total", "command" => command.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_batch_delivered("stdout", 3);
        record_delivery_failure("tcp", Duration::from_secs(2));
        record_reconnect("tcp", true);
        record_checkpoint(100);
        record_empty_batch();
        record_queue_depth(5);
        record_command("callback");
    }
}
