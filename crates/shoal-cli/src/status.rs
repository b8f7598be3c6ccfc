//! Human-readable status rendering for the `status`, `check` and `bench`
//! subcommands.

use shoal_metrics::RequestMetrics;
use shoal_pool::WorkerStatus;

/// Formats a duration in seconds for table cells; sub-sample workers show
/// "n/a" rather than a misleading zero.
pub fn format_secs(secs: f64) -> String {
    if secs <= 0.0 {
        "n/a".to_string()
    } else if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else {
        format!("{secs:.2}s")
    }
}

pub fn format_percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

fn health_mark(healthy: bool) -> &'static str {
    if healthy { "up" } else { "DOWN" }
}

/// Prints the fleet status table plus the request metrics summary.
pub fn print_status(workers: &[WorkerStatus], requests: &RequestMetrics) {
    println!("{}", "=".repeat(96));
    println!("SHOAL WORKER POOL STATUS");
    println!("{}", "=".repeat(96));

    println!("\nRequests:");
    println!("  total: {}", requests.total_requests);
    println!("  success rate: {}", format_percent(requests.success_rate));
    println!("  req/s: {:.2}", requests.requests_per_second);
    println!(
        "  avg response: {}",
        format_secs(requests.average_response_time)
    );

    println!("\nWorkers ({}):", workers.len());
    println!("{}", "-".repeat(96));
    println!(
        "{:<16} {:<21} {:<12} {:<8} {:<6} {:<7} {:<10}",
        "ID", "ADDRESS", "DIALECT", "LOAD", "STATE", "REQS", "AVG_TIME"
    );
    println!("{}", "-".repeat(96));

    for worker in workers {
        println!(
            "{:<16} {:<21} {:<12} {:<8} {:<6} {:<7} {:<10}",
            worker.id,
            format!("{}:{}", worker.host, worker.port),
            worker.dialect.to_string(),
            format!("{:.0}%", worker.load_percent),
            health_mark(worker.healthy),
            worker.total_requests,
            format_secs(worker.average_response_time),
        );
    }
    println!("{}", "=".repeat(96));
}
