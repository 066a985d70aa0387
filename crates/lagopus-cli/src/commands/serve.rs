use std::time::Duration;

use lagopus_server::{SinceBoundary, StatsStore, feed, shared};

pub fn run(host: &str, port: u16, boundary: SinceBoundary, demo_jobs: &[String], feed_ms: u64) {
    let base = format!("http://{host}:{port}");
    let boundary_label = match boundary {
        SinceBoundary::Inclusive => "time >= since",
        SinceBoundary::Exclusive => "time > since",
    };

    println!("Lagopus stats endpoint v{}", lagopus_core::VERSION);
    println!("   {base}");
    println!("   since filter: {boundary_label}");
    println!();
    println!("   Endpoints:");
    println!("     GET  /                              API index");
    println!("     GET  /health                        Health check");
    println!("     GET  /api/jobs                      Jobs with sample counts");
    println!("     GET  /api/jobs/stats?job=<id>       Full history of a job");
    println!("     GET  /api/jobs/<id>/stats?since=<t> Rows from <t> on");
    println!("     POST /api/jobs/<id>/stats           Append a row or an array of rows");
    if !demo_jobs.is_empty() {
        println!();
        println!(
            "   Synthetic feed every {feed_ms}ms for: {}",
            demo_jobs.join(", ")
        );
        println!(
            "   Try: lagopus monitor --url {base} --job {}",
            demo_jobs[0]
        );
    }
    println!();

    let store = shared(StatsStore::new(boundary));
    let rt = super::runtime();
    let result = rt.block_on(async {
        let period = Duration::from_millis(feed_ms.max(1));
        let feeds: Vec<_> = demo_jobs
            .iter()
            .map(|job| feed::spawn_feed(store.clone(), job.clone(), period))
            .collect();
        let result = lagopus_server::run_server(store, host, port).await;
        for handle in feeds {
            handle.abort();
        }
        result
    });

    if let Err(e) = result {
        eprintln!("Error: cannot serve on {host}:{port}: {e}");
        std::process::exit(1);
    }
}
