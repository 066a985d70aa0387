use lagopus_core::{EndpointStyle, FetchResult, HttpStatsClient, parse_instant};

/// Print the parsed samples as pretty JSON, optionally trimmed to the last `limit`.
pub fn render(samples: &FetchResult, limit: Option<usize>) -> String {
    let start = limit.map_or(0, |n| samples.len().saturating_sub(n));
    serde_json::to_string_pretty(&samples[start..]).unwrap_or_else(|_| "[]".to_string())
}

pub fn run(url: &str, endpoint: EndpointStyle, job: &str, since: Option<&str>, limit: Option<usize>) {
    let since = match since.map(|s| (s, parse_instant(s))) {
        None => None,
        Some((_, Some(t))) => Some(t),
        Some((raw, None)) => {
            eprintln!("Error: cannot parse --since '{raw}' as an ISO-8601 instant");
            std::process::exit(1);
        }
    };

    let client = match HttpStatsClient::new(url, endpoint) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let rt = super::runtime();
    match rt.block_on(client.fetch_once(job, since)) {
        Ok(samples) => {
            eprintln!("{} sample(s) for job '{job}'", samples.len());
            println!("{}", render(&samples, limit));
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
