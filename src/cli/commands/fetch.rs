//! Fetch command - resolve one request through the worker

use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::error::{SwError, SwResult};
use crate::fetch::create_fetcher;
use crate::http::{Origin, Response};
use crate::worker::WorkerHost;
use std::io::Write;
use tokio::fs;
use tracing::debug;

/// Execute the fetch command
///
/// Without worker support the request goes straight to the network.
pub async fn execute(args: FetchArgs, config: &Config) -> SwResult<()> {
    let response = match WorkerHost::from_config(config).await? {
        Some(host) => {
            let request = host.origin().request(&args.method, &args.url)?;
            host.fetch(request).await?
        }
        None => {
            debug!("No worker support, fetching from network");
            let origin = Origin::parse(&config.origin.url)?;
            let request = origin.request(&args.method, &args.url)?;
            create_fetcher(config)?.fetch(&request).await?
        }
    };

    if !response.is_ok() {
        eprintln!("{} {}", response.status, response.status_text);
    }

    let head = if args.include {
        format_head(&response)
    } else {
        String::new()
    };

    match args.output {
        Some(path) => {
            fs::write(&path, &response.body)
                .await
                .map_err(|e| SwError::io(format!("writing {}", path.display()), e))?;
            print!("{}", head);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(head.as_bytes())
                .and_then(|_| stdout.write_all(&response.body))
                .and_then(|_| stdout.flush())
                .map_err(|e| SwError::io("writing response to stdout", e))?;
        }
    }

    Ok(())
}

fn format_head(response: &Response) -> String {
    let mut head = format!("{} {}\n", response.status, response.status_text);
    for (name, value) in &response.headers {
        head.push_str(&format!("{}: {}\n", name, value));
    }
    head.push('\n');
    head
}
