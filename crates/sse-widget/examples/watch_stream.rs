//! Watch Stream Example
//!
//! Attaches a widget to an SSE endpoint and prints status changes and data.
//!
//! Run with: `cargo run -p sse-widget --example watch_stream -- <url> [max-attempts]`
//!
//! Set `RUST_LOG=sse_widget=debug` to see connection and backoff logs.

use sse_widget::{ConnectionStatus, PassThrough, StreamWidget, WidgetConfig, WidgetEvent};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sse_widget=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: watch_stream <url> [max-attempts]");
        std::process::exit(2);
    };
    let max_attempts = args.next().map(|v| v.parse::<u32>()).transpose()?;

    let config = WidgetConfig::new(url).max_attempts(max_attempts);
    let (handle, mut events) = StreamWidget::attach(config, PassThrough)?;

    let mut status = handle.status_watch();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current: ConnectionStatus = *status.borrow_and_update();
            println!("[status] {current}");
        }
    });

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(WidgetEvent::Data(payload)) => {
                    println!("[{}] {}", payload.event_type, payload.data);
                }
                Some(WidgetEvent::Error(err)) => println!("[error] {err}"),
                Some(WidgetEvent::Opened) => println!("[opened]"),
                Some(WidgetEvent::Attached) => println!("[display] {}", handle.display().text),
                Some(WidgetEvent::Detached) | None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.detach()?;
            }
        }
    }
    Ok(())
}
