mod args;
use args::*;
use clap::Parser;
use edge_mux::EventLoop;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut builder = pretty_env_logger::formatted_timed_builder();

    builder.parse_filters(&args.log_filter);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.init();

    let mut event_loop = EventLoop::new(args.to_config(), std::io::stdout().lock())?;

    if let Err(err) = event_loop.run() {
        log::error!("event loop stopped with error: {}, {:?}", err, event_loop.stats());

        return Err(err.into());
    }

    Ok(())
}
