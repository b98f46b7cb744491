//! # ccnews
//!
//! Downloading of CommonCrawl News WARC files.
//!
//! ```sh
//! ccnews 2023/09 --max-files 1 --download-folder data/unprocessed
//! ```
//!
//! Logging is configured through `RUST_LOG` and defaults to `info`.

use ccnews::{cli, config::Config, error::Error, job::Job};
use env_logger::Env;
use log::{debug, error};
use structopt::StructOpt;

async fn run(opt: cli::Download) -> Result<(), Error> {
    let config = Config::try_from(opt)?;
    Job::new(config)?.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let opt = cli::Download::from_args();
    debug!("cli args\n{:#?}", opt);

    // per-file failures are not errors: only invalid input and
    // fatal failures end up here, and make the process exit with 1.
    if let Err(e) = run(opt).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
