//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "ccnews",
    about = "Download the CommonCrawl News WARC files of a month."
)]
/// Download command and parameters.
/// ```sh
/// ccnews 0.1.0
/// Download the CommonCrawl News WARC files of a month.
///
/// USAGE:
///     ccnews [OPTIONS] <period>
///
/// FLAGS:
///     -h, --help       Prints help information
///     -V, --version    Prints version information
///
/// OPTIONS:
///         --backoff <backoff>                    initial wait between attempts, in seconds [default: 10]
///     -t, --concurrency <concurrency>            number of simultaneous downloads [default: 10]
///         --download-folder <download-folder>    override the default download folder
///         --max-attempts <max-attempts>          attempts per file before giving up [default: 5]
///         --max-files <max-files>                maximum number of WARC files to download (for testing), 0 for no limit
///         --report <report>                      write a JSON report of the run to this file
///         --timeout <timeout>                    per request timeout, in seconds
///
/// ARGS:
///     <period>    year and month in YYYY/MM format (e.g. 2023/09)
/// ```
pub struct Download {
    #[structopt(help = "year and month in YYYY/MM format (e.g. 2023/09)")]
    pub period: String,
    #[structopt(
        long = "max-files",
        help = "maximum number of WARC files to download (for testing), 0 for no limit"
    )]
    pub max_files: Option<usize>,
    #[structopt(
        long = "download-folder",
        parse(from_os_str),
        help = "override the default download folder"
    )]
    pub download_folder: Option<PathBuf>,
    #[structopt(
        short = "t",
        long = "concurrency",
        default_value = "10",
        help = "number of simultaneous downloads"
    )]
    pub concurrency: usize,
    #[structopt(
        long = "max-attempts",
        default_value = "5",
        help = "attempts per file before giving up"
    )]
    pub max_attempts: u32,
    #[structopt(
        long = "backoff",
        default_value = "10",
        help = "initial wait between attempts, in seconds"
    )]
    pub backoff: u64,
    #[structopt(long = "timeout", help = "per request timeout, in seconds")]
    pub timeout: Option<u64>,
    #[structopt(
        long = "report",
        parse(from_os_str),
        help = "write a JSON report of the run to this file"
    )]
    pub report: Option<PathBuf>,
    #[structopt(long = "manifest-base-url", hidden = true)]
    pub manifest_base_url: Option<String>,
    #[structopt(long = "data-base-url", hidden = true)]
    pub data_base_url: Option<String>,
}
