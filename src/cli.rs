//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::AppResult;
use crate::utils::urls::normalize_base_url;

/// Session-backed content discovery and download for an Ultra learning
/// portal.
///
/// Sign in once with `login`; every other command reuses the persisted
/// browser profile and never asks for credentials.
#[derive(Parser, Debug)]
#[command(name = "bb-acquire")]
#[command(author, version, about)]
pub struct Args {
    /// Portal landing URL (falls back to BB_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Browser profile directory holding the persisted session
    #[arg(long, global = true)]
    pub profile_dir: Option<String>,

    /// Run the browser headless (only sensible once a session exists)
    #[arg(long, global = true)]
    pub headless: bool,

    /// TOML file overriding individual settings
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the portal for interactive sign-in and persist the session
    Login {
        /// Keep the browser open until Enter is pressed here
        #[arg(long)]
        stay_open: bool,
    },
    /// Print enrolled courses, one name plus indented URL per course
    ListCourses,
    /// Expand a course page and print its downloadable links
    ListContent {
        /// Course outline URL (from list-courses)
        #[arg(long)]
        course_url: String,
    },
    /// Download the PDFs referenced by a course page
    Download {
        /// Course outline URL (from list-courses)
        #[arg(long)]
        course_url: String,
        /// Output directory (defaults to the configured download dir)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
        /// Keep only filenames matching this case-insensitive glob, e.g. "*week1*.pdf"
        #[arg(long, conflicts_with = "regex")]
        pattern: Option<String>,
        /// Keep only filenames matching this case-insensitive regex
        #[arg(long)]
        regex: Option<String>,
    },
    /// Inspect the saved profile without launching a browser
    SessionInfo,
}

impl Args {
    /// Assemble the effective configuration: environment defaults, then
    /// the optional file overlay, then explicit flags.
    pub async fn build_config(&self) -> AppResult<Config> {
        let mut config = Config::from_env();
        if let Some(path) = &self.config {
            config = config.apply_file(path).await?;
        }
        if let Some(v) = &self.base_url {
            config.base_url = normalize_base_url(v);
        }
        if let Some(v) = &self.profile_dir {
            config.profile_dir = v.clone();
        }
        if self.headless {
            config.headless = true;
        }
        Ok(config)
    }
}
