use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use bb_acquire::app::{self, SessionReport};
use bb_acquire::cli::{Args, Command};
use bb_acquire::error::{AppError, AppResult};
use bb_acquire::offload::OffloadRunner;
use bb_acquire::utils::logging::{self, kib};

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> AppResult<()> {
    let runner = OffloadRunner::new()?;
    let config = runner.run(args.build_config())?;

    if config.base_url.is_empty()
        && matches!(args.command, Command::Login { .. } | Command::ListCourses)
    {
        return Err(AppError::Other(
            "a portal URL is required: pass --base-url or set BB_BASE_URL".to_string(),
        ));
    }

    match &args.command {
        // Answered from disk, no browser launch.
        Command::SessionInfo => {
            print_session_report(&app::session_report(&config));
            Ok(())
        }
        Command::Login { stay_open } => runner.run_login(&config, *stay_open),
        Command::ListCourses => {
            let courses = runner.run_list_courses(&config)?;
            if courses.is_empty() {
                eprintln!(
                    "No courses detected on the landing page. Navigate into 'Courses' in the browser, then re-run list-courses."
                );
            }
            for course in &courses {
                println!("{}\n  {}\n", course.label, course.url);
            }
            Ok(())
        }
        Command::ListContent { course_url } => {
            let items = runner.run_list_content(&config, course_url)?;
            if items.is_empty() {
                eprintln!(
                    "No obvious downloadable items found. Try expanding content sections or switching to 'Original View' content areas, then re-run."
                );
            }
            for item in &items {
                println!("{}\n  {}\n", item.label, item.url);
            }
            Ok(())
        }
        Command::Download {
            course_url,
            out,
            pattern,
            regex,
        } => {
            let out_dir = out
                .clone()
                .unwrap_or_else(|| PathBuf::from(&config.download_dir));
            let report = runner.run_download(
                &config,
                course_url,
                &out_dir,
                pattern.as_deref(),
                regex.as_deref(),
            )?;
            for saved in &report.saved {
                println!("{}", report.out_dir.join(&saved.file_name).display());
            }
            Ok(())
        }
    }
}

fn print_session_report(report: &SessionReport) {
    if !report.exists {
        println!(
            "Profile directory does not exist: {}",
            report.profile_dir.display()
        );
        return;
    }
    println!("Profile path: {}", report.profile_dir.display());
    println!(
        "Files: {}  Size: {}",
        report.file_count,
        kib(report.total_bytes)
    );
    for artifact in &report.artifacts {
        println!("Found: {} ({} bytes)", artifact.rel_path, artifact.bytes);
    }
    if let Some(host) = &report.base_host {
        println!("Confirmed host: {host}");
    }
    if let Some(modified) = &report.snapshot_modified {
        println!(
            "Cookie snapshot written: {}",
            modified.format("%Y-%m-%d %H:%M:%S")
        );
    }
    match &report.cookie_domains {
        Some(domains) if domains.is_empty() => println!("Cookie snapshot domains: (none)"),
        Some(domains) => println!("Cookie snapshot domains: {}", domains.join(", ")),
        None => {}
    }
}
