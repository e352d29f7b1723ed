use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};

use repoaudit::report::{prepare_output_dir, write_reports};
use repoaudit::{build_config, logging, run_audit, Args, ScanProgress, Side};

fn log_progress(side: Side, progress: ScanProgress) {
    let secs = progress.elapsed.as_secs();
    if progress.done {
        info!("Finished {side} scan: {} files in {secs}s", progress.files);
    } else {
        info!("Scanning {side} files: {} (elapsed {secs}s)", progress.files);
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(args.verbose) {
        eprintln!("Failed to initialise logging: {e}");
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(1);
        }
    };

    // Reports never land inside a scanned tree.
    let roots = [config.client_root.as_path(), config.server_root.as_path()];
    let out_dir = match prepare_output_dir(&args.output_dir, &roots) {
        Ok(dir) => dir,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let result = run_audit(&config, &mut log_progress);

    let paths = match write_reports(&result, &out_dir) {
        Ok(paths) => paths,
        Err(e) => {
            error!("Failed to write reports: {e:#}");
            return ExitCode::from(3);
        }
    };

    if !result.client.exists {
        warn!("Client directory not found: {}", result.client.dir);
    }
    if !result.server.exists {
        warn!("Server directory not found: {}", result.server.dir);
    }

    println!("== RepoAudit: Summary ==");
    println!("Client files:         {}", result.client.total_files);
    println!("Server files:         {}", result.server.total_files);
    println!("Facts examined:       {}", result.cross_check.examined.len());
    println!(
        "No textual evidence:  {}",
        result.cross_check.without_textual_evidence.len()
    );
    println!("Reports written to:");
    println!("- {}", paths.markdown.display());
    println!("- {}", paths.json.display());

    ExitCode::SUCCESS
}
