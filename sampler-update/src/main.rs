//! Update `sampler.html` with the encoded paths of `references/common-paths.md`
//!
//! The paths are encoded by running `scripts/path-codec.js --encode-all` with Node.js. The
//! decoder and the resulting `PATHS` object then replace the ones embedded in `sampler.html`.
//!
//! # Example
//!
//! `update-sampler --skill-dir ~/skills/codegen-images`

mod splice;

use std::{path, process};

use anyhow::{bail, Context};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use fs_err as fs;
use log::{info, warn};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Directory containing `sampler.html` and the path encoder
    #[arg(long, env = "CODEGEN_IMAGES_DIR", default_value = "/mnt/skills/user/codegen-images")]
    skill_dir: path::PathBuf,

    /// Node.js executable used to run the encoder
    #[arg(long, default_value = "node")]
    node: String,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

/// Encoder script, relative to the skill directory
const PATH_CODEC_JS: &str = "scripts/path-codec.js";

/// Files used by the update, relative to the skill directory
struct SkillFiles {
    common_paths_md: path::PathBuf,
    sampler_html: path::PathBuf,
    path_codec_js: path::PathBuf,
}

impl SkillFiles {
    fn new(skill_dir: &path::Path) -> Self {
        Self {
            common_paths_md: skill_dir.join("references").join("common-paths.md"),
            sampler_html: skill_dir.join("sampler.html"),
            path_codec_js: skill_dir.join(PATH_CODEC_JS),
        }
    }

    fn check_exist(&self) -> anyhow::Result<()> {
        for (what, file) in [
            ("Source file", &self.common_paths_md),
            ("Target file", &self.sampler_html),
            ("Encoder script", &self.path_codec_js),
        ] {
            if !file.exists() {
                bail!("{what} not found: {}", file.display());
            }
        }
        Ok(())
    }
}

/// Run the encoder from within `skill_dir` and return what it printed
fn encode_paths(node: &str, skill_dir: &path::Path) -> anyhow::Result<String> {
    let output = process::Command::new(node)
        .arg(PATH_CODEC_JS)
        .arg("--encode-all")
        .current_dir(skill_dir)
        .output()
        .with_context(|| format!("could not run encoder with {node}"))?;
    if !output.status.success() {
        bail!(
            "encoder exited with {}\nstderr: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8(output.stdout).context("encoder output is not valid UTF-8")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    let files = SkillFiles::new(&cli.skill_dir);
    info!("Updating sampler.html from common-paths.md...");
    info!("  Source: {}", files.common_paths_md.display());
    info!("  Target: {}", files.sampler_html.display());
    files.check_exist()?;

    info!("Encoding paths...");
    let encoded = encode_paths(&cli.node, &cli.skill_dir)?;

    info!("Extracting PATHS section...");
    let sections = splice::extract_sections(&encoded)?;

    info!("Updating sampler.html...");
    let html = fs::read_to_string(&files.sampler_html)?;
    let update = splice::update_sampler_html(&html, &sections)?;
    if update.get_opts_replaced {
        info!("Updated getOpts function to use uniform rendering");
    } else {
        warn!("Could not find getOpts function to update");
    }
    fs::write(&files.sampler_html, update.content)?;

    info!("Updated {}", files.sampler_html.display());
    info!("  Replaced {} PATHS section(s)", update.paths_replaced);
    info!("Update complete!");
    Ok(())
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}

#[cfg(test)]
fn temp_skill_dir(name: &str) -> path::PathBuf {
    let dir = std::env::temp_dir().join(format!("update-sampler-{name}-{}", process::id()));
    fs::create_dir_all(dir.join("references")).unwrap();
    fs::create_dir_all(dir.join("scripts")).unwrap();
    dir
}

#[test]
fn skill_files_are_checked_in_order() {
    let dir = std::env::temp_dir().join(format!("update-sampler-{}", process::id()));
    fs::create_dir_all(dir.join("references")).unwrap();
    fs::write(dir.join("references").join("common-paths.md"), "# paths").unwrap();

    let err = SkillFiles::new(&dir).check_exist().unwrap_err();
    fs::remove_dir_all(&dir).unwrap();
    assert!(err.to_string().starts_with("Target file not found: "));
    assert!(err.to_string().ends_with("sampler.html"));
}

#[test]
fn encoder_output_is_captured_from_a_relative_skill_dir() {
    let dir = temp_skill_dir("relative");
    fs::write(dir.join(PATH_CODEC_JS), "echo \"encoded $1\"\n").unwrap();

    // The same directory, spelled relative to the working directory
    let cwd = std::env::current_dir().unwrap();
    let up: path::PathBuf = cwd.components().skip(1).map(|_| "..").collect();
    let relative = up.join(dir.strip_prefix("/").unwrap());
    assert!(relative.is_relative());

    let result = encode_paths("sh", &relative);
    fs::remove_dir_all(&dir).unwrap();
    assert_eq!(result.unwrap(), "encoded --encode-all\n");
}

#[test]
fn encoder_failure_reports_status_and_stderr() {
    let dir = temp_skill_dir("failing");
    fs::write(dir.join(PATH_CODEC_JS), "echo 'bad path' >&2\nexit 3\n").unwrap();

    let err = encode_paths("sh", &dir).unwrap_err().to_string();
    fs::remove_dir_all(&dir).unwrap();

    assert!(err.starts_with("encoder exited with exit status: 3"), "{err}");
    assert!(err.ends_with("stderr: bad path\n"), "{err}");
}
