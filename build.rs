use clap::CommandFactory;
use clap_mangen::Man;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

#[path = "src/cli.rs"]
#[expect(
    dead_code,
    reason = "Only type definitions are needed for man page generation"
)]
mod cli;

fn main() -> Result<(), Box<dyn Error>> {
    // Regenerate the manual pages when the CLI or metadata changes.
    println!("cargo:rerun-if-changed=src/cli.rs");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_NAME");
    println!("cargo:rerun-if-env-changed=CARGO_BIN_NAME");

    let out_dir = PathBuf::from("target/generated-man");
    if out_dir.exists() {
        fs::remove_dir_all(&out_dir)?;
    }
    fs::create_dir_all(&out_dir)?;

    // The top-level page summarises the tool; each subcommand gets its own
    // page so `man kanna-gen` documents every generator switch.
    let cmd = cli::Cli::command();
    let name = cmd.get_name().to_owned();
    render_page(cmd.clone(), &out_dir, &name)?;
    for sub in cmd.get_subcommands() {
        let page = format!("{name}-{}", sub.get_name());
        render_page(sub.clone(), &out_dir, &page)?;
    }

    Ok(())
}

fn render_page(cmd: clap::Command, out_dir: &Path, page: &str) -> Result<(), Box<dyn Error>> {
    let man = Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    fs::write(out_dir.join(format!("{page}.1")), buf)?;
    Ok(())
}
