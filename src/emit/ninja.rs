//! Root Ninja file writer.
//!
//! Flushes the finalised per-toolchain rules into `build.ninja` under the
//! build directory. Non-default toolchains land in their own
//! `toolchain_<name>.ninja`, pulled in with `subninja` statements. All
//! ordering comes from the aggregator's label sort plus the toolchain map
//! order, so re-running with unchanged inputs produces byte-identical files.

use std::fmt::Write;

use anyhow::{Context, Result};
use itertools::Itertools;
use tracing::debug;

use super::PerToolchainRules;
use super::write_if_changed;
use crate::settings::BuildSettings;

/// Rules shared by every generated file. Toolchain files inherit them
/// through `subninja` scoping.
const RULE_PREAMBLE: &str = "\
rule cc
  command = c++ -MMD -MF $out.d -c $in -o $out
  depfile = $out.d
  deps = gcc
  description = CC $out
rule alink
  command = ar rcs $out $in
  description = AR $out
rule solink
  command = c++ -shared -o $out $in
  description = SOLINK $out
rule link
  command = c++ -o $out $in
  description = LINK $out
rule stamp
  command = touch $out
  description = STAMP $out
rule copy
  command = cp -af $in $out
  description = COPY $in $out
rule action
  command = $cmd
  description = ACTION $out
";

/// Write `build.ninja` and the per-toolchain files.
///
/// # Errors
///
/// Returns an error when a file cannot be written.
pub fn write_root_files(settings: &BuildSettings, rules: &PerToolchainRules) -> Result<()> {
    let build_dir = settings.build_dir_disk();

    let mut main = String::new();
    writeln!(main, "# Generated by kanna gen. Do not edit.").expect("write ninja");
    writeln!(main, "ninja_required_version = 1.7.2").expect("write ninja");
    writeln!(main).expect("write ninja");
    main.push_str(RULE_PREAMBLE);
    writeln!(main).expect("write ninja");

    let mut default_outputs = Vec::new();
    for (toolchain, pairs) in rules {
        if *toolchain == settings.default_toolchain {
            for (target, fragment) in pairs {
                main.push_str(fragment);
                if let Some(output) = target.primary_output() {
                    default_outputs.push(output.as_str().to_owned());
                }
            }
        } else {
            let file_name = format!("toolchain_{}.ninja", toolchain.name);
            let mut content = String::new();
            writeln!(content, "# Rules for {toolchain}.").expect("write ninja");
            writeln!(content).expect("write ninja");
            for (_, fragment) in pairs {
                content.push_str(fragment);
            }
            let path = build_dir.join(&file_name);
            write_if_changed(&path, &content)
                .with_context(|| format!("writing {path}"))?;
            writeln!(main, "subninja {file_name}").expect("write ninja");
        }
    }

    if !default_outputs.is_empty() {
        writeln!(main, "build all: phony {}", default_outputs.iter().join(" "))
            .expect("write ninja");
        writeln!(main, "default all").expect("write ninja");
    }

    let path = build_dir.join("build.ninja");
    let changed = write_if_changed(&path, &main).with_context(|| format!("writing {path}"))?;
    debug!(%path, changed, "root ninja file flushed");
    Ok(())
}
