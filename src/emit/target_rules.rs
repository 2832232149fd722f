//! Per-target Ninja rule fragments.
//!
//! [`write_target_rules`] is the injected per-target writer: a pure function
//! from a resolved [`Target`] to the Ninja text describing how to build it.
//! It observes nothing but its arguments, so worker threads may run it in any
//! order; fragment placement and ordering are the aggregator's concern.

use std::fmt::Write;

use itertools::Itertools;
use thiserror::Error;

use crate::files::SourceFile;
use crate::settings::BuildSettings;
use crate::target::{Target, TargetType, object_dir};

/// Errors raised while writing a rule fragment.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("{label}: copy needs one output per source ({sources} sources, {outputs} outputs)")]
    CopyCountMismatch {
        label: String,
        sources: usize,
        outputs: usize,
    },
}

/// Escape a path for use in a Ninja build statement.
fn escape(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for ch in path.chars() {
        if matches!(ch, ' ' | ':' | '$') {
            escaped.push('$');
        }
        escaped.push(ch);
    }
    escaped
}

/// Write the rule fragment for one resolved target.
///
/// # Errors
///
/// Returns an error for malformed copy targets; any error is fatal to the
/// gen command once the pool drains.
pub fn write_target_rules(settings: &BuildSettings, target: &Target) -> Result<String, EmitError> {
    let mut out = String::new();
    writeln!(out, "# {}", target.label.to_user_visible(true)).expect("write fragment");

    let dep_outputs: Vec<String> = target
        .linked_dep_outputs
        .iter()
        .map(|output| escape(output.as_str()))
        .collect();
    match target.target_type {
        TargetType::Executable => {
            let objects = write_object_builds(&mut out, settings, target);
            write_final_edge(&mut out, target, "link", &objects, &dep_outputs);
        }
        TargetType::StaticLibrary => {
            let objects = write_object_builds(&mut out, settings, target);
            write_final_edge(&mut out, target, "alink", &objects, &dep_outputs);
        }
        TargetType::SharedLibrary => {
            let objects = write_object_builds(&mut out, settings, target);
            write_final_edge(&mut out, target, "solink", &objects, &dep_outputs);
        }
        TargetType::SourceSet => {
            let objects = write_object_builds(&mut out, settings, target);
            write_final_edge(&mut out, target, "stamp", &objects, &dep_outputs);
        }
        TargetType::Group => {
            // A group's stamp depends directly on its deps' outputs.
            write_final_edge(&mut out, target, "stamp", &dep_outputs, &[]);
        }
        TargetType::Action => write_action(&mut out, settings, target),
        TargetType::Copy => write_copies(&mut out, settings, target)?,
    }

    writeln!(out).expect("write fragment");
    debug_assert!(!out.is_empty(), "every target yields a fragment");
    Ok(out)
}

fn rebased(settings: &BuildSettings, file: &SourceFile) -> String {
    escape(&settings.rebase_to_build_dir(file))
}

/// Compile each source into the target's object directory; returns the
/// object paths. Declared inputs become implicit deps of every compile.
fn write_object_builds(out: &mut String, settings: &BuildSettings, target: &Target) -> Vec<String> {
    let obj_dir = object_dir(settings, &target.label);
    let inputs: Vec<String> = target
        .inputs
        .iter()
        .map(|input| rebased(settings, input))
        .collect();
    target
        .sources
        .iter()
        .map(|source| {
            let file_name = source.without_root().rsplit('/').next().unwrap_or_default();
            let object = escape(&format!("{obj_dir}/{}/{file_name}.o", target.label.name));
            write!(out, "build {object}: cc {}", rebased(settings, source))
                .expect("write fragment");
            if !inputs.is_empty() {
                write!(out, " | {}", inputs.iter().join(" ")).expect("write fragment");
            }
            writeln!(out).expect("write fragment");
            object
        })
        .collect()
}

/// The edge producing the target's declared outputs.
fn write_final_edge(
    out: &mut String,
    target: &Target,
    rule: &str,
    inputs: &[String],
    implicit: &[String],
) {
    let outputs = target
        .outputs
        .iter()
        .map(|output| escape(output.as_str()))
        .join(" ");
    write!(out, "build {outputs}: {rule}").expect("write fragment");
    if !inputs.is_empty() {
        write!(out, " {}", inputs.iter().join(" ")).expect("write fragment");
    }
    if !implicit.is_empty() {
        write!(out, " | {}", implicit.iter().join(" ")).expect("write fragment");
    }
    let order_only = target
        .data_dep_outputs
        .iter()
        .map(|output| escape(output.as_str()))
        .join(" ");
    if !order_only.is_empty() {
        write!(out, " || {order_only}").expect("write fragment");
    }
    writeln!(out).expect("write fragment");
}

fn write_action(out: &mut String, settings: &BuildSettings, target: &Target) {
    let outputs = target
        .outputs
        .iter()
        .map(|output| escape(output.as_str()))
        .join(" ");
    let mut explicit: Vec<String> = Vec::new();
    if let Some(script) = &target.script {
        explicit.push(rebased(settings, script));
    }
    explicit.extend(target.sources.iter().map(|s| rebased(settings, s)));
    write!(out, "build {outputs}: action").expect("write fragment");
    if !explicit.is_empty() {
        write!(out, " {}", explicit.iter().join(" ")).expect("write fragment");
    }
    let implicit: Vec<String> = target
        .inputs
        .iter()
        .map(|input| rebased(settings, input))
        .chain(
            target
                .linked_dep_outputs
                .iter()
                .map(|output| escape(output.as_str())),
        )
        .collect();
    if !implicit.is_empty() {
        write!(out, " | {}", implicit.iter().join(" ")).expect("write fragment");
    }
    writeln!(out).expect("write fragment");

    let cmd = match &target.script {
        Some(script) => {
            let mut cmd = format!("python3 {}", rebased(settings, script));
            for arg in &target.script_args {
                cmd.push(' ');
                cmd.push_str(arg);
            }
            cmd
        }
        None => "touch $out".to_owned(),
    };
    writeln!(out, "  cmd = {cmd}").expect("write fragment");
}

fn write_copies(
    out: &mut String,
    settings: &BuildSettings,
    target: &Target,
) -> Result<(), EmitError> {
    if target.sources.len() != target.outputs.len() {
        return Err(EmitError::CopyCountMismatch {
            label: target.label.to_user_visible(true),
            sources: target.sources.len(),
            outputs: target.outputs.len(),
        });
    }
    for (source, output) in target.sources.iter().zip(&target.outputs) {
        writeln!(
            out,
            "build {}: copy {}",
            escape(output.as_str()),
            rebased(settings, source)
        )
        .expect("write fragment");
    }
    Ok(())
}
