//! Generated-input validation.
//!
//! After resolution closes, every file a target lists as an input or source
//! from under the build directory must be produced by a dependency reachable
//! through `public_deps`. The scheduler accumulates the violations; this
//! module groups them per file, hunts down the actual producer with a brute
//! force scan (an error path, so the linear cost is fine), and prints one
//! diagnostic per file before failing the command.

use std::sync::Arc;

use itertools::Itertools;
use miette::Diagnostic;
use thiserror::Error;

use crate::builder::Builder;
use crate::console::Console;
use crate::files::SourceFile;
use crate::scheduler::UnknownInputs;
use crate::settings::BuildSettings;
use crate::target::Target;

/// Summary error; the detailed diagnostics have already been printed.
#[derive(Debug, Error, Diagnostic)]
#[error("found {count} unknown generated input(s)")]
#[diagnostic(
    code(kanna::validate::unknown_generated_inputs),
    help("every generated input needs a public_deps path from its consumer to its producer")
)]
pub struct ValidateError {
    pub count: usize,
}

const PUBLIC_DEPS_HINT: &str = "\
If you have generated inputs, there needs to be a dependency path between the
two targets in addition to just listing the files. For indirect dependencies,
the intermediate ones must be public_deps. data_deps don't count since they're
only runtime dependencies. If a dependency chain does exist, it is probably
private; make the intermediate links public_deps.
";

/// Run the global generated-input check, printing every violation.
///
/// # Errors
///
/// Returns a [`ValidateError`] carrying the violation count when any entry
/// exists; the check is always fatal.
pub fn check_for_invalid_generated_inputs(
    console: &Console,
    settings: &BuildSettings,
    builder: &Builder,
    unknown_inputs: &UnknownInputs,
) -> Result<(), ValidateError> {
    if unknown_inputs.is_empty() {
        return Ok(());
    }

    for (file, consumers) in unknown_inputs {
        console.print(&render_invalid_generated_input(
            settings, builder, file, consumers,
        ));
        console.print("\n");
    }
    console.print(PUBLIC_DEPS_HINT);

    let count = unknown_inputs.len();
    if count > 1 {
        console.warning(&format!("\n{count} generated input errors found."));
    }
    Err(ValidateError { count })
}

/// The target whose computed outputs contain the output file corresponding
/// to `file`, if any. Brute force over all resolved targets.
fn find_target_that_generates_file<'a>(
    settings: &BuildSettings,
    builder: &'a Builder,
    file: &SourceFile,
) -> Option<&'a Arc<Target>> {
    let output = settings.output_file_for(file)?;
    builder
        .get_all_resolved_targets()
        .iter()
        .find(|target| target.outputs.contains(&output))
}

/// Render the diagnostic for one bad file and its consumer targets.
///
/// Toolchain labels only show when some involved target is off the default
/// toolchain, keeping single-toolchain output terse.
fn render_invalid_generated_input(
    settings: &BuildSettings,
    builder: &Builder,
    file: &SourceFile,
    consumers: &[Arc<Target>],
) -> String {
    let generator = find_target_that_generates_file(settings, builder, file);

    let mut show_toolchains = consumers
        .iter()
        .any(|target| target.label.toolchain != settings.default_toolchain);
    if let Some(generator) = generator
        && generator.label.toolchain != settings.default_toolchain
    {
        show_toolchains = true;
    }

    let target_str = if consumers.len() > 1 {
        "targets"
    } else {
        "target"
    };
    let consumer_list = consumers
        .iter()
        .map(|target| format!("  {}", target.label.to_user_visible(show_toolchains)))
        .join("\n");

    let mut message = format!(
        "ERROR Input to {target_str} not generated by a dependency.\n\
         The file:\n  {file}\nis listed as an input or source for the {target_str}:\n\
         {consumer_list}\n"
    );
    match generator {
        Some(generator) => {
            message.push_str(&format!(
                "but this file was not generated by any dependencies of the {target_str}. \
                 The target\nthat generates the file is:\n  {}\n",
                generator.label.to_user_visible(show_toolchains)
            ));
        }
        None => message.push_str("but no targets in the build generate that file.\n"),
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TargetDef;
    use crate::files::SourceDir;
    use crate::label::ToolchainLabel;
    use crate::target::TargetType;
    use camino::Utf8PathBuf;
    use indexmap::IndexMap;

    fn settings() -> Arc<BuildSettings> {
        let root = SourceDir::root();
        Arc::new(BuildSettings {
            source_root: Utf8PathBuf::from("/src"),
            build_dir: SourceDir::resolve(&root, "//out").expect("build dir"),
            default_toolchain: ToolchainLabel::parse("//build/toolchain:default", &root)
                .expect("toolchain"),
            root_build_file: crate::files::SourceFile::resolve(&root, "//Kannafile")
                .expect("root file"),
            check_public_headers: false,
            check_system_includes: false,
        })
    }

    fn def(name: &str, target_type: TargetType) -> TargetDef {
        TargetDef {
            name: name.to_owned(),
            target_type,
            sources: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            deps: Vec::new(),
            public_deps: Vec::new(),
            data_deps: Vec::new(),
            script: None,
            args: Vec::new(),
            toolchain: None,
            jumbo: None,
        }
    }

    fn file(path: &str) -> SourceFile {
        SourceFile::resolve(&SourceDir::root(), path).expect("file")
    }

    fn add_target(builder: &mut Builder, dir: &str, def: &TargetDef) -> Arc<Target> {
        let dir = SourceDir::resolve(&SourceDir::root(), dir).expect("dir");
        let target = Target::from_def(builder.settings(), &dir, def).expect("target");
        let newly = builder.define_target(target).expect("define");
        Arc::clone(newly.last().expect("resolved"))
    }

    #[test]
    fn missing_producer_is_reported_as_such() {
        let settings = settings();
        let mut builder = Builder::new(Arc::clone(&settings));
        let consumer = add_target(&mut builder, "//app", &def("app", TargetType::Group));

        let message = render_invalid_generated_input(
            &settings,
            &builder,
            &file("//out/gen/b.h"),
            &[consumer],
        );
        assert!(message.contains("//out/gen/b.h"));
        assert!(message.contains("is listed as an input or source for the target:"));
        assert!(message.contains("no targets in the build generate that file"));
    }

    #[test]
    fn existing_producer_is_named() {
        let settings = settings();
        let mut builder = Builder::new(Arc::clone(&settings));
        let mut producer_def = def("gen_b", TargetType::Action);
        producer_def.outputs = vec!["//out/gen/b.h".to_owned()];
        add_target(&mut builder, "//gen", &producer_def);
        let consumer = add_target(&mut builder, "//app", &def("app", TargetType::Group));

        let message = render_invalid_generated_input(
            &settings,
            &builder,
            &file("//out/gen/b.h"),
            &[consumer],
        );
        assert!(message.contains("that generates the file is:\n  //gen:gen_b\n"));
    }

    #[test]
    fn toolchain_suffixes_are_suppressed_on_the_default_toolchain() {
        let settings = settings();
        let mut builder = Builder::new(Arc::clone(&settings));
        let consumer = add_target(&mut builder, "//app", &def("app", TargetType::Group));

        let message = render_invalid_generated_input(
            &settings,
            &builder,
            &file("//out/gen/b.h"),
            &[consumer],
        );
        assert!(!message.contains("(//build/toolchain:default)"));
    }

    #[test]
    fn toolchain_suffixes_show_when_a_consumer_is_off_default() {
        let settings = settings();
        let mut builder = Builder::new(Arc::clone(&settings));
        let mut consumer_def = def("app", TargetType::Group);
        consumer_def.toolchain = Some("//tc:alt".to_owned());
        let consumer = add_target(&mut builder, "//app", &consumer_def);

        let message = render_invalid_generated_input(
            &settings,
            &builder,
            &file("//out/gen/b.h"),
            &[consumer],
        );
        assert!(message.contains("//app:app(//tc:alt)"));
    }

    #[test]
    fn empty_multimap_passes() {
        let settings = settings();
        let builder = Builder::new(Arc::clone(&settings));
        let console = Console::new(true);
        let unknown: UnknownInputs = IndexMap::new();
        assert!(
            check_for_invalid_generated_inputs(&console, &settings, &builder, &unknown).is_ok()
        );
    }

    #[test]
    fn violations_fail_with_a_count() {
        let settings = settings();
        let mut builder = Builder::new(Arc::clone(&settings));
        let consumer = add_target(&mut builder, "//app", &def("app", TargetType::Group));
        let console = Console::new(true);

        let mut unknown: UnknownInputs = IndexMap::new();
        unknown.insert(file("//out/gen/a.h"), vec![Arc::clone(&consumer)]);
        unknown.insert(file("//out/gen/b.h"), vec![consumer]);
        let err = check_for_invalid_generated_inputs(&console, &settings, &builder, &unknown)
            .unwrap_err();
        assert_eq!(err.count, 2);
    }
}
