//! Visual Studio solution and project writer.
//!
//! Every binary target selected by the filters becomes an NMake-style
//! `.vcxproj` that shells out to the downstream Ninja executor; one solution
//! file (default `all.sln`) ties them together. Project GUIDs are derived
//! from labels so regeneration never churns the solution.

use std::fmt::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use super::{WriterOptions, filtered_targets};
use crate::builder::Builder;
use crate::emit::write_if_changed;
use crate::label::Label;
use crate::settings::BuildSettings;
use crate::target::Target;

/// Supported Visual Studio versions; the bare `vs` tag maps to the newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Vs2013,
    Vs2015,
    Vs2017,
    Vs2019,
}

impl Version {
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "vs2013" => Self::Vs2013,
            "vs2015" => Self::Vs2015,
            "vs2017" => Self::Vs2017,
            _ => Self::Vs2019,
        }
    }

    fn tools_version(self) -> &'static str {
        match self {
            Self::Vs2013 => "12.0",
            Self::Vs2015 => "14.0",
            Self::Vs2017 => "15.0",
            Self::Vs2019 => "16.0",
        }
    }

    fn solution_comment(self) -> &'static str {
        match self {
            Self::Vs2013 => "# Visual Studio 2013",
            Self::Vs2015 => "# Visual Studio 14",
            Self::Vs2017 => "# Visual Studio 15",
            Self::Vs2019 => "# Visual Studio Version 16",
        }
    }
}

/// Write the solution and one project per selected binary target.
///
/// # Errors
///
/// Returns an error when a file cannot be written.
pub fn run_and_write_files(
    settings: &BuildSettings,
    builder: &Builder,
    version: Version,
    options: WriterOptions<'_>,
) -> Result<()> {
    let targets = filtered_targets(settings, builder, options.filters, options.no_deps)?;
    let projects: Vec<&Arc<Target>> = targets.iter().filter(|t| t.is_binary()).collect();

    let build_dir = settings.build_dir_disk();
    let mut solution_entries = Vec::new();
    for target in &projects {
        let guid = label_guid(&target.label);
        let project_rel = format!("obj/{}.vcxproj", project_stem(&target.label));
        write_project(settings, target, version, options, &guid, &project_rel)?;
        solution_entries.push((target.label.clone(), guid, project_rel));
    }

    let mut sln = String::new();
    writeln!(sln, "Microsoft Visual Studio Solution File, Format Version 12.00")
        .expect("write sln");
    writeln!(sln, "{}", version.solution_comment()).expect("write sln");
    for (label, guid, project_rel) in &solution_entries {
        writeln!(
            sln,
            "Project(\"{{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}}\") = \"{}\", \"{project_rel}\", \"{{{guid}}}\"",
            label.name
        )
        .expect("write sln");
        writeln!(sln, "EndProject").expect("write sln");
    }
    writeln!(sln, "Global").expect("write sln");
    writeln!(sln, "EndGlobal").expect("write sln");

    let sln_name = options.sln_name.unwrap_or("all");
    let path = build_dir.join(format!("{sln_name}.sln"));
    write_if_changed(&path, &sln).with_context(|| format!("writing {path}"))?;
    Ok(())
}

fn project_stem(label: &Label) -> String {
    if label.dir.is_root() {
        label.name.clone()
    } else {
        format!("{}/{}", label.dir.without_root(), label.name)
    }
}

fn write_project(
    settings: &BuildSettings,
    target: &Target,
    version: Version,
    options: WriterOptions<'_>,
    guid: &str,
    project_rel: &str,
) -> Result<()> {
    let ninja = options.ninja_executable.unwrap_or("ninja");
    let extra_args = options
        .ninja_extra_args
        .map_or_else(String::new, |args| format!(" {args}"));
    let output = target
        .primary_output()
        .map(crate::files::OutputFile::as_str)
        .unwrap_or_default();

    let mut project = String::new();
    writeln!(project, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write vcxproj");
    writeln!(
        project,
        "<Project DefaultTargets=\"Build\" ToolsVersion=\"{}\" xmlns=\"http://schemas.microsoft.com/developer/msbuild/2003\">",
        version.tools_version()
    )
    .expect("write vcxproj");
    writeln!(project, "  <PropertyGroup>").expect("write vcxproj");
    writeln!(project, "    <ProjectGuid>{{{guid}}}</ProjectGuid>").expect("write vcxproj");
    if let Some(win_sdk) = options.win_sdk {
        writeln!(
            project,
            "    <WindowsTargetPlatformVersion>{win_sdk}</WindowsTargetPlatformVersion>"
        )
        .expect("write vcxproj");
    }
    writeln!(
        project,
        "    <NMakeBuildCommandLine>{ninja}{extra_args} {output}</NMakeBuildCommandLine>"
    )
    .expect("write vcxproj");
    writeln!(project, "  </PropertyGroup>").expect("write vcxproj");
    writeln!(project, "  <ItemGroup>").expect("write vcxproj");
    for source in &target.sources {
        writeln!(
            project,
            "    <ClCompile Include=\"{}\" />",
            settings.disk_path(source)
        )
        .expect("write vcxproj");
    }
    writeln!(project, "  </ItemGroup>").expect("write vcxproj");
    writeln!(project, "</Project>").expect("write vcxproj");

    let path = settings.build_dir_disk().join(project_rel);
    write_if_changed(&path, &project).with_context(|| format!("writing {path}"))?;
    Ok(())
}

/// Deterministic GUID for a label: the leading bytes of a SHA-256 over the
/// fully qualified name, formatted 8-4-4-4-12.
fn label_guid(label: &Label) -> String {
    let digest = Sha256::digest(label.to_user_visible(true).as_bytes());
    let hex: String = digest.iter().take(16).map(|b| format!("{b:02X}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}
