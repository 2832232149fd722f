//! Xcode project writer.
//!
//! Rather than modelling the build natively, the generated project carries a
//! single legacy (external build system) target that shells out to the
//! downstream Ninja executor, which is all Xcode needs for indexing and
//! building. Object identifiers are derived from the project name so
//! regeneration is stable.

use std::fmt::Write;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use super::{IdeError, WriterOptions};
use crate::builder::Builder;
use crate::emit::write_if_changed;
use crate::settings::BuildSettings;

/// Build-system flavour selected with `--xcode-build-system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildSystem {
    #[default]
    Legacy,
    New,
}

impl BuildSystem {
    fn parse(raw: Option<&str>) -> Result<Self, IdeError> {
        match raw {
            None | Some("") | Some("legacy") => Ok(Self::Legacy),
            Some("new") => Ok(Self::New),
            Some(other) => Err(IdeError::UnknownBuildSystem(other.to_owned())),
        }
    }

    fn workspace_flag(self) -> &'static str {
        match self {
            // The legacy build system must be requested explicitly.
            Self::Legacy => "\t<key>BuildSystemType</key>\n\t<string>Original</string>\n",
            Self::New => "",
        }
    }
}

/// Write `<project>.xcodeproj` into the build directory.
///
/// # Errors
///
/// Returns an error for unknown `--xcode-build-system` values or when a
/// file cannot be written.
pub fn run_and_write_files(
    settings: &BuildSettings,
    _builder: &Builder,
    options: WriterOptions<'_>,
) -> Result<()> {
    let build_system = BuildSystem::parse(options.xcode_build_system)?;
    let project_name = match options.xcode_project {
        Some(name) if !name.is_empty() => name,
        _ => "all",
    };
    let ninja = options.ninja_executable.unwrap_or("ninja");
    let build_args = options
        .root_target
        .map_or_else(String::new, |root| format!(" {root}"));

    let ids: Vec<String> = (0..4).map(|n| object_id(project_name, n)).collect();
    let [project_id, target_id, config_list_id, config_id] = [&ids[0], &ids[1], &ids[2], &ids[3]];

    let mut pbxproj = String::new();
    writeln!(pbxproj, "// !$*UTF8*$!").expect("write pbxproj");
    writeln!(pbxproj, "{{").expect("write pbxproj");
    writeln!(pbxproj, "\tarchiveVersion = 1;").expect("write pbxproj");
    writeln!(pbxproj, "\tobjectVersion = 46;").expect("write pbxproj");
    writeln!(pbxproj, "\tobjects = {{").expect("write pbxproj");
    writeln!(
        pbxproj,
        "\t\t{target_id} = {{\n\t\t\tisa = PBXLegacyTarget;\n\t\t\tbuildArgsString = \"-C .{build_args}\";\n\t\t\tbuildToolPath = \"{ninja}\";\n\t\t\tname = All;\n\t\t\tproductName = All;\n\t\t}};"
    )
    .expect("write pbxproj");
    writeln!(
        pbxproj,
        "\t\t{config_id} = {{\n\t\t\tisa = XCBuildConfiguration;\n\t\t\tname = Release;\n\t\t}};"
    )
    .expect("write pbxproj");
    writeln!(
        pbxproj,
        "\t\t{config_list_id} = {{\n\t\t\tisa = XCConfigurationList;\n\t\t\tbuildConfigurations = ({config_id});\n\t\t\tdefaultConfigurationName = Release;\n\t\t}};"
    )
    .expect("write pbxproj");
    writeln!(
        pbxproj,
        "\t\t{project_id} = {{\n\t\t\tisa = PBXProject;\n\t\t\tbuildConfigurationList = {config_list_id};\n\t\t\ttargets = ({target_id});\n\t\t}};"
    )
    .expect("write pbxproj");
    writeln!(pbxproj, "\t}};").expect("write pbxproj");
    writeln!(pbxproj, "\trootObject = {project_id};").expect("write pbxproj");
    writeln!(pbxproj, "}}").expect("write pbxproj");

    let project_dir = settings
        .build_dir_disk()
        .join(format!("{project_name}.xcodeproj"));
    let path = project_dir.join("project.pbxproj");
    write_if_changed(&path, &pbxproj).with_context(|| format!("writing {path}"))?;

    let workspace = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Workspace version=\"1.0\">\n\
         \t<FileRef location=\"self:\"></FileRef>\n</Workspace>\n";
    let workspace_path = project_dir
        .join("project.xcworkspace")
        .join("contents.xcworkspacedata");
    write_if_changed(&workspace_path, workspace)
        .with_context(|| format!("writing {workspace_path}"))?;

    let settings_plist = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n<dict>\n{}</dict>\n</plist>\n",
        build_system.workspace_flag()
    );
    let plist_path = project_dir
        .join("project.xcworkspace")
        .join("xcshareddata")
        .join("WorkspaceSettings.xcsettings");
    write_if_changed(&plist_path, &settings_plist)
        .with_context(|| format!("writing {plist_path}"))?;
    Ok(())
}

/// 24-hex-digit object identifier, deterministic per (project, index).
fn object_id(project_name: &str, index: u8) -> String {
    let digest = Sha256::digest([project_name.as_bytes(), &[index]].concat());
    digest.iter().take(12).map(|b| format!("{b:02X}")).collect()
}
