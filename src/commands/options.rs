//! Options command implementation
//!
//! Lists every resolved option in resolution order with its value and the
//! source it came from, followed by the export registry.

use anyhow::Result;
use clap::Args;

use super::ProfileArgs;
use stitch::options::ApplicationOption;
use stitch::output::OutputConfig;
use stitch::phases::orchestrator;

/// Print resolved options
#[derive(Args, Debug)]
pub struct OptionsArgs {
    /// Also list the export registry
    #[arg(long)]
    pub exports: bool,
}

/// Execute the options command
pub fn execute(args: OptionsArgs, profile_args: &ProfileArgs, output: &OutputConfig) -> Result<()> {
    let profile = profile_args.load()?;
    let composition = orchestrator::compose(&profile)?;

    for line in option_lines(&composition.options) {
        println!("{}", line);
    }

    if args.exports {
        println!();
        println!("{}", output.heading("Exports"));
        for (key, value) in composition.options.exports() {
            println!("{} = {}", key, value.to_json());
        }
    }
    Ok(())
}

/// `project.option = value (source)` per result.
fn option_lines(options: &ApplicationOption) -> Vec<String> {
    options
        .results()
        .map(|(project, option, item)| {
            let value = item
                .value
                .as_ref()
                .map(|value| value.to_json().to_string())
                .unwrap_or_else(|| "<unset>".to_string());
            format!("{}.{} = {} ({})", project, option, value, item.source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stitch::options::CommonFacts;
    use stitch::setting::{OptionDeclaration, ProjectSetting};
    use stitch::value::{OptionType, OptionValue};
    use std::path::PathBuf;

    #[test]
    fn test_option_lines() {
        let mut options = ApplicationOption::new(CommonFacts::detect());
        let mut optional = OptionDeclaration::new("base", "extra", OptionType::String);
        optional.optional = true;
        let setting = ProjectSetting {
            name: "base".to_string(),
            dir: PathBuf::from("/src/base"),
            file: PathBuf::from("/src/base/stitch.yaml"),
            options: vec![
                OptionDeclaration::new("base", "mode", OptionType::String)
                    .with_default(OptionValue::String("dev".to_string())),
                optional,
            ],
            dependencies: Vec::new(),
            resources: Vec::new(),
        };
        let mut locate = |_: &str| -> stitch::error::Result<String> { unreachable!() };
        options.resolve_project(&setting, &mut locate).unwrap();

        assert_eq!(
            option_lines(&options),
            vec![
                "base.mode = \"dev\" (default)".to_string(),
                "base.extra = <unset> (unset)".to_string(),
            ]
        );
    }
}
