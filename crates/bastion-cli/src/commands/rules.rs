//! Rules command implementation.
//!
//! Lists, exports and imports the compliance rule table.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use bastion_compliance::checker::ComplianceChecker;
use bastion_compliance::rules::{ComplianceRule, RuleTable};
use bastion_config::{read_file, save_config, write_file};

use crate::commands::Context;
use crate::error::CliError;
use crate::output::{print_header, print_info, print_output, print_success, print_warning};

/// Arguments for the rules command.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

/// Rules subcommands.
#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Show the configured rules
    List,

    /// Write the configured rules to a file
    Export(FileArgs),

    /// Merge rules from a file into the configuration
    Import(FileArgs),
}

/// File argument shared by export and import.
#[derive(Args, Debug)]
pub struct FileArgs {
    /// Rule table file (yaml, json or toml)
    #[arg(long)]
    pub file: PathBuf,
}

/// Rule row for display.
#[derive(Debug, Serialize, Tabled)]
pub struct RuleRow {
    #[tabled(rename = "Rule")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub rule_type: String,
    #[tabled(rename = "Severity")]
    pub severity: String,
    #[tabled(rename = "Enabled")]
    pub enabled: bool,
    #[tabled(rename = "Parameters")]
    pub parameters: String,
}

impl From<&ComplianceRule> for RuleRow {
    fn from(rule: &ComplianceRule) -> Self {
        Self {
            name: rule.name.clone(),
            rule_type: rule.kind.type_name().to_string(),
            severity: rule.severity.to_string(),
            enabled: rule.enabled,
            parameters: rule.kind.parameters().to_string(),
        }
    }
}

/// Execute the rules command.
pub fn execute(args: RulesArgs, ctx: &Context) -> Result<()> {
    match args.command {
        RulesCommand::List => list(ctx),
        RulesCommand::Export(file) => export(&file, ctx),
        RulesCommand::Import(file) => import(&file, ctx),
    }
}

fn list(ctx: &Context) -> Result<()> {
    let checker = ctx.config.compliance.checker();
    let rows: Vec<RuleRow> = checker.rules().map(RuleRow::from).collect();

    if ctx.is_table() {
        print_header("Compliance Rules");
    }
    print_output(&rows, ctx.format)
}

fn export(args: &FileArgs, ctx: &Context) -> Result<()> {
    let table = ctx.config.compliance.checker().export_rules();
    write_file(&table, &args.file)?;

    if !ctx.quiet {
        print_success(&format!(
            "Exported {} rules to {}",
            table.len(),
            args.file.display()
        ));
    }
    Ok(())
}

fn import(args: &FileArgs, ctx: &Context) -> Result<()> {
    let table: RuleTable = read_file(&args.file)?;
    let total = table.len();

    let mut checker: ComplianceChecker = ctx.config.compliance.checker();
    let imported = checker.import_rules(table);
    if imported < total && !ctx.quiet {
        print_warning(&format!("Skipped {} invalid rule(s)", total - imported));
    }

    let path = ctx
        .config_path
        .as_ref()
        .ok_or_else(|| CliError::Config("no configuration file to import into".to_string()))?;

    let mut config = ctx.config.clone();
    config.compliance.rules = checker.export_rules();
    save_config(&config, path)?;

    if !ctx.quiet {
        print_success(&format!("Imported {imported} rules into {}", path.display()));
        print_info(&format!("{} rules configured", config.compliance.rules.len()));
    }
    Ok(())
}
