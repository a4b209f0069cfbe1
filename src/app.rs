use std::{io, sync::Arc};

use anyhow::{Context, Result};

use chatwatch::{
    domain::{
        self,
        chat_item::{ChannelId, UserId},
        rule::Pattern,
    },
    hub::{self, ChannelStreamHub, HubOptions},
    infra, rules,
    usecases::{
        self, bootstrap,
        classify_message::{classify_message, ClassifyQuery},
        context::AppContext,
        edit_rules::{add_rule, list_rules, remove_rule, EditOutcome, RuleListing},
        watch_channel::{watch_channel, LineChatSource},
    },
};

use crate::cli::{Cli, Command, RulesAction};

pub fn run(cli: Cli) -> Result<()> {
    let context = bootstrap::bootstrap(cli.config.as_deref())?;
    tracing::debug!(
        domain = domain::module_name(),
        rules = rules::module_name(),
        hub = hub::module_name(),
        usecases = usecases::module_name(),
        infra = infra::module_name(),
        rules_file = %context.layout.rules_file.display(),
        "module boundaries loaded"
    );

    match cli.command_or_default() {
        Command::Rules { action } => run_rules(&context, action)?,
        Command::Classify {
            channel,
            author,
            text,
        } => {
            let classification = classify_message(
                &context.rules,
                ClassifyQuery {
                    channel: ChannelId::new(channel),
                    author: UserId::new(author),
                    text,
                },
            );
            match classification.highlighted_by() {
                Some(rule) => println!(
                    "{} (by {:?} rule {:?})",
                    classification.label(),
                    rule.target(),
                    rule.pattern().as_str()
                ),
                None => println!("{}", classification.label()),
            }
        }
        Command::Watch { channel } => run_watch(&context, ChannelId::new(channel))?,
    }

    Ok(())
}

fn run_rules(context: &AppContext, action: RulesAction) -> Result<()> {
    match action {
        RulesAction::List => {
            for line in listing_lines(&list_rules(&context.rules)) {
                println!("{line}");
            }
        }
        RulesAction::Add {
            target,
            pattern,
            regex,
        } => {
            let outcome = add_rule(&context.sessions, target.into(), Pattern::new(pattern, regex))?;
            println!("{}", outcome_message(outcome));
        }
        RulesAction::Remove { target, pattern } => {
            let outcome = remove_rule(&context.sessions, target.into(), &pattern)?;
            println!("{}", outcome_message(outcome));
        }
    }

    Ok(())
}

fn run_watch(context: &AppContext, channel: ChannelId) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let hub = ChannelStreamHub::new(
        Arc::new(LineChatSource::stdin()),
        Arc::clone(&context.rules),
        HubOptions::from(&context.config.hub),
        runtime.handle().clone(),
    );
    tracing::info!(channel = %channel, hub = ?hub, "watching channel");

    let mut stdout = io::stdout().lock();
    let summary = runtime.block_on(watch_channel(&hub, channel, &mut stdout))?;
    tracing::info!(
        printed = summary.printed,
        skipped = summary.skipped,
        status = ?summary.status,
        "watch finished"
    );

    Ok(())
}

fn listing_lines(listing: &RuleListing) -> Vec<String> {
    let section = |title: &str, patterns: &[Pattern]| {
        let mut lines = vec![format!("{title}:")];
        lines.extend(patterns.iter().map(|pattern| {
            if pattern.is_regex() {
                format!("  /{}/", pattern.as_str())
            } else {
                format!("  {}", pattern.as_str())
            }
        }));
        lines
    };

    let mut lines = section("message highlights", &listing.message);
    lines.extend(section("user highlights", &listing.user));
    lines.extend(section("blacklist", &listing.blacklist));
    lines
}

fn outcome_message(outcome: EditOutcome) -> &'static str {
    match outcome {
        EditOutcome::Added => "rule added",
        EditOutcome::AlreadyPresent => "rule already present",
        EditOutcome::Removed => "rule removed",
        EditOutcome::NotFound => "rule not found",
    }
}
