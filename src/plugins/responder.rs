//! Pushback text for guardrail violations.
//!
//! Rendering is a pure function of its inputs. Phrasings are picked by
//! modular indexing on ids and counts, never at random, so the same
//! violations at the same trust level always produce the same string.

use crate::plugins::dik::{DikTier, dik_tier};
use crate::plugins::guardrails::Violation;

pub const LOW_TEMPLATES: [&str; 3] = [
    "Heads up: this project seems to follow \"{rule}\". Want me to stick with that?",
    "I noticed a possible convention here: {rule}. I can go either way.",
    "Quick note: existing code suggests \"{rule}\". Should I follow it?",
];

pub const MEDIUM_TEMPLATES: [&str; 3] = [
    "This goes against a project convention: {rule}. I'd recommend following it.",
    "The codebase consistently follows this rule: {rule}. Let's keep to it unless there's a reason not to.",
    "Before we continue: {rule}. This change doesn't match that.",
];

pub const HIGH_TEMPLATES: [&str; 3] = [
    "I'm going to push back here. This project's rule is clear: {rule}.",
    "This breaks an established convention: {rule}. I strongly recommend we don't do this.",
    "This violates a project rule: {rule}. Let's do it the project's way.",
];

pub const ESCALATION_PHRASES: [&str; 3] = [
    " This rule keeps getting overridden. If it's wrong, let's retire it instead.",
    " You've overridden this one before.",
    " This has come up before; each override costs a little consistency.",
];

pub const VINDICATION_REMINDERS: [&str; 3] = [
    " Last time this was overridden, the original suggestion turned out to be right.",
    " For the record: the earlier override of this rule was later changed back to match it.",
    " History note: you ended up adopting this convention after overriding it before.",
];

pub const HIGH_VINDICATED_CLOSING: &str =
    "Some of these were overridden before, and the original suggestion won out in the end.";

fn templates_for(tier: DikTier) -> &'static [&'static str; 3] {
    match tier {
        DikTier::Low => &LOW_TEMPLATES,
        DikTier::Medium => &MEDIUM_TEMPLATES,
        DikTier::High => &HIGH_TEMPLATES,
    }
}

fn pick<'a>(phrases: &'a [&'a str; 3], index: i64) -> &'a str {
    phrases[index.rem_euclid(phrases.len() as i64) as usize]
}

/// Render the response for a whole check. No violations renders as empty.
pub fn render_response(violations: &[Violation], dik_level: f64) -> String {
    let tier = dik_tier(dik_level);
    match violations {
        [] => String::new(),
        [single] => render_single(single, tier),
        many => render_multiple(many, tier),
    }
}

pub fn render_single(violation: &Violation, tier: DikTier) -> String {
    let mut out = pick(templates_for(tier), violation.guardrail_id).replace("{rule}", &violation.rule);
    if tier == DikTier::Low {
        return out;
    }
    if violation.history.previous_override_count > 0 {
        out.push_str(pick(&ESCALATION_PHRASES, violation.history.previous_override_count));
    }
    if violation.history.ever_vindicated {
        out.push_str(pick(&VINDICATION_REMINDERS, violation.guardrail_id));
    }
    out
}

pub fn render_multiple(violations: &[Violation], tier: DikTier) -> String {
    let (opening, closing) = match tier {
        DikTier::Low => (
            "A few project conventions might apply here:".to_string(),
            "Want me to follow them?".to_string(),
        ),
        DikTier::Medium => (
            format!("This conflicts with {} project conventions:", violations.len()),
            "I'd recommend adjusting before we continue.".to_string(),
        ),
        DikTier::High => (
            format!(
                "I'm going to stop here. This breaks {} established conventions:",
                violations.len()
            ),
            "Let's fix these before moving on.".to_string(),
        ),
    };

    let mut lines = vec![opening];
    for v in violations {
        lines.push(format!("- {}", v.rule));
    }
    lines.push(closing);
    if tier == DikTier::High && violations.iter().any(|v| v.history.ever_vindicated) {
        lines.push(HIGH_VINDICATED_CLOSING.to_string());
    }
    lines.join("\n")
}
