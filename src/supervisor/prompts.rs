//! Prompt construction for every stage operation
//!
//! Prompts are plain `format!` templates. Each asks for strict JSON with an
//! explicit key list; the lenient extractor absorbs the drift that happens
//! anyway.

use crate::domain::{Issue, MissionPlan};

pub(crate) const SYSTEM_ASSESS: &str = "You are an engineering supervisor forming an execution strategy \
for a work item before a coding agent runs. Reply with strict JSON only.";

pub(crate) const SYSTEM_ANALYZE: &str = "You are an engineering supervisor inspecting a coding agent's \
output. Grade completion against acceptance criteria, validate scope, and report discoveries. \
Reply with strict JSON only.";

pub(crate) const SYSTEM_COMPLETION: &str = "You are an engineering supervisor deciding whether a \
structural work item may close based on its children. Reply with strict JSON only.";

pub(crate) const SYSTEM_PLAN: &str = "You are an engineering supervisor planning a mission as ordered \
phases of tasks. Reply with strict JSON only.";

pub(crate) const SYSTEM_DIAGNOSE: &str = "You are an engineering supervisor diagnosing a test failure \
from raw output. Reply with strict JSON only.";

pub(crate) const SYSTEM_SUMMARIZE: &str = "You summarize coding-agent output faithfully and concisely. \
Reply with plain text only.";

pub(crate) const SYSTEM_DESCRIBE: &str = "You extract the goal and constraints from a free-form work \
description. Reply with strict JSON only.";

pub(crate) const SYSTEM_REFINE: &str = "You are an engineering supervisor iteratively improving a work \
artifact. Keep what is right, sharpen what is vague, remove what is wrong.";

/// Agent output is bounded to this many characters before analysis
pub(crate) const ANALYSIS_OUTPUT_BUDGET: usize = 8_000;

/// Test output larger than this is truncated before diagnosis
pub(crate) const DIAGNOSIS_OUTPUT_BUDGET: usize = 100_000;

/// Render the shared issue header embedded in most prompts
pub(crate) fn issue_block(issue: &Issue) -> String {
    let mut block = format!(
        "Issue: {id}\nTitle: {title}\nType: {ty} (subtype: {subtype})\nPriority: {priority}\nStatus: {status}\n",
        id = issue.id,
        title = issue.title,
        ty = issue.r#type,
        subtype = issue.subtype,
        priority = issue.priority,
        status = issue.status,
    );

    block.push_str(&format!("\nDescription:\n{}\n", issue.description));

    if let Some(design) = &issue.design {
        block.push_str(&format!("\nDesign:\n{}\n", design));
    }

    if issue.acceptance_criteria.trim().is_empty() {
        block.push_str("\nAcceptance criteria: (none recorded)\n");
    } else {
        block.push_str(&format!("\nAcceptance criteria:\n{}\n", issue.acceptance_criteria));
    }

    block
}

pub(crate) fn assessment_prompt(issue: &Issue) -> String {
    format!(
        "{issue}\n\
         Form an execution strategy for this issue.\n\n\
         Reply with JSON:\n\
         {{\n\
           \"strategy\": \"high-level approach\",\n\
           \"steps\": [\"ordered execution steps\"],\n\
           \"risks\": [\"what could go wrong\"],\n\
           \"confidence\": 0.0,\n\
           \"reasoning\": \"why this strategy\",\n\
           \"should_decompose\": false,\n\
           \"decomposition\": null or {{\n\
             \"reasoning\": \"why to split\",\n\
             \"child_issues\": [{{\"title\": \"\", \"description\": \"\", \"acceptance_criteria\": \"\", \"priority\": 2, \"estimated_minutes\": null}}]\n\
           }}\n\
         }}",
        issue = issue_block(issue)
    )
}

pub(crate) fn analysis_prompt(issue: &Issue, agent_output: &str, success: bool) -> String {
    format!(
        "{issue}\n\
         The coding agent reported {outcome}. Its output follows:\n\n\
         --- AGENT OUTPUT ---\n{output}\n--- END AGENT OUTPUT ---\n\n\
         Inspect the output. Grade each acceptance criterion, check the agent stayed on task, \
         list punted work, and report discovered issues with kind blocker|related|background.\n\n\
         Reply with JSON:\n\
         {{\n\
           \"completed\": false,\n\
           \"scope\": {{\"on_task\": true, \"explanation\": \"\"}},\n\
           \"criteria\": [{{\"criterion\": \"\", \"met\": false, \"evidence\": \"\", \"reason\": \"\"}}],\n\
           \"punted\": [\"\"],\n\
           \"discovered_issues\": [{{\"title\": \"\", \"description\": \"\", \"type\": \"task\", \
\"priority_hint\": \"P2\", \"kind\": \"related\", \"acceptance_criteria\": null, \"labels\": []}}],\n\
           \"quality_issues\": [\"\"],\n\
           \"summary\": \"\",\n\
           \"confidence\": 0.0\n\
         }}",
        issue = issue_block(issue),
        outcome = if success { "success" } else { "failure" },
        output = truncate_middle(agent_output, ANALYSIS_OUTPUT_BUDGET),
    )
}

pub(crate) fn completion_prompt(parent: &Issue, children: &[Issue]) -> String {
    let closed = children.iter().filter(|c| !c.is_open()).count();
    let mut roster = String::new();
    for child in children {
        roster.push_str(&format!("- {} [{}] {}\n", child.id, child.status, child.title));
    }

    let structural_rule = if parent.is_structural() {
        "\nThis is a structural container: all children closed strongly implies the parent is \
         complete. Rebut only with a concrete unmet acceptance criterion.\n"
    } else {
        ""
    };

    format!(
        "{issue}\n\
         Children ({closed}/{total} closed):\n{roster}{structural_rule}\n\
         Decide whether the parent may close.\n\n\
         Reply with JSON:\n\
         {{\"should_close\": false, \"reasoning\": \"\", \"confidence\": 0.0, \"caveats\": [\"\"]}}",
        issue = issue_block(parent),
        closed = closed,
        total = children.len(),
        roster = roster,
        structural_rule = structural_rule,
    )
}

pub(crate) fn plan_prompt(mission: &Issue) -> String {
    format!(
        "{issue}\n\
         Produce a phased execution plan for this mission.\n\n\
         Rules:\n\
         - Phase numbers are unique positive integers\n\
         - Phase dependencies reference existing phase numbers and form no cycles\n\
         - Every phase has at least one task\n\n\
         Reply with JSON:\n\
         {{\n\
           \"mission_id\": \"{id}\",\n\
           \"strategy\": \"\",\n\
           \"estimated_effort\": \"\",\n\
           \"confidence\": 0.0,\n\
           \"risks\": [\"\"],\n\
           \"phases\": [{{\n\
             \"number\": 1,\n\
             \"title\": \"\",\n\
             \"description\": \"\",\n\
             \"strategy\": \"\",\n\
             \"tasks\": [{{\"title\": \"\", \"description\": \"\", \"acceptance_criteria\": \"\", \
\"depends_on\": [], \"estimated_minutes\": null, \"priority\": 2, \"type\": \"task\"}}],\n\
             \"depends_on\": [],\n\
             \"estimated_effort\": \"\"\n\
           }}]\n\
         }}",
        issue = issue_block(mission),
        id = mission.id,
    )
}

/// Appended to the planning prompt after a failed parse so the model can
/// self-correct
pub(crate) fn parse_retry_suffix(diagnostic: &str) -> String {
    format!(
        "\n\nYour previous reply could not be parsed: {}\nReply again with strict JSON only, no prose, no code fences.",
        diagnostic
    )
}

pub(crate) fn refine_phase_prompt(plan: &MissionPlan, phase_number: u32, feedback: &str) -> String {
    format!(
        "Current plan for mission {mission}:\n\n{plan}\n\n\
         Refine phase {number} using this feedback:\n{feedback}\n\n\
         Reply with the COMPLETE updated plan as strict JSON in the same schema. \
         Leave other phases untouched unless the feedback requires otherwise.",
        mission = plan.mission_id,
        plan = plan_json(plan),
        number = phase_number,
        feedback = feedback,
    )
}

pub(crate) fn phase_structure_prompt(plan: &MissionPlan) -> String {
    let mut outline = String::new();
    for phase in &plan.phases {
        let deps: Vec<String> = phase.depends_on.iter().map(|d| d.to_string()).collect();
        outline.push_str(&format!(
            "Phase {}: {} (deps: [{}], {} tasks)\n",
            phase.number,
            phase.title,
            deps.join(", "),
            phase.tasks.len()
        ));
        for task in &phase.tasks {
            outline.push_str(&format!("  - {}\n", task.title));
        }
    }

    format!(
        "Judge the logical ordering of this mission plan:\n\n{outline}\n\
         Errors are ordering problems that would break execution; warnings are stylistic.\n\n\
         Reply with JSON: {{\"errors\": [\"\"], \"warnings\": [\"\"]}}",
        outline = outline,
    )
}

pub(crate) fn diagnosis_prompt(issue: &Issue, test_output: &str) -> String {
    format!(
        "{issue}\n\
         Test output:\n\n--- TEST OUTPUT ---\n{output}\n--- END TEST OUTPUT ---\n\n\
         Diagnose the failure.\n\n\
         Reply with JSON:\n\
         {{\n\
           \"failure_type\": \"flaky|real|environmental|unknown\",\n\
           \"root_cause\": \"\",\n\
           \"proposed_fix\": \"\",\n\
           \"confidence\": 0.0,\n\
           \"test_names\": [\"\"],\n\
           \"stack_traces\": [\"\"],\n\
           \"verification\": [\"steps to verify the fix\"]\n\
         }}",
        issue = issue_block(issue),
        output = truncate_middle(test_output, DIAGNOSIS_OUTPUT_BUDGET),
    )
}

pub(crate) fn summarize_prompt(agent_output: &str, max_chars: usize) -> String {
    format!(
        "Summarize this coding-agent output in at most {max_chars} characters. \
         Keep concrete outcomes, errors, and file names.\n\n{output}",
        max_chars = max_chars,
        output = truncate_middle(agent_output, ANALYSIS_OUTPUT_BUDGET),
    )
}

pub(crate) fn describe_prompt(text: &str) -> String {
    format!(
        "Extract the goal and constraints from this description:\n\n{text}\n\n\
         Reply with JSON: {{\"goal\": \"\", \"constraints\": [\"\"]}}",
        text = text,
    )
}

pub(crate) fn refine_artifact_prompt(artifact_type: &str, content: &str, context: &str) -> String {
    format!(
        "Improve this {artifact_type}.\n\n\
         Context:\n{context}\n\n\
         Current {artifact_type}:\n{content}\n\n\
         Reply with the improved {artifact_type} in the SAME textual format, \
         keeping every section heading. Do not add commentary.",
        artifact_type = artifact_type,
        content = content,
        context = context,
    )
}

/// Compare two artifact serializations for convergence. Both sides are
/// truncated so the comparison stays inside the token budget.
pub(crate) fn convergence_prompt(artifact_type: &str, current: &str, previous: &str) -> String {
    const SIDE_BUDGET: usize = 3_000;
    format!(
        "Two consecutive versions of a {artifact_type} follow.\n\n\
         PREVIOUS:\n{previous}\n\n\
         CURRENT:\n{current}\n\n\
         Has the {artifact_type} stabilized, or would another iteration make a substantive difference?\n\n\
         Reply with JSON: {{\"converged\": false, \"confidence\": 0.0, \"reasoning\": \"\", \"strategy\": \"what to focus on next\"}}",
        artifact_type = artifact_type,
        previous = truncate_middle(previous, SIDE_BUDGET),
        current = truncate_middle(current, SIDE_BUDGET),
    )
}

pub(crate) fn reemit_prompt(artifact_type: &str, content: &str, schema_hint: &str) -> String {
    format!(
        "Convert this final {artifact_type} into strict JSON.\n\n{content}\n\n\
         Reply with JSON only, in this schema:\n{schema_hint}",
        artifact_type = artifact_type,
        content = content,
        schema_hint = schema_hint,
    )
}

pub(crate) fn plan_json(plan: &MissionPlan) -> String {
    serde_json::to_string_pretty(plan).unwrap_or_else(|_| "{}".to_string())
}

/// Truncate preserving the start, middle, and end of the text.
///
/// Large agent output usually carries its signal at the boundaries (setup,
/// the interesting transition, the final verdict); even three-way slicing
/// keeps all three visible.
pub(crate) fn truncate_middle(text: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let marker = "\n...[truncated]...\n";
    let slice = max_chars / 3;
    let chars: Vec<char> = text.chars().collect();

    let start: String = chars[..slice].iter().collect();
    let mid_from = total / 2 - slice / 2;
    let middle: String = chars[mid_from..mid_from + slice].iter().collect();
    let end: String = chars[total - slice..].iter().collect();

    format!("{start}{marker}{middle}{marker}{end}")
}
