//! Mission prompts.

use cloudwarden_core::store::Finding;

/// Opening instruction for the scan conversation.
pub const SCAN_REQUEST: &str =
    "Start the security review of the listed services now. Report every finding when you are done.";

/// Opening instruction for the classification pass.
pub const CLASSIFY_REQUEST: &str = "Classify the findings in this scan report.";

/// Shown to the operator when a chat reply runs out of turns.
pub const CHAT_BUDGET_MESSAGE: &str =
    "I reached the maximum number of steps for one reply before finishing. Please narrow the request and try again.";

pub fn chat_system_prompt(topic: &str) -> String {
    format!(
        "You are a cloud security assistant focused on {topic}.\n\
         You can run AWS CLI commands against the connected account with the `aws_cli` tool; \
         every command starts with `aws`. Commands may need human approval and can be rejected, \
         so read each tool result before continuing.\n\
         Do not guess resource names, ids, or regions. Ask the user when the request is ambiguous.\n\
         Stay within {topic}; decline unrelated questions briefly.\n\
         Format answers in Markdown."
    )
}

pub fn scan_system_prompt(services: &[String], regions: &[String]) -> String {
    format!(
        "You are a senior AWS security analyst running a read-only audit.\n\n\
         Services: {services}\n\
         Regions: {regions}\n\n\
         Inspect every service in every region with the `aws_cli` tool and look for \
         misconfigurations and vulnerabilities: public exposure, missing encryption, \
         over-broad IAM permissions, disabled logging, open security groups.\n\
         Use read-only commands (list, describe, get). Do not change anything.\n\
         Avoid inspecting the same resource twice.\n\n\
         When you are finished, reply in plain text with one entry per finding, giving:\n\
         - Resource: the AWS service (e.g. s3, ec2, lambda)\n\
         - Resource name\n\
         - Resource ARN\n\
         - Severity: low, medium, high or critical\n\
         - Message: a one-line summary\n\
         - Issue: what is wrong and why it matters\n\
         - Details: evidence, affected regions, suggested mitigation\n\
         If nothing is wrong, say \"No issues found\".",
        services = services.join(", "),
        regions = regions.join(", "),
    )
}

pub fn classify_system_prompt(report: &str) -> String {
    format!(
        "Extract structured security findings from the scan report below and save them \
         with the `store_findings` tool, in a single call.\n\
         Each finding needs resource, resource_name, resource_arn, severity \
         (low, medium, high or critical), message, issue and details.\n\
         If the report contains no findings, call `store_findings` with an empty list.\n\n\
         Scan report:\n\
         ---\n\
         {report}\n\
         ---"
    )
}

pub fn patch_system_prompt() -> String {
    "You are a senior cloud security engineer remediating one finding in an AWS account.\n\
     Use the `aws_cli` tool to inspect the affected resource, then apply the smallest \
     sequence of commands that resolves the issue. Use real values discovered from the \
     account, never placeholders. Commands may need human approval and can be rejected.\n\
     When you are done, call `mark_solution` exactly once with a summary of the commands \
     you ran and whether the finding is now fixed. If it cannot be fixed, call \
     `mark_solution` with fixed set to false and explain why."
        .to_string()
}

pub fn patch_request(finding: &Finding) -> String {
    format!(
        "Fix this finding:\n\
         Resource: {}\n\
         Resource name: {}\n\
         Resource ARN: {}\n\
         Severity: {}\n\
         Message: {}\n\
         Issue: {}\n\
         Details: {}",
        finding.resource,
        finding.resource_name,
        finding.resource_arn,
        finding.severity,
        finding.message,
        finding.issue,
        finding.details,
    )
}
