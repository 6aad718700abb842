// ── Essential-tool registry ──────────────────────────────────────────────────
// The bundled, declarative catalog of capabilities the permission engine
// recognizes by name. Grounded in the tool surface a real agent exposes
// (cloud IAM, email, chat/channel bridges, code execution, filesystem,
// on-chain transfers) — each entry just a dotted id, a label, a risk tier,
// and the action applied when no user override exists.

use sidecar_core::models::{Action, EssentialTool, RiskTier};
use std::sync::LazyLock;

/// The bundled registry. Looked up by exact dotted id first, then by the
/// function-name suffix after the last dot (`send_email` matches
/// `gmail.send_email`).
pub static ESSENTIAL_TOOLS: LazyLock<Vec<EssentialTool>> = LazyLock::new(|| {
    vec![
        tool("aws.iam_create_user", "Create an AWS IAM user", RiskTier::Admin, Action::Block),
        tool("aws.iam_delete_user", "Delete an AWS IAM user", RiskTier::Admin, Action::Block),
        tool("aws.iam_attach_policy", "Attach an IAM policy", RiskTier::Admin, Action::Block),
        tool("aws.s3_delete_bucket", "Delete an S3 bucket", RiskTier::Delete, Action::Block),
        tool("aws.s3_list_buckets", "List S3 buckets", RiskTier::Read, Action::Allow),
        tool("aws.ec2_terminate_instance", "Terminate an EC2 instance", RiskTier::Delete, Action::Block),
        tool("gmail.send_email", "Send an email via Gmail", RiskTier::Write, Action::LogOnly),
        tool("gmail.delete_email", "Delete an email", RiskTier::Delete, Action::Block),
        tool("gmail.read_inbox", "Read the inbox", RiskTier::Read, Action::Allow),
        tool("google.drive_delete_file", "Delete a Google Drive file", RiskTier::Delete, Action::Block),
        tool("google.calendar_create_event", "Create a calendar event", RiskTier::Write, Action::LogOnly),
        tool("slack.post_message", "Post a Slack message", RiskTier::Write, Action::LogOnly),
        tool("slack.delete_channel", "Delete a Slack channel", RiskTier::Delete, Action::Block),
        tool("discord.send_message", "Send a Discord message", RiskTier::Write, Action::LogOnly),
        tool("discord.ban_member", "Ban a Discord member", RiskTier::Admin, Action::Block),
        tool("discord.delete_channel", "Delete a Discord channel", RiskTier::Delete, Action::Block),
        tool("github.create_repo", "Create a GitHub repository", RiskTier::Write, Action::LogOnly),
        tool("github.delete_repo", "Delete a GitHub repository", RiskTier::Delete, Action::Block),
        tool("github.merge_pull_request", "Merge a pull request", RiskTier::Write, Action::LogOnly),
        tool("filesystem.delete_path", "Delete a file or directory", RiskTier::Delete, Action::Block),
        tool("filesystem.write_file", "Write a file", RiskTier::Write, Action::LogOnly),
        tool("filesystem.read_file", "Read a file", RiskTier::Read, Action::Allow),
        tool("exec.run_command", "Execute an arbitrary shell command", RiskTier::Admin, Action::Block),
        tool("solana.transfer_sol", "Transfer SOL on-chain", RiskTier::Write, Action::Block),
        tool("solana.swap_token", "Swap a token via a DEX", RiskTier::Write, Action::Block),
        tool("coinbase.withdraw_funds", "Withdraw funds from Coinbase", RiskTier::Admin, Action::Block),
        tool("telegram.send_message", "Send a Telegram message", RiskTier::Write, Action::LogOnly),
        tool("n8n.trigger_workflow", "Trigger an n8n workflow", RiskTier::Write, Action::LogOnly),
        tool("stripe.create_charge", "Create a Stripe charge", RiskTier::Write, Action::Block),
        tool("stripe.issue_refund", "Issue a Stripe refund", RiskTier::Write, Action::Block),
    ]
});

fn tool(id: &str, label: &str, risk: RiskTier, default_action: Action) -> EssentialTool {
    EssentialTool { id: id.to_string(), label: label.to_string(), risk, default_action }
}

/// Finds an entry by exact id, or by the function-name suffix after the
/// last `.` (so a model calling the bare `send_email` still resolves to
/// `gmail.send_email`'s registry entry).
pub fn lookup(function_name: &str) -> Option<&'static EssentialTool> {
    if let Some(exact) = ESSENTIAL_TOOLS.iter().find(|t| t.id == function_name) {
        return Some(exact);
    }
    ESSENTIAL_TOOLS
        .iter()
        .find(|t| t.id.rsplit_once('.').map(|(_, suffix)| suffix) == Some(function_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_id_lookup() {
        let found = lookup("aws.iam_create_user").unwrap();
        assert_eq!(found.risk, RiskTier::Admin);
        assert_eq!(found.default_action, Action::Block);
    }

    #[test]
    fn suffix_lookup_matches_bare_function_name() {
        let found = lookup("send_email").unwrap();
        assert_eq!(found.id, "gmail.send_email");
    }

    #[test]
    fn unknown_name_has_no_entry() {
        assert!(lookup("totally.unknown_tool").is_none());
    }
}
