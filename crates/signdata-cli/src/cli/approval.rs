//! Terminal approval authority.

use async_trait::async_trait;
use dialoguer::{theme::ColorfulTheme, Confirm};

use signdata_core::{ApprovalAuthority, ApprovalDecision, ApprovalError, ApprovalRequest};

/// Shows the rendered prompt on stderr and asks for a yes/no answer.
///
/// Fails with `Unavailable` when there is no interactive terminal.
pub struct TerminalApproval;

#[async_trait]
impl ApprovalAuthority for TerminalApproval {
    async fn request_approval(
        &self,
        request: &ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        let prompt = request.prompt.clone();

        let confirmed = tokio::task::spawn_blocking(move || {
            eprintln!("{prompt}\n");
            Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Sign this message?")
                .default(false)
                .interact()
        })
        .await
        .map_err(|e| ApprovalError::Unavailable(e.to_string()))?
        .map_err(|e| ApprovalError::Unavailable(format!("no interactive terminal: {e}")))?;

        Ok(if confirmed {
            ApprovalDecision::Confirm
        } else {
            ApprovalDecision::Reject
        })
    }
}
