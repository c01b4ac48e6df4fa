use paydesk_client::HttpPayoutRequestRepository;
use paydesk_core::config::{AppConfig, LoadOptions};
use paydesk_core::display::DELETE_CONFIRMATION_PROMPT;
use paydesk_core::domain::{Decision, PayoutRequestId, StatusFilter};
use paydesk_core::errors::WorkflowError;
use paydesk_core::session::StaticSession;
use paydesk_core::workflow::{ActionOutcome, WorkflowController, WorkflowSettings};

use crate::commands::{
    prepare, CommandResult, EXIT_CONFIG, EXIT_CONFIRMATION_REQUIRED, EXIT_OPERATION,
};

type Controller = WorkflowController<HttpPayoutRequestRepository, StaticSession>;

pub fn list(options: LoadOptions, filter: StatusFilter) -> CommandResult {
    let (config, runtime) = match prepare("list", options) {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };
    let controller = match build_controller("list", &config) {
        Ok(controller) => controller.with_filter(filter),
        Err(result) => return result,
    };

    let outcome = runtime.block_on(controller.reload());
    let message = format!(
        "{} payout request(s) ({})",
        controller.records().len(),
        filter.label().to_lowercase()
    );
    finish("list", &controller, outcome, message)
}

/// Approve or reject. The list is loaded first so the decision is checked
/// against the backend's current view of the record.
pub fn transition(options: LoadOptions, id: PayoutRequestId, decision: Decision) -> CommandResult {
    let command = match decision {
        Decision::Accept => "approve",
        Decision::Reject => "reject",
    };
    let (config, runtime) = match prepare(command, options) {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };
    let controller = match build_controller(command, &config) {
        Ok(controller) => controller,
        Err(result) => return result,
    };

    let outcome = runtime.block_on(async {
        match controller.reload().await {
            ActionOutcome::Completed => {}
            other => return other,
        }
        match decision {
            Decision::Accept => controller.approve(&id).await,
            Decision::Reject => controller.reject(&id).await,
        }
    });

    let message = format!("payout request {id} {}", decision.target_status());
    finish(command, &controller, outcome, message)
}

/// Without `confirm` this only arms the delete and reports the prompt.
pub fn delete(options: LoadOptions, id: PayoutRequestId, confirm: bool) -> CommandResult {
    let (config, runtime) = match prepare("delete", options) {
        Ok(prepared) => prepared,
        Err(result) => return result,
    };
    let controller = match build_controller("delete", &config) {
        Ok(controller) => controller,
        Err(result) => return result,
    };

    let outcome = runtime.block_on(async {
        let armed = controller.delete(&id).await;
        if !confirm || armed != ActionOutcome::AwaitingConfirmation {
            return armed;
        }
        controller.delete(&id).await
    });

    let message = format!("payout request {id} deleted");
    finish("delete", &controller, outcome, message)
}

fn build_controller(command: &str, config: &AppConfig) -> Result<Controller, CommandResult> {
    let repository = HttpPayoutRequestRepository::from_config(&config.backend).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            EXIT_CONFIG,
        )
    })?;

    Ok(WorkflowController::new(
        repository,
        StaticSession::from_config(&config.session),
        WorkflowSettings::from_config(config),
    ))
}

fn finish(
    command: &str,
    controller: &Controller,
    outcome: ActionOutcome,
    message: String,
) -> CommandResult {
    match outcome {
        ActionOutcome::Completed => {
            let data = serde_json::to_value(controller.snapshot()).ok();
            CommandResult::success_with_data(command, message, data)
        }
        ActionOutcome::AwaitingConfirmation => CommandResult::failure(
            command,
            "confirmation_required",
            format!("{DELETE_CONFIRMATION_PROMPT} Re-run with --confirm to proceed."),
            EXIT_CONFIRMATION_REQUIRED,
        ),
        ActionOutcome::AlreadyProcessing => {
            let error = WorkflowError::ConcurrentOperationRejected;
            CommandResult::failure(
                command,
                error.error_class(),
                error.user_message(),
                EXIT_OPERATION,
            )
        }
        ActionOutcome::Superseded => CommandResult::failure(
            command,
            "superseded",
            "a newer read replaced this result",
            EXIT_OPERATION,
        ),
        ActionOutcome::Failed(error) => CommandResult::failure(
            command,
            error.error_class(),
            error.user_message(),
            EXIT_OPERATION,
        ),
    }
}
