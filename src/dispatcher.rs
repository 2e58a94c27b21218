use tracing::{debug, warn};

use crate::browser::Browser;
use crate::error::StepFailure;
use crate::handlers::{DefaultHandlers, StepContext, StepHandlers};
use crate::plan::{Action, Interaction};
use crate::progress::StepOutcome;

/// Routes one step to its handler and turns the result into a [`StepOutcome`].
#[derive(Debug, Clone, Default)]
pub struct Dispatcher<H = DefaultHandlers> {
    handlers: H,
}

impl<H> Dispatcher<H> {
    pub fn new(handlers: H) -> Self {
        Self { handlers }
    }

    pub async fn dispatch<B>(&self, ctx: &mut StepContext<'_, B>, action: &Action) -> StepOutcome
    where
        B: Browser,
        H: StepHandlers<B>,
    {
        debug!(action = action.label(), "dispatching step");

        let result = match action {
            Action::Navigate { url } => self.handlers.navigate(ctx, url).await,
            Action::Interact(Interaction::Click {
                element_description,
            }) => self.handlers.click(ctx, element_description).await,
            Action::Interact(Interaction::Type {
                element_description,
                value,
                submit,
            }) => {
                self.handlers
                    .type_text(ctx, element_description, value, *submit)
                    .await
            }
            Action::Interact(interaction @ Interaction::Select { .. }) => {
                Err(StepFailure::UnknownInteractionKind {
                    interaction: interaction.kind().to_string(),
                })
            }
        };

        // a handler that reports success must have touched the page
        let result = result.and_then(|()| {
            if ctx.actions_performed() == 0 {
                Err(StepFailure::NoActionPerformed)
            } else {
                Ok(())
            }
        });

        match result {
            Ok(()) => {
                debug!(
                    action = action.label(),
                    actions = ctx.actions_performed(),
                    "step succeeded"
                );
                StepOutcome::Succeeded
            }
            Err(reason) => {
                warn!(
                    action = action.label(),
                    reason = reason.label(),
                    error = %reason,
                    "step failed"
                );
                StepOutcome::Failed { reason }
            }
        }
    }
}
