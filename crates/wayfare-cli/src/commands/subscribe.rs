use wayfare_core::api::SubscriptionRequest;

use crate::cli::{PaymentMethodArg, PlanArg};
use crate::commands::common::CliContext;
use crate::error::CliError;

pub async fn run_subscribe(
    context: &CliContext,
    email: &str,
    plan: PlanArg,
    method: PaymentMethodArg,
) -> Result<(), CliError> {
    let email = email.trim();
    if !email.contains('@') {
        return Err(CliError::InvalidEmail(email.to_string()));
    }

    let client = context.require_api_client()?;
    let request = SubscriptionRequest {
        email: email.to_string(),
        plan: plan.as_str().to_string(),
        method: method.as_str().to_string(),
    };

    if client.subscribe(&request).await.is_some() {
        println!("Subscribed {email} to the {} plan", request.plan);
    } else {
        println!("Subscription for {email} could not be confirmed by the backend");
    }
    Ok(())
}
