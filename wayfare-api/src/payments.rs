use serde::Serialize;
use tracing::info;
use wayfare_shared::{Masked, PaymentMethod};

use crate::client::{ApiClient, ApiRequest};
use crate::error::{ApiError, ApiResult};

/// Card details for a new payment method. Never logged in clear.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentMethod {
    pub card_number: Masked<String>,
    pub cardholder_name: String,
    pub expiry_month: u32,
    pub expiry_year: u32,
    pub cvv: Masked<String>,
    pub is_default: bool,
}

impl NewPaymentMethod {
    pub fn validate(&self) -> ApiResult<()> {
        let digits = self.card_number.expose().replace([' ', '-'], "");
        if !(12..=19).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::Validation("card number must be 12 to 19 digits".into()));
        }
        if !(1..=12).contains(&self.expiry_month) {
            return Err(ApiError::Validation("expiry month must be 1-12".into()));
        }
        let cvv = self.cvv.expose();
        if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
            return Err(ApiError::Validation("cvv must be 3 or 4 digits".into()));
        }
        if self.cardholder_name.trim().is_empty() {
            return Err(ApiError::Validation("cardholder name is required".into()));
        }
        Ok(())
    }
}

pub async fn list_payment_methods(client: &ApiClient) -> ApiResult<Vec<PaymentMethod>> {
    client.execute(&ApiRequest::get("/users/payment-methods")).await
}

pub async fn add_payment_method(client: &ApiClient, method: &NewPaymentMethod) -> ApiResult<PaymentMethod> {
    method.validate()?;
    let created: PaymentMethod = client
        .execute(&ApiRequest::post("/users/payment-methods").json(method)?)
        .await?;
    info!(payment_method_id = %created.id, "Payment method added");
    Ok(created)
}

pub async fn remove_payment_method(client: &ApiClient, id: &str) -> ApiResult<()> {
    client
        .execute_empty(&ApiRequest::delete("/users/payment-methods").segment(id))
        .await
}

pub async fn set_default_payment_method(client: &ApiClient, id: &str) -> ApiResult<()> {
    client
        .execute_empty(&ApiRequest::post("/users/payment-methods").segment(id).segment("default"))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(number: &str, month: u32) -> NewPaymentMethod {
        NewPaymentMethod {
            card_number: Masked::<String>::from(number),
            cardholder_name: "Ada Lovelace".to_string(),
            expiry_month: month,
            expiry_year: 2027,
            cvv: Masked::<String>::from("123"),
            is_default: false,
        }
    }

    #[test]
    fn test_card_validation() {
        assert!(card("4242 4242 4242 4242", 12).validate().is_ok());
        assert!(card("4242", 12).validate().is_err());
        assert!(card("4242 4242 4242 424x", 12).validate().is_err());
        assert!(card("4242424242424242", 13).validate().is_err());
    }

    #[test]
    fn test_card_number_masked_in_debug() {
        let rendered = format!("{:?}", card("4242424242424242", 1));
        assert!(!rendered.contains("4242"));
        let json = serde_json::to_value(card("4242424242424242", 1)).unwrap();
        assert_eq!(json["cardNumber"], "4242424242424242");
    }
}
