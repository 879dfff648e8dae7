use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use wayfare_shared::{CabinClass, SearchResults, TripType};

use crate::client::{ApiClient, ApiRequest};
use crate::error::{ApiError, ApiResult};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlightSearchQuery {
    pub from: String,
    pub to: String,
    pub departure_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_date: Option<String>,
    pub cabin_class: CabinClass,
    pub trip_type: TripType,
}

impl FlightSearchQuery {
    /// Form checks, so a malformed search never reaches the backend.
    pub fn validate(&self) -> ApiResult<()> {
        if self.from.trim().is_empty() || self.to.trim().is_empty() {
            return Err(ApiError::Validation("origin and destination are required".into()));
        }
        if self.from.eq_ignore_ascii_case(&self.to) {
            return Err(ApiError::Validation("origin and destination must differ".into()));
        }
        let departure = parse_date("departure date", &self.departure_date)?;

        match (self.trip_type, &self.return_date) {
            (TripType::RoundTrip, None) => {
                Err(ApiError::Validation("a round trip needs a return date".into()))
            }
            (TripType::RoundTrip, Some(raw)) => {
                if parse_date("return date", raw)? < departure {
                    return Err(ApiError::Validation("return date is before departure".into()));
                }
                Ok(())
            }
            (TripType::OneWay, _) => Ok(()),
        }
    }

    fn to_request(&self) -> ApiRequest {
        let mut request = ApiRequest::get("/flights")
            .query("from", self.from.trim().to_ascii_uppercase())
            .query("to", self.to.trim().to_ascii_uppercase())
            .query("departureDate", self.departure_date.as_str())
            .query("cabinClass", self.cabin_class.as_str())
            .query("tripType", self.trip_type.to_string());
        // One-way searches never send a return date
        if let (TripType::RoundTrip, Some(date)) = (self.trip_type, &self.return_date) {
            request = request.query("returnDate", date.as_str());
        }
        request
    }
}

fn parse_date(field: &str, raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| ApiError::Validation(format!("{} must be YYYY-MM-DD, got {:?}", field, raw)))
}

pub async fn search_flights(client: &ApiClient, query: &FlightSearchQuery) -> ApiResult<SearchResults> {
    query.validate()?;
    let results: SearchResults = client.execute(&query.to_request()).await?;
    info!(
        from = %query.from,
        to = %query.to,
        outbound = results.outbound_flights.len(),
        inbound = results.return_flights.len(),
        "Flight search complete"
    );
    Ok(results)
}
